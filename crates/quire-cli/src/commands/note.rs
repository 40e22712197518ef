//! Note command handlers

use anyhow::{Context, Result};

use quire_core::{Account, NoteFields, Quire};

use crate::output::{Output, OutputFormat};

/// Fields given on the command line; unset ones keep their current value
#[derive(Debug, Default)]
pub struct NoteArgs {
    pub title: Option<String>,
    pub body: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub syntax: Option<String>,
}

impl NoteArgs {
    /// Overlay these arguments on existing fields
    fn apply(self, current: NoteFields) -> NoteFields {
        NoteFields {
            title: self.title.unwrap_or(current.title),
            subject: self.subject.or(current.subject),
            body: self.body.unwrap_or(current.body),
            tags: if self.tags.is_empty() {
                current.tags
            } else {
                self.tags
            },
            syntax: self.syntax.or(current.syntax),
        }
    }
}

pub fn create(quire: &Quire, me: &Account, args: NoteArgs, output: &Output) -> Result<()> {
    let fields = args.apply(NoteFields::default());
    let note = quire
        .notes()
        .create_note(me.id, fields)
        .context("Failed to create note")?;

    output.success(&format!("Created note: {}", note.title()));
    output.print_note(&note);
    Ok(())
}

/// Edit a note and push the change into the collections holding it
pub fn edit(
    quire: &Quire,
    me: &Account,
    title: &str,
    args: NoteArgs,
    output: &Output,
) -> Result<()> {
    let current = quire.notes().get_note(me.id, title)?;
    let fields = args.apply(current.fields);

    let outcome = quire
        .notes()
        .update_note(me.id, title, fields, quire.config().listing_filter)?;

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        OutputFormat::Quiet => println!("{}", outcome.note.title()),
        OutputFormat::Human => {
            output.success(&format!("Updated note: {}", outcome.note.title()));
            if outcome.propagation.collections_updated > 0 {
                println!(
                    "  refreshed in {} collection(s)",
                    outcome.propagation.collections_updated
                );
            }
            if outcome.position_changed {
                println!("  moved in your listing");
            }
        }
    }
    Ok(())
}

pub fn show(quire: &Quire, me: &Account, title: &str, output: &Output) -> Result<()> {
    let note = quire.notes().get_note(me.id, title)?;
    output.print_note(&note);
    Ok(())
}

pub fn list(quire: &Quire, me: &Account, output: &Output) -> Result<()> {
    let notes = quire.notes().list_notes(me.id)?;
    output.print_notes(&notes);
    Ok(())
}

/// Delete a note and its snapshots in the owner's collections
pub fn delete(quire: &Quire, me: &Account, title: &str, output: &Output) -> Result<()> {
    let outcome = quire.notes().delete_note(me.id, title)?;

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        _ => output.success(&format!(
            "Deleted note: {} (removed from {} collection(s))",
            outcome.title,
            outcome.propagation.collections_updated
        )),
    }
    Ok(())
}

/// Grant or revoke a friend's access to a note
pub fn share(
    quire: &Quire,
    me: &Account,
    title: &str,
    username: &str,
    grant: bool,
    output: &Output,
) -> Result<()> {
    let grantee = quire.accounts().find_by_username(username)?;
    let sharing = quire.sharing();
    let note = if grant {
        sharing.share_note(me.id, title, grantee.id)?
    } else {
        sharing.unshare_note(me.id, title, grantee.id)?
    };

    match output.format {
        OutputFormat::Json => output.json(&note),
        _ if grant => output.success(&format!("Shared {} with {}", note.title(), username)),
        _ => output.success(&format!("Stopped sharing {} with {}", note.title(), username)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_keep_unset_fields() {
        let current = NoteFields::new("draft", "body")
            .with_subject("ideas")
            .with_tags(["rust"]);
        let args = NoteArgs {
            title: Some("final".to_string()),
            ..NoteArgs::default()
        };

        let fields = args.apply(current);
        assert_eq!(fields.title, "final");
        assert_eq!(fields.body, "body");
        assert_eq!(fields.subject.as_deref(), Some("ideas"));
        assert_eq!(fields.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_args_replace_tags() {
        let current = NoteFields::new("draft", "body").with_tags(["old"]);
        let args = NoteArgs {
            tags: vec!["new".to_string()],
            ..NoteArgs::default()
        };
        assert_eq!(args.apply(current).tags, vec!["new".to_string()]);
    }
}
