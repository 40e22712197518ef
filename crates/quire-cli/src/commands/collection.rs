//! Collection command handlers

use anyhow::{Context, Result};

use quire_core::{Account, CollectionFields, Quire};

use crate::output::{Output, OutputFormat};

/// Metadata given on the command line; unset fields keep their current value
#[derive(Debug, Default)]
pub struct CollectionArgs {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub tags: Vec<String>,
}

impl CollectionArgs {
    fn apply(self, current: CollectionFields) -> CollectionFields {
        CollectionFields {
            title: self.title.unwrap_or(current.title),
            subject: self.subject.or(current.subject),
            body: self.body.or(current.body),
            tags: if self.tags.is_empty() {
                current.tags
            } else {
                self.tags
            },
        }
    }
}

pub fn create(
    quire: &Quire,
    me: &Account,
    args: CollectionArgs,
    notes: &[String],
    output: &Output,
) -> Result<()> {
    let fields = args.apply(CollectionFields::default());
    let collection = quire
        .collections()
        .create_collection(me.id, fields, notes)
        .context("Failed to create collection")?;

    output.success(&format!("Created collection: {}", collection.title()));
    output.print_collection(&collection);
    Ok(())
}

/// Edit metadata; with no notes given the current selection is refreshed
pub fn edit(
    quire: &Quire,
    me: &Account,
    title: &str,
    args: CollectionArgs,
    notes: &[String],
    output: &Output,
) -> Result<()> {
    let current = quire.collections().get_collection(me.id, title)?;
    let notes: Vec<String> = if notes.is_empty() {
        current
            .snapshots
            .iter()
            .map(|snapshot| snapshot.title().to_string())
            .collect()
    } else {
        notes.to_vec()
    };
    let fields = args.apply(current.fields);

    let outcome = quire.collections().update_collection(
        me.id,
        title,
        fields,
        &notes,
        quire.config().listing_filter,
    )?;

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        OutputFormat::Quiet => println!("{}", outcome.collection.title()),
        OutputFormat::Human => {
            output.success(&format!(
                "Updated collection: {}",
                outcome.collection.title()
            ));
            if outcome.position_changed {
                println!("  moved in your listing");
            }
        }
    }
    Ok(())
}

pub fn append(
    quire: &Quire,
    me: &Account,
    title: &str,
    notes: &[String],
    output: &Output,
) -> Result<()> {
    let collection = quire.collections().add_to_collection(me.id, title, notes)?;
    output.success(&format!(
        "{} now holds {} note(s)",
        collection.title(),
        collection.snapshots.len()
    ));
    Ok(())
}

pub fn remove(
    quire: &Quire,
    me: &Account,
    title: &str,
    note: &str,
    output: &Output,
) -> Result<()> {
    let collection = quire
        .collections()
        .remove_from_collection(me.id, title, note)?;
    output.success(&format!("Removed {} from {}", note, collection.title()));
    Ok(())
}

pub fn reorder(
    quire: &Quire,
    me: &Account,
    title: &str,
    order: &[usize],
    output: &Output,
) -> Result<()> {
    let collection = quire
        .collections()
        .reorder_collection(me.id, title, order)?;

    match output.format {
        OutputFormat::Human => output.print_collection(&collection),
        OutputFormat::Json => output.json(&collection),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

pub fn show(quire: &Quire, me: &Account, title: &str, output: &Output) -> Result<()> {
    let collection = quire.collections().get_collection(me.id, title)?;
    output.print_collection(&collection);
    Ok(())
}

pub fn list(quire: &Quire, me: &Account, output: &Output) -> Result<()> {
    let collections = quire.collections().list_collections(me.id)?;
    output.print_collections(&collections);
    Ok(())
}

pub fn delete(quire: &Quire, me: &Account, title: &str, output: &Output) -> Result<()> {
    let collection = quire.collections().delete_collection(me.id, title)?;
    output.success(&format!("Deleted collection: {}", collection.title()));
    Ok(())
}

/// Grant or revoke a friend's access to a collection
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
    let collection = if grant {
        sharing.share_collection(me.id, title, grantee.id)?
    } else {
        sharing.unshare_collection(me.id, title, grantee.id)?
    };

    match output.format {
        OutputFormat::Json => output.json(&collection),
        _ if grant => output.success(&format!("Shared {} with {}", collection.title(), username)),
        _ => output.success(&format!(
            "Stopped sharing {} with {}",
            collection.title(),
            username
        )),
    }
    Ok(())
}
