//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use quire_core::{Collection, ListingEntry, Note, RelationshipEntry};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Pretty-print any serializable value as JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print a single note
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("Title:    {}", note.title());
                if let Some(ref subject) = note.fields.subject {
                    println!("Subject:  {}", subject);
                }
                if !note.fields.tags.is_empty() {
                    println!("Tags:     {}", note.fields.tags.join(", "));
                }
                if let Some(ref syntax) = note.fields.syntax {
                    println!("Syntax:   {}", syntax);
                }
                if !note.access_rights.is_empty() {
                    println!("Shared:   {} account(s)", note.access_rights.len());
                }
                println!("Updated:  {}", note.updated_at.format("%Y-%m-%d %H:%M"));
                println!();
                println!("{}", note.fields.body);
            }
            OutputFormat::Json => self.json(note),
            OutputFormat::Quiet => println!("{}", note.title()),
        }
    }

    /// Print a single collection with its snapshots in order
    pub fn print_collection(&self, collection: &Collection) {
        match self.format {
            OutputFormat::Human => {
                println!("Title:    {}", collection.title());
                if let Some(ref subject) = collection.fields.subject {
                    println!("Subject:  {}", subject);
                }
                if let Some(ref body) = collection.fields.body {
                    println!("Body:     {}", truncate_line(body, 60));
                }
                if !collection.fields.tags.is_empty() {
                    println!("Tags:     {}", collection.fields.tags.join(", "));
                }
                if !collection.access_rights.is_empty() {
                    println!("Shared:   {} account(s)", collection.access_rights.len());
                }
                println!(
                    "Updated:  {}",
                    collection.updated_at.format("%Y-%m-%d %H:%M")
                );

                println!();
                println!("── Notes ({}) ──", collection.snapshots.len());
                for (position, snapshot) in collection.snapshots.iter().enumerate() {
                    println!(
                        "{:>3}. {} - {}",
                        position,
                        snapshot.title(),
                        truncate_line(&snapshot.fields.body, 50)
                    );
                }
            }
            OutputFormat::Json => self.json(collection),
            OutputFormat::Quiet => println!("{}", collection.title()),
        }
    }

    pub fn print_notes(&self, notes: &[Note]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes found.");
                    return;
                }
                for note in notes {
                    println!(
                        "{} | {}",
                        truncate(note.title(), 35),
                        truncate_line(&note.fields.body, 45)
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => self.json(notes),
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.title());
                }
            }
        }
    }

    pub fn print_collections(&self, collections: &[Collection]) {
        match self.format {
            OutputFormat::Human => {
                if collections.is_empty() {
                    println!("No collections found.");
                    return;
                }
                for collection in collections {
                    println!(
                        "{} [{}]",
                        truncate(collection.title(), 45),
                        collection.snapshots.len()
                    );
                }
                println!("\n{} collection(s)", collections.len());
            }
            OutputFormat::Json => self.json(collections),
            OutputFormat::Quiet => {
                for collection in collections {
                    println!("{}", collection.title());
                }
            }
        }
    }

    /// Print the combined listing
    pub fn print_listing(&self, entries: &[ListingEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("Nothing here yet.");
                    return;
                }
                for entry in entries {
                    let kind = match entry {
                        ListingEntry::Note(_) => "note",
                        ListingEntry::Collection(_) => "collection",
                    };
                    println!("{:<10} {}", kind, truncate(entry.title(), 60));
                }
                println!("\n{} item(s)", entries.len());
            }
            OutputFormat::Json => self.json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.title());
                }
            }
        }
    }

    /// Print friends and pending requests
    pub fn print_relationships(&self, entries: &[RelationshipEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No friends or requests.");
                    return;
                }
                for entry in entries {
                    let label = match entry {
                        RelationshipEntry::IncomingPending(_) => "wants to be friends",
                        RelationshipEntry::OutgoingPending(_) => "request sent",
                        RelationshipEntry::Established(_) => "friend",
                    };
                    println!("{:<20} {}", entry.account().username, label);
                }
            }
            OutputFormat::Json => self.json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.account().username);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
