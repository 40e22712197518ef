//! Account command handlers

use anyhow::{Context, Result};

use quire_core::Quire;

use super::confirm;
use crate::output::{Output, OutputFormat};

/// Register a new account
pub fn create(quire: &Quire, username: &str, output: &Output) -> Result<()> {
    let account = quire
        .accounts()
        .create_account(username)
        .context("Failed to create account")?;

    match output.format {
        OutputFormat::Json => output.json(&account),
        OutputFormat::Quiet => println!("{}", account.id),
        OutputFormat::Human => output.success(&format!("Created account: {}", account.username)),
    }
    Ok(())
}

/// Show an account and its friends and requests
pub fn show(quire: &Quire, username: &str, output: &Output) -> Result<()> {
    let account = quire.accounts().find_by_username(username)?;
    let entries = quire.relationships().relationships(account.id)?;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "account": account,
            "relationships": entries,
        })),
        OutputFormat::Quiet => println!("{}", account.id),
        OutputFormat::Human => {
            println!("Username: {}", account.username);
            println!("ID:       {}", account.id);
            println!("Created:  {}", account.created_at.format("%Y-%m-%d %H:%M"));
            println!();
            output.print_relationships(&entries);
        }
    }
    Ok(())
}

/// Delete an account, its content and every reference to it
pub fn delete(quire: &Quire, username: &str, force: bool, output: &Output) -> Result<()> {
    let account = quire.accounts().find_by_username(username)?;

    if !force && output.should_prompt() {
        println!(
            "Delete account '{}' with all of its notes and collections?",
            account.username
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let outcome = quire.accounts().delete_account(account.id)?;

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            output.success(&format!("Deleted account: {}", outcome.account.username));
            println!(
                "  {} note(s), {} collection(s) removed; {} friend(s) and {} grant(s) updated",
                outcome.notes_deleted,
                outcome.collections_deleted,
                outcome.counterparts_updated,
                outcome.grants_revoked
            );
        }
    }
    Ok(())
}
