//! Friend command handlers

use anyhow::Result;

use quire_core::{Account, DecideOutcome, Quire, RequestOutcome};

use crate::output::{Output, OutputFormat};

/// Send a friend request; crossing requests become a friendship at once
pub fn request(quire: &Quire, me: &Account, username: &str, output: &Output) -> Result<()> {
    let outcome = quire.relationships().request_by_username(me.id, username)?;

    let message = match outcome {
        RequestOutcome::Sent => format!("Sent friend request to {}", username),
        RequestOutcome::Established => format!("You and {} are now friends", username),
        RequestOutcome::AlreadyEstablished => format!("Already friends with {}", username),
    };
    report(output, &outcome, &message);
    Ok(())
}

/// Accept or deny a request from `username`
pub fn decide(
    quire: &Quire,
    me: &Account,
    username: &str,
    accept: bool,
    output: &Output,
) -> Result<()> {
    let requester = quire.accounts().find_by_username(username)?;
    let outcome = quire.relationships().decide(me.id, requester.id, accept)?;

    let message = match outcome {
        DecideOutcome::Accepted => format!("You and {} are now friends", username),
        DecideOutcome::Denied => format!("Denied request from {}", username),
        DecideOutcome::AlreadyEstablished => format!("Already friends with {}", username),
    };
    report(output, &outcome, &message);
    Ok(())
}

/// Withdraw a request sent to `username`
pub fn cancel(quire: &Quire, me: &Account, username: &str, output: &Output) -> Result<()> {
    let requestee = quire.accounts().find_by_username(username)?;
    let cancelled = quire.relationships().cancel(me.id, requestee.id)?;

    let message = if cancelled {
        format!("Cancelled request to {}", username)
    } else {
        format!("No pending request to {}", username)
    };
    report(output, &serde_json::json!({ "cancelled": cancelled }), &message);
    Ok(())
}

/// End a friendship; shared access is revoked in both directions
pub fn remove(quire: &Quire, me: &Account, username: &str, output: &Output) -> Result<()> {
    let other = quire.accounts().find_by_username(username)?;
    let outcome = quire.relationships().dissolve(me.id, other.id)?;

    let message = if outcome.was_established {
        format!(
            "No longer friends with {} ({} shared item(s) revoked)",
            username,
            outcome.cascade.total()
        )
    } else {
        format!("Not friends with {}", username)
    };
    report(output, &outcome, &message);
    Ok(())
}

pub fn list(quire: &Quire, me: &Account, output: &Output) -> Result<()> {
    let entries = quire.relationships().relationships(me.id)?;
    output.print_relationships(&entries);
    Ok(())
}

fn report<T: serde::Serialize>(output: &Output, outcome: &T, message: &str) {
    match output.format {
        OutputFormat::Json => output.json(outcome),
        _ => output.success(message),
    }
}
