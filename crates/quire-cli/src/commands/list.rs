//! Combined listing command

use anyhow::Result;

use quire_core::{Account, DisplayFilter, Quire};

use crate::output::Output;

/// List what `me` can see, using the configured filter unless one is given
pub fn list(quire: &Quire, me: &Account, filter: Option<&str>, output: &Output) -> Result<()> {
    let filter = match filter {
        Some(value) => value.parse::<DisplayFilter>()?,
        None => quire.config().listing_filter,
    };

    let entries = quire.listing(me.id, filter)?;
    output.print_listing(&entries);
    Ok(())
}
