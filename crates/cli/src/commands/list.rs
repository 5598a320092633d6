//! One-shot catalog listing.
//!
//! # Usage
//!
//! ```bash
//! pocket-shop list
//! pocket-shop list --json
//! ```

use std::io::Write;

use pocket_shop_store::ProductStore;

use super::{CliError, write_products};

/// Fetch the catalog once and write it to `out`.
///
/// # Errors
///
/// Returns an error if the fetch fails or output cannot be written.
pub async fn run(store: &ProductStore, json: bool, mut out: impl Write) -> Result<(), CliError> {
    let snapshot = store.fetch_catalog().await?;

    if json {
        serde_json::to_writer_pretty(&mut out, &*snapshot)?;
        writeln!(out)?;
    } else {
        write_products(&mut out, &snapshot)?;
    }

    out.flush()?;
    Ok(())
}
