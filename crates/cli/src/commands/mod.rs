//! CLI commands and their shared error type.

pub mod list;
pub mod shell;

use std::io::{self, Write};

use pocket_shop_core::{Product, ProductValidationError};
use pocket_shop_store::{CatalogError, ConfigError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration or flag value is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading the remote catalog failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A product is missing required fields.
    #[error("{0}")]
    Validation(#[from] ProductValidationError),
}

const TITLE_WIDTH: usize = 40;

/// Write products as an aligned table.
///
/// The `#` column is the 1-based position in `products`. Locally created
/// products share the default ID, so the shell addresses entries by position.
pub(crate) fn write_products(out: &mut impl Write, products: &[Product]) -> io::Result<()> {
    if products.is_empty() {
        return writeln!(out, "(no products)");
    }

    writeln!(
        out,
        "{:>3}  {:>4}  {:<width$}  {:>9}  CATEGORY",
        "#",
        "ID",
        "TITLE",
        "PRICE",
        width = TITLE_WIDTH
    )?;
    for (position, product) in products.iter().enumerate() {
        writeln!(
            out,
            "{:>3}  {:>4}  {:<width$}  {:>9}  {}",
            position + 1,
            product.id,
            truncate(&product.title, TITLE_WIDTH),
            product.price.to_string(),
            product.category,
            width = TITLE_WIDTH
        )?;
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("Lamp", 10), "Lamp");
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate("Fjallraven Backpack", 10), "Fjallra...");
    }

    #[test]
    fn test_write_empty_products() {
        let mut out = Vec::new();
        write_products(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(no products)\n");
    }

    #[test]
    fn test_write_products_numbers_rows_from_one() {
        let mut out = Vec::new();
        write_products(&mut out, &test_support::catalog()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut rows = text.lines().skip(1);
        let first = rows.next().unwrap();
        let second = rows.next().unwrap();
        assert!(first.trim_start().starts_with("1  "));
        assert!(first.contains("Backpack"));
        assert!(second.trim_start().starts_with("2  "));
        assert!(second.contains("T-Shirt"));
    }

    #[test]
    fn test_validation_error_passes_message_through() {
        let err = CliError::from(Product::default().validate().unwrap_err());
        assert!(
            err.to_string()
                .starts_with("Please fill in the following required fields: Title")
        );
    }
}
