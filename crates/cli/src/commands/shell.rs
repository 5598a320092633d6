//! Interactive session against one store.
//!
//! Reads one command per line. Catalog and cart observers are registered up
//! front and print a summary line for every snapshot the store publishes, so
//! the output shows exactly what any other view of the store would see.
//!
//! `add` and `remove` take a position from the `#` column of the `catalog` and
//! `cart` listings. Locally created products have no server ID, so positions
//! are the only way to tell two of them apart.
//!
//! A failed `fetch` is reported and the session continues; run `fetch` again
//! to retry.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use pocket_shop_core::{Price, Product};
use pocket_shop_store::{CartSnapshot, CatalogSnapshot, ProductStore, Subscription};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{CliError, write_products};

const HELP: &str = "\
Commands:
  fetch           Fetch the remote catalog
  catalog         Show the current catalog
  create <json>   Create a product from a JSON object
  created         Show locally created products
  add <n>         Add catalog entry #n to the cart
  remove <n>      Remove cart entry #n
  cart            Show the cart
  help            Show this message
  quit            End the session";

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Fetch,
    Catalog,
    Create(String),
    Created,
    /// 1-based position in the catalog listing.
    Add(usize),
    /// 1-based position in the cart listing.
    Remove(usize),
    Cart,
    Help,
    Quit,
    Empty,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid position '{0}' (use the # column of the listing)")]
    InvalidPosition(String),
}

/// Parse one input line.
///
/// # Errors
///
/// Returns `ParseError` for unknown commands and missing or bad arguments.
pub fn parse_command(line: &str) -> Result<ShellCommand, ParseError> {
    let line = line.trim();
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, rest)| (name, rest.trim()));

    let position_arg = |command: &'static str| -> Result<usize, ParseError> {
        if rest.is_empty() {
            return Err(ParseError::MissingArgument(command));
        }
        match rest.parse::<usize>() {
            Ok(position) if position > 0 => Ok(position),
            _ => Err(ParseError::InvalidPosition(rest.to_string())),
        }
    };

    match name {
        "" => Ok(ShellCommand::Empty),
        "fetch" | "refresh" => Ok(ShellCommand::Fetch),
        "catalog" | "ls" => Ok(ShellCommand::Catalog),
        "create" if rest.is_empty() => Err(ParseError::MissingArgument("create")),
        "create" => Ok(ShellCommand::Create(rest.to_string())),
        "created" => Ok(ShellCommand::Created),
        "add" => position_arg("add").map(ShellCommand::Add),
        "remove" | "rm" => position_arg("remove").map(ShellCommand::Remove),
        "cart" => Ok(ShellCommand::Cart),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

/// Output shared between command handlers and store observers.
type SharedOut<W> = Arc<Mutex<W>>;

struct Session<W> {
    store: ProductStore,
    out: SharedOut<W>,
    _catalog: Subscription,
    _cart: Subscription,
}

impl<W: Write + Send + 'static> Session<W> {
    fn new(store: ProductStore, out: W) -> Self {
        let out = Arc::new(Mutex::new(out));

        let catalog_out = Arc::clone(&out);
        let catalog = store.subscribe_catalog(move |snapshot: &CatalogSnapshot| {
            let _ = writeln!(catalog_out.lock(), "[catalog] {} products", snapshot.len());
        });

        let cart_out = Arc::clone(&out);
        let cart = store.subscribe_cart(move |snapshot: &CartSnapshot| {
            let _ = writeln!(
                cart_out.lock(),
                "[cart] {} items, total {}",
                snapshot.len(),
                cart_total(snapshot)
            );
        });

        tracing::debug!(
            catalog = %catalog.id(),
            cart = %cart.id(),
            "Session observers registered"
        );

        Self {
            store,
            out,
            _catalog: catalog,
            _cart: cart,
        }
    }

    /// Run one command. Returns `false` when the session should end.
    async fn execute(&self, command: ShellCommand) -> io::Result<bool> {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Quit => return Ok(false),
            ShellCommand::Help => writeln!(self.out.lock(), "{HELP}")?,
            ShellCommand::Fetch => {
                // Observers print the new snapshot; only failures need reporting here.
                if let Err(e) = self.store.fetch_catalog().await {
                    writeln!(self.out.lock(), "fetch failed: {e} (run 'fetch' to retry)")?;
                }
            }
            ShellCommand::Catalog => write_products(&mut *self.out.lock(), &self.store.catalog())?,
            ShellCommand::Created => {
                write_products(&mut *self.out.lock(), &self.store.list_created_products())?;
            }
            ShellCommand::Cart => write_products(&mut *self.out.lock(), &self.store.list_cart())?,
            ShellCommand::Create(json) => match parse_new_product(&json) {
                Ok(product) => self.store.create_product(product),
                Err(e) => writeln!(self.out.lock(), "create failed: {e}")?,
            },
            ShellCommand::Add(position) => {
                let catalog = self.store.catalog();
                match entry_at(&catalog, position) {
                    Some(product) => self.store.add_to_cart(product.clone()),
                    None => writeln!(self.out.lock(), "no entry #{position} in the catalog")?,
                }
            }
            ShellCommand::Remove(position) => {
                // Equal entries are interchangeable, so removing the first
                // equal one removes the listed entry.
                let cart = self.store.list_cart();
                let removed = entry_at(&cart, position)
                    .is_some_and(|product| self.store.remove_from_cart(product));
                if !removed {
                    writeln!(self.out.lock(), "no entry #{position} in the cart")?;
                }
            }
        }
        Ok(true)
    }
}

/// Decode and validate a product typed into the session.
fn parse_new_product(json: &str) -> Result<Product, CliError> {
    let product: Product = serde_json::from_str(json)?;
    product.validate()?;
    Ok(product)
}

/// Entry at a 1-based listing position.
fn entry_at(products: &[Product], position: usize) -> Option<&Product> {
    position.checked_sub(1).and_then(|index| products.get(index))
}

fn cart_total(items: &[Product]) -> Price {
    items.iter().map(|p| p.price).sum()
}

/// Run a session reading commands from `input` until EOF or `quit`.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails; command
/// failures are reported in the output and the session continues.
pub async fn run<R, W>(store: ProductStore, input: R, out: W) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let session = Session::new(store, out);
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let keep_going = match parse_command(&line) {
            Ok(command) => session.execute(command).await?,
            Err(e) => {
                writeln!(session.out.lock(), "{e}")?;
                true
            }
        };
        if !keep_going {
            break;
        }
    }

    session.out.lock().flush()?;
    tracing::debug!("Session ended");
    Ok(())
}
