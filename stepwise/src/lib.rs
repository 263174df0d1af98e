#![cfg_attr(docsrs, feature(doc_cfg))]
//! `stepwise` applies database schema changes as a tree of guarded, idempotent steps.
//!
//! Core concepts:
//! - A [`Step`] pairs a [`Guard`], a read-only check of the live schema, with an [`Invocable`],
//!   the change itself. The change runs only when the guard says it is still needed.
//! - A [`Group`] is an ordered list of steps and nested groups.
//! - A [`Runner`] applies a root group to a database and reports every outcome through a
//!   [`Reporter`], by default the `tracing`-backed [`Logger`].
//!
//! # Motivation
//!
//! Version-table migrators record which scripts already ran and trust that record. `stepwise`
//! instead asks the database every time: a step that would create a table first checks that the
//! table is missing. The same tree can be applied to a fresh database, to one that is halfway
//! there, or to one that is already up to date, and a second run reports every step as skipped.
//!
//! Guards and actions share one session, and by default one transaction around the whole tree,
//! so nothing can change the schema between a check and its action and a failed run leaves no
//! partial changes behind.
//!
//! # Example
//!
//! ```
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> Result<(), stepwise::Error> {
//! use stepwise::{group, statements, Guard, Invocable, Runner, Step};
//!
//! let root = group![
//!     Step::new(
//!         Guard::table_not_exists("vocab"),
//!         statements!["CREATE TABLE vocab (id INTEGER PRIMARY KEY, word TEXT NOT NULL)"],
//!     ),
//!     Step::new(
//!         Guard::if_empty("vocab has no words", "SELECT 1 FROM vocab LIMIT 1", vec![]),
//!         Invocable::body(|session| {
//!             for word in ["foo", "bar"] {
//!                 session.execute("INSERT INTO vocab (word) VALUES (?1)", &[word.into()])?;
//!             }
//!             Ok(())
//!         }),
//!     ),
//! ]
//! .with_label("vocab")
//! .with_abort_on_error(true);
//!
//! let mut conn = rusqlite::Connection::open_in_memory()?;
//! assert_eq!(Runner::new().apply(&root, &mut conn)?.applied, 2);
//! assert_eq!(Runner::new().apply(&root, &mut conn)?.skipped, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag (default).
//! - [`PostgreSQL`](postgres) - available with the `postgres` feature flag.
//!
//! Any other database can take part by implementing [`Session`], [`Transaction`] and
//! [`Connection`].

pub mod config;
pub use config::Config;

mod error;
pub use error::Error;

pub mod guard;
pub use guard::{DynamicGuard, Guard, SchemaObject};

mod invocable;
pub use invocable::{Body, Invocable};

mod migration;
pub use migration::{Group, Migration, Step};

pub mod reporter;
pub use reporter::{Logger, Outcome, Phase, Reporter, Scope, Stats};

mod runner;
pub use runner::{Runner, TransactionMode};

mod session;
pub use session::{Connection, Dialect, Session, Transaction, Value};

#[macro_use]
mod macros;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
