use crate::error::Error;
use crate::migration::Group;
use crate::reporter::{Logger, Phase, Reporter, Stats};
use crate::session::{Connection, Transaction};

/// How the [`Runner`] scopes the statements of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// One transaction around the whole tree: it is committed when every step succeeded and
    /// rolled back on any error, so either the full set of changes lands or none of it does.
    #[default]
    Shared,
    /// No explicit transaction; every statement commits on its own. Needed for DDL the database
    /// refuses to run inside a transaction, at the cost of partial application on failure.
    AutoCommit,
}

/// The entrypoint for applying a tree of migrations to a database.
///
/// ```
/// # #[cfg(not(feature = "sqlite"))]
/// # fn main() {}
/// # #[cfg(feature = "sqlite")]
/// # fn main() {
/// use stepwise::{group, statements, Guard, Runner, Step, TransactionMode};
///
/// let root = group![Step::new(
///     Guard::table_not_exists("widgets"),
///     statements!["CREATE TABLE widgets (id INTEGER)"],
/// )]
/// .with_label("schema")
/// .with_abort_on_error(true);
///
/// let mut conn = rusqlite::Connection::open_in_memory().unwrap();
/// let mut runner = Runner::new().with_transaction_mode(TransactionMode::Shared);
///
/// // nothing is kept from a dry run
/// assert_eq!(runner.dry_run(&root, &mut conn).unwrap().applied, 1);
/// assert_eq!(runner.apply(&root, &mut conn).unwrap().applied, 1);
/// # }
/// ```
#[derive(Debug)]
pub struct Runner<R: Reporter = Logger> {
    reporter: R,
    transaction_mode: TransactionMode,
}

impl Runner<Logger> {
    pub fn new() -> Self {
        Self {
            reporter: Logger::new(),
            transaction_mode: TransactionMode::default(),
        }
    }
}

impl Default for Runner<Logger> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Reporter> Runner<R> {
    /// Report step outcomes to `reporter` instead of the default [`Logger`].
    pub fn with_reporter<T: Reporter>(self, reporter: T) -> Runner<T> {
        Runner {
            reporter,
            transaction_mode: self.transaction_mode,
        }
    }

    pub fn with_transaction_mode(mut self, transaction_mode: TransactionMode) -> Self {
        self.transaction_mode = transaction_mode;
        self
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Tallies of the most recent run, including one that returned an error.
    pub fn stats(&self) -> Stats {
        self.reporter.stats()
    }

    /// Apply `root` to the database.
    ///
    /// Returns the run's tallies, or the first error a step reported. With
    /// [`TransactionMode::Shared`] an error leaves the database untouched.
    pub fn apply<C: Connection>(
        &mut self,
        root: &Group,
        connection: &mut C,
    ) -> Result<Stats, Error> {
        self.start(Phase::Apply, root);
        let result = match self.transaction_mode {
            TransactionMode::Shared => self.apply_in_transaction(root, connection, true),
            TransactionMode::AutoCommit => root.apply(connection, &mut self.reporter, None),
        };
        self.finish(result)
    }

    /// Apply `root` inside a transaction that is always rolled back.
    ///
    /// Reports what [`Runner::apply`] would do under the `test` phase; later steps see the effects
    /// of earlier ones, but nothing is kept.
    pub fn dry_run<C: Connection>(
        &mut self,
        root: &Group,
        connection: &mut C,
    ) -> Result<Stats, Error> {
        self.start(Phase::Test, root);
        let result = self.apply_in_transaction(root, connection, false);
        self.finish(result)
    }

    /// Open a PostgreSQL connection from `config` and apply `root` to it.
    #[cfg(feature = "postgres")]
    #[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
    pub fn apply_with_config(
        &mut self,
        root: &Group,
        config: &crate::config::Config,
    ) -> Result<Stats, Error> {
        let mut client = crate::postgres::connect(config)?;
        self.apply(root, &mut client)
    }

    fn start(&mut self, phase: Phase, root: &Group) {
        self.reporter.reset();
        self.reporter.set_phase(phase);
        tracing::debug!(
            phase = %phase,
            label = root.label().unwrap_or_default(),
            transaction_mode = ?self.transaction_mode,
            "Starting migration run"
        );
    }

    fn apply_in_transaction<C: Connection>(
        &mut self,
        root: &Group,
        connection: &mut C,
        commit: bool,
    ) -> Result<(), Error> {
        let mut tx = connection.begin()?;
        match root.apply(&mut tx, &mut self.reporter, None) {
            Ok(()) if commit => tx.commit(),
            Ok(()) => tx.rollback(),
            Err(error) => {
                if let Err(rollback_error) = tx.rollback() {
                    tracing::error!(error = %rollback_error, "Rollback failed");
                }
                Err(error)
            }
        }
    }

    fn finish(&mut self, result: Result<(), Error>) -> Result<Stats, Error> {
        self.reporter.write_stats();
        match result {
            Ok(()) => Ok(self.reporter.stats()),
            Err(error) => {
                tracing::debug!(error = %error, aborted = error.is_abort(), "Migration run failed");
                Err(error)
            }
        }
    }
}

impl Group {
    /// Apply this group as the root of a run with a default [`Runner`].
    pub fn apply_to<C: Connection>(&self, connection: &mut C) -> Result<Stats, Error> {
        Runner::new().apply(self, connection)
    }
}
