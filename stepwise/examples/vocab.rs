//! Applies a small vocabulary schema to the database described by the `DB_*` environment
//! variables, then drops it again.
//!
//! ```sh
//! DB_NAME=scratch RUST_LOG=stepwise=debug cargo run --example vocab --features postgres
//! ```

use std::path::Path;

use stepwise::{group, statements, Config, Guard, Invocable, Runner, Step};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), stepwise::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stepwise=info")),
        )
        .without_time()
        .with_target(false)
        .init();

    let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("examples/vocab_data.sql");

    let root = group![
        Step::new(
            Guard::table_exists("test_vocab"),
            statements!["DROP TABLE test_vocab"],
        )
        .with_label("reset"),
        Step::new(
            Guard::table_not_exists("test_vocab"),
            statements![
                "CREATE TABLE test_vocab (id serial not null, word varchar(32) not null)",
                "ALTER TABLE test_vocab ADD CONSTRAINT pk_test_vocab_id PRIMARY KEY (id)",
            ],
        )
        .with_label("create"),
        Step::new(
            Guard::if_empty("test_vocab has no rows", "SELECT 1 FROM test_vocab LIMIT 1", vec![]),
            Invocable::script(data),
        )
        .with_label("seed"),
        Step::new(
            Guard::dynamic("foo is missing", |session| {
                session.query_is_empty("SELECT 1 FROM test_vocab WHERE word = $1", &["foo".into()])
            }),
            Invocable::body(|session| {
                session.execute("INSERT INTO test_vocab (word) VALUES ($1)", &["foo".into()])
            }),
        )
        .with_label("custom"),
        Step::new(
            Guard::table_exists("test_vocab"),
            statements!["DROP TABLE test_vocab"],
        )
        .with_label("cleanup"),
    ]
    .with_label("vocab")
    .with_abort_on_error(true);

    let config = Config::from_env();
    let mut runner = Runner::new();
    runner.apply_with_config(&root, &config)?;
    Ok(())
}
