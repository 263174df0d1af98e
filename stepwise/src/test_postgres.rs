//! PostgreSQL integration tests.
//!
//! A single container is started on first use and shared by every test; each test gets its own
//! database. The tests need a docker daemon and are ignored by default:
//! `cargo test --features postgres -- --ignored`.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use crate::{group, statements, Config, Error, Guard, Invocable, Runner, Session, Step};

/// Default credentials for testcontainers-modules postgres
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";

static POSTGRES_PORT: OnceLock<u16> = OnceLock::new();

fn postgres_port() -> u16 {
    *POSTGRES_PORT.get_or_init(|| {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
        let port = rt.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");
            // keep the container running for the rest of the test binary
            std::mem::forget(container);
            port
        });
        std::mem::forget(rt);
        port
    })
}

fn config_for(database: &str) -> Config {
    Config::default()
        .with_host("127.0.0.1")
        .with_port(postgres_port().to_string())
        .with_username(PG_USER)
        .with_password(PG_PASSWORD)
        .with_database(database)
}

/// Create a database with a unique name and return its configuration.
fn fresh_database() -> Config {
    let mut admin =
        Client::connect(&config_for("postgres").dsn(), NoTls).expect("failed to connect as admin");
    let name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", name))
        .expect("failed to create test database");
    config_for(&name)
}

fn fresh_client() -> Client {
    crate::postgres::connect(&fresh_database()).expect("failed to connect to test database")
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[test]
#[ignore = "requires docker"]
fn table_guards() {
    let mut client = fresh_client();
    assert!(Guard::table_not_exists("widgets").evaluate(&mut client).unwrap());
    assert!(!Guard::table_exists("widgets").evaluate(&mut client).unwrap());

    client
        .batch_execute("CREATE TABLE widgets (id SERIAL PRIMARY KEY)")
        .unwrap();
    assert!(Guard::table_exists("widgets").evaluate(&mut client).unwrap());
    // unquoted identifiers are stored in lower case
    assert!(Guard::table_exists("Widgets").evaluate(&mut client).unwrap());
    assert!(!Guard::table_not_exists("WIDGETS").evaluate(&mut client).unwrap());
}

#[test]
#[ignore = "requires docker"]
fn column_constraint_and_index_guards() {
    let mut client = fresh_client();
    client
        .batch_execute(
            "CREATE TABLE widgets (id SERIAL PRIMARY KEY, name TEXT);
             ALTER TABLE widgets ADD CONSTRAINT widgets_name_unique UNIQUE (name);
             CREATE INDEX ix_widgets_name ON widgets (name);",
        )
        .unwrap();

    assert!(Guard::column_exists("widgets", "name").evaluate(&mut client).unwrap());
    assert!(Guard::column_not_exists("widgets", "size").evaluate(&mut client).unwrap());
    assert!(Guard::constraint_exists("widgets_name_unique")
        .evaluate(&mut client)
        .unwrap());
    assert!(Guard::constraint_not_exists("widgets_size_check")
        .evaluate(&mut client)
        .unwrap());
    assert!(Guard::index_exists("widgets", "ix_widgets_name")
        .evaluate(&mut client)
        .unwrap());
    assert!(Guard::index_not_exists("gadgets", "ix_widgets_name")
        .evaluate(&mut client)
        .unwrap());
}

#[test]
#[ignore = "requires docker"]
fn role_guards() {
    let mut client = fresh_client();
    // roles are cluster wide, so the name has to be unique across tests
    let role = unique("reporting");
    assert!(Guard::role_not_exists(role.as_str()).evaluate(&mut client).unwrap());

    client.batch_execute(&format!("CREATE ROLE {}", role)).unwrap();
    assert!(Guard::role_exists(role.as_str()).evaluate(&mut client).unwrap());
    client.batch_execute(&format!("DROP ROLE {}", role)).unwrap();
}

#[test]
#[ignore = "requires docker"]
fn statements_are_traced() {
    use tracing_test::traced_test;

    #[traced_test]
    fn run_test() {
        let mut client = fresh_client();
        Session::execute(&mut client, "CREATE TABLE traced (id INTEGER)", &[]).unwrap();
        client
            .query_is_empty("SELECT 1 FROM traced WHERE id = $1", &[1.into()])
            .unwrap();

        assert!(logs_contain("kind=\"execute\""));
        assert!(logs_contain("CREATE TABLE traced (id INTEGER)"));
        assert!(logs_contain("kind=\"query\""));
        assert!(logs_contain("elapsed_ms="));
    }

    run_test();
}

#[test]
#[ignore = "requires docker"]
fn params_are_bound() {
    let mut client = fresh_client();
    client
        .batch_execute("CREATE TABLE vocab (id SERIAL PRIMARY KEY, word TEXT NOT NULL, rank INT8)")
        .unwrap();
    Session::execute(
        &mut client,
        "INSERT INTO vocab (word, rank) VALUES ($1, $2)",
        &["foo".into(), 7i64.into()],
    )
    .unwrap();
    Session::execute(
        &mut client,
        "INSERT INTO vocab (word, rank) VALUES ($1, $2)",
        &["bar".into(), crate::Value::Null],
    )
    .unwrap();

    assert!(!client
        .query_is_empty("SELECT 1 FROM vocab WHERE word = $1", &["bar".into()])
        .unwrap());
    assert!(client
        .query_is_empty("SELECT 1 FROM vocab WHERE rank = $1", &[8i64.into()])
        .unwrap());
}

fn vocab() -> crate::Group {
    group![
        Step::new(
            Guard::table_not_exists("vocab"),
            statements!["CREATE TABLE vocab (id SERIAL PRIMARY KEY, word TEXT NOT NULL)"],
        ),
        Step::new(
            Guard::constraint_not_exists("vocab_word_unique"),
            statements!["ALTER TABLE vocab ADD CONSTRAINT vocab_word_unique UNIQUE (word)"],
        ),
        Step::new(
            Guard::if_empty("vocab is empty", "SELECT 1 FROM vocab LIMIT 1", vec![]),
            Invocable::body(|session| {
                for word in ["foo", "bar", "baz"] {
                    session.execute("INSERT INTO vocab (word) VALUES ($1)", &[word.into()])?;
                }
                Ok(())
            }),
        ),
    ]
    .with_label("vocab")
    .with_abort_on_error(true)
}

#[test]
#[ignore = "requires docker"]
fn runner_applies_once() {
    let config = fresh_database();
    let mut runner = Runner::new();

    assert_eq!(runner.apply_with_config(&vocab(), &config).unwrap().applied, 3);
    assert_eq!(runner.apply_with_config(&vocab(), &config).unwrap().skipped, 3);

    let mut client = crate::postgres::connect(&config).unwrap();
    let count: i64 = client
        .query_one("SELECT COUNT(*) FROM vocab", &[])
        .unwrap()
        .get(0);
    assert_eq!(count, 3);
}

#[test]
#[ignore = "requires docker"]
fn failed_run_rolls_back_ddl() {
    let mut client = fresh_client();
    let root = group![
        Step::new(
            Guard::table_not_exists("gadgets"),
            statements!["CREATE TABLE gadgets (id SERIAL PRIMARY KEY)"],
        ),
        Step::new(Guard::always(), statements!["INSERT INTO nowhere VALUES (1)"]),
    ];

    let err = Runner::new().apply(&root, &mut client).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Postgres(_)));
    assert!(Guard::table_not_exists("gadgets").evaluate(&mut client).unwrap());
}

#[test]
#[ignore = "requires docker"]
fn configured_schema_is_searched_first() {
    let config = fresh_database();
    let mut client = crate::postgres::connect(&config).unwrap();
    client.batch_execute("CREATE SCHEMA app").unwrap();
    drop(client);

    let config = config.with_schema("app");
    Runner::new().apply_with_config(&vocab(), &config).unwrap();

    let mut client = crate::postgres::connect(&config).unwrap();
    let schema: String = client
        .query_one(
            "SELECT schemaname::text FROM pg_catalog.pg_tables WHERE tablename = 'vocab'",
            &[],
        )
        .unwrap()
        .get(0);
    assert_eq!(schema, "app");
}
