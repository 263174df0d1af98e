//! Convenience macros for building migration trees.

/// Build a [`Group`](crate::Group) from steps and nested groups, applied in the order written.
///
/// ```
/// use stepwise::{group, statements, Guard, Step};
///
/// let schema = group![
///     Step::new(
///         Guard::table_not_exists("users"),
///         statements!["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"],
///     ),
///     group![Step::new(
///         Guard::index_not_exists("users", "ix_users_name"),
///         statements!["CREATE INDEX ix_users_name ON users (name)"],
///     )]
///     .with_label("indexes"),
/// ]
/// .with_label("schema")
/// .with_abort_on_error(true);
///
/// assert_eq!(schema.children().len(), 2);
/// ```
#[macro_export]
macro_rules! group {
    () => {
        $crate::Group::default()
    };
    ($($child:expr),+ $(,)?) => {
        $crate::Group::new(vec![$($crate::Migration::from($child)),+])
    };
}

/// Build an [`Invocable::Statements`](crate::Invocable::Statements) that runs each statement in
/// turn.
///
/// ```
/// use stepwise::{statements, Invocable};
///
/// let create = statements![
///     "CREATE TABLE vocab (id INTEGER PRIMARY KEY, word TEXT NOT NULL)",
///     format!("CREATE UNIQUE INDEX {} ON vocab (word)", "ix_vocab_word"),
/// ];
/// assert!(matches!(create, Invocable::Statements(ref s) if s.len() == 2));
/// ```
#[macro_export]
macro_rules! statements {
    ($($statement:expr),+ $(,)?) => {
        $crate::Invocable::Statements(vec![
            $(::std::convert::Into::<::std::string::String>::into($statement)),+
        ])
    };
}
