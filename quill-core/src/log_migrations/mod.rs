//! Event-log database migrations
//!
//! Applied to `logs.duckdb` by the logging service through the shared
//! migration runner. Entries are `(file name, sql)` in application order.

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
