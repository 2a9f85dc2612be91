//! Main database migrations
//!
//! SQL files are embedded with `include_str!` and applied in the order listed.
//! New files take the next `NNN_` prefix and are appended here.

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_follows.sql", include_str!("002_follows.sql")),
    ("003_jobs.sql", include_str!("003_jobs.sql")),
];
