//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::user::namespace_key;
use crate::domain::{
    Follow, Followable, Identity, Job, JobKind, JobStatus, Organization, Provider, Tag, User,
};
use crate::ports::{JobQueue, NamespaceOwner, Repository};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const USER_COLUMNS: &str = "user_id, username, email, name, summary, website_url, employer_url,
    profile_image_url, location, old_username, old_old_username, signup_cta_variant,
    saw_onboarding, estimated_default_language,
    twitter_username, twitter_followers_count, twitter_following_count, twitter_created_at,
    github_username, github_followers_count, github_following_count, github_created_at,
    following_users_count, following_tags_count, following_orgs_count,
    created_at, updated_at";

const IDENTITY_COLUMNS: &str =
    "identity_id, user_id, provider, uid, auth_data_dump, token, secret, created_at";

const JOB_COLUMNS: &str =
    "job_id, kind, user_id, status, attempts, last_error, created_at, updated_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file.
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when another process holds the database open.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            delay_ms = delay.as_millis() as u64,
                            "database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is statically linked via the "json" feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file, `None` when in memory
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        let migration_service = MigrationService::new(&conn);
        migration_service
            .run_pending()
            .map_err(|e| Error::database(format!("Migration failed: {}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn query_users(&self, where_clause: &str, arg: Option<&str>) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM sys_users {}", USER_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = match arg {
            Some(a) => stmt.query_map([a], row_to_user)?,
            None => stmt.query_map([], row_to_user)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn query_one_user(&self, where_clause: &str, arg: &str) -> Result<Option<User>> {
        Ok(self
            .query_users(&format!("{} LIMIT 1", where_clause), Some(arg))?
            .into_iter()
            .next())
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    }
}

// === Row mapping ===

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_uuid(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))
}

fn get_timestamp(row: &Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).map_err(|e| conversion_error(idx, e))
}

fn get_optional_timestamp(row: &Row, idx: usize) -> duckdb::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_timestamp(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_count(row: &Row, idx: usize) -> duckdb::Result<i64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0))
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn row_to_user(row: &Row) -> duckdb::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        summary: row.get(4)?,
        website_url: row.get(5)?,
        employer_url: row.get(6)?,
        profile_image_url: row.get(7)?,
        location: row.get(8)?,
        old_username: row.get(9)?,
        old_old_username: row.get(10)?,
        signup_cta_variant: row.get(11)?,
        saw_onboarding: row.get::<_, Option<bool>>(12)?.unwrap_or(true),
        estimated_default_language: row.get(13)?,
        twitter_username: row.get(14)?,
        twitter_followers_count: get_count(row, 15)?,
        twitter_following_count: get_count(row, 16)?,
        twitter_created_at: get_optional_timestamp(row, 17)?,
        github_username: row.get(18)?,
        github_followers_count: get_count(row, 19)?,
        github_following_count: get_count(row, 20)?,
        github_created_at: get_optional_timestamp(row, 21)?,
        following_users_count: get_count(row, 22)?,
        following_tags_count: get_count(row, 23)?,
        following_orgs_count: get_count(row, 24)?,
        created_at: get_timestamp(row, 25)?,
        updated_at: get_timestamp(row, 26)?,
    })
}

fn row_to_identity(row: &Row) -> duckdb::Result<Identity> {
    let provider: String = row.get(2)?;
    let dump: String = row.get(4)?;
    Ok(Identity {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        provider: provider
            .parse::<Provider>()
            .map_err(|e| conversion_error(2, e))?,
        uid: row.get(3)?,
        auth_data_dump: serde_json::from_str(&dump).map_err(|e| conversion_error(4, e))?,
        token: row.get(5)?,
        secret: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
    })
}

fn row_to_organization(row: &Row) -> duckdb::Result<Organization> {
    Ok(Organization {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: get_timestamp(row, 3)?,
        updated_at: get_timestamp(row, 4)?,
    })
}

fn row_to_tag(row: &Row) -> duckdb::Result<Tag> {
    Ok(Tag {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        created_at: get_timestamp(row, 2)?,
    })
}

fn row_to_follow(row: &Row) -> duckdb::Result<Option<Follow>> {
    let kind: String = row.get(1)?;
    let followable = Followable::from_parts(&kind, get_uuid(row, 2)?);
    Ok(match followable {
        Some(followable) => Some(Follow {
            follower_id: get_uuid(row, 0)?,
            followable,
            created_at: get_timestamp(row, 3)?,
        }),
        // Rows of a type this build does not know about are skipped
        None => None,
    })
}

fn row_to_job(row: &Row) -> duckdb::Result<Job> {
    let kind: String = row.get(1)?;
    let status: String = row.get(3)?;
    Ok(Job {
        id: get_uuid(row, 0)?,
        kind: kind.parse::<JobKind>().map_err(|e| conversion_error(1, e))?,
        user_id: get_uuid(row, 2)?,
        status: JobStatus::parse(&status),
        attempts: get_count(row, 4)?,
        last_error: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

// === Write helpers (usable inside a transaction) ===

fn claim_name(conn: &Connection, handle: &str, owner: NamespaceOwner) -> Result<()> {
    let (owner_type, owner_id) = match owner {
        NamespaceOwner::User(id) => ("user", id),
        NamespaceOwner::Organization(id) => ("organization", id),
    };
    conn.execute(
        "INSERT INTO sys_namespace (slug_key, owner_type, owner_id) VALUES (?, ?, ?)",
        params![namespace_key(handle), owner_type, owner_id.to_string()],
    )
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict(format!("'{}' is already taken", handle)),
        other => other,
    })?;
    Ok(())
}

fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sys_users ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            USER_COLUMNS
        ),
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.name,
            user.summary,
            user.website_url,
            user.employer_url,
            user.profile_image_url,
            user.location,
            user.old_username,
            user.old_old_username,
            user.signup_cta_variant,
            user.saw_onboarding,
            user.estimated_default_language,
            user.twitter_username,
            user.twitter_followers_count,
            user.twitter_following_count,
            user.twitter_created_at.map(|t| t.to_rfc3339()),
            user.github_username,
            user.github_followers_count,
            user.github_following_count,
            user.github_created_at.map(|t| t.to_rfc3339()),
            user.following_users_count,
            user.following_tags_count,
            user.following_orgs_count,
            user.created_at.to_rfc3339(),
            user.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_identity(conn: &Connection, identity: &Identity) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sys_identities ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            IDENTITY_COLUMNS
        ),
        params![
            identity.id.to_string(),
            identity.user_id.to_string(),
            identity.provider.as_str(),
            identity.uid,
            identity.auth_data_dump.to_string(),
            identity.token,
            identity.secret,
            identity.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::conflict(format!(
            "{} account {} is already linked",
            identity.provider, identity.uid
        )),
        other => other,
    })?;
    Ok(())
}

/// Persist every non-counter field, moving the namespace claim on rename
fn write_user_update(conn: &Connection, user: &User) -> Result<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT username FROM sys_users WHERE user_id = ?",
            [user.id.to_string()],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            duckdb::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    let current = current.ok_or_else(|| Error::not_found(format!("User {}", user.id)))?;

    if namespace_key(&current) != namespace_key(&user.username) {
        conn.execute(
            "DELETE FROM sys_namespace WHERE owner_type = 'user' AND owner_id = ?",
            [user.id.to_string()],
        )?;
        claim_name(conn, &user.username, NamespaceOwner::User(user.id))?;
    }

    conn.execute(
        "UPDATE sys_users SET
            username = ?, email = ?, name = ?, summary = ?, website_url = ?, employer_url = ?,
            profile_image_url = ?, location = ?, old_username = ?, old_old_username = ?,
            signup_cta_variant = ?, saw_onboarding = ?, estimated_default_language = ?,
            twitter_username = ?, twitter_followers_count = ?, twitter_following_count = ?,
            twitter_created_at = ?,
            github_username = ?, github_followers_count = ?, github_following_count = ?,
            github_created_at = ?,
            updated_at = ?
         WHERE user_id = ?",
        params![
            user.username,
            user.email,
            user.name,
            user.summary,
            user.website_url,
            user.employer_url,
            user.profile_image_url,
            user.location,
            user.old_username,
            user.old_old_username,
            user.signup_cta_variant,
            user.saw_onboarding,
            user.estimated_default_language,
            user.twitter_username,
            user.twitter_followers_count,
            user.twitter_following_count,
            user.twitter_created_at.map(|t| t.to_rfc3339()),
            user.github_username,
            user.github_followers_count,
            user.github_following_count,
            user.github_created_at.map(|t| t.to_rfc3339()),
            user.updated_at.to_rfc3339(),
            user.id.to_string(),
        ],
    )?;

    Ok(())
}

fn counter_column(followable: Followable) -> &'static str {
    match followable {
        Followable::User(_) => "following_users_count",
        Followable::Tag(_) => "following_tags_count",
        Followable::Organization(_) => "following_orgs_count",
    }
}

impl Repository for DuckDbRepository {
    // === Users ===

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.query_one_user("WHERE user_id = ?", &id.to_string())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_one_user("WHERE lower(username) = lower(?)", username)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_one_user(
            "WHERE email IS NOT NULL AND lower(email) = lower(?) ORDER BY created_at",
            email.trim(),
        )
    }

    fn find_user_by_provider_username(
        &self,
        provider: Provider,
        handle: &str,
    ) -> Result<Option<User>> {
        let column = match provider {
            Provider::Twitter => "twitter_username",
            Provider::Github => "github_username",
        };
        self.query_one_user(&format!("WHERE lower({}) = lower(?)", column), handle)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.query_users("ORDER BY created_at", None)
    }

    fn create_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        claim_name(&tx, &user.username, NamespaceOwner::User(user.id))?;
        insert_user(&tx, user)?;
        tx.commit()?;
        Ok(())
    }

    fn create_user_with_identity(&self, user: &User, identity: &Identity) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        claim_name(&tx, &user.username, NamespaceOwner::User(user.id))?;
        insert_user(&tx, user)?;
        insert_identity(&tx, identity)?;
        tx.commit()?;
        Ok(())
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_user_update(&tx, user)?;
        tx.commit()?;
        Ok(())
    }

    /// Follow counters are owned by the follow methods and never written here
    fn delete_user(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sys_users WHERE user_id = ?",
            [&id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::not_found(format!("User {}", id)));
        }

        // Followers of this user lose one followed user
        tx.execute(
            "UPDATE sys_users SET following_users_count = GREATEST(following_users_count - 1, 0)
             WHERE user_id IN (
                SELECT follower_id FROM sys_follows
                WHERE followable_type = 'user' AND followable_id = ?
             )",
            [&id],
        )?;
        tx.execute(
            "DELETE FROM sys_follows
             WHERE follower_id = ? OR (followable_type = 'user' AND followable_id = ?)",
            [&id, &id],
        )?;
        tx.execute("DELETE FROM sys_identities WHERE user_id = ?", [&id])?;
        tx.execute(
            "DELETE FROM sys_namespace WHERE owner_type = 'user' AND owner_id = ?",
            [&id],
        )?;
        tx.execute("DELETE FROM sys_users WHERE user_id = ?", [&id])?;

        tx.commit()?;
        Ok(())
    }

    // === Namespace ===

    fn namespace_owner(&self, handle: &str) -> Result<Option<NamespaceOwner>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT owner_type, owner_id FROM sys_namespace WHERE slug_key = ?")?;
        let mut rows = stmt.query_map([namespace_key(handle)], |row| {
            let owner_type: String = row.get(0)?;
            let owner_id = get_uuid(row, 1)?;
            Ok(match owner_type.as_str() {
                "organization" => NamespaceOwner::Organization(owner_id),
                _ => NamespaceOwner::User(owner_id),
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    // === Identities ===

    fn find_identity(&self, provider: Provider, uid: &str) -> Result<Option<Identity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_identities WHERE provider = ? AND uid = ?",
            IDENTITY_COLUMNS
        ))?;
        let mut rows = stmt.query_map([provider.as_str(), uid], row_to_identity)?;
        Ok(rows.next().transpose()?)
    }

    fn identities_for_user(&self, user_id: Uuid) -> Result<Vec<Identity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_identities WHERE user_id = ? ORDER BY created_at",
            IDENTITY_COLUMNS
        ))?;
        let rows = stmt.query_map([user_id.to_string()], row_to_identity)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn add_identity(&self, identity: &Identity) -> Result<()> {
        let conn = self.conn()?;
        insert_identity(&conn, identity)
    }

    fn attach_identity(&self, user: &User, identity: &Identity) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_user_update(&tx, user)?;
        insert_identity(&tx, identity)?;
        tx.commit()?;
        Ok(())
    }

    // === Organizations ===

    fn create_organization(&self, org: &Organization) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        claim_name(&tx, &org.slug, NamespaceOwner::Organization(org.id))?;
        tx.execute(
            "INSERT INTO sys_organizations (organization_id, name, slug, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                org.id.to_string(),
                org.name,
                org.slug,
                org.created_at.to_rfc3339(),
                org.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT organization_id, name, slug, created_at, updated_at
             FROM sys_organizations WHERE organization_id = ?",
        )?;
        let mut rows = stmt.query_map([id.to_string()], row_to_organization)?;
        Ok(rows.next().transpose()?)
    }

    fn find_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT organization_id, name, slug, created_at, updated_at
             FROM sys_organizations WHERE lower(slug) = lower(?)",
        )?;
        let mut rows = stmt.query_map([slug], row_to_organization)?;
        Ok(rows.next().transpose()?)
    }

    fn list_organizations(&self) -> Result<Vec<Organization>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT organization_id, name, slug, created_at, updated_at
             FROM sys_organizations ORDER BY slug",
        )?;
        let rows = stmt.query_map([], row_to_organization)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // === Tags ===

    fn create_tag(&self, tag: &Tag) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_tags (tag_id, name, created_at) VALUES (?, ?, ?)",
            params![tag.id.to_string(), tag.name, tag.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT tag_id, name, created_at FROM sys_tags WHERE tag_id = ?")?;
        let mut rows = stmt.query_map([id.to_string()], row_to_tag)?;
        Ok(rows.next().transpose()?)
    }

    fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT tag_id, name, created_at FROM sys_tags WHERE name = ?")?;
        let mut rows = stmt.query_map([name], row_to_tag)?;
        Ok(rows.next().transpose()?)
    }

    // === Follows ===

    fn add_follow(&self, follow: &Follow) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO sys_follows (follower_id, followable_type, followable_id, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
            params![
                follow.follower_id.to_string(),
                follow.followable.kind(),
                follow.followable.id().to_string(),
                follow.created_at.to_rfc3339(),
            ],
        )?;
        if inserted > 0 {
            let column = counter_column(follow.followable);
            tx.execute(
                &format!(
                    "UPDATE sys_users SET {col} = {col} + 1 WHERE user_id = ?",
                    col = column
                ),
                [follow.follower_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(inserted > 0)
    }

    fn remove_follow(&self, follower_id: Uuid, followable: Followable) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM sys_follows
             WHERE follower_id = ? AND followable_type = ? AND followable_id = ?",
            params![
                follower_id.to_string(),
                followable.kind(),
                followable.id().to_string(),
            ],
        )?;
        if removed > 0 {
            let column = counter_column(followable);
            tx.execute(
                &format!(
                    "UPDATE sys_users SET {col} = GREATEST({col} - 1, 0) WHERE user_id = ?",
                    col = column
                ),
                [follower_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    fn follows_for_user(&self, follower_id: Uuid) -> Result<Vec<Follow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT follower_id, followable_type, followable_id, created_at
             FROM sys_follows WHERE follower_id = ? ORDER BY created_at",
        )?;
        let rows = stmt.query_map([follower_id.to_string()], row_to_follow)?;
        let follows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(follows.into_iter().flatten().collect())
    }

    // === Jobs ===

    fn pending_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_jobs WHERE status = 'pending' ORDER BY created_at LIMIT ?",
            JOB_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], row_to_job)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn recent_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_jobs ORDER BY created_at DESC LIMIT ?",
            JOB_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], row_to_job)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn update_job(&self, job: &Job) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sys_jobs SET status = ?, attempts = ?, last_error = ?, updated_at = ?
             WHERE job_id = ?",
            params![
                job.status.as_str(),
                job.attempts,
                job.last_error,
                job.updated_at.to_rfc3339(),
                job.id.to_string(),
            ],
        )?;
        Ok(())
    }

    // === Counts ===

    fn count_users(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM sys_users")
    }

    fn count_identities(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM sys_identities")
    }

    fn count_organizations(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM sys_organizations")
    }

    fn count_follows(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM sys_follows")
    }

    fn count_jobs(&self, status: JobStatus) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM sys_jobs WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?)
    }
}

impl JobQueue for DuckDbRepository {
    fn enqueue(&self, job: &Job) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sys_jobs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                JOB_COLUMNS
            ),
            params![
                job.id.to_string(),
                job.kind.as_str(),
                job.user_id.to_string(),
                job.status.as_str(),
                job.attempts,
                job.last_error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn identity_for(user: &User, provider: Provider, uid: &str) -> Identity {
        let mut payload = crate::domain::AuthPayload::new(provider, uid);
        payload.extra.raw_info = json!({"lang": "en"});
        Identity::from_payload(user.id, &payload).unwrap()
    }

    #[test]
    fn test_user_roundtrip() {
        let repo = repo();
        let mut user = User::new(Uuid::new_v4(), "Ben");
        user.email = Some("ben@example.com".to_string());
        user.summary = Some("Hello".to_string());
        user.twitter_followers_count = 100;
        user.twitter_created_at = Some(Utc::now());
        repo.create_user(&user).unwrap();

        let loaded = repo.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded.username, "Ben");
        assert_eq!(loaded.email.as_deref(), Some("ben@example.com"));
        assert_eq!(loaded.twitter_followers_count, 100);
        assert!(loaded.twitter_created_at.is_some());
        assert!(loaded.saw_onboarding);
    }

    #[test]
    fn test_lookups_are_case_insensitive() {
        let repo = repo();
        let mut user = User::new(Uuid::new_v4(), "Ben");
        user.email = Some("Ben@Example.com".to_string());
        repo.create_user(&user).unwrap();

        assert!(repo.find_user_by_username("bEN").unwrap().is_some());
        assert!(repo.find_user_by_email("ben@example.COM").unwrap().is_some());
        assert_eq!(
            repo.namespace_owner("BEN").unwrap(),
            Some(NamespaceOwner::User(user.id))
        );
    }

    #[test]
    fn test_namespace_rejects_case_variant() {
        let repo = repo();
        repo.create_user(&User::new(Uuid::new_v4(), "ben")).unwrap();

        let err = repo.create_user(&User::new(Uuid::new_v4(), "BEN")).unwrap_err();
        assert!(err.is_conflict(), "unexpected error: {}", err);
        assert_eq!(repo.count_users().unwrap(), 1);

        let org = Organization::new(Uuid::new_v4(), "Ben Inc", "Ben");
        assert!(repo.create_organization(&org).unwrap_err().is_conflict());
    }

    #[test]
    fn test_failed_registration_rolls_back() {
        let repo = repo();
        let first = User::new(Uuid::new_v4(), "first");
        repo.create_user_with_identity(&first, &identity_for(&first, Provider::Github, "1"))
            .unwrap();

        // Same provider account for a different user: identity insert fails
        let second = User::new(Uuid::new_v4(), "second");
        let err = repo
            .create_user_with_identity(&second, &identity_for(&second, Provider::Github, "1"))
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(repo.get_user(second.id).unwrap().is_none());
        assert_eq!(repo.namespace_owner("second").unwrap(), None);
    }

    #[test]
    fn test_one_identity_per_provider() {
        let repo = repo();
        let user = User::new(Uuid::new_v4(), "ben");
        repo.create_user_with_identity(&user, &identity_for(&user, Provider::Twitter, "1"))
            .unwrap();

        let err = repo
            .add_identity(&identity_for(&user, Provider::Twitter, "2"))
            .unwrap_err();
        assert!(err.is_conflict());

        repo.add_identity(&identity_for(&user, Provider::Github, "1")).unwrap();
        assert_eq!(repo.identities_for_user(user.id).unwrap().len(), 2);

        let found = repo.find_identity(Provider::Twitter, "1").unwrap().unwrap();
        assert_eq!(found.user_id, user.id);
        assert_eq!(found.auth_data_dump["extra"]["raw_info"]["lang"], "en");
    }

    #[test]
    fn test_update_moves_namespace_claim() {
        let repo = repo();
        let mut user = User::new(Uuid::new_v4(), "ben");
        repo.create_user(&user).unwrap();

        user.rename("benhalpern");
        repo.update_user(&user).unwrap();

        assert_eq!(repo.namespace_owner("ben").unwrap(), None);
        assert_eq!(
            repo.namespace_owner("benhalpern").unwrap(),
            Some(NamespaceOwner::User(user.id))
        );
        let loaded = repo.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded.old_username.as_deref(), Some("ben"));

        // Case-only change keeps the same claim
        user.rename("BenHalpern");
        repo.update_user(&user).unwrap();
        assert_eq!(
            repo.namespace_owner("benhalpern").unwrap(),
            Some(NamespaceOwner::User(user.id))
        );
    }

    #[test]
    fn test_follow_counters() {
        let repo = repo();
        let user = User::new(Uuid::new_v4(), "ben");
        let other = User::new(Uuid::new_v4(), "jess");
        repo.create_user(&user).unwrap();
        repo.create_user(&other).unwrap();
        let tag = Tag::new(Uuid::new_v4(), "rust");
        repo.create_tag(&tag).unwrap();

        assert!(repo.add_follow(&Follow::new(user.id, Followable::User(other.id))).unwrap());
        assert!(!repo.add_follow(&Follow::new(user.id, Followable::User(other.id))).unwrap());
        assert!(repo.add_follow(&Follow::new(user.id, Followable::Tag(tag.id))).unwrap());

        let loaded = repo.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded.following_users_count, 1);
        assert_eq!(loaded.following_tags_count, 1);
        assert_eq!(repo.follows_for_user(user.id).unwrap().len(), 2);

        assert!(repo.remove_follow(user.id, Followable::Tag(tag.id)).unwrap());
        assert!(!repo.remove_follow(user.id, Followable::Tag(tag.id)).unwrap());
        let loaded = repo.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded.following_tags_count, 0);
    }

    #[test]
    fn test_delete_user_cleans_up() {
        let repo = repo();
        let user = User::new(Uuid::new_v4(), "ben");
        let fan = User::new(Uuid::new_v4(), "fan");
        repo.create_user_with_identity(&user, &identity_for(&user, Provider::Github, "9"))
            .unwrap();
        repo.create_user(&fan).unwrap();
        repo.add_follow(&Follow::new(fan.id, Followable::User(user.id))).unwrap();

        repo.delete_user(user.id).unwrap();

        assert!(repo.get_user(user.id).unwrap().is_none());
        assert!(repo.find_identity(Provider::Github, "9").unwrap().is_none());
        assert_eq!(repo.namespace_owner("ben").unwrap(), None);
        let fan = repo.get_user(fan.id).unwrap().unwrap();
        assert_eq!(fan.following_users_count, 0);
        assert!(repo.follows_for_user(fan.id).unwrap().is_empty());

        assert!(matches!(repo.delete_user(user.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_job_queue() {
        let repo = repo();
        let user_id = Uuid::new_v4();
        repo.enqueue(&Job::new(JobKind::IndexUser, user_id)).unwrap();
        repo.enqueue(&Job::new(JobKind::SubscribeNewsletter, user_id)).unwrap();

        let mut pending = repo.pending_jobs(10).unwrap();
        assert_eq!(pending.len(), 2);

        let job = &mut pending[0];
        job.status = JobStatus::Failed;
        job.attempts = 1;
        job.last_error = Some("timeout".to_string());
        repo.update_job(job).unwrap();

        assert_eq!(repo.pending_jobs(10).unwrap().len(), 1);
        assert_eq!(repo.count_jobs(JobStatus::Failed).unwrap(), 1);
        assert_eq!(repo.recent_jobs(10).unwrap().len(), 2);
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: Could not set lock on file: Resource temporarily unavailable"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }
}
