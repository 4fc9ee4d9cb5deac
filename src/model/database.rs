use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};

use super::{
    error::{Error, Result},
    session::{Session, SessionData},
    snippet::{self, Snippet},
    user,
};

pub struct Database {
    conn: Connection,
}

/// Build the database.
impl Database {
    /// Open (or create) the database at `path`. `":memory:"` gives a throwaway one.
    pub fn build(path: &str) -> Result<Database> {
        let conn = Database::init_db(path)?;
        let db = Database { conn };
        Ok(db)
    }

    fn init_db(path: &str) -> Result<Connection> {
        let conn = Connection::open(path)?;

        trace!("Opened database connection.");
        trace!("Initializing database...");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snippets (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                title   TEXT NOT NULL,
                content TEXT NOT NULL,
                created TEXT NOT NULL,
                expires TEXT NOT NULL
            )",
            (),
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_snippets_created ON snippets(created)",
            (),
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                hashed_password TEXT NOT NULL,
                created         TEXT NOT NULL
            )",
            (),
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                token  TEXT PRIMARY KEY,
                data   TEXT NOT NULL,
                expiry TEXT NOT NULL
            )",
            (),
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expiry)",
            (),
        )?;

        info!("Finished initializing database");

        Ok(conn)
    }
}

/// Snippet stuff
impl Database {
    pub fn insert_snippet(
        &self,
        title: &str,
        content: &str,
        expires_in_days: i64,
    ) -> Result<snippet::Id> {
        self.insert_snippet_at(title, content, expires_in_days, Utc::now())
    }

    /// Like [`Database::insert_snippet`], but with an explicit creation time.
    pub fn insert_snippet_at(
        &self,
        title: &str,
        content: &str,
        expires_in_days: i64,
        created: DateTime<Utc>,
    ) -> Result<snippet::Id> {
        let expires = created + Duration::days(expires_in_days);

        self.conn.execute(
            "INSERT INTO snippets (title, content, created, expires) VALUES (?1, ?2, ?3, ?4)",
            params![title, content, created, expires],
        )?;
        let id = self.conn.last_insert_rowid();

        debug!("Added snippet {} to database, expires {}", id, expires);

        Ok(id)
    }

    /// Get a snippet that has not expired yet.
    pub fn get_snippet(&self, id: snippet::Id) -> Result<Snippet> {
        debug!("Getting snippet {}", id);

        self.conn
            .query_row(
                "SELECT id, title, content, created, expires FROM snippets
                 WHERE expires > ?1 AND id = ?2",
                params![Utc::now(), id],
                map_snippet,
            )
            .optional()?
            .ok_or(Error::NoRecord)
    }

    /// The most recently created unexpired snippets, newest first.
    pub fn latest_snippets(&self) -> Result<Vec<Snippet>> {
        trace!("Getting latest snippets");

        let mut stmt = self.conn.prepare(
            "SELECT id, title, content, created, expires FROM snippets
             WHERE expires > ?1 ORDER BY created DESC, id DESC LIMIT ?2",
        )?;
        let snippets = stmt
            .query_map(params![Utc::now(), snippet::LATEST_LIMIT], map_snippet)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(snippets)
    }
}

/// User stuff
impl Database {
    /// Store a new user whose password has already been hashed.
    ///
    /// Fails with [`Error::DuplicateEmail`] if the email is taken (case-insensitively).
    pub fn insert_user(&self, name: &str, email: &str, hashed_password: &str) -> Result<user::Id> {
        let result = self.conn.execute(
            "INSERT INTO users (name, email, hashed_password, created) VALUES (?1, ?2, ?3, ?4)",
            params![name, email, hashed_password, Utc::now()],
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                debug!("Added user {} to database", id);
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("Signup with an email already in use");
                Err(Error::DuplicateEmail)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The id and password hash stored for `email`, if there is such a user.
    pub fn get_credentials(&self, email: &str) -> Result<Option<(user::Id, String)>> {
        let credentials = self
            .conn
            .query_row(
                "SELECT id, hashed_password FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(credentials)
    }

    pub fn user_exists(&self, id: user::Id) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

/// Session stuff
impl Database {
    /// Insert the session, or overwrite the row with the same token.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        trace!("Saving session expiring at {}", session.expiry);

        let data = serde_json::to_string(&session.data)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO sessions (token, data, expiry) VALUES (?1, ?2, ?3)",
            params![session.token, data, session.expiry],
        )?;
        Ok(())
    }

    /// Look up a session by token. Expired rows are returned as-is.
    pub fn get_session_from_token(&self, token: &str) -> Result<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "SELECT token, data, expiry FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((token, data, expiry)) = row else {
            return Ok(None);
        };
        let data: SessionData = serde_json::from_str(&data)?;

        Ok(Some(Session::new(token, data, expiry)))
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        trace!("Deleting session");
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Returns how many sessions were removed.
    pub fn delete_expired_sessions(&self) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM sessions WHERE expiry <= ?1", params![Utc::now()])?;
        Ok(deleted)
    }
}

#[cfg(test)]
impl Database {
    pub fn delete_user(&self, id: user::Id) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Helper functions
fn map_snippet(row: &Row) -> rusqlite::Result<Snippet> {
    Ok(Snippet {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created: row.get(3)?,
        expires: row.get(4)?,
    })
}

/// Whether `err` is a UNIQUE constraint failure. The only UNIQUE column
/// written through this check is `users.email`.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
