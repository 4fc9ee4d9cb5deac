use chrono::Utc;
use log::{debug, error};

use crate::model::{self, Database, Session};

#[derive(Debug)]
pub enum Error {
    SessionNotFound,
    SessionExpired,
    Database(model::Error),
}

/// Load the session for `token`, dropping it from the store if it has expired.
pub fn verify_session(token: &str, database: &Database) -> Result<Session, Error> {
    // Get and verify session
    let session = match database.get_session_from_token(token) {
        Ok(Some(session)) => session,
        Ok(None) => {
            debug!("Session not found in database");
            return Err(Error::SessionNotFound);
        }
        Err(err) => {
            error!("Failed to get session from database: {}", err);
            return Err(Error::Database(err));
        }
    };

    if session.is_expired(Utc::now()) {
        debug!("Session expired at {}", session.expiry);
        database.delete_session(token).map_err(Error::Database)?;
        return Err(Error::SessionExpired);
    }

    Ok(session)
}
