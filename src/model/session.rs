use chrono::{DateTime, Duration, Utc};

use crate::auth;

use super::user;

pub type Token = String;

/// Sessions expire this long after their token was issued.
pub const LIFETIME_HOURS: i64 = 12;

/// What a session remembers between requests. Stored as JSON.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub user_id: Option<user::Id>,
    /// Shown on the next rendered page, then dropped.
    #[serde(default)]
    pub flash: Option<String>,
    pub csrf_token: String,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub token: Token,
    pub data: SessionData,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn new(token: Token, data: SessionData, expiry: DateTime<Utc>) -> Session {
        Session {
            token,
            data,
            expiry,
        }
    }

    pub fn generate() -> Session {
        let data = SessionData {
            csrf_token: auth::token::generate_token(),
            ..Default::default()
        };

        Session {
            token: auth::token::generate_token(),
            data,
            expiry: Utc::now() + Duration::hours(LIFETIME_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Swap in a freshly issued token and restart the lifetime, keeping the data.
    /// Returns the old token.
    pub fn renew(&mut self) -> Token {
        self.expiry = Utc::now() + Duration::hours(LIFETIME_HOURS);
        std::mem::replace(&mut self.token, auth::token::generate_token())
    }
}
