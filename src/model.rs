pub mod database;
pub mod error;
pub mod session;
pub mod snippet;
pub mod user;

use log::debug;
use tera::Tera;
use tokio::sync::Mutex;

use crate::{auth, config::Config, templates};

pub use database::Database;
pub use error::Error;
pub use session::Session;

/// Everything a request handler needs, shared behind an `Arc`.
pub struct AppState {
    pub database: Mutex<Database>,
    pub templates: Tera,
    pub config: Config,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to open database: {0}")]
    Database(#[from] Error),
    #[error("failed to load templates: {0}")]
    Templates(#[from] tera::Error),
}

impl AppState {
    pub fn build(config: Config) -> Result<AppState, BuildError> {
        let database = Database::build(&config.database_path)?;

        let purged = database.delete_expired_sessions()?;
        debug!("Purged {} expired sessions", purged);

        let templates = templates::build(&config.templates_glob)?;

        auth::hash::init_dummy();

        Ok(AppState {
            database: Mutex::new(database),
            templates,
            config,
        })
    }
}
