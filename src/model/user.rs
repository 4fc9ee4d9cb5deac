//! Signup and login. Password hashing is slow, so it runs on the blocking
//! pool and never while the database is locked.

use log::debug;
use tokio::{sync::Mutex, task};

use super::{
    error::{Error, Result},
    Database,
};
use crate::auth;

pub type Id = i64;

/// Hash `password` and store a new user.
///
/// Fails with [`Error::DuplicateEmail`] if the email is taken (case-insensitively).
pub async fn insert(
    database: &Mutex<Database>,
    name: &str,
    email: &str,
    password: &str,
) -> Result<Id> {
    let password = password.to_owned();
    let hashed_password =
        task::spawn_blocking(move || auth::hash::hash_password(&password)).await??;

    database.lock().await.insert_user(name, email, &hashed_password)
}

/// Returns the id of the user with these credentials.
pub async fn authenticate(database: &Mutex<Database>, email: &str, password: &str) -> Result<Id> {
    let credentials = database.lock().await.get_credentials(email)?;

    let password = password.to_owned();
    task::spawn_blocking(move || {
        let Some((id, hashed_password)) = credentials else {
            debug!("No user with that email");
            auth::hash::check_dummy(&password);
            return Err(Error::InvalidCredentials);
        };

        if !auth::hash::check_password(&password, &hashed_password)? {
            debug!("Password incorrect for user {}", id);
            return Err(Error::InvalidCredentials);
        }

        Ok(id)
    })
    .await?
}
