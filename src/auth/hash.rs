use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;

pub type Error = argon2::password_hash::Error;

lazy_static! {
    /// Verified against when a login names an unknown email,
    /// so both failure paths cost one hash verification.
    static ref DUMMY_HASH: Option<String> = hash_password("not a real password").ok();
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    // Argon2 with default params (Argon2id v19)
    let argon2 = Argon2::default();

    // Hash password to PHC string ($argon2id$v=19$...)
    let password_hash = argon2.hash_password(password.as_bytes(), &salt)?.to_string();

    Ok(password_hash)
}

/// Check `password` against a PHC string produced by [`hash_password`].
///
/// Returns `Ok(false)` on a mismatch; `Err` means the stored hash itself is unusable.
pub fn check_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(Error::Password) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Build the dummy hash now instead of on the first unknown-email login.
pub fn init_dummy() {
    lazy_static::initialize(&DUMMY_HASH);
}

pub fn check_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = check_password(password, hash);
    }
}
