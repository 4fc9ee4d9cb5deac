use rand::{distributions::Alphanumeric, Rng};
use rand_core::OsRng;

use crate::model::session::Token;

/// 43 alphanumeric chars is a little over 256 bits.
const TOKEN_LEN: usize = 43;

pub fn generate_token() -> Token {
    OsRng
        .sample_iter(Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
