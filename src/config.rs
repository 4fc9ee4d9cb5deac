use std::{env, net::SocketAddr, str::FromStr};

use log::LevelFilter;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_path: String,
    pub log_level: LevelFilter,
    /// Adds the `Secure` attribute to the session cookie.
    /// Only turn this on when the server sits behind TLS.
    pub secure_cookies: bool,
    pub templates_glob: String,
    pub static_dir: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {value:?}")]
pub struct Error {
    name: &'static str,
    value: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            database_path: "./snippetbox.sqlite3".to_owned(),
            log_level: LevelFilter::Debug,
            secure_cookies: false,
            templates_glob: "templates/**/*".to_owned(),
            static_dir: "public".to_owned(),
        }
    }
}

impl Config {
    /// Read the config from `SNIPPETBOX_*` environment variables,
    /// loading a `.env` file first if one exists.
    pub fn from_env() -> Result<Config, Error> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            addr: parse_var("SNIPPETBOX_ADDR", defaults.addr)?,
            database_path: parse_var("SNIPPETBOX_DB", defaults.database_path)?,
            log_level: parse_var("SNIPPETBOX_LOG", defaults.log_level)?,
            secure_cookies: parse_var("SNIPPETBOX_SECURE_COOKIES", defaults.secure_cookies)?,
            templates_glob: parse_var("SNIPPETBOX_TEMPLATES", defaults.templates_glob)?,
            static_dir: parse_var("SNIPPETBOX_STATIC", defaults.static_dir)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, Error> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };

    value.parse().map_err(|_| Error { name, value })
}
