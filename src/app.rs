use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;

use crate::database;
use crate::fetch::{self, hobolink, usgs};
use crate::model::ReachModel;
use crate::server;

/// Environment-driven site configuration, loaded once at startup and shared
/// with request handlers.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Outside the boating season flags are suppressed and pages carry a
    /// season note instead.
    pub boating_season: bool,
    /// Read the data-store snapshots instead of hitting the live feeds.
    pub use_mock_data: bool,
    /// Upper bound on the `hours` parameter of the model-output views.
    pub api_max_hours: i64,
    pub data_store: PathBuf,
    pub static_dir: String,
    /// Credentials for the `/admin` routes, checked via HTTP basic auth.
    pub basic_auth_user: String,
    pub basic_auth_password: String,
    pub usgs_site_no: String,
    pub hobolink_export: String,
    pub hobolink_user: String,
    pub hobolink_password: String,
    pub hobolink_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let bind_addr = std::env::var("FLAGGING_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid IP address/port for FLAGGING_ADDR: {}", bind_addr))?;
        Ok(Self {
            database_url,
            bind_addr,
            boating_season: env_flag("BOATING_SEASON", true),
            use_mock_data: env_flag("USE_MOCK_DATA", false),
            api_max_hours: std::env::var("API_MAX_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
            data_store: std::env::var("DATA_STORE")
                .unwrap_or_else(|_| "data_store".to_string())
                .into(),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            basic_auth_user: std::env::var("BASIC_AUTH_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),
            basic_auth_password: std::env::var("BASIC_AUTH_PASSWORD")
                .unwrap_or_else(|_| "password".to_string()),
            usgs_site_no: std::env::var("USGS_SITE_NO")
                .unwrap_or_else(|_| "01104500".to_string()),
            hobolink_export: std::env::var("HOBOLINK_EXPORT")
                .unwrap_or_else(|_| "code_for_boston_export".to_string()),
            hobolink_user: std::env::var("HOBOLINK_USER").unwrap_or_default(),
            hobolink_password: std::env::var("HOBOLINK_PASSWORD").unwrap_or_default(),
            hobolink_token: std::env::var("HOBOLINK_TOKEN").unwrap_or_default(),
        })
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

/// Starts the web server and waits for it to exit.
pub async fn serve() -> Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    let server = server::run(&config).context("failed to start server")?;
    server.await.context("server error")?;
    Ok(())
}

/// `update-db` subcommand: one refresh cycle against the configured
/// database. Any upstream failure aborts before anything is written.
pub fn run_update_db() -> Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    let conn = PgConnection::establish(&config.database_url)
        .context("could not connect to database")?;
    database::update_database(&conn, &config, &ReachModel)
        .context("database refresh failed")?;
    log::info!("database refresh complete");
    Ok(())
}

/// Parses the `--days` argument of `refresh-data-store`.
pub fn parse_days(value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .with_context(|| format!("invalid value for --days: {}", value))
}

/// `refresh-data-store` subcommand: re-fetch both live feeds and write the
/// offline snapshot files. Refuses to run while the web app is serving so a
/// half-written snapshot is never read.
pub fn refresh_data_store(days_ago: i64) -> Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    if TcpStream::connect(config.bind_addr).is_ok() {
        bail!(
            "the web app appears to be running on {}; stop it before refreshing the data store",
            config.bind_addr
        );
    }

    let client = reqwest::blocking::Client::new();
    let usgs_rows =
        usgs::get_live_data(&client, &config, days_ago).context("USGS fetch failed")?;
    let hobolink_rows =
        hobolink::get_live_data(&client, &config).context("HOBOlink fetch failed")?;
    fetch::save_snapshot(&config.data_store, usgs::SNAPSHOT_FILE, &usgs_rows)?;
    fetch::save_snapshot(&config.data_store, hobolink::SNAPSHOT_FILE, &hobolink_rows)?;
    log::info!(
        "data store refreshed: {} usgs rows, {} hobolink rows",
        usgs_rows.len(),
        hobolink_rows.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_parses_common_truthy_values() {
        std::env::set_var("FLAGGING_TEST_FLAG", "yes");
        assert!(env_flag("FLAGGING_TEST_FLAG", false));
        std::env::set_var("FLAGGING_TEST_FLAG", "0");
        assert!(!env_flag("FLAGGING_TEST_FLAG", true));
        std::env::remove_var("FLAGGING_TEST_FLAG");
        assert!(env_flag("FLAGGING_TEST_FLAG", true));
    }

    #[test]
    fn days_argument_must_be_an_integer() {
        assert_eq!(parse_days("5").unwrap(), 5);
        assert_eq!(parse_days("14").unwrap(), 14);
        let err = parse_days("five").unwrap_err();
        assert!(err.to_string().contains("--days"));
    }
}
