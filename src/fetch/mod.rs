use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub(crate) mod hobolink;
pub(crate) mod usgs;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0} returned status code {1}")]
    Status(&'static str, reqwest::StatusCode),
    #[error("could not parse {0} response: {1}")]
    Parse(&'static str, String),
    #[error("could not access the data store: {0}")]
    Snapshot(#[from] io::Error),
    #[error("malformed snapshot file: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Reads a previously saved snapshot from the data store. Used when the site
/// runs in mock-data mode, without credentials for the live feeds.
pub(crate) fn load_snapshot<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>, Error> {
    let contents = fs::read_to_string(dir.join(name))?;
    Ok(serde_json::from_str(&contents)?)
}

pub(crate) fn save_snapshot<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<(), Error> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(name), serde_json::to_string_pretty(rows)?)?;
    Ok(())
}

/// Rejects 4xx/5xx responses before any parsing is attempted.
pub(crate) fn check_status(
    source: &'static str,
    res: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, Error> {
    let status = res.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Status(source, status));
    }
    Ok(res)
}
