/// HTTP client that queries our own server, used by the CLI status command.
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ServerConfig;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The document the server serves about itself on `/info`.
#[derive(Debug, Deserialize)]
pub struct ServerInfoResponse {
    pub name: String,
    pub version: String,
    pub targets: usize,
    pub scheduled_checks: usize,
}

/// Retrieve the `/info` document from the server.
pub async fn fetch_info(server: &ServerConfig) -> Result<ServerInfoResponse, ClientError> {
    let json = get(server, "info").await?;
    let info = serde_json::from_str(&json)?;
    Ok(info)
}

/// Send a GET request to the server.
async fn get(server: &ServerConfig, uri: &str) -> Result<String, ClientError> {
    debug!("GET {}/{}", server, uri);
    let client = Client::new();
    let response = client.get(format!("{}/{}", server, uri)).send().await?;
    let body = response.text().await?;
    Ok(body)
}
