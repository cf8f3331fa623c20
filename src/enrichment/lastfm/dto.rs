//! Last.fm API Data Transfer Objects
//!
//! These types match what the Last.fm 2.0 API returns with `format=json`.
//! DO NOT use these types outside the lastfm module - convert to domain types.
//!
//! API Reference: https://www.last.fm/api

use serde::{Deserialize, Serialize};

/// `auth.getMobileSession` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Session {
    pub name: Option<String>,
    /// Session key, valid indefinitely
    pub key: String,
}

/// `track.scrobble` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrobbleResponse {
    pub scrobbles: Scrobbles,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scrobbles {
    #[serde(rename = "@attr")]
    pub attr: ScrobbleAttr,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScrobbleAttr {
    #[serde(default)]
    pub accepted: u32,
    #[serde(default)]
    pub ignored: u32,
}

/// Error payload, returned with HTTP 200 as often as with an error status
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: u32,
    pub message: String,
}
