//! Last.fm API integration
//!
//! Mobile-session authentication and scrobble submission.
//!
//! API docs: https://www.last.fm/api

pub mod dto;
pub mod signature;
mod client;

pub use client::LastFmClient;
pub use signature::api_signature;
