//! Typed decoding of MPRIS `PropertiesChanged` payloads.
//!
//! Every field is decoded on its own: a malformed `mpris:length` yields a
//! [`FieldError`] for that key while title, artists and album still come
//! through.

use std::collections::HashMap;
use std::time::Duration;

use zvariant::{OwnedValue, Value};

pub const KEY_TITLE: &str = "xesam:title";
pub const KEY_ARTIST: &str = "xesam:artist";
pub const KEY_ALBUM: &str = "xesam:album";
pub const KEY_ART_URL: &str = "mpris:artUrl";
pub const KEY_LENGTH: &str = "mpris:length";

const PROP_METADATA: &str = "Metadata";
const PROP_PLAYBACK_STATUS: &str = "PlaybackStatus";

/// Playback status reported by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    /// Parse the MPRIS status string. Unknown values give `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Playing" => Some(Self::Playing),
            "Paused" => Some(Self::Paused),
            "Stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Track metadata from an MPRIS `Metadata` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub art_url: Option<String>,
    /// Zero when the player does not report a length
    pub length: Duration,
}

impl TrackInfo {
    /// Whether `other` describes the same track, ignoring the art URL.
    pub fn same_track(&self, other: &TrackInfo) -> bool {
        self.title == other.title
            && self.artists == other.artists
            && self.album == other.album
            && self.length == other.length
    }
}

/// A property or metadata field that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{key}: expected {expected}, found `{found}`")]
    WrongType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("{key}: negative length {value}")]
    NegativeLength { key: String, value: i64 },

    #[error("unknown playback status `{0}`")]
    UnknownStatus(String),
}

/// The decoded part of one `PropertiesChanged` signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChanges {
    pub track: Option<TrackInfo>,
    pub status: Option<PlaybackStatus>,
    pub errors: Vec<FieldError>,
}

impl PropertyChanges {
    /// Whether anything the monitor acts on changed.
    pub fn is_empty(&self) -> bool {
        self.track.is_none() && self.status.is_none()
    }
}

/// Decode the changed-properties map of the `org.mpris.MediaPlayer2.Player`
/// interface. Unrelated properties (`Volume`, `Position`, ...) are ignored.
pub fn decode_changes(changed: &HashMap<String, OwnedValue>) -> PropertyChanges {
    let mut changes = PropertyChanges::default();

    if let Some(value) = changed.get(PROP_METADATA) {
        match metadata_map(PROP_METADATA, value) {
            Ok(map) => changes.track = Some(decode_metadata(&map, &mut changes.errors)),
            Err(e) => changes.errors.push(e),
        }
    }

    if let Some(value) = changed.get(PROP_PLAYBACK_STATUS) {
        match string(PROP_PLAYBACK_STATUS, value) {
            Ok(s) => match PlaybackStatus::parse(&s) {
                Some(status) => changes.status = Some(status),
                None => changes.errors.push(FieldError::UnknownStatus(s)),
            },
            Err(e) => changes.errors.push(e),
        }
    }

    changes
}

/// Decode a `Metadata` dictionary, collecting per-field errors.
pub fn decode_metadata(map: &HashMap<String, OwnedValue>, errors: &mut Vec<FieldError>) -> TrackInfo {
    let mut info = TrackInfo::default();

    if let Some(v) = map.get(KEY_TITLE) {
        match string(KEY_TITLE, v) {
            Ok(s) => info.title = s,
            Err(e) => errors.push(e),
        }
    }
    if let Some(v) = map.get(KEY_ARTIST) {
        match string_list(KEY_ARTIST, v) {
            Ok(list) => info.artists = list,
            Err(e) => errors.push(e),
        }
    }
    if let Some(v) = map.get(KEY_ALBUM) {
        match string(KEY_ALBUM, v) {
            Ok(s) => info.album = s,
            Err(e) => errors.push(e),
        }
    }
    if let Some(v) = map.get(KEY_ART_URL) {
        match string(KEY_ART_URL, v) {
            Ok(s) if !s.is_empty() => info.art_url = Some(s),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
    }
    if let Some(v) = map.get(KEY_LENGTH) {
        match length(KEY_LENGTH, v) {
            Ok(d) => info.length = d,
            Err(e) => errors.push(e),
        }
    }

    info
}

/// Strip any number of variant wrappers.
fn unwrap_variant<'a>(value: &'a Value<'a>) -> &'a Value<'a> {
    match value {
        Value::Value(inner) => unwrap_variant(inner),
        other => other,
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &Value<'_>) -> FieldError {
    FieldError::WrongType {
        key: key.to_string(),
        expected,
        found: value.value_signature().to_string(),
    }
}

fn string(key: &str, value: &Value<'_>) -> Result<String, FieldError> {
    match unwrap_variant(value) {
        Value::Str(s) => Ok(s.as_str().to_string()),
        other => Err(wrong_type(key, "s", other)),
    }
}

/// `as`, or a lone `s` from players that report one artist as a string.
fn string_list(key: &str, value: &Value<'_>) -> Result<Vec<String>, FieldError> {
    match unwrap_variant(value) {
        Value::Str(s) => Ok(vec![s.as_str().to_string()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match unwrap_variant(item) {
                Value::Str(s) => Ok(s.as_str().to_string()),
                other => Err(wrong_type(key, "as", other)),
            })
            .collect(),
        other => Err(wrong_type(key, "as", other)),
    }
}

/// Microseconds as `x`, `t`, `i` or `u`.
fn length(key: &str, value: &Value<'_>) -> Result<Duration, FieldError> {
    let micros: i64 = match unwrap_variant(value) {
        Value::I64(v) => *v,
        Value::U64(v) => i64::try_from(*v).unwrap_or(i64::MAX),
        Value::I32(v) => i64::from(*v),
        Value::U32(v) => i64::from(*v),
        other => return Err(wrong_type(key, "x", other)),
    };

    u64::try_from(micros)
        .map(Duration::from_micros)
        .map_err(|_| FieldError::NegativeLength {
            key: key.to_string(),
            value: micros,
        })
}

fn metadata_map(key: &str, value: &Value<'_>) -> Result<HashMap<String, OwnedValue>, FieldError> {
    let inner = unwrap_variant(value);
    if !matches!(inner, Value::Dict(_)) {
        return Err(wrong_type(key, "a{sv}", inner));
    }

    inner
        .try_clone()
        .and_then(HashMap::<String, OwnedValue>::try_from)
        .map_err(|_| wrong_type(key, "a{sv}", inner))
}
