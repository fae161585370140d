use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// A saved session string plus the metadata shown when listing it.
///
/// Timestamps are local wall-clock time without an offset, which keeps
/// files written by earlier versions of the tool readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub name: String,
    #[serde(rename = "session_string")]
    pub token: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "last_used", default, deserialize_with = "lenient_timestamp")]
    pub last_used_at: Option<NaiveDateTime>,
}

impl SessionRecord {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            phone: None,
            notes: None,
            created_at: None,
            last_used_at: None,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub(crate) fn touch(&mut self) {
        self.last_used_at = Some(now());
    }
}

/// A record found in the store, with file details for display.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub record: SessionRecord,
    pub filename: String,
    pub file_size: u64,
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parse a stored timestamp. Offset timestamps are converted to local time.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Metadata never makes a record unreadable: anything unparseable becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::Null => None,
        serde_json::Value::String(raw) if raw.trim().is_empty() => None,
        serde_json::Value::String(raw) => {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                warn!(value = %raw, "Ignoring unparseable session timestamp");
            }
            parsed
        }
        other => {
            warn!(value = %other, "Ignoring non-string session timestamp");
            None
        }
    };
    Ok(parsed)
}
