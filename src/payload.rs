//! Classification of raw assistant responses.
//!
//! The backend answers with a single string. Most of the time it is prose, but
//! tool answers arrive as a JSON object tagged with a `type` discriminator,
//! either on their own or embedded in surrounding prose. `classify` turns that
//! string into a [`ResponsePayload`] and never fails: anything it cannot make
//! sense of is plain text.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub header: String,
    pub spellcheck: Option<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedAttributes {
    pub color: Option<String>,
    /// Percent, 0-100.
    pub brightness: Option<u8>,
}

impl AppliedAttributes {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.brightness.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub name: String,
    pub success: bool,
    pub attributes: AppliedAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub domain: String,
    pub action: String,
    pub devices: Vec<DeviceOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    PlainText(String),
    SearchResults(SearchResults),
    DeviceStatus(DeviceStatus),
    /// A recognised payload that carries an `error` field instead of data.
    Error(String),
}

impl ResponsePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponsePayload::PlainText(_) => "plain_text",
            ResponsePayload::SearchResults(_) => "search_results",
            ResponsePayload::DeviceStatus(_) => "device_status",
            ResponsePayload::Error(_) => "error",
        }
    }
}

/// Result of classification: the structured payload plus any prose that
/// surrounded an embedded JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub payload: ResponsePayload,
    pub residual: Option<String>,
}

impl Classified {
    fn plain(raw: &str) -> Self {
        Self {
            payload: ResponsePayload::PlainText(raw.to_string()),
            residual: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePayload {
    SearchResults(SearchWire),
    DeviceStatus(DeviceWire),
    #[serde(other)]
    Unknown,
}

// Wire structs accept null for every field so one odd value does not demote a
// recognised payload to plain text.

#[derive(Deserialize)]
struct SearchWire {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    meta: Option<SearchMetaWire>,
    // Brave forwards this as whatever it likes; only a plain string is shown
    #[serde(default)]
    spellcheck: Option<Value>,
    #[serde(default)]
    results: Option<Vec<SearchHitWire>>,
}

#[derive(Deserialize)]
struct SearchMetaWire {
    #[serde(default)]
    header: Option<String>,
}

#[derive(Deserialize)]
struct SearchHitWire {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Deserialize)]
struct DeviceWire {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    devices: Option<Vec<DeviceOutcomeWire>>,
}

#[derive(Deserialize)]
struct DeviceOutcomeWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "applied_attributes")]
    attributes: Option<AttributesWire>,
}

#[derive(Deserialize)]
struct AttributesWire {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    brightness: Option<f64>,
}

const DEFAULT_SEARCH_HEADER: &str = "Search results";

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn error_message(error: Value) -> String {
    match error {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn brightness_percent(raw: f64) -> Option<u8> {
    raw.is_finite().then(|| raw.clamp(0.0, 100.0).round() as u8)
}

impl WirePayload {
    fn into_payload(self) -> Option<ResponsePayload> {
        match self {
            WirePayload::SearchResults(search) => {
                if let Some(error) = search.error {
                    return Some(ResponsePayload::Error(error_message(error)));
                }
                let header = non_empty(search.meta.and_then(|m| m.header))
                    .unwrap_or_else(|| DEFAULT_SEARCH_HEADER.to_string());
                let spellcheck = non_empty(search.spellcheck.and_then(|v| v.as_str().map(str::to_string)));
                let results = search
                    .results
                    .unwrap_or_default()
                    .into_iter()
                    .map(|hit| SearchHit {
                        title: hit.title.unwrap_or_default(),
                        url: hit.url.unwrap_or_default(),
                        description: hit.description.unwrap_or_default(),
                        favicon: non_empty(hit.favicon),
                    })
                    .collect();
                Some(ResponsePayload::SearchResults(SearchResults {
                    header,
                    spellcheck,
                    results,
                }))
            }
            WirePayload::DeviceStatus(status) => {
                if let Some(error) = status.error {
                    return Some(ResponsePayload::Error(error_message(error)));
                }
                let devices = status
                    .devices
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| DeviceOutcome {
                        name: d.name.unwrap_or_default(),
                        success: d.success.unwrap_or(false),
                        attributes: d
                            .attributes
                            .map(|a| AppliedAttributes {
                                color: non_empty(a.color),
                                brightness: a.brightness.and_then(brightness_percent),
                            })
                            .unwrap_or_default(),
                    })
                    .collect();
                Some(ResponsePayload::DeviceStatus(DeviceStatus {
                    domain: status.domain.unwrap_or_default(),
                    action: status.action.unwrap_or_default(),
                    devices,
                }))
            }
            WirePayload::Unknown => None,
        }
    }
}

fn discriminator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""type"\s*:\s*"(search_results|device_status)""#).expect("valid discriminator regex")
    })
}

/// Classify a raw backend response.
pub fn classify(raw: &str) -> Classified {
    // A string that is JSON on its own is judged only by its top-level tag
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return match WirePayload::deserialize(value).ok().and_then(WirePayload::into_payload) {
            Some(payload) => Classified { payload, residual: None },
            None => Classified::plain(raw),
        };
    }

    extract_embedded(raw).unwrap_or_else(|| Classified::plain(raw))
}

/// Find a tagged JSON object inside prose. Candidate object starts are the
/// `{` positions before each discriminator match, nearest first.
fn extract_embedded(raw: &str) -> Option<Classified> {
    for found in discriminator_pattern().find_iter(raw) {
        let starts = raw[..found.start()].match_indices('{').map(|(i, _)| i).rev();

        for start in starts {
            let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
            let value = match stream.next() {
                Some(Ok(value)) => value,
                _ => continue,
            };
            let end = start + stream.byte_offset();
            if end < found.end() || !value.is_object() {
                continue;
            }

            let Some(payload) = WirePayload::deserialize(value).ok().and_then(WirePayload::into_payload) else {
                continue;
            };

            let parts: Vec<&str> = [raw[..start].trim(), raw[end..].trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
            let residual = if parts.is_empty() { None } else { Some(parts.join("\n")) };

            return Some(Classified { payload, residual });
        }
    }
    None
}
