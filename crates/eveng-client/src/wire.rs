//! Wire DTOs for the EVE-NG REST API.
//!
//! Every response is wrapped in an envelope `{code, status, message, data}`.
//! The platform is loose with types: numbers arrive as strings, booleans as
//! `0`/`1`, and empty maps as `[]`. Decoding here is deliberately lenient so
//! those quirks never reach the core.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CapResult, CapabilityError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub code: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    fn is_success(&self) -> bool {
        let code_ok = self.code.map_or(true, |c| (200..300).contains(&c));
        let status_ok = !matches!(self.status.as_str(), "fail" | "error" | "unauthorized");
        code_ok && status_ok
    }
}

/// Unwrap an envelope, returning its `data` on success.
///
/// A non-success HTTP status or envelope becomes [`CapabilityError::Rejected`]
/// carrying the envelope code (falling back to the HTTP status) and the
/// whole decoded body as payload.
pub fn decode_envelope(http_status: u16, body: &str) -> CapResult<Value> {
    let http_ok = (200..300).contains(&http_status);

    let raw: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if http_ok => {
            return Err(CapabilityError::Decode(format!("{e}: {}", excerpt(body))));
        }
        Err(_) => {
            return Err(CapabilityError::Rejected {
                status: http_status,
                message: excerpt(body),
                payload: None,
            });
        }
    };

    let envelope: Envelope = serde_json::from_value(raw.clone())
        .map_err(|e| CapabilityError::Decode(format!("bad envelope: {e}")))?;

    if http_ok && envelope.is_success() {
        return Ok(envelope.data);
    }

    let status = envelope
        .code
        .and_then(|c| u16::try_from(c).ok())
        .filter(|c| *c >= 400)
        .unwrap_or(if http_ok { 400 } else { http_status });
    let message = if envelope.message.is_empty() {
        format!("status '{}'", envelope.status)
    } else {
        envelope.message
    };
    Err(CapabilityError::Rejected {
        status,
        message,
        payload: Some(raw),
    })
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}

/// Decode an envelope's `data` into a typed value.
pub fn decode_data<T: DeserializeOwned>(data: Value) -> CapResult<T> {
    serde_json::from_value(data).map_err(|e| CapabilityError::Decode(e.to_string()))
}

/// Decode an id-keyed map that the platform sends as `[]` when empty.
pub fn decode_map<T: DeserializeOwned>(data: Value) -> CapResult<BTreeMap<String, T>> {
    match data {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| decode_data(v).map(|rec| (k, rec)))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| decode_data(v).map(|rec| (i.to_string(), rec)))
            .collect(),
        other => Err(CapabilityError::Decode(format!(
            "expected an id-keyed map, got {other}"
        ))),
    }
}

/// Decode a list the platform may also send as an id-keyed map. Map
/// entries come back ordered by numeric key, then by key text.
pub fn decode_list<T: DeserializeOwned>(data: Value) -> CapResult<Vec<T>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(decode_data).collect(),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| {
                (a.parse::<u64>().ok(), a).cmp(&(b.parse::<u64>().ok(), b))
            });
            entries.into_iter().map(|(_, v)| decode_data(v)).collect()
        }
        other => Err(CapabilityError::Decode(format!("expected a list, got {other}"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Folders and labs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FolderListing {
    #[serde(default, deserialize_with = "de_seq")]
    pub folders: Vec<FolderEntry>,
    #[serde(default, deserialize_with = "de_seq")]
    pub labs: Vec<LabEntry>,
}

impl FolderListing {
    /// Child folders, without the `..` parent entry or the root itself.
    pub fn subfolders(&self) -> impl Iterator<Item = &FolderEntry> {
        self.folders
            .iter()
            .filter(|f| f.name != ".." && f.path != "/" && !f.path.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabEntry {
    pub file: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, deserialize_with = "de_string")]
    pub mtime: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub umtime: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabRecord {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub filename: String,
    #[serde(default, deserialize_with = "de_string")]
    pub description: String,
    #[serde(default, deserialize_with = "de_string")]
    pub author: String,
    #[serde(default, deserialize_with = "de_string")]
    pub version: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub scripttimeout: Option<i64>,
    #[serde(default, deserialize_with = "de_bool")]
    pub lock: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Nodes and interfaces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeRecord {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "de_string")]
    pub node_type: String,
    #[serde(default, deserialize_with = "de_string")]
    pub template: String,
    #[serde(default, deserialize_with = "de_string")]
    pub image: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub cpu: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub ram: Option<u32>,
    #[serde(default, deserialize_with = "de_string")]
    pub console: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub left: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub top: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InterfacesRecord {
    #[serde(default, deserialize_with = "de_indexed")]
    pub ethernet: Vec<EthernetRecord>,
    #[serde(default, deserialize_with = "de_indexed")]
    pub serial: Vec<SerialRecord>,
}

impl InterfacesRecord {
    /// Index of the ethernet interface with the given name.
    pub fn ethernet_index(&self, name: &str) -> Option<u32> {
        self.ethernet.iter().find(|e| e.name == name).map(|e| e.index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EthernetRecord {
    /// Position in the upstream list, or the map key when sent as a map.
    #[serde(skip)]
    pub index: u32,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub network_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SerialRecord {
    #[serde(skip)]
    pub index: u32,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub remote_id: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub remote_if: Option<u32>,
}

trait Indexed {
    fn index(&self) -> u32;
    fn set_index(&mut self, index: u32);
}

impl Indexed for EthernetRecord {
    fn index(&self) -> u32 {
        self.index
    }
    fn set_index(&mut self, index: u32) {
        self.index = index;
    }
}

impl Indexed for SerialRecord {
    fn index(&self) -> u32 {
        self.index
    }
    fn set_index(&mut self, index: u32) {
        self.index = index;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Networks and links
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NetworkRecord {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "de_string")]
    pub network_type: String,
    #[serde(default, deserialize_with = "de_opt_bool")]
    pub visibility: Option<bool>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub left: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub top: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub count: Option<u32>,
    #[serde(default, deserialize_with = "de_string")]
    pub icon: String,
}

/// One entry of `GET /api/labs/{path}/topology`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkRecord {
    /// `ethernet` or `serial`.
    #[serde(rename = "type", default, deserialize_with = "de_string")]
    pub medium: String,
    #[serde(default, deserialize_with = "de_string")]
    pub source: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub source_label: Option<String>,
    #[serde(default, deserialize_with = "de_string")]
    pub destination: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub destination_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub destination_label: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub network_id: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lenient scalar decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn value_as_string(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        other => value_as_i64(other).map(|n| n != 0),
    }
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_as_i64))
}

fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(de_opt_i64(d)?.and_then(|n| u32::try_from(n).ok()))
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(de_opt_string(d)?.unwrap_or_default())
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(value_as_string))
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(de_opt_bool(d)?.unwrap_or(false))
}

fn de_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(value_as_bool))
}

/// A list that may arrive as `null` or as an index-keyed map.
fn de_seq<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(d)?.unwrap_or(Value::Null) {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(D::Error::custom))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(_, v)| serde_json::from_value(v).map_err(D::Error::custom))
            .collect(),
        other => Err(D::Error::custom(format!("expected a list, got {other}"))),
    }
}

/// Interface lists: either a JSON array (index = position) or a map keyed
/// by interface index. Output is sorted by index.
fn de_indexed<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Indexed,
{
    let mut out: Vec<T> = Vec::new();
    match Option::<Value>::deserialize(d)?.unwrap_or(Value::Null) {
        Value::Null => {}
        Value::Array(items) => {
            for (pos, item) in items.into_iter().enumerate() {
                let mut rec: T = serde_json::from_value(item).map_err(D::Error::custom)?;
                rec.set_index(pos as u32);
                out.push(rec);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let index: u32 = key
                    .parse()
                    .map_err(|_| D::Error::custom(format!("interface index '{key}' is not numeric")))?;
                let mut rec: T = serde_json::from_value(item).map_err(D::Error::custom)?;
                rec.set_index(index);
                out.push(rec);
            }
            out.sort_by_key(|r| r.index());
        }
        other => {
            return Err(D::Error::custom(format!(
                "expected interface list or map, got {other}"
            )))
        }
    }
    Ok(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
