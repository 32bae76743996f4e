//! Event model and codecs for the fault-tracing engine.
//!
//! Events are the only persisted record. They carry an opaque payload that is
//! interpreted lazily per event type during graph reconstruction. Two codecs
//! exist: a binary one (bincode) used by the store, and a JSON wire shape used
//! by ingest and bundle emission. Both round-trip every well-formed event, and
//! both let unknown event-type codes pass through untouched.

mod graph;
mod payloads;

pub use graph::{Edge, GraphSnapshot, Node};
pub use payloads::{HealthChangePayload, HealthStatus, Payload, RpcCallPayload, RpcErrorPayload};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bincode::{Decode, Encode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("binary decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Event type tag. Extensible by addition only: codes this build does not
/// know about are carried in `Unknown` and survive both codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    RpcCall,
    RpcError,
    HealthChange,
    Unknown(i32),
}

impl EventType {
    pub fn code(self) -> i32 {
        match self {
            EventType::RpcCall => 0,
            EventType::RpcError => 1,
            EventType::HealthChange => 2,
            EventType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => EventType::RpcCall,
            1 => EventType::RpcError,
            2 => EventType::HealthChange,
            other => EventType::Unknown(other),
        }
    }

    /// Symbolic name, if this is a known type.
    pub fn name(self) -> Option<&'static str> {
        match self {
            EventType::RpcCall => Some("RPC_CALL"),
            EventType::RpcError => Some("RPC_ERROR"),
            EventType::HealthChange => Some("HEALTH_CHANGE"),
            EventType::Unknown(_) => None,
        }
    }

    /// Parse a symbolic name. Unknown names are an input error; unknown
    /// numeric codes are not (see `from_code`).
    pub fn parse_name(name: &str) -> Result<Self> {
        match name {
            "RPC_CALL" => Ok(EventType::RpcCall),
            "RPC_ERROR" => Ok(EventType::RpcError),
            "HEALTH_CHANGE" => Ok(EventType::HealthChange),
            other => Err(CodecError::UnknownEventType(other.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_i32(self.code()),
        }
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EventTypeVisitor;

        impl<'de> Visitor<'de> for EventTypeVisitor {
            type Value = EventType;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an event type name or numeric code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<EventType, E> {
                EventType::parse_name(v).map_err(|_| {
                    E::invalid_value(de::Unexpected::Str(v), &"a known event type name")
                })
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<EventType, E> {
                Ok(EventType::from_code(v as i32))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<EventType, E> {
                Ok(EventType::from_code(v as i32))
            }
        }

        deserializer.deserialize_any(EventTypeVisitor)
    }
}

/// The atomic telemetry record. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    /// Milliseconds since epoch. Ordering key, not wall-clock semantics.
    pub ts: i64,
    pub event_type: EventType,
    pub service: String,
    pub host: String,
    pub trace_ids: Vec<String>,
    /// Opaque bytes, interpreted per `event_type`. JSON object bytes for
    /// everything the collector and simulator produce.
    pub payload: Vec<u8>,
}

/// Flat record for the binary codec. The type tag is a raw i32 so codes from
/// newer builds survive a round-trip through this one.
#[derive(Encode, Decode)]
struct EventRecord {
    id: String,
    ts: i64,
    event_type: i32,
    service: String,
    host: String,
    trace_ids: Vec<String>,
    payload: Vec<u8>,
}

impl Event {
    /// Binary encoding for persistence.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = EventRecord {
            id: self.id.clone(),
            ts: self.ts,
            event_type: self.event_type.code(),
            service: self.service.clone(),
            host: self.host.clone(),
            trace_ids: self.trace_ids.clone(),
            payload: self.payload.clone(),
        };
        Ok(bincode::encode_to_vec(&record, bincode::config::standard())?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (record, _): (EventRecord, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(Event {
            id: record.id,
            ts: record.ts,
            event_type: EventType::from_code(record.event_type),
            service: record.service,
            host: record.host,
            trace_ids: record.trace_ids,
            payload: record.payload,
        })
    }

    /// Interpret the payload per the event type. Malformed or unknown-type
    /// payloads come back as `Raw` and contribute nothing to reconstruction.
    pub fn decode_payload(&self) -> Payload {
        payloads::decode(self.event_type, &self.payload)
    }
}

/// JSON wire shape accepted on ingest and emitted in query responses and
/// proof bundles.
///
/// `type` accepts a symbolic name or an integer code. `payload` is a JSON
/// object; extra fields inside it are preserved verbatim in the event's
/// opaque bytes. Missing `id` and `ts` are filled in by `into_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub service: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub trace_ids: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WireEvent {
    /// Convert to the domain event, generating an id and stamping the current
    /// wall-clock milliseconds where the wire shape left them out.
    pub fn into_event(self) -> Event {
        let id = if self.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.id
        };
        let ts = if self.ts == 0 {
            chrono::Utc::now().timestamp_millis()
        } else {
            self.ts
        };
        let payload = match &self.payload {
            serde_json::Value::Null => Vec::new(),
            value => serde_json::to_vec(value).unwrap_or_default(),
        };
        Event {
            id,
            ts,
            event_type: self.event_type,
            service: self.service,
            host: self.host,
            trace_ids: self.trace_ids,
            payload,
        }
    }

    pub fn from_event(event: &Event) -> Self {
        let payload = if event.payload.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&event.payload)
                .unwrap_or_else(|_| serde_json::Value::String(BASE64.encode(&event.payload)))
        };
        WireEvent {
            id: event.id.clone(),
            event_type: event.event_type,
            service: event.service.clone(),
            host: event.host.clone(),
            ts: event.ts,
            trace_ids: event.trace_ids.clone(),
            payload,
        }
    }
}
