//! Payload interpretation per event type.
//!
//! Payload bytes stay opaque through ingest and persistence; decoding happens
//! lazily when the reconstructor needs the fields. Anything that does not
//! parse as the expected JSON shape falls back to `Payload::Raw`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::EventType;

/// Service health, as carried by HEALTH_CHANGE payloads and node snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Up,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            HealthStatus::Up => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Down => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Down => "DOWN",
        }
    }
}

impl Serialize for HealthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for HealthStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = HealthStatus;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("UP, DEGRADED, DOWN or 0..=2")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HealthStatus, E> {
                match v {
                    "UP" => Ok(HealthStatus::Up),
                    "DEGRADED" => Ok(HealthStatus::Degraded),
                    "DOWN" => Ok(HealthStatus::Down),
                    other => Err(E::invalid_value(
                        de::Unexpected::Str(other),
                        &"a health status name",
                    )),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<HealthStatus, E> {
                match v {
                    0 => Ok(HealthStatus::Up),
                    1 => Ok(HealthStatus::Degraded),
                    2 => Ok(HealthStatus::Down),
                    other => Err(E::invalid_value(
                        de::Unexpected::Unsigned(other),
                        &"0, 1 or 2",
                    )),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<HealthStatus, E> {
                if v >= 0 {
                    self.visit_u64(v as u64)
                } else {
                    Err(E::invalid_value(de::Unexpected::Signed(v), &"0, 1 or 2"))
                }
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcCallPayload {
    #[serde(default)]
    pub source_service: String,
    #[serde(default)]
    pub dest_service: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status_code: Option<i32>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcErrorPayload {
    #[serde(default)]
    pub source_service: String,
    #[serde(default)]
    pub dest_service: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChangePayload {
    pub new_status: HealthStatus,
}

/// Tagged view over an event's opaque payload bytes.
#[derive(Debug, Clone)]
pub enum Payload {
    RpcCall(RpcCallPayload),
    RpcError(RpcErrorPayload),
    HealthChange(HealthChangePayload),
    Raw(Vec<u8>),
}

pub(crate) fn decode(event_type: EventType, payload: &[u8]) -> Payload {
    match event_type {
        EventType::RpcCall => match serde_json::from_slice(payload) {
            Ok(rpc) => Payload::RpcCall(rpc),
            Err(_) => Payload::Raw(payload.to_vec()),
        },
        EventType::RpcError => match serde_json::from_slice(payload) {
            Ok(rpc) => Payload::RpcError(rpc),
            Err(_) => Payload::Raw(payload.to_vec()),
        },
        EventType::HealthChange => match serde_json::from_slice(payload) {
            Ok(hc) => Payload::HealthChange(hc),
            Err(_) => Payload::Raw(payload.to_vec()),
        },
        EventType::Unknown(_) => Payload::Raw(payload.to_vec()),
    }
}
