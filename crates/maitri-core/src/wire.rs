use crate::{AgentMap, AgentRecord, VitalsPatch};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Server frame types that are valid on the channel but carry nothing the
/// console reconciles.
const IGNORED_TYPES: [&str; 2] = ["pong", "command_response"];

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connected {
        client_id: Option<String>,
        message: Option<String>,
    },
    VitalsUpdate(VitalsPatch),
    AgentStatus(AgentMap),
    ChatResponse(String),
    Ignored(String),
}

impl Inbound {
    pub fn kind(&self) -> &str {
        match self {
            Inbound::Connected { .. } => "connected",
            Inbound::VitalsUpdate(_) => "vitals_update",
            Inbound::AgentStatus(_) => "agent_status",
            Inbound::ChatResponse(_) => "chat_response",
            Inbound::Ignored(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Chat { text: String },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("frame is not a valid envelope: {0}")]
    Malformed(String),
    #[error("frame has no type discriminant")]
    MissingType,
    #[error("unrecognized frame type: {0}")]
    UnknownType(String),
    #[error("frame type {kind} is missing its {field} payload")]
    MissingPayload {
        kind: &'static str,
        field: &'static str,
    },
    #[error("frame encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    client_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    message: Option<String>,
}

/// Scalars are kept as text; null, objects and arrays read as absent.
fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    Ok(match val {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

pub fn decode_inbound(text: &str) -> Result<Inbound, WireError> {
    let raw: RawInbound =
        serde_json::from_str(text).map_err(|err| WireError::Malformed(err.to_string()))?;
    let kind = raw.kind.ok_or(WireError::MissingType)?;
    match kind.as_str() {
        "connected" => Ok(Inbound::Connected {
            client_id: raw.client_id,
            message: raw.message,
        }),
        "vitals_update" => vitals_from_data(&raw.data)
            .map(Inbound::VitalsUpdate)
            .ok_or(WireError::MissingPayload {
                kind: "vitals_update",
                field: "vitals",
            }),
        "agent_status" => agents_from_data(&raw.data)
            .map(Inbound::AgentStatus)
            .ok_or(WireError::MissingPayload {
                kind: "agent_status",
                field: "agents",
            }),
        "chat_response" => raw
            .data
            .get("response")
            .and_then(response_text)
            .map(Inbound::ChatResponse)
            .ok_or(WireError::MissingPayload {
                kind: "chat_response",
                field: "response",
            }),
        other if IGNORED_TYPES.contains(&other) => Ok(Inbound::Ignored(kind)),
        _ => Err(WireError::UnknownType(kind)),
    }
}

pub fn encode_outbound(message: &Outbound) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(|err| WireError::Encode(err.to_string()))
}

/// Vitals live under `vitals` in both the push payload and the poll body;
/// a bare vitals object is accepted too.
pub fn vitals_from_data(data: &Value) -> Option<VitalsPatch> {
    let source = data
        .get("vitals")
        .filter(|nested| nested.is_object())
        .unwrap_or(data);
    if !source.is_object() {
        return None;
    }
    serde_json::from_value::<VitalsPatch>(source.clone())
        .ok()
        .filter(|patch| !patch.is_empty())
}

fn agents_from_data(data: &Value) -> Option<AgentMap> {
    let agents = data.get("agents").and_then(Value::as_object)?;
    Some(
        agents
            .iter()
            .filter(|(_, value)| value.is_object())
            .filter_map(|(id, value)| {
                serde_json::from_value::<AgentRecord>(value.clone())
                    .ok()
                    .map(|record| (id.clone(), record))
            })
            .collect(),
    )
}

/// Plain strings are used verbatim, objects prefer their own `response`
/// field, anything else is stringified. Empty replies count as absent.
pub fn response_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Object(map) => nested_response(map).unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn nested_response(map: &Map<String, Value>) -> Option<String> {
    map.get("response")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatReply {
    pub const NO_RESPONSE: &'static str = "No response";

    pub fn into_text(self) -> String {
        if let Some(text) = response_text(&self.response) {
            return text;
        }
        match self.error {
            Some(error) if !error.trim().is_empty() => error,
            _ => Self::NO_RESPONSE.to_string(),
        }
    }
}
