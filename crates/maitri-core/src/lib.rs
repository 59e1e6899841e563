use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod wire;

pub const DEFAULT_HEART_RATE: f64 = 72.0;
pub const DEFAULT_O2_LEVEL: f64 = 98.0;
pub const DEFAULT_CO2_LEVEL: f64 = 0.04;
pub const DEFAULT_TEMPERATURE: f64 = 22.0;
pub const DEFAULT_SLEEP_QUALITY: f64 = 88.0;
pub const DEFAULT_STRESS_LEVEL: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial vitals reading as delivered by a push or a poll. Absent fields
/// leave the corresponding snapshot field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct VitalsPatch {
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub heart_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub o2_level: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub co2_level: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub sleep_quality: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub stress_level: Option<f64>,
}

impl VitalsPatch {
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.o2_level.is_none()
            && self.co2_level.is_none()
            && self.temperature.is_none()
            && self.sleep_quality.is_none()
            && self.stress_level.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct VitalsSnapshot {
    pub heart_rate: Option<f64>,
    pub o2_level: Option<f64>,
    pub co2_level: Option<f64>,
    pub temperature: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub stress_level: Option<f64>,
}

impl VitalsSnapshot {
    /// Snapshot a session starts from before any reading arrives.
    pub fn initial() -> Self {
        Self {
            heart_rate: Some(DEFAULT_HEART_RATE),
            o2_level: Some(DEFAULT_O2_LEVEL),
            co2_level: Some(DEFAULT_CO2_LEVEL),
            temperature: Some(DEFAULT_TEMPERATURE),
            sleep_quality: Some(DEFAULT_SLEEP_QUALITY),
            stress_level: Some(DEFAULT_STRESS_LEVEL),
        }
    }

    /// Returns the snapshot that results from overlaying `patch`.
    pub fn apply(&self, patch: &VitalsPatch) -> Self {
        Self {
            heart_rate: patch.heart_rate.or(self.heart_rate),
            o2_level: patch.o2_level.or(self.o2_level),
            co2_level: patch.co2_level.or(self.co2_level),
            temperature: patch.temperature.or(self.temperature),
            sleep_quality: patch.sleep_quality.or(self.sleep_quality),
            stress_level: patch.stress_level.or(self.stress_level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Idle,
    Active,
    Processing,
    Alert,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Active => "active",
            AgentState::Processing => "processing",
            AgentState::Alert => "alert",
        }
    }

    pub fn status_label(&self) -> AgentStatusLabel {
        match self {
            AgentState::Processing => AgentStatusLabel::Processing,
            AgentState::Alert => AgentStatusLabel::Alert,
            AgentState::Idle | AgentState::Active => AgentStatusLabel::Active,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "idle" => Ok(AgentState::Idle),
            "active" => Ok(AgentState::Active),
            "processing" => Ok(AgentState::Processing),
            "alert" => Ok(AgentState::Alert),
            other => Err(format!("Unknown agent state: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for AgentState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = Value::deserialize(deserializer)?;
        Ok(val
            .as_str()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }
}

/// Display projection of [`AgentState`]. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatusLabel {
    Active,
    Processing,
    Alert,
}

impl AgentStatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatusLabel::Active => "Active",
            AgentStatusLabel::Processing => "Processing",
            AgentStatusLabel::Alert => "Alert",
        }
    }
}

impl fmt::Display for AgentStatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentRecord {
    #[serde(default, deserialize_with = "deserialize_string_or_default")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "deserialize_string_or_default")]
    pub kind: String,
    #[serde(default)]
    pub state: AgentState,
    #[serde(default, deserialize_with = "deserialize_string_or_default")]
    pub status_message: String,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub capabilities: Vec<String>,
}

impl AgentRecord {
    pub fn status_label(&self) -> AgentStatusLabel {
        self.state.status_label()
    }
}

pub type AgentMap = BTreeMap<String, AgentRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
            feedback: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, Utc::now())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const AGENT_ROSTER: [RosterEntry; 10] = [
    RosterEntry {
        id: "orchestrator",
        name: "Orchestrator",
        description: "Command Hub",
    },
    RosterEntry {
        id: "vitals_agent",
        name: "Vitals",
        description: "Biometrics",
    },
    RosterEntry {
        id: "counselor_agent",
        name: "Counselor",
        description: "Mental Support",
    },
    RosterEntry {
        id: "exercise_agent",
        name: "Exercise",
        description: "Fitness",
    },
    RosterEntry {
        id: "sleep_agent",
        name: "Sleep",
        description: "Rest Cycles",
    },
    RosterEntry {
        id: "nutrition_agent",
        name: "Nutrition",
        description: "Sustenance",
    },
    RosterEntry {
        id: "mood_agent",
        name: "Mood",
        description: "Emotions",
    },
    RosterEntry {
        id: "social_agent",
        name: "Social",
        description: "Crew",
    },
    RosterEntry {
        id: "alert_agent",
        name: "Alert",
        description: "Emergency",
    },
    RosterEntry {
        id: "digital_twin",
        name: "Digital Twin",
        description: "Prediction",
    },
];

/// Accept a JSON number or a numeric string; anything else reads as absent.
fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    let number = match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|value| value.is_finite()))
}

fn deserialize_string_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    Ok(match val {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    let Value::Array(items) = val else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect())
}
