//! Agent pool
//!
//! A fixed number of executor slots. Each slot runs at most one task at a
//! time; tasks are chat requests built from a closed set of task kinds.

pub mod pool;
pub mod prompts;
pub mod registry;

pub use pool::AgentPool;
pub use registry::{AgentRegistry, InMemoryAgentRegistry};

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

/// Capabilities every slot advertises
pub const SLOT_CAPABILITIES: [&str; 5] = ["chat", "code", "analysis", "debug", "fix"];

/// Work an agent slot can execute
///
/// Deserialized from JSON tagged by `type`. Tags other than `chat`, `code`,
/// `debug` and `fix` become [`AgentTask::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTask {
    Chat {
        message: String,
    },
    Code {
        code: String,
        language: Option<String>,
    },
    Debug {
        code: String,
        error: Option<String>,
    },
    Fix {
        code: String,
        issue: Option<String>,
    },
    /// Unrecognized task type; `payload` is sent as the chat message unchanged
    Other { kind: String, payload: String },
}

#[derive(Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownTask {
    Chat {
        message: String,
    },
    Code {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Debug {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Fix {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issue: Option<String>,
    },
}

impl From<KnownTask> for AgentTask {
    fn from(task: KnownTask) -> Self {
        match task {
            KnownTask::Chat { message } => Self::Chat { message },
            KnownTask::Code { code, language } => Self::Code { code, language },
            KnownTask::Debug { code, error } => Self::Debug { code, error },
            KnownTask::Fix { code, issue } => Self::Fix { code, issue },
        }
    }
}

/// Text carried by an unrecognized task: its `payload` or `message` string,
/// otherwise the whole task object as JSON
fn passthrough_payload(value: &Value) -> String {
    ["payload", "message"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

impl<'de> Deserialize<'de> for AgentTask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| <D::Error as de::Error>::missing_field("type"))?
            .to_string();

        match kind.as_str() {
            "chat" | "code" | "debug" | "fix" => KnownTask::deserialize(value)
                .map(Self::from)
                .map_err(de::Error::custom),
            _ => Ok(Self::Other {
                payload: passthrough_payload(&value),
                kind,
            }),
        }
    }
}

impl Serialize for AgentTask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let known = match self.clone() {
            Self::Chat { message } => KnownTask::Chat { message },
            Self::Code { code, language } => KnownTask::Code { code, language },
            Self::Debug { code, error } => KnownTask::Debug { code, error },
            Self::Fix { code, issue } => KnownTask::Fix { code, issue },
            Self::Other { kind, payload } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", &kind)?;
                map.serialize_entry("payload", &payload)?;
                return map.end();
            }
        };
        known.serialize(serializer)
    }
}

impl AgentTask {
    /// Metrics label for the task kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Code { .. } => "code",
            Self::Debug { .. } => "debug",
            Self::Fix { .. } => "fix",
            Self::Other { .. } => "other",
        }
    }

    /// Whether the task runs on the dedicated code model
    pub fn uses_code_model(&self) -> bool {
        matches!(self, Self::Code { .. } | Self::Debug { .. } | Self::Fix { .. })
    }
}

/// What a busy slot is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CurrentTask {
    /// Reserved by `create_agent` until the agent's first task
    Initialize { agent_id: String },
    Running {
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        started_at: DateTime<Utc>,
    },
}

impl CurrentTask {
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Initialize { agent_id } => Some(agent_id),
            Self::Running { agent_id, .. } => agent_id.as_deref(),
        }
    }
}

/// Point-in-time view of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSlot {
    pub id: usize,
    pub busy: bool,
    pub current_task: Option<CurrentTask>,
    pub capabilities: &'static [&'static str],
}

/// Options for `create_agent`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Model for chat and free-form tasks; routed by the chat service when absent
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub memory: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Initializing,
    Ready,
}

/// Registered agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub slot: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub memory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: AgentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_from_tagged_json() {
        let task: AgentTask =
            serde_json::from_str(r#"{"type": "debug", "code": "x = 1/0"}"#).expect("parse");
        assert_eq!(
            task,
            AgentTask::Debug {
                code: "x = 1/0".to_string(),
                error: None
            }
        );
        assert_eq!(task.kind(), "debug");
        assert!(task.uses_code_model());
    }

    #[test]
    fn test_unknown_task_type_passes_through() {
        let task: AgentTask =
            serde_json::from_str(r#"{"type": "analysis", "message": "explain this"}"#)
                .expect("parse");
        assert_eq!(
            task,
            AgentTask::Other {
                kind: "analysis".to_string(),
                payload: "explain this".to_string(),
            }
        );
        assert_eq!(prompts::render(&task), "explain this");
        assert!(!task.uses_code_model());
    }

    #[test]
    fn test_unknown_task_without_text_sends_whole_object() {
        let task: AgentTask =
            serde_json::from_str(r#"{"type": "review", "files": ["a.rs"]}"#).expect("parse");
        let AgentTask::Other { kind, payload } = &task else {
            panic!("expected passthrough task, got {:?}", task);
        };
        assert_eq!(kind, "review");
        let sent: Value = serde_json::from_str(payload).expect("payload is the task json");
        assert_eq!(sent["files"][0], "a.rs");
    }

    #[test]
    fn test_known_task_errors_still_reported() {
        assert!(serde_json::from_str::<AgentTask>(r#"{"type": "code"}"#).is_err());
        assert!(serde_json::from_str::<AgentTask>(r#"{"message": "hi"}"#).is_err());
    }

    #[test]
    fn test_task_serializes_with_type_tag() {
        let json = serde_json::to_value(AgentTask::Fix {
            code: "x".to_string(),
            issue: None,
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "fix", "code": "x"}));

        let json = serde_json::to_value(AgentTask::Other {
            kind: "analysis".to_string(),
            payload: "p".to_string(),
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "analysis", "payload": "p"}));
    }

    #[test]
    fn test_chat_and_other_use_agent_model() {
        let chat = AgentTask::Chat {
            message: "hi".to_string(),
        };
        let other = AgentTask::Other {
            kind: "analysis".to_string(),
            payload: "p".to_string(),
        };
        assert!(!chat.uses_code_model());
        assert!(!other.uses_code_model());
    }

    #[test]
    fn test_current_task_serialization() {
        let task = CurrentTask::Initialize {
            agent_id: "a1".to_string(),
        };
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["type"], "initialize");
        assert_eq!(json["agent_id"], "a1");
    }
}
