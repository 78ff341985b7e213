use crate::tools::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Suffix appended to every corrective message sent back to the model.
pub const RETRY_SUFFIX: &str = "Fix the errors and try again.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on corrective messages produced from a retryable failure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retry: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: generate_id(),
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            retry: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content.into())
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Tool-result turn asking the model to correct the call it made.
    pub fn retry_prompt(tool_call_id: impl Into<String>, reason: &str) -> Self {
        Self {
            retry: true,
            ..Self::tool_result(tool_call_id, format!("{reason}\n\n{RETRY_SUFFIX}"))
        }
    }

    /// Corrective turn for replies that were not tool calls at all.
    pub fn user_retry_prompt(reason: &str) -> Self {
        Self {
            retry: true,
            ..Self::user(format!("{reason}\n\n{RETRY_SUFFIX}"))
        }
    }
}

/// Ordered history of one run. Turns are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Starts a conversation with a fresh id, an optional system prompt and the user request.
    pub fn start(system_prompt: Option<&str>, request: impl Into<String>) -> Self {
        let mut conversation = Self::new(generate_id());
        if let Some(prompt) = system_prompt.filter(|prompt| !prompt.trim().is_empty()) {
            conversation.add_message(Message::system(prompt));
        }
        conversation.add_message(Message::user(request));
        conversation
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn retry_count(&self) -> usize {
        self.messages.iter().filter(|message| message.retry).count()
    }
}
