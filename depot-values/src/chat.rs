use serde::{Deserialize, Serialize};

/// Role of a message in a conversation, used by the chat-template engine (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Function,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::Function => "function",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "system" => MessageRole::System,
            "assistant" => MessageRole::Assistant,
            "tool" => MessageRole::Tool,
            "function" => MessageRole::Function,
            _ => MessageRole::User,
        }
    }
}

/// A tool invocation attached to an otherwise-empty assistant message (§9 "null content").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One message in a conversation, as consumed by the chat-template engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    /// Present on a `tool` role message: the id of the call this responds to.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            tool_call: None,
            tool_call_id: None,
        }
    }

    /// A readable representation that tolerates "null content" tool-call messages (§9):
    /// renders `Assistant calls function: name(args)` or `Tool ({id}): {content}`.
    pub fn readable_content(&self) -> String {
        if let Some(ref call) = self.tool_call {
            return format!("Assistant calls function: {}({})", call.name, call.arguments);
        }
        if self.role == MessageRole::Tool {
            let id = self.tool_call_id.as_deref().unwrap_or("unknown");
            let content = self.content.as_deref().unwrap_or("");
            return format!("Tool ({id}): {content}");
        }
        self.content.clone().unwrap_or_default()
    }
}
