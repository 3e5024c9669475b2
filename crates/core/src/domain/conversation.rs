use serde::{Deserialize, Serialize};

use crate::flows::states::Stage;
use crate::language::Language;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Per-conversation state. The caller owns retention and re-submits it each
/// turn; the remote agent id is just one field of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub conversation_id: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<Language>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            stage: Stage::default(),
            history: Vec::new(),
            agent_handle: None,
            detected_language: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_agent_handle(mut self, agent_handle: Option<String>) -> Self {
        self.agent_handle = agent_handle;
        self
    }

    pub fn record_turn(&mut self, user_message: &str, assistant_reply: &str) {
        self.history.push(Message::user(user_message));
        self.history.push(Message::assistant(assistant_reply));
    }

    pub fn last_assistant_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.as_str())
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &str> {
        self.history
            .iter()
            .filter(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationState, Message, Role};
    use crate::flows::states::Stage;

    #[test]
    fn new_conversation_starts_in_understanding() {
        let state = ConversationState::new("conv-1");
        assert_eq!(state.stage, Stage::Understanding);
        assert!(state.history.is_empty());
        assert!(state.last_assistant_message().is_none());
    }

    #[test]
    fn record_turn_appends_in_order() {
        let mut state = ConversationState::new("conv-2")
            .with_history(vec![Message::user("hi"), Message::assistant("What is it for?")]);
        state.record_turn("YouTube", "That will be $60.");

        assert_eq!(state.history.len(), 4);
        assert_eq!(state.history[2].role, Role::User);
        assert_eq!(state.last_assistant_message(), Some("That will be $60."));
        assert_eq!(state.user_messages().collect::<Vec<_>>(), vec!["hi", "YouTube"]);
    }

    #[test]
    fn history_roles_use_lowercase_wire_names() {
        let raw = r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]"#;
        let parsed: Vec<Message> = serde_json::from_str(raw).expect("history should parse");
        assert_eq!(parsed[0], Message::user("a"));
        assert_eq!(parsed[1].role.as_str(), "assistant");
    }
}
