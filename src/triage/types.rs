use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use ts_rs::TS;

// ============================================================================
// Conversation step
// ============================================================================

/// Where the conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Greeting,
    Name,
    Email,
    StartAssessment,
    Questions,
    Safety,
    FinalChoices,
}

impl Step {
    /// Steps that take typed input rather than button presses.
    pub fn accepts_text(self) -> bool {
        matches!(self, Step::Name | Step::Email)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

/// Value carried by a quick-reply button: an answer score or a named choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum ButtonValue {
    Score(#[ts(type = "number")] i64),
    Choice(String),
}

impl ButtonValue {
    pub fn as_score(&self) -> Option<i64> {
        match self {
            ButtonValue::Score(v) => Some(*v),
            ButtonValue::Choice(_) => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ButtonValue::Choice(v) => Some(v),
            ButtonValue::Score(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Button {
    pub text: String,
    pub value: ButtonValue,
}

impl Button {
    pub fn choice(text: &str, value: FinalChoice) -> Self {
        Self {
            text: text.to_string(),
            value: ButtonValue::Choice(value.as_str().to_string()),
        }
    }

    pub fn score(text: &str, value: i64) -> Self {
        Self {
            text: text.to_string(),
            value: ButtonValue::Score(value),
        }
    }
}

/// One chat bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
    /// RFC 3339.
    pub timestamp: String,
}

impl Message {
    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            buttons: None,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Bot)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = (!buttons.is_empty()).then_some(buttons);
        self
    }

    /// `HH:MM` in local time, as shown next to the bubble.
    pub fn display_time(&self) -> String {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
            .unwrap_or_default()
    }
}

// ============================================================================
// Message log
// ============================================================================

/// What a front end needs to redraw the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message(Message),
    Typing(bool),
    Cleared,
}

/// Append-only list of chat bubbles. Only [`MessageLog::clear`] removes anything.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    typing: bool,
    events: Option<UnboundedSender<ChatEvent>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every change to `events`.
    pub fn with_events(events: UnboundedSender<ChatEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is rendering; the log itself stays authoritative.
            let _ = tx.send(event);
        }
    }

    pub fn push(&mut self, message: Message) {
        self.set_typing(false);
        self.emit(ChatEvent::Message(message.clone()));
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.typing = false;
        self.emit(ChatEvent::Cleared);
    }

    pub fn set_typing(&mut self, typing: bool) {
        if self.typing != typing {
            self.typing = typing;
            self.emit(ChatEvent::Typing(typing));
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Buttons of the newest bubble. Older buttons are no longer actionable.
    pub fn last_buttons(&self) -> &[Button] {
        self.messages
            .last()
            .and_then(|m| m.buttons.as_deref())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.text.as_str()).collect()
    }
}

// ============================================================================
// Answers
// ============================================================================

/// Question id → selected option value. Re-answering a question overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, i64>);

impl AnswerMap {
    pub fn record(&mut self, question_id: &str, value: i64) {
        self.0.insert(question_id.to_string(), value);
    }

    pub fn get(&self, question_id: &str) -> Option<i64> {
        self.0.get(question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ============================================================================
// Final choices
// ============================================================================

/// Named buttons offered once the questions are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalChoice {
    ContactDoctor,
    Share,
    ShowAssessment,
    Restart,
    Private,
    ConfirmAppointment,
    NotNow,
}

impl FinalChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalChoice::ContactDoctor => "contact_doctor",
            FinalChoice::Share => "share",
            FinalChoice::ShowAssessment => "show_assessment",
            FinalChoice::Restart => "restart",
            FinalChoice::Private => "private",
            FinalChoice::ConfirmAppointment => "confirm_appointment",
            FinalChoice::NotNow => "not_now",
        }
    }
}

impl FromStr for FinalChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contact_doctor" => Ok(FinalChoice::ContactDoctor),
            "share" => Ok(FinalChoice::Share),
            "show_assessment" => Ok(FinalChoice::ShowAssessment),
            "restart" => Ok(FinalChoice::Restart),
            "private" => Ok(FinalChoice::Private),
            "confirm_appointment" => Ok(FinalChoice::ConfirmAppointment),
            "not_now" => Ok(FinalChoice::NotNow),
            other => Err(format!("unknown choice {other:?}")),
        }
    }
}

impl fmt::Display for FinalChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_button_value_is_untagged() {
        let score: Button = serde_json::from_str(r#"{"text":"Often","value":2}"#).unwrap();
        assert_eq!(score.value.as_score(), Some(2));
        let choice: Button = serde_json::from_str(r#"{"text":"Go","value":"start"}"#).unwrap();
        assert_eq!(choice.value.as_choice(), Some("start"));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::bot("hi");
        let b = Message::bot("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.display_time().len(), 5);
    }

    #[test]
    fn test_log_emits_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut log = MessageLog::with_events(tx);
        log.set_typing(true);
        log.push(Message::bot("hello"));
        log.clear();

        assert_eq!(rx.try_recv().unwrap(), ChatEvent::Typing(true));
        assert_eq!(rx.try_recv().unwrap(), ChatEvent::Typing(false));
        assert!(matches!(rx.try_recv().unwrap(), ChatEvent::Message(m) if m.text == "hello"));
        assert_eq!(rx.try_recv().unwrap(), ChatEvent::Cleared);
        assert!(log.is_empty());
    }

    #[test]
    fn test_only_newest_buttons_are_live() {
        let mut log = MessageLog::new();
        log.push(Message::bot("pick").with_buttons(vec![Button::score("No", 0)]));
        assert_eq!(log.last_buttons().len(), 1);
        log.push(Message::user("No"));
        assert!(log.last_buttons().is_empty());
    }

    #[test]
    fn test_final_choice_parses_known_values() {
        assert_eq!("not_now".parse::<FinalChoice>(), Ok(FinalChoice::NotNow));
        assert!("maybe".parse::<FinalChoice>().is_err());
    }
}
