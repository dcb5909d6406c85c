//! Patient triage chatbot: conversation state machine, scripted bot
//! messages, the remote scoring seam and appointment tickets.

pub mod bot;
pub mod script;
pub mod service;
pub mod ticket;
pub mod types;

pub use bot::TriageBot;
pub use script::{Pacing, Playback, Script};
pub use service::TriageService;
pub use ticket::{DirectoryTicketSink, TicketSink};
pub use types::{
    AnswerMap, Button, ButtonValue, ChatEvent, FinalChoice, Message, MessageLog, Sender, Step,
};
