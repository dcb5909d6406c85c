use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

use super::types::{Button, Message, MessageLog};

/// Whether scripted bot messages wait out their delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Delays are real; a typing indicator shows while waiting.
    #[default]
    Typed,
    /// Messages appear back to back, in the same order.
    Instant,
}

impl FromStr for Pacing {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typed" => Ok(Pacing::Typed),
            "instant" => Ok(Pacing::Instant),
            other => Err(AppError::Config(format!(
                "pacing must be \"typed\" or \"instant\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
enum Action {
    Say(Message),
    Pause,
}

#[derive(Debug, Clone)]
struct ScriptStep {
    /// Offset from the start of playback.
    at: Duration,
    action: Action,
}

/// A run of bot messages, each due at a fixed offset from when playback starts.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Completed,
    Cancelled,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(self, ms: u64, text: impl Into<String>) -> Self {
        self.say(ms, Message::bot(text))
    }

    pub fn at_with(self, ms: u64, text: impl Into<String>, buttons: Vec<Button>) -> Self {
        self.say(ms, Message::bot(text).with_buttons(buttons))
    }

    pub fn say(mut self, ms: u64, message: Message) -> Self {
        self.steps.push(ScriptStep {
            at: Duration::from_millis(ms),
            action: Action::Say(message),
        });
        self
    }

    /// Hold the typing indicator until `ms` without saying anything.
    pub fn wait_until(mut self, ms: u64) -> Self {
        self.steps.push(ScriptStep {
            at: Duration::from_millis(ms),
            action: Action::Pause,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total scripted duration.
    pub fn duration(&self) -> Duration {
        self.steps.iter().map(|s| s.at).max().unwrap_or_default()
    }

    /// Append each message to `log` when it falls due.
    ///
    /// Steps run in insertion order; offsets are measured from the call. A
    /// cancelled token stops playback before the next pending step.
    pub async fn play(
        self,
        pacing: Pacing,
        cancel: &CancellationToken,
        log: &mut MessageLog,
    ) -> Playback {
        let start = Instant::now();

        for step in self.steps {
            if cancel.is_cancelled() {
                log.set_typing(false);
                return Playback::Cancelled;
            }

            if pacing == Pacing::Typed {
                let deadline = start + step.at;
                if deadline > Instant::now() {
                    log.set_typing(true);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            log.set_typing(false);
                            return Playback::Cancelled;
                        }
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
            }

            match step.action {
                Action::Say(message) => log.push(message),
                Action::Pause => log.set_typing(false),
            }
        }

        Playback::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::ChatEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_pacing_from_str() {
        assert_eq!("Instant".parse::<Pacing>().unwrap(), Pacing::Instant);
        assert!(matches!("slow".parse::<Pacing>(), Err(AppError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_playback_waits_for_offsets() {
        let mut log = MessageLog::new();
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let script = Script::new().at(0, "one").at(1500, "two").at(3000, "three");
        assert_eq!(script.duration(), Duration::from_millis(3000));
        let outcome = script.play(Pacing::Typed, &cancel, &mut log).await;

        assert_eq!(outcome, Playback::Completed);
        assert_eq!(log.texts(), vec!["one", "two", "three"]);
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(!log.is_typing());
    }

    #[tokio::test]
    async fn test_instant_playback_keeps_order() {
        let mut log = MessageLog::new();
        let cancel = CancellationToken::new();
        let outcome = Script::new()
            .at(4500, "a")
            .at(1500, "b")
            .play(Pacing::Instant, &cancel, &mut log)
            .await;
        assert_eq!(outcome, Playback::Completed);
        assert_eq!(log.texts(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut log = MessageLog::with_events(tx);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2000)).await;
            trigger.cancel();
        });

        let outcome = Script::new()
            .at(0, "first")
            .at(1500, "second")
            .at(3000, "never")
            .play(Pacing::Typed, &cancel, &mut log)
            .await;

        assert_eq!(outcome, Playback::Cancelled);
        assert_eq!(log.texts(), vec!["first", "second"]);
        assert!(!log.is_typing());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(ChatEvent::Typing(false)));
    }

    #[tokio::test]
    async fn test_already_cancelled_plays_nothing() {
        let mut log = MessageLog::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = Script::new()
            .at(0, "hello")
            .play(Pacing::Instant, &cancel, &mut log)
            .await;
        assert_eq!(outcome, Playback::Cancelled);
        assert!(log.is_empty());
    }
}
