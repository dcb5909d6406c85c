use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::triage::{
    Button, ChatEvent, DirectoryTicketSink, Message, Pacing, Sender, TriageBot,
};
use crate::AppState;

const BOT_NAME: &str = "Dr. Sarah";
const HELP: &str = "Type your answer, or the number of an option. Commands: /retry /restart /quit";

/// Interactive triage conversation on stdin/stdout.
pub async fn run(
    state: &mut AppState,
    ticket_dir: Option<PathBuf>,
    instant: bool,
) -> Result<(), AppError> {
    let pacing = if instant { Pacing::Instant } else { state.config.pacing };
    let ticket_dir = ticket_dir.unwrap_or_else(|| state.config.ticket_dir.clone());
    let sink = Arc::new(DirectoryTicketSink::new(ticket_dir));

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let mut bot = TriageBot::new(state.api.clone(), sink, pacing).with_events(tx);
    let cancel = bot.cancellation();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("CareBridge check-in. {HELP}");
    println!();
    bot.open().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !cancel.is_cancelled() {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/restart" => bot.restart().await,
            "/retry" => {
                if !bot.retry_completion().await {
                    println!("Nothing to retry.");
                }
            }
            _ if bot.step().accepts_text() => bot.submit_text(input).await,
            _ => match resolve_button(bot.buttons(), input).cloned() {
                Some(button) => bot.press(&button).await,
                None if bot.buttons().is_empty() => {
                    println!("(Type /restart to begin again or /quit to leave.)")
                }
                None => println!("(Pick one of the numbered options.)"),
            },
        }
    }

    if let Some(path) = bot.last_ticket() {
        tracing::debug!(path = %path.display(), "Chat ended with a saved ticket");
    }
    // Dropping the bot cancels pending messages and closes the event channel.
    drop(bot);
    let _ = printer.await;
    println!();
    println!("Take care.");
    Ok(())
}

/// Match input against the live buttons by 1-based number, label or value.
pub(crate) fn resolve_button<'a>(buttons: &'a [Button], input: &str) -> Option<&'a Button> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| buttons.get(i));
    }
    buttons.iter().find(|b| {
        b.text.eq_ignore_ascii_case(input)
            || b.value.as_choice().is_some_and(|v| v.eq_ignore_ascii_case(input))
    })
}

pub(crate) fn render_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::Bot => BOT_NAME,
        Sender::User => "You",
    };
    let mut out = String::new();
    for (i, line) in message.text.lines().enumerate() {
        if i == 0 {
            out.push_str(&format!("[{}] {who}: {line}\n", message.display_time()));
        } else {
            out.push_str(&format!("        {line}\n"));
        }
    }
    if let Some(buttons) = &message.buttons {
        for (i, button) in buttons.iter().enumerate() {
            out.push_str(&format!("    [{}] {}\n", i + 1, button.text));
        }
    }
    out
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<ChatEvent>) {
    let mut typing = false;
    while let Some(event) = rx.recv().await {
        let mut stdout = std::io::stdout().lock();
        if typing {
            let _ = write!(stdout, "\r{:width$}\r", "", width = BOT_NAME.len() + 14);
        }
        match event {
            ChatEvent::Message(message) => {
                typing = false;
                let _ = write!(stdout, "{}", render_message(&message));
            }
            ChatEvent::Typing(on) => {
                typing = on;
                if on {
                    let _ = write!(stdout, "{BOT_NAME} is typing…");
                }
            }
            ChatEvent::Cleared => {
                typing = false;
                let _ = writeln!(stdout, "\n── new conversation ──\n");
            }
        }
        let _ = stdout.flush();
    }
}
