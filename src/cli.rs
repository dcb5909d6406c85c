use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CareBridge triage chatbot and portal client.
#[derive(Parser, Debug)]
#[command(name = "carebridge")]
#[command(version)]
#[command(about = "CareBridge mental-health triage and portal client")]
pub struct CliArgs {
    /// TOML config file. Defaults to `<config dir>/carebridge/config.toml`.
    #[arg(long, global = true, env = "CAREBRIDGE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the API origin, e.g. `http://localhost:8000`.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Talk to the triage assistant
    Chat {
        /// Directory for appointment tickets
        #[arg(long, value_name = "DIR")]
        ticket_dir: Option<PathBuf>,
        /// Show bot messages without typing delays
        #[arg(long)]
        instant: bool,
    },
    /// Sign in to the portal
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "CAREBRIDGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Open a portal page, e.g. `/doctor/alerts`
    Open {
        #[arg(value_name = "ROUTE", default_value = "/")]
        route: String,
    },
    /// Act on a patient alert
    Alert {
        #[command(subcommand)]
        action: AlertAction,
    },
    /// Add a journal entry (patients)
    Journal {
        /// Mood from 1 (very low) to 10 (great)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        mood: u8,
        #[arg(long)]
        thoughts: String,
    },
    /// Work on clinician notes (doctors)
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Check that the API is reachable
    Health,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum AlertAction {
    /// Mark an alert as seen
    Ack {
        #[arg(value_name = "ALERT_ID")]
        id: i64,
    },
    /// Close an alert
    Resolve {
        #[arg(value_name = "ALERT_ID")]
        id: i64,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum NoteAction {
    /// Save or update the local draft for a patient
    Draft {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_name = "TYPE")]
        note_type: Option<String>,
    },
    /// Show one draft, or all of them
    Show {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: Option<i64>,
    },
    /// Discard a draft
    Clear {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: i64,
    },
    /// Send a draft to the patient's record and discard it locally
    Submit {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_flags() {
        let args = CliArgs::try_parse_from(["carebridge", "chat", "--instant", "--api-url", "http://api.test"]).unwrap();
        assert_eq!(
            args.command,
            Command::Chat {
                ticket_dir: None,
                instant: true
            }
        );
        assert_eq!(args.api_url.as_deref(), Some("http://api.test"));
    }

    #[test]
    fn test_journal_mood_range() {
        assert!(CliArgs::try_parse_from(["carebridge", "journal", "--mood", "11", "--thoughts", "x"]).is_err());
        assert!(CliArgs::try_parse_from(["carebridge", "journal", "--mood", "7", "--thoughts", "x"]).is_ok());
    }

    #[test]
    fn test_note_draft_args() {
        let args = CliArgs::try_parse_from([
            "carebridge", "note", "draft", "12", "--title", "Intake", "--note-type", "session",
        ])
        .unwrap();
        match args.command {
            Command::Note {
                action: NoteAction::Draft { patient_id, title, content, note_type },
            } => {
                assert_eq!(patient_id, 12);
                assert_eq!(title.as_deref(), Some("Intake"));
                assert_eq!(content, None);
                assert_eq!(note_type.as_deref(), Some("session"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
