//! Terminal front end: one handler per CLI subcommand.

pub mod auth;
pub mod chat;
pub mod notes;
pub mod portal;
pub mod system;

use crate::cli::Command;
use crate::error::AppError;
use crate::AppState;

pub async fn dispatch(state: &mut AppState, command: Command) -> Result<(), AppError> {
    match command {
        Command::Chat {
            ticket_dir,
            instant,
        } => chat::run(state, ticket_dir, instant).await,
        Command::Login { email, password } => auth::login(state, &email, password).await,
        Command::Logout => auth::logout(state),
        Command::Whoami => auth::whoami(state).await,
        Command::Open { route } => portal::open(state, &route).await,
        Command::Alert { action } => portal::alert(state, action).await,
        Command::Journal { mood, thoughts } => portal::journal(state, mood, &thoughts).await,
        Command::Note { action } => notes::run(state, action).await,
        Command::Health => system::health(state).await,
    }
}
