use std::io::{IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::AppError;
use crate::session::AuthUser;
use crate::AppState;

/// Sign in, reading the password from stdin when it was not passed.
pub async fn login(
    state: &mut AppState,
    email: &str,
    password: Option<String>,
) -> Result<(), AppError> {
    let password = match password {
        Some(p) => p,
        None => read_password().await?,
    };

    let role = state.session.login(email, &password).await?;
    let name = state
        .session
        .user()
        .and_then(|u| u.display_name.clone())
        .unwrap_or_else(|| email.to_string());

    println!("Signed in as {name} ({role}).");
    println!("Your home page: carebridge open {}", role.home());
    Ok(())
}

const PASSWORD_PROMPT: &str = "Password (hidden; CAREBRIDGE_PASSWORD also works): ";

/// Read the password without echo on a terminal. Piped stdin is read as a
/// plain line.
async fn read_password() -> Result<String, AppError> {
    print!("{PASSWORD_PROMPT}");
    std::io::stdout().flush()?;

    let line = if std::io::stdin().is_terminal() {
        let line = tokio::task::spawn_blocking(read_hidden_line)
            .await
            .map_err(|e| AppError::Internal(format!("password prompt failed: {e}")))??;
        println!();
        line
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        lines.next_line().await?.unwrap_or_default()
    };
    require_password(&line)
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

fn apply_key(line: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    match key.code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Esc => KeyOutcome::Cancel,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Cancel,
        KeyCode::Char(c) => {
            line.push(c);
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            line.pop();
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

/// Raw mode is always restored, even when reading fails.
fn read_hidden_line() -> Result<String, AppError> {
    terminal::enable_raw_mode()?;
    let mut line = String::new();
    let outcome = loop {
        match event::read() {
            Ok(Event::Key(key)) => match apply_key(&mut line, key) {
                KeyOutcome::Continue => {}
                done => break Ok(done),
            },
            Ok(_) => {}
            Err(e) => break Err(e),
        }
    };
    terminal::disable_raw_mode()?;

    match outcome? {
        KeyOutcome::Cancel => Err(AppError::Validation("password entry cancelled".into())),
        _ => Ok(line),
    }
}

fn require_password(line: &str) -> Result<String, AppError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(AppError::Validation("password cannot be empty".into()));
    }
    Ok(line.to_string())
}

pub fn logout(state: &mut AppState) -> Result<(), AppError> {
    state.session.logout()?;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(state: &mut AppState) -> Result<(), AppError> {
    match state.session.restore().await? {
        Some(user) => println!("{}", describe_user(user)),
        None => println!("Not signed in."),
    }
    Ok(())
}

pub(crate) fn describe_user(user: &AuthUser) -> String {
    match &user.display_name {
        Some(name) => format!("{name} <{}>, {} (id {})", user.email, user.role, user.id),
        None => format!("{}, {} (id {})", user.email, user.role, user.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_describe_user() {
        let mut user = AuthUser {
            id: 4,
            email: "lee@carebridge.test".into(),
            display_name: Some("Ana Lee".into()),
            role: Role::Doctor,
        };
        assert_eq!(describe_user(&user), "Ana Lee <lee@carebridge.test>, doctor (id 4)");
        user.display_name = None;
        assert_eq!(describe_user(&user), "lee@carebridge.test, doctor (id 4)");
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_hidden_line_keys() {
        let mut line = String::new();
        for c in "pass".chars() {
            assert_eq!(apply_key(&mut line, key(KeyCode::Char(c))), KeyOutcome::Continue);
        }
        apply_key(&mut line, key(KeyCode::Backspace));
        assert_eq!(line, "pas");
        assert_eq!(apply_key(&mut line, key(KeyCode::Enter)), KeyOutcome::Submit);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_key(&mut line, ctrl_c), KeyOutcome::Cancel);
        assert_eq!(line, "pas");
    }

    #[test]
    fn test_require_password() {
        assert_eq!(require_password("s3cret\r\n").unwrap(), "s3cret");
        assert!(matches!(require_password("\n"), Err(AppError::Validation(_))));
    }
}
