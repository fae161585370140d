//! Operator input.
//!
//! Reads happen on a blocking thread so a pending prompt can be abandoned
//! when Ctrl-C arrives.

use std::io::{self, Write};

use async_trait::async_trait;
use thiserror::Error;
use tgsession_core::auth::{wait_for_interrupt, AuthError, FlowEvent, Interrupt, LoginPrompt};
#[cfg(unix)]
use tracing::debug;

use crate::ui::render;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Interrupted")]
    Interrupted,

    #[error("End of input")]
    Closed,

    #[error("Failed to read input: {0}")]
    Io(String),
}

impl InputError {
    /// Whether this ends the program rather than the current action.
    pub fn is_exit(&self) -> bool {
        matches!(self, InputError::Interrupted | InputError::Closed)
    }
}

impl From<InputError> for AuthError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Interrupted => AuthError::Interrupted,
            other => AuthError::Prompt(other.to_string()),
        }
    }
}

/// Terminal attributes saved before a no-echo prompt.
///
/// An interrupted prompt leaves its reader thread behind with echo off, so
/// the saved attributes are put back from here.
#[cfg(unix)]
struct TerminalState {
    fd: std::os::unix::io::RawFd,
    original: termios::Termios,
}

#[cfg(unix)]
impl TerminalState {
    fn capture() -> Option<Self> {
        use std::os::unix::io::AsRawFd;

        let fd = io::stdin().as_raw_fd();
        termios::Termios::from_fd(fd)
            .ok()
            .map(|original| Self { fd, original })
    }

    fn restore(&self) {
        if let Err(e) = termios::tcsetattr(self.fd, termios::TCSANOW, &self.original) {
            debug!(error = %e, "Failed to restore terminal attributes");
        }
    }
}

#[cfg(not(unix))]
struct TerminalState;

#[cfg(not(unix))]
impl TerminalState {
    fn capture() -> Option<Self> {
        None
    }

    fn restore(&self) {}
}

/// Run `restore` when the read was abandoned by an interrupt.
fn restore_if_interrupted<T>(result: &Result<T, InputError>, restore: impl FnOnce()) {
    if matches!(result, Err(InputError::Interrupted)) {
        restore();
    }
}

#[derive(Clone)]
pub struct Console {
    interrupt: Interrupt,
}

impl Console {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }

    async fn blocking<F>(&self, read: F) -> Result<String, InputError>
    where
        F: FnOnce() -> io::Result<Option<String>> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(read);
        tokio::select! {
            joined = task => match joined {
                Ok(Ok(Some(line))) => Ok(line),
                Ok(Ok(None)) => Err(InputError::Closed),
                Ok(Err(e)) => Err(InputError::Io(e.to_string())),
                Err(e) => Err(InputError::Io(e.to_string())),
            },
            _ = wait_for_interrupt(Some(self.interrupt.clone())) => Err(InputError::Interrupted),
        }
    }

    /// Print `prompt` and read one trimmed line.
    pub async fn read_line(&self, prompt: &str) -> Result<String, InputError> {
        print!("{}", prompt);
        io::stdout()
            .flush()
            .map_err(|e| InputError::Io(e.to_string()))?;

        self.blocking(|| {
            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                return Ok(None);
            }
            Ok(Some(input.trim().to_string()))
        })
        .await
    }

    /// Read without echoing, for passwords and API hashes.
    pub async fn read_secret(&self, prompt: &str) -> Result<String, InputError> {
        let saved = TerminalState::capture();
        let prompt = prompt.to_string();
        let result = self
            .blocking(move || match rpassword::prompt_password(prompt) {
                Ok(secret) => Ok(Some(secret)),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e),
            })
            .await;

        restore_if_interrupted(&result, || {
            if let Some(state) = &saved {
                state.restore();
                println!();
            }
        });
        result
    }

    /// Ask a y/n question.
    pub async fn confirm(&self, prompt: &str) -> Result<bool, InputError> {
        let answer = self.read_line(prompt).await?;
        Ok(crate::utils::is_yes(&answer))
    }

    pub async fn pause(&self, prompt: &str) -> Result<(), InputError> {
        self.read_line(prompt).await.map(|_| ())
    }
}

#[async_trait]
impl LoginPrompt for Console {
    async fn login_code(&mut self, _phone: &str) -> Result<String, AuthError> {
        Ok(self.read_line("Enter the login code you received: ").await?)
    }

    async fn password(&mut self, _hint: Option<&str>) -> Result<String, AuthError> {
        Ok(self.read_secret("Two-step verification password: ").await?)
    }

    fn notify(&mut self, event: FlowEvent) {
        render::flow_event(&event);
    }
}
