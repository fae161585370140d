//! The interactive menu shell.
//!
//! Every action runs behind a catch-all: failures are shown to the
//! operator and the menu comes back. Only Exit, Ctrl-C or end of input
//! leave the loop.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use tgsession_core::api::GatewayConnector;
use tgsession_core::auth::{
    parse_phone, ApiCredentials, AuthError, CredentialStore, Interrupt, SessionCreator,
};
use tgsession_core::config::{Config, ENV_API_HASH};
use tgsession_core::store::{SessionRecord, SessionStore, StoredSession};

use crate::console::{Console, InputError};
use crate::ui::render;
use crate::utils::parse_selection;

/// Text the operator must type before a session file is removed
const DELETE_CONFIRMATION: &str = "DELETE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SetCredentials,
    CreateSession,
    ListSessions,
    LoadSession,
    DeleteSession,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 6] = [
        MenuAction::SetCredentials,
        MenuAction::CreateSession,
        MenuAction::ListSessions,
        MenuAction::LoadSession,
        MenuAction::DeleteSession,
        MenuAction::Exit,
    ];

    pub fn from_choice(s: &str) -> Option<Self> {
        let n: usize = s.trim().parse().ok()?;
        Self::ALL.get(n.checked_sub(1)?).copied()
    }

    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|a| a == self).unwrap_or(0) + 1
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::SetCredentials => "Set API credentials",
            MenuAction::CreateSession => "Create a new session",
            MenuAction::ListSessions => "List saved sessions",
            MenuAction::LoadSession => "Load a saved session",
            MenuAction::DeleteSession => "Delete a saved session",
            MenuAction::Exit => "Exit",
        }
    }
}

/// Name used when the operator saves a session without naming it.
fn default_session_name(phone: &str) -> String {
    format!("Session_{}", phone.replace('+', ""))
}

/// Whether an action's error should end the program instead of returning to the menu.
fn is_exit(err: &anyhow::Error) -> bool {
    if let Some(input) = err.downcast_ref::<InputError>() {
        return input.is_exit();
    }
    matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Interrupted))
}

pub struct App {
    store: SessionStore,
    connector: GatewayConnector,
    credentials: Option<ApiCredentials>,
    console: Console,
    interrupt: Interrupt,
}

impl App {
    pub fn new(config: Config, interrupt: Interrupt) -> Result<Self> {
        let store = SessionStore::new(config.sessions_dir());
        debug!(dir = %store.dir().display(), "Session store configured");

        let connector = GatewayConnector::new(config.gateway_url())
            .context("Failed to create client gateway connector")?;
        debug!(gateway = connector.base_url(), "Client gateway configured");

        let credentials = Self::initial_credentials(&config);

        Ok(Self {
            store,
            connector,
            credentials,
            console: Console::new(interrupt.clone()),
            interrupt,
        })
    }

    /// API credentials from the environment or the keychain, for the last used API ID.
    fn initial_credentials(config: &Config) -> Option<ApiCredentials> {
        let api_id = config.api_id?;

        if let Ok(api_hash) = std::env::var(ENV_API_HASH) {
            match ApiCredentials::parse(&api_id.to_string(), &api_hash) {
                Ok(credentials) => return Some(credentials),
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_API_HASH),
            }
        }

        match CredentialStore::get(api_id) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                debug!(api_id, error = %e, "No stored API hash");
                None
            }
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        render::banner();

        loop {
            render::menu(self.credentials.as_ref().map(|c| c.api_id));

            let choice = match self.console.read_line("\nChoose (1-6): ").await {
                Ok(choice) => choice,
                Err(e) if e.is_exit() => {
                    render::goodbye("Exiting.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let Some(action) = MenuAction::from_choice(&choice) else {
                render::failure("Invalid choice. Enter a number between 1 and 6.");
                continue;
            };

            if action == MenuAction::Exit {
                render::goodbye("Goodbye.");
                return Ok(());
            }

            if let Err(e) = self.dispatch(action).await {
                if is_exit(&e) {
                    render::goodbye("Interrupted, exiting.");
                    return Ok(());
                }

                error!(?action, error = %e, "Menu action failed");
                render::failure(&format!("\nError: {:#}", e));
                if self.console.pause("Press Enter to continue...").await.is_err() {
                    render::goodbye("Exiting.");
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch(&mut self, action: MenuAction) -> Result<()> {
        debug!(?action, "Menu action selected");
        match action {
            MenuAction::SetCredentials => self.setup_credentials().await,
            MenuAction::CreateSession => self.create_session().await,
            MenuAction::ListSessions => self.list_sessions(),
            MenuAction::LoadSession => self.load_session().await,
            MenuAction::DeleteSession => self.delete_session().await,
            MenuAction::Exit => Ok(()),
        }
    }

    // =========================================================================
    // API credentials
    // =========================================================================

    async fn setup_credentials(&mut self) -> Result<()> {
        render::info("Enter your API credentials (issued at https://my.telegram.org).");

        loop {
            let api_id = self.console.read_line("API ID: ").await?;
            let api_hash = self.console.read_secret("API hash: ").await?;

            match ApiCredentials::parse(&api_id, &api_hash) {
                Ok(credentials) => {
                    self.remember_credentials(credentials);
                    render::success("API credentials set.");
                    return Ok(());
                }
                Err(e) => render::failure(&e.to_string()),
            }
        }
    }

    fn remember_credentials(&mut self, credentials: ApiCredentials) {
        if let Err(e) = CredentialStore::store(&credentials) {
            warn!(error = %e, "Failed to store API hash");
        }

        // Reload so environment overrides are not written back to disk
        let mut saved = Config::load().unwrap_or_default();
        saved.api_id = Some(credentials.api_id);
        if let Err(e) = saved.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!(api_id = credentials.api_id, "API credentials set");
        self.credentials = Some(credentials);
    }

    fn forget_credentials(&mut self) {
        if let Some(credentials) = self.credentials.take() {
            if let Err(e) = CredentialStore::delete(credentials.api_id) {
                debug!(error = %e, "No stored API hash to remove");
            }
        }
    }

    fn creator(&self, credentials: ApiCredentials) -> SessionCreator<GatewayConnector> {
        SessionCreator::new(self.connector.clone(), credentials)
            .with_interrupt(self.interrupt.clone())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    async fn read_phone(&self) -> Result<String> {
        loop {
            let input = self
                .console
                .read_line("Phone number (e.g. +821012345678): ")
                .await?;
            match parse_phone(&input) {
                Ok(phone) => return Ok(phone),
                Err(e) => render::failure(&e.to_string()),
            }
        }
    }

    async fn create_session(&mut self) -> Result<()> {
        let Some(credentials) = self.credentials.clone() else {
            render::failure("Set the API credentials first.");
            return Ok(());
        };

        render::info("\nCreating a new session.");
        let phone = self.read_phone().await?;

        let creator = self.creator(credentials);
        let mut prompt = self.console.clone();
        let token = match creator.acquire_session(&phone, &mut prompt).await {
            Ok(token) => token,
            Err(AuthError::Interrupted) => return Err(AuthError::Interrupted.into()),
            Err(AuthError::InvalidCredentials) => {
                self.forget_credentials();
                render::failure("Invalid API ID or API hash. Set the credentials again.");
                return Ok(());
            }
            Err(e) => {
                render::failure(&format!("Session creation failed: {}", e));
                return Ok(());
            }
        };

        render::success("\nSession created.");

        if self.console.confirm("Save this session? (y/n): ").await? {
            let name = self.console.read_line("Session name: ").await?;
            let name = if name.is_empty() {
                default_session_name(&phone)
            } else {
                name
            };
            let notes = self.console.read_line("Notes (optional): ").await?;

            let record = SessionRecord::new(name, token.clone())
                .with_phone(Some(phone))
                .with_notes(Some(notes));
            match self.store.save(&record) {
                Ok(path) => render::success(&format!("Session saved: {}", path.display())),
                Err(e) => {
                    error!(error = %e, "Failed to save session");
                    render::failure(&format!("Failed to save session: {}", e));
                }
            }
        }

        render::token_block(&token, "Copy this string and keep it somewhere safe.");
        Ok(())
    }

    fn list_sessions(&self) -> Result<()> {
        let sessions = self.store.list()?;
        render::session_list(&sessions);
        Ok(())
    }

    /// List sessions and let the operator pick one by number.
    async fn pick_session(&self, prompt: &str, show_notes: bool) -> Result<Option<StoredSession>> {
        let mut sessions = self.store.list()?;
        if sessions.is_empty() {
            render::info("No saved sessions.");
            return Ok(None);
        }

        render::info("\nSaved sessions:");
        render::session_choices(&sessions, show_notes);

        let input = self.console.read_line(prompt).await?;
        match parse_selection(&input, sessions.len()) {
            Some(index) => Ok(Some(sessions.swap_remove(index))),
            None => {
                render::failure("Invalid number.");
                Ok(None)
            }
        }
    }

    async fn load_session(&mut self) -> Result<()> {
        let Some(chosen) = self
            .pick_session("\nSession number to load: ", true)
            .await?
        else {
            return Ok(());
        };

        let token = match self.store.load(&chosen.filename) {
            Ok(token) => token,
            Err(e) => {
                render::failure(&format!("Failed to load session: {}", e));
                return Ok(());
            }
        };
        render::info(&format!("Loaded session '{}'.", chosen.record.name));
        render::token_block(&token, "Copy this string to use the session.");

        if let Some(credentials) = self.credentials.clone() {
            if self.console.confirm("\nTest this session now? (y/n): ").await? {
                self.verify_session(credentials, &token).await?;
            }
        }
        Ok(())
    }

    async fn verify_session(&self, credentials: ApiCredentials, token: &str) -> Result<()> {
        let creator = self.creator(credentials);
        let mut prompt = self.console.clone();

        match creator.verify_session(token, &mut prompt).await {
            // The outcome was already shown through the prompt's notifications
            Ok(valid) => info!(valid, "Session verified"),
            Err(AuthError::Interrupted) => return Err(AuthError::Interrupted.into()),
            Err(e) => render::failure(&format!("Session test failed: {}", e)),
        }
        Ok(())
    }

    async fn delete_session(&mut self) -> Result<()> {
        let Some(chosen) = self
            .pick_session("\nSession number to delete: ", false)
            .await?
        else {
            return Ok(());
        };

        render::warning(&format!(
            "\nReally delete session '{}'? This cannot be undone.",
            chosen.record.name
        ));
        let confirm = self
            .console
            .read_line(&format!("Type '{}' to confirm: ", DELETE_CONFIRMATION))
            .await?;
        if confirm != DELETE_CONFIRMATION {
            render::info("Deletion cancelled.");
            return Ok(());
        }

        self.store
            .delete(&chosen.filename)
            .with_context(|| format!("Failed to delete session '{}'", chosen.record.name))?;
        render::success("Session deleted.");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
