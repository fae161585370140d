//! Login handshake and session verification.
//!
//! Every attempt runs against a connection-scoped client: the connection is
//! opened at the start and released exactly once on every exit path,
//! including operator interrupts.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ApiCredentials, AuthError};
use crate::api::{ClientFactory, Identity, RemoteClient, SignIn};

/// Progress of a single handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Disconnected,
    Connected,
    CodeRequested,
    PasswordRequired,
    Authenticated,
    TokenExported,
}

/// Progress reported to the operator while a flow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Connecting,
    CodeSent { phone: String },
    PasswordRequired { hint: Option<String> },
    SignedIn(Identity),
    Verified(Identity),
    Unauthorized,
}

/// Operator side of the handshake: supplies the login code and password.
#[async_trait]
pub trait LoginPrompt: Send {
    async fn login_code(&mut self, phone: &str) -> Result<String, AuthError>;

    async fn password(&mut self, hint: Option<&str>) -> Result<String, AuthError>;

    fn notify(&mut self, _event: FlowEvent) {}
}

/// Receiving end of the operator interrupt signal (`true` once fired).
pub type Interrupt = watch::Receiver<bool>;

pub fn interrupt_channel() -> (watch::Sender<bool>, Interrupt) {
    watch::channel(false)
}

/// One connection and the states it has been through.
pub struct Handshake<C> {
    client: C,
    state: AuthState,
    history: Vec<AuthState>,
}

impl<C: RemoteClient> Handshake<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: AuthState::Disconnected,
            history: vec![AuthState::Disconnected],
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[AuthState] {
        &self.history
    }

    pub fn reached(&self, state: AuthState) -> bool {
        self.history.contains(&state)
    }

    fn advance(&mut self, next: AuthState) {
        debug!(from = ?self.state, to = ?next, "Handshake state change");
        self.state = next;
        self.history.push(next);
    }

    /// Open the connection. Done once; later calls are no-ops.
    pub async fn open<P>(&mut self, prompt: &mut P) -> Result<(), AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        if self.reached(AuthState::Connected) {
            return Ok(());
        }
        prompt.notify(FlowEvent::Connecting);
        self.client.connect().await?;
        self.advance(AuthState::Connected);
        Ok(())
    }

    /// Run the login handshake up to the exported token. Does not release.
    pub async fn login<P>(&mut self, phone: &str, prompt: &mut P) -> Result<String, AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        self.open(prompt).await?;

        self.client.request_code(phone).await?;
        self.advance(AuthState::CodeRequested);
        info!("Login code requested");
        prompt.notify(FlowEvent::CodeSent {
            phone: phone.to_string(),
        });

        let code = prompt.login_code(phone).await?;
        match self.client.sign_in(phone, code.trim()).await? {
            SignIn::Authorized => {}
            SignIn::PasswordRequired { hint } => {
                self.advance(AuthState::PasswordRequired);
                info!("Two-step verification required");
                prompt.notify(FlowEvent::PasswordRequired { hint: hint.clone() });

                let password = prompt.password(hint.as_deref()).await?;
                self.client.check_password(&password).await?;
            }
        }
        self.advance(AuthState::Authenticated);

        match self.client.who_am_i().await {
            Ok(me) => {
                info!(user = me.display_name(), "Signed in");
                prompt.notify(FlowEvent::SignedIn(me));
            }
            Err(e) => warn!(error = %e, "Signed in but could not fetch account details"),
        }

        let token = self.client.export_session().await?;
        if token.is_empty() {
            return Err(AuthError::other("remote returned an empty session string"));
        }
        self.advance(AuthState::TokenExported);
        Ok(token)
    }

    /// Check whether the connection's existing session is still authorized.
    pub async fn check<P>(&mut self, prompt: &mut P) -> Result<bool, AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        self.open(prompt).await?;

        if !self.client.is_authorized().await? {
            info!("Stored session is no longer authorized");
            prompt.notify(FlowEvent::Unauthorized);
            return Ok(false);
        }
        self.advance(AuthState::Authenticated);

        match self.client.who_am_i().await {
            Ok(me) => prompt.notify(FlowEvent::Verified(me)),
            Err(e) => warn!(error = %e, "Session valid but could not fetch account details"),
        }
        Ok(true)
    }

    /// Tear the connection down.
    pub async fn release(&mut self) {
        self.client.disconnect().await;
        self.advance(AuthState::Disconnected);
    }
}

/// Drives login and verification attempts with a fixed set of API credentials.
pub struct SessionCreator<F> {
    factory: F,
    credentials: ApiCredentials,
    interrupt: Option<Interrupt>,
}

impl<F: ClientFactory> SessionCreator<F> {
    pub fn new(factory: F, credentials: ApiCredentials) -> Self {
        Self {
            factory,
            credentials,
            interrupt: None,
        }
    }

    /// Abort running attempts (still releasing the connection) once `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Open a handshake over a fresh client. `session` resumes an existing token.
    pub fn handshake(&self, session: Option<&str>) -> Handshake<F::Client> {
        Handshake::new(self.factory.open(&self.credentials, session))
    }

    /// Log in from scratch and return the exported session string.
    pub async fn acquire_session<P>(&self, phone: &str, prompt: &mut P) -> Result<String, AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        let mut handshake = self.handshake(None);
        self.run_login(&mut handshake, phone, prompt).await
    }

    /// Same as [`acquire_session`](Self::acquire_session) over a caller-owned
    /// handshake, so its state history stays inspectable afterwards.
    pub async fn run_login<P>(
        &self,
        handshake: &mut Handshake<F::Client>,
        phone: &str,
        prompt: &mut P,
    ) -> Result<String, AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        info!(api_id = self.credentials.api_id, "Starting login handshake");
        let outcome = match self.open(handshake, prompt).await {
            Ok(()) => {
                let work = handshake.login(phone, prompt);
                self.interruptible(work).await
            }
            Err(e) => Err(e),
        };
        handshake.release().await;

        if let Err(ref e) = outcome {
            warn!(error = %e, "Login handshake failed");
        }
        outcome
    }

    /// Connect with an existing session string and report whether it is still authorized.
    ///
    /// An unauthorized session is `Ok(false)`, not an error.
    pub async fn verify_session<P>(&self, token: &str, prompt: &mut P) -> Result<bool, AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        let mut handshake = self.handshake(Some(token));
        let outcome = match self.open(&mut handshake, prompt).await {
            Ok(()) => {
                let work = handshake.check(prompt);
                self.interruptible(work).await
            }
            Err(e) => Err(e),
        };
        handshake.release().await;
        outcome
    }

    /// Connect outside the interrupt race: a dropped connect could leave the
    /// remote side holding a connection that `release` does not know about.
    /// An interrupt that fired meanwhile is honoured once connected.
    async fn open<P>(
        &self,
        handshake: &mut Handshake<F::Client>,
        prompt: &mut P,
    ) -> Result<(), AuthError>
    where
        P: LoginPrompt + ?Sized,
    {
        handshake.open(prompt).await?;
        if self.interrupted() {
            info!("Handshake interrupted by operator");
            return Err(AuthError::Interrupted);
        }
        Ok(())
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn interruptible<T>(
        &self,
        work: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        tokio::select! {
            result = work => result,
            _ = wait_for_interrupt(self.interrupt.clone()) => {
                info!("Handshake interrupted by operator");
                Err(AuthError::Interrupted)
            }
        }
    }
}

/// Resolves once the interrupt fires. Never resolves without a live sender.
pub async fn wait_for_interrupt(interrupt: Option<Interrupt>) {
    if let Some(mut rx) = interrupt {
        if rx.wait_for(|fired| *fired).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PHONE: &str = "+821012345678";

    #[derive(Clone, Default)]
    struct Script {
        fail_connect: bool,
        reject_code: bool,
        password: Option<&'static str>,
        authorized: bool,
        identity_fails: bool,
        /// Fired while connect is still in flight.
        interrupt_during_connect: Option<Arc<watch::Sender<bool>>>,
    }

    #[derive(Clone, Default)]
    struct Counters {
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
        closed_connections: Arc<AtomicUsize>,
        codes_requested: Arc<AtomicUsize>,
        passwords: Arc<AtomicUsize>,
    }

    struct ScriptedClient {
        script: Script,
        counters: Counters,
        session: Option<String>,
        connected: bool,
        signed_in: bool,
    }

    #[async_trait]
    impl RemoteClient for ScriptedClient {
        async fn connect(&mut self) -> Result<(), AuthError> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            if self.script.fail_connect {
                return Err(AuthError::other("connection refused"));
            }
            if let Some(tx) = &self.script.interrupt_during_connect {
                let _ = tx.send(true);
                tokio::task::yield_now().await;
            }
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
            if std::mem::take(&mut self.connected) {
                self.counters.closed_connections.fetch_add(1, Ordering::SeqCst);
            }
        }

        async fn request_code(&mut self, _phone: &str) -> Result<(), AuthError> {
            self.counters.codes_requested.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn sign_in(&mut self, _phone: &str, code: &str) -> Result<SignIn, AuthError> {
            if self.script.reject_code || code != "12345" {
                return Err(AuthError::InvalidCode);
            }
            if self.script.password.is_some() {
                return Ok(SignIn::PasswordRequired {
                    hint: Some("usual".to_string()),
                });
            }
            self.signed_in = true;
            Ok(SignIn::Authorized)
        }

        async fn check_password(&mut self, password: &str) -> Result<(), AuthError> {
            self.counters.passwords.fetch_add(1, Ordering::SeqCst);
            if Some(password) == self.script.password {
                self.signed_in = true;
                Ok(())
            } else {
                Err(AuthError::InvalidPassword)
            }
        }

        async fn is_authorized(&mut self) -> Result<bool, AuthError> {
            Ok(self.script.authorized && self.session.is_some())
        }

        async fn who_am_i(&mut self) -> Result<Identity, AuthError> {
            if self.script.identity_fails {
                return Err(AuthError::other("users.getFullUser failed"));
            }
            Ok(Identity {
                first_name: Some("Alice".to_string()),
                username: None,
            })
        }

        async fn export_session(&mut self) -> Result<String, AuthError> {
            if self.signed_in {
                Ok("1BQANOTEuMTA4LjU2LjE1NAG7".to_string())
            } else {
                Ok(String::new())
            }
        }
    }

    struct ScriptedFactory {
        script: Script,
        counters: Counters,
    }

    impl ClientFactory for ScriptedFactory {
        type Client = ScriptedClient;

        fn open(&self, _credentials: &ApiCredentials, session: Option<&str>) -> ScriptedClient {
            ScriptedClient {
                script: self.script.clone(),
                counters: self.counters.clone(),
                session: session.map(str::to_string),
                connected: false,
                signed_in: false,
            }
        }
    }

    struct ScriptedPrompt {
        code: &'static str,
        password: Option<&'static str>,
        hang_on_code: bool,
        events: Vec<FlowEvent>,
    }

    impl ScriptedPrompt {
        fn new(code: &'static str, password: Option<&'static str>) -> Self {
            Self {
                code,
                password,
                hang_on_code: false,
                events: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl LoginPrompt for ScriptedPrompt {
        async fn login_code(&mut self, _phone: &str) -> Result<String, AuthError> {
            if self.hang_on_code {
                std::future::pending::<()>().await;
            }
            Ok(self.code.to_string())
        }

        async fn password(&mut self, _hint: Option<&str>) -> Result<String, AuthError> {
            self.password
                .map(str::to_string)
                .ok_or_else(|| AuthError::Prompt("no password entered".to_string()))
        }

        fn notify(&mut self, event: FlowEvent) {
            self.events.push(event);
        }
    }

    fn creator(script: Script) -> (SessionCreator<ScriptedFactory>, Counters) {
        let counters = Counters::default();
        let factory = ScriptedFactory {
            script,
            counters: counters.clone(),
        };
        let credentials = ApiCredentials {
            api_id: 12345,
            api_hash: "0123456789abcdef0123456789abcdef".to_string(),
        };
        (SessionCreator::new(factory, credentials), counters)
    }

    #[tokio::test]
    async fn test_acquire_session_without_password() {
        let (creator, counters) = creator(Script::default());
        let mut prompt = ScriptedPrompt::new("12345", None);
        let mut handshake = creator.handshake(None);

        let token = creator
            .run_login(&mut handshake, PHONE, &mut prompt)
            .await
            .unwrap();

        assert!(!token.is_empty());
        assert_eq!(
            handshake.history(),
            &[
                AuthState::Disconnected,
                AuthState::Connected,
                AuthState::CodeRequested,
                AuthState::Authenticated,
                AuthState::TokenExported,
                AuthState::Disconnected,
            ]
        );
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
        assert!(prompt.events.contains(&FlowEvent::SignedIn(Identity {
            first_name: Some("Alice".to_string()),
            username: None,
        })));
    }

    #[tokio::test]
    async fn test_rejected_code_is_terminal_and_releases_once() {
        let (creator, counters) = creator(Script {
            reject_code: true,
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", None);

        let err = creator.acquire_session(PHONE, &mut prompt).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCode);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_factor_with_password() {
        let (creator, counters) = creator(Script {
            password: Some("hunter2"),
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", Some("hunter2"));
        let mut handshake = creator.handshake(None);

        let token = creator
            .run_login(&mut handshake, PHONE, &mut prompt)
            .await
            .unwrap();

        assert!(!token.is_empty());
        assert!(handshake.reached(AuthState::PasswordRequired));
        assert!(handshake.reached(AuthState::TokenExported));
        assert_eq!(counters.passwords.load(Ordering::SeqCst), 1);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_factor_without_password_never_authenticates() {
        let (creator, counters) = creator(Script {
            password: Some("hunter2"),
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", None);
        let mut handshake = creator.handshake(None);

        let err = creator
            .run_login(&mut handshake, PHONE, &mut prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Prompt(_)));
        assert!(handshake.reached(AuthState::PasswordRequired));
        assert!(!handshake.reached(AuthState::Authenticated));
        assert_eq!(handshake.state(), AuthState::Disconnected);
        assert_eq!(counters.passwords.load(Ordering::SeqCst), 0);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_is_not_retried() {
        let (creator, counters) = creator(Script {
            password: Some("hunter2"),
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", Some("wrong"));

        let err = creator.acquire_session(PHONE, &mut prompt).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidPassword);
        assert_eq!(counters.passwords.load(Ordering::SeqCst), 1);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_still_releases() {
        let (creator, counters) = creator(Script {
            fail_connect: true,
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", None);
        let mut handshake = creator.handshake(None);

        let err = creator
            .run_login(&mut handshake, PHONE, &mut prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Other(_)));
        assert!(!handshake.reached(AuthState::Connected));
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_identity_failure_is_not_fatal() {
        let (creator, _) = creator(Script {
            identity_fails: true,
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("12345", None);

        let token = creator.acquire_session(PHONE, &mut prompt).await.unwrap();
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_releases_connection() {
        let (creator, counters) = creator(Script::default());
        let (tx, rx) = interrupt_channel();
        let creator = creator.with_interrupt(rx);
        let mut prompt = ScriptedPrompt::new("12345", None);
        prompt.hang_on_code = true;

        tx.send(true).unwrap();
        let err = creator.acquire_session(PHONE, &mut prompt).await.unwrap_err();

        assert_eq!(err, AuthError::Interrupted);
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interrupt_during_connect_still_closes_connection() {
        let (tx, rx) = interrupt_channel();
        let tx = Arc::new(tx);
        let (creator, counters) = creator(Script {
            interrupt_during_connect: Some(tx.clone()),
            ..Script::default()
        });
        let creator = creator.with_interrupt(rx);
        let mut prompt = ScriptedPrompt::new("12345", None);
        let mut handshake = creator.handshake(None);

        let err = creator
            .run_login(&mut handshake, PHONE, &mut prompt)
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::Interrupted);
        assert!(handshake.reached(AuthState::Connected));
        assert!(!handshake.reached(AuthState::CodeRequested));
        assert_eq!(counters.codes_requested.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closed_connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_interrupted_during_connect_closes_connection() {
        let (tx, rx) = interrupt_channel();
        let (creator, counters) = creator(Script {
            authorized: true,
            interrupt_during_connect: Some(Arc::new(tx)),
            ..Script::default()
        });
        let creator = creator.with_interrupt(rx);
        let mut prompt = ScriptedPrompt::new("", None);

        let err = creator.verify_session("1Babc", &mut prompt).await.unwrap_err();

        assert_eq!(err, AuthError::Interrupted);
        assert_eq!(counters.closed_connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_session_authorized() {
        let (creator, counters) = creator(Script {
            authorized: true,
            ..Script::default()
        });
        let mut prompt = ScriptedPrompt::new("", None);

        assert!(creator.verify_session("1Babc", &mut prompt).await.unwrap());
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
        assert!(matches!(prompt.events.last(), Some(FlowEvent::Verified(_))));
    }

    #[tokio::test]
    async fn test_verify_session_unauthorized_is_false_not_error() {
        let (creator, counters) = creator(Script::default());
        let mut prompt = ScriptedPrompt::new("", None);

        assert!(!creator.verify_session("1Babc", &mut prompt).await.unwrap());
        assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(prompt.events.last(), Some(&FlowEvent::Unauthorized));
    }
}
