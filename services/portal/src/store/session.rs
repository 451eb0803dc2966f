//! services/portal/src/store/session.rs
//!
//! The Session Lifecycle Controller: owns the credential and the signed-in user,
//! and on logout clears local state and tells every other store to reset.

use pcas_core::domain::{LoginRequest, RegisterRequest, User, UserRole};
use pcas_core::ports::{ApiGateway, HttpMethod, LocalCache, PortError, PortResult};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::persistence::{self, APPLICATION_PREFIX};
use crate::store::events::{SessionBus, SessionEvent};
use crate::validation;

const REGISTER_PATH: &str = "/api/auth/register";
const LOGIN_PATH: &str = "/api/auth/login";
const ME_PATH: &str = "/api/auth/me";
const USERS_PATH: &str = "/api/auth/users";
const LOGOUT_PATH: &str = "/api/auth/logout";

const NO_TOKEN_MESSAGE: &str = "No authentication token found";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_authenticated: bool,
}

#[derive(Deserialize)]
struct LoginData {
    user: User,
    token: String,
}

pub struct SessionController {
    gateway: Arc<dyn ApiGateway>,
    cache: Arc<dyn LocalCache>,
    bus: SessionBus,
    state: Mutex<AuthState>,
}

impl SessionController {
    /// Starts unauthenticated, with any stored credential already in memory.
    pub fn new(gateway: Arc<dyn ApiGateway>, cache: Arc<dyn LocalCache>, bus: SessionBus) -> Self {
        let token = persistence::load_token(cache.as_ref());
        Self {
            gateway,
            cache,
            bus,
            state: Mutex::new(AuthState {
                token,
                ..AuthState::default()
            }),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    /// Reads any stored credential into memory without asking the server.
    /// `get_current_user` is what validates it.
    pub fn initialize_auth(&self) {
        if let Some(token) = persistence::load_token(self.cache.as_ref()) {
            self.lock().token = Some(token);
        }
    }

    /// Creates an account. Does not sign in; the caller must `login` afterwards.
    pub async fn register(&self, request: &RegisterRequest) -> PortResult<User> {
        self.begin();
        let result = async {
            validation::check_registration(request).map_err(validation::into_port_error)?;
            let body = serde_json::to_value(request)
                .map_err(|e| PortError::InvalidInput(e.to_string()))?;
            let envelope = self
                .gateway
                .request(HttpMethod::Post, REGISTER_PATH, Some(body))
                .await?;
            envelope.field::<User>("user")
        }
        .await;

        let mut state = self.lock();
        state.is_loading = false;
        match &result {
            Ok(user) => {
                info!(user_id = %user.id, "Registered account");
                state.error = None;
            }
            Err(e) => {
                warn!("Registration failed: {}", e);
                state.error = Some(e.to_string());
                state.is_authenticated = false;
            }
        }
        result
    }

    pub async fn login(&self, request: &LoginRequest) -> PortResult<User> {
        self.begin();
        let result = async {
            validation::check_login(request).map_err(validation::into_port_error)?;
            let body = serde_json::to_value(request)
                .map_err(|e| PortError::InvalidInput(e.to_string()))?;
            let envelope = self
                .gateway
                .request(HttpMethod::Post, LOGIN_PATH, Some(body))
                .await?;
            envelope.data_as::<LoginData>()
        }
        .await;

        match result {
            Ok(LoginData { user, token }) => {
                persistence::store_token(self.cache.as_ref(), &token);
                info!(user_id = %user.id, "Signed in");
                let mut state = self.lock();
                state.is_loading = false;
                state.user = Some(user.clone());
                state.token = Some(token);
                state.is_authenticated = true;
                state.error = None;
                Ok(user)
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                let mut state = self.lock();
                state.is_loading = false;
                state.error = Some(e.to_string());
                state.is_authenticated = false;
                Err(e)
            }
        }
    }

    /// Re-hydrates the session from the stored credential. Any failure, a missing
    /// credential included, leaves the session fully signed out.
    pub async fn get_current_user(&self) -> PortResult<User> {
        self.lock().is_loading = true;
        let result = match persistence::load_token(self.cache.as_ref()) {
            Some(_) => self
                .gateway
                .request(HttpMethod::Get, ME_PATH, None)
                .await
                .and_then(|envelope| envelope.field::<User>("user")),
            None => Err(PortError::Unauthorized(NO_TOKEN_MESSAGE.to_string())),
        };

        if result.is_err() {
            persistence::clear_token(self.cache.as_ref());
        }
        let mut state = self.lock();
        state.is_loading = false;
        match &result {
            Ok(user) => {
                state.user = Some(user.clone());
                state.is_authenticated = true;
                state.error = None;
            }
            Err(e) => {
                warn!("Could not restore session: {}", e);
                state.error = Some(e.to_string());
                state.is_authenticated = false;
                state.token = None;
                state.user = None;
            }
        }
        result
    }

    /// Lists users registered under `role`. Leaves the signed-in user untouched.
    pub async fn users_by_role(&self, role: UserRole) -> PortResult<Vec<User>> {
        self.lock().is_loading = true;
        let result = match persistence::load_token(self.cache.as_ref()) {
            Some(_) => {
                let path = format!("{}/{}", USERS_PATH, role.as_str());
                self.gateway
                    .request(HttpMethod::Get, &path, None)
                    .await
                    .and_then(|envelope| envelope.field::<Vec<User>>("users"))
            }
            None => Err(PortError::Unauthorized(NO_TOKEN_MESSAGE.to_string())),
        };

        let mut state = self.lock();
        state.is_loading = false;
        state.error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Ends the session. The server is told on a best-effort basis; local state is
    /// cleared whatever it answers, and the error (if any) is kept on the state.
    pub async fn logout(&self) -> PortResult<()> {
        self.lock().is_loading = true;
        let server_result = match persistence::load_token(self.cache.as_ref()) {
            Some(_) => self
                .gateway
                .request(HttpMethod::Post, LOGOUT_PATH, None)
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = &server_result {
            warn!("Server logout failed, clearing local session anyway: {}", e);
        }

        self.end_session(server_result.as_ref().err().map(ToString::to_string));
        server_result
    }

    /// Ends the session without contacting the server.
    pub fn logout_local(&self) {
        self.end_session(None);
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    fn end_session(&self, error: Option<String>) {
        persistence::clear_token(self.cache.as_ref());
        let purged = persistence::purge_prefix(self.cache.as_ref(), APPLICATION_PREFIX);
        {
            let mut state = self.lock();
            *state = AuthState {
                error,
                ..AuthState::default()
            };
        }
        info!(purged, "Signed out");
        self.bus.publish(SessionEvent::LoggedOut);
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
