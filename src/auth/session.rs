//! AuthSession - wires the credential store, refresh protocol and invoker
//!
//! Built once per session from [`Config`] and shared by reference with every
//! component that issues authenticated calls.

use reqwest::Client;
use std::sync::Arc;
use crate::Result;
use crate::config::Config;
use super::claims::{self, Claims};
use super::failure::SessionFailureHandler;
use super::invoker::AuthenticatedInvoker;
use super::navigator::Navigator;
use super::refresh::RefreshCoordinator;
use super::store::{CredentialName, CredentialStore};

pub struct AuthSession {
    store: Arc<CredentialStore>,
    failure: Arc<SessionFailureHandler>,
    refresher: RefreshCoordinator,
    invoker: AuthenticatedInvoker,
}

impl AuthSession {
    /// Open the durable credential file named by `config`
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = CredentialStore::open(config.credentials_path(), config.remember_me)?;
        Self::with_store(config, Arc::new(store), navigator)
    }

    /// Build a session over an existing store
    pub fn with_store(
        config: &Config,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let failure = Arc::new(SessionFailureHandler::new(
            store.clone(),
            navigator,
            config.login_route.clone(),
        ));
        let refresher = RefreshCoordinator::new(
            Client::new(),
            config.refresh_url()?,
            store.clone(),
            failure.clone(),
        );
        let invoker = AuthenticatedInvoker::new(
            store.clone(),
            refresher.clone(),
            config.refresh_threshold_secs,
        );

        Ok(Self {
            store,
            failure,
            refresher,
            invoker,
        })
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn invoker(&self) -> &AuthenticatedInvoker {
        &self.invoker
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn failure_handler(&self) -> &Arc<SessionFailureHandler> {
        &self.failure
    }

    pub fn remember_login_state(&self) -> bool {
        self.store.remember_login_state()
    }

    pub fn set_remember_login_state(&self, remember_me: bool) {
        self.store.set_remember_login_state(remember_me);
    }

    /// Persist a credential pair issued by a login.
    ///
    /// The access credential must decode; its claims are returned.
    pub fn sign_in(&self, access_token: &str, refresh_token: &str, remember_me: bool) -> Result<Claims> {
        let claims = claims::decode_payload(access_token)?;

        self.store.set_remember_login_state(remember_me);
        self.store.save(CredentialName::Access, access_token);
        self.store.save(CredentialName::Refresh, refresh_token);
        self.failure.rearm();

        tracing::info!("Signed in as {} ({})", claims.display_name, claims.role);
        Ok(claims)
    }

    /// Drop every stored credential
    pub fn sign_out(&self) {
        self.store.clear();
        tracing::info!("Signed out");
    }

    /// Claims of the current access credential, looking in both backends
    pub fn current_user(&self) -> Result<Option<Claims>> {
        claims::decode(&self.store, CredentialName::Access, true)
    }

    /// Holding a credential of at least `User` role; guests do not count
    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.current_user()?.is_some_and(|c| c.is_logged_in()))
    }
}
