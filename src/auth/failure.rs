//! Terminal session failure: purge credentials and force a re-login

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use super::navigator::Navigator;
use super::store::CredentialStore;

pub struct SessionFailureHandler {
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    terminated: AtomicBool,
}

impl SessionFailureHandler {
    pub fn new(
        store: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_route: login_route.into(),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Clear every stored credential and send the user to the login route.
    ///
    /// Navigation happens once until the handler is re-armed by a sign-in.
    pub fn terminate(&self) {
        self.store.clear();
        if self.terminated.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session already terminated");
            return;
        }
        tracing::info!("Session terminated, redirecting to {}", self.login_route);
        self.navigator.navigate(&self.login_route);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Allow the next `terminate` to navigate again
    pub fn rearm(&self) {
        self.terminated.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::navigator::HeadlessNavigator;
    use crate::auth::store::CredentialName;

    fn handler() -> (Arc<CredentialStore>, Arc<HeadlessNavigator>, SessionFailureHandler) {
        let store = Arc::new(CredentialStore::in_memory(true));
        let navigator = Arc::new(HeadlessNavigator::new());
        let handler = SessionFailureHandler::new(store.clone(), navigator.clone(), "/login");
        (store, navigator, handler)
    }

    #[test]
    fn test_terminate_clears_and_navigates() {
        let (store, navigator, handler) = handler();
        store.save(CredentialName::Access, "a");
        store.save(CredentialName::Refresh, "r");

        handler.terminate();

        assert_eq!(store.get(CredentialName::Access, true), None);
        assert_eq!(store.get(CredentialName::Refresh, true), None);
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
        assert!(handler.is_terminated());
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let (_store, navigator, handler) = handler();
        handler.terminate();
        handler.terminate();
        assert_eq!(navigator.routes().len(), 1);
    }

    #[test]
    fn test_rearm_allows_second_redirect() {
        let (_store, navigator, handler) = handler();
        handler.terminate();
        handler.rearm();
        handler.terminate();
        assert_eq!(navigator.routes().len(), 2);
    }
}
