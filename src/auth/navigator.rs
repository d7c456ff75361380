//! UI effects the auth layer needs: a blocking notice and a route change

use async_trait::async_trait;
use std::sync::Mutex;

/// User-visible notice shown before a forced re-login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    pub title: String,
    pub message: String,
}

impl SessionNotice {
    pub fn session_expired() -> Self {
        Self {
            title: "Your account session has expired".to_string(),
            message: "Please sign in again".to_string(),
        }
    }
}

/// Presentation layer hooks
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Show a blocking notice, resolving once the user has dismissed it
    async fn present_notice(&self, notice: &SessionNotice);

    /// Move to `route`, discarding in-flight application state
    fn navigate(&self, route: &str);
}

/// Navigator without a UI; records what would have been shown
#[derive(Debug, Default)]
pub struct HeadlessNavigator {
    notices: Mutex<Vec<SessionNotice>>,
    routes: Mutex<Vec<String>>,
}

impl HeadlessNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<SessionNotice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Navigator for HeadlessNavigator {
    async fn present_notice(&self, notice: &SessionNotice) {
        tracing::debug!("Notice: {}", notice.title);
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }

    fn navigate(&self, route: &str) {
        tracing::debug!("Navigate to {}", route);
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route.to_string());
        }
    }
}
