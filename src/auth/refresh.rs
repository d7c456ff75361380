//! Access credential renewal
//!
//! Exchanges the refresh credential for a new access credential. Concurrent
//! callers share one in-flight exchange: the first publishes a pending
//! handle and later callers await it instead of starting another round-trip.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;
use super::failure::SessionFailureHandler;
use super::navigator::SessionNotice;
use super::store::{CredentialName, CredentialStore};

/// Why a refresh did not produce a new access credential
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// No response from the refresh endpoint
    #[error("refresh endpoint unreachable: {0}")]
    Transport(String),

    /// Non-terminal rejection
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    /// Success status, but no usable `accessToken` in the body
    #[error("refresh response malformed: {0}")]
    MalformedResponse(String),

    /// The refresh credential itself was refused; the session is gone
    #[error("session expired")]
    SessionExpired,
}

impl RefreshFailure {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshFailure::SessionExpired)
    }
}

pub type RefreshOutcome = std::result::Result<(), RefreshFailure>;

/// Shared handle on an in-flight renewal
pub type PendingOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

struct PendingRefresh {
    id: u64,
    outcome: PendingOutcome,
}

struct Inner {
    http_client: Client,
    refresh_url: Url,
    store: Arc<CredentialStore>,
    failure: Arc<SessionFailureHandler>,
    pending: Mutex<Option<PendingRefresh>>,
    next_id: AtomicU64,
}

/// Single-flight refresh protocol runner
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// `http_client` must not carry the access credential; the refresh
    /// call authenticates with the refresh credential only.
    pub fn new(
        http_client: Client,
        refresh_url: Url,
        store: Arc<CredentialStore>,
        failure: Arc<SessionFailureHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http_client,
                refresh_url,
                store,
                failure,
                pending: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn refresh_url(&self) -> &Url {
        &self.inner.refresh_url
    }

    /// Whether an exchange is currently in flight
    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start a renewal, or join the one already in flight.
    ///
    /// The exchange runs on its own task, so dropping the returned handle
    /// only abandons the wait; other waiters and the stored result are
    /// unaffected.
    pub fn begin(&self) -> PendingOutcome {
        let mut slot = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = slot.as_ref() {
            tracing::debug!("Joining in-flight refresh #{}", pending.id);
            return pending.outcome.clone();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let outcome = async move {
            let outcome = inner.exchange().await;
            inner.finish(id);
            outcome
        }
        .boxed()
        .shared();

        tokio::spawn(outcome.clone());
        *slot = Some(PendingRefresh {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Renew the access credential, joining an in-flight renewal if any
    pub async fn refresh(&self) -> RefreshOutcome {
        self.begin().await
    }
}

impl Inner {
    fn finish(&self, id: u64) {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|p| p.id == id) {
            *slot = None;
        }
    }

    async fn exchange(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.get(CredentialName::Refresh, false) else {
            tracing::error!("No refresh credential stored, ending session");
            return self.expire_session().await;
        };

        tracing::info!("Access credential near expiry, refreshing");

        let response = match self
            .http_client
            .post(self.refresh_url.clone())
            .bearer_auth(&refresh_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("An error occurred while refreshing: {}", e);
                return Err(RefreshFailure::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Backend returned code {}, body was: {}", status.as_u16(), body);

            if status == StatusCode::UNAUTHORIZED {
                return self.expire_session().await;
            }
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Refresh response could not be read: {}", e);
                return Err(RefreshFailure::Transport(e.to_string()));
            }
        };

        let access_token = match serde_json::from_str::<RefreshResponse>(&body) {
            Ok(parsed) if !parsed.access_token.is_empty() => parsed.access_token,
            Ok(_) => {
                tracing::warn!("Refresh response carried an empty accessToken");
                return Err(RefreshFailure::MalformedResponse(
                    "empty accessToken".to_string(),
                ));
            }
            Err(e) => {
                tracing::warn!("Refresh response is malformed: {}", e);
                return Err(RefreshFailure::MalformedResponse(e.to_string()));
            }
        };

        self.store.save(CredentialName::Access, &access_token);
        tracing::info!("Access credential renewed");
        Ok(())
    }

    async fn expire_session(&self) -> RefreshOutcome {
        self.failure
            .navigator()
            .present_notice(&SessionNotice::session_expired())
            .await;
        self.failure.terminate();
        Err(RefreshFailure::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::navigator::HeadlessNavigator;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        store: Arc<CredentialStore>,
        navigator: Arc<HeadlessNavigator>,
        coordinator: RefreshCoordinator,
    }

    fn fixture(server: &MockServer) -> Fixture {
        let store = Arc::new(CredentialStore::in_memory(true));
        store.save(CredentialName::Access, "old-access");
        store.save(CredentialName::Refresh, "refresh-1");
        let navigator = Arc::new(HeadlessNavigator::new());
        let failure = Arc::new(SessionFailureHandler::new(
            store.clone(),
            navigator.clone(),
            "/login",
        ));
        let url = Url::parse(&format!("{}/api/user/refresh-token", server.uri())).unwrap();
        let coordinator = RefreshCoordinator::new(Client::new(), url, store.clone(), failure);
        Fixture {
            store,
            navigator,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_refresh_saves_new_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/refresh-token"))
            .and(header("authorization", "Bearer refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new"})))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        assert_eq!(fx.coordinator.refresh().await, Ok(()));
        assert_eq!(fx.store.get(CredentialName::Access, false).as_deref(), Some("new"));
        assert_eq!(fx.store.get(CredentialName::Refresh, false).as_deref(), Some("refresh-1"));
        assert!(!fx.coordinator.is_pending());
    }

    #[tokio::test]
    async fn test_missing_refresh_credential_ends_session_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "new"})))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::in_memory(true));
        store.save(CredentialName::Access, "old-access");
        let navigator = Arc::new(HeadlessNavigator::new());
        let failure = Arc::new(SessionFailureHandler::new(
            store.clone(),
            navigator.clone(),
            "/login",
        ));
        let url = Url::parse(&format!("{}/api/user/refresh-token", server.uri())).unwrap();
        let coordinator = RefreshCoordinator::new(Client::new(), url, store.clone(), failure);

        assert_eq!(coordinator.refresh().await, Err(RefreshFailure::SessionExpired));
        assert_eq!(store.get(CredentialName::Access, true), None);
        assert_eq!(navigator.notices().len(), 1);
        assert_eq!(navigator.routes(), vec!["/login".to_string()]);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let fx = fixture(&server);
        assert_eq!(fx.coordinator.refresh().await, Err(RefreshFailure::SessionExpired));
        assert_eq!(fx.store.get(CredentialName::Access, true), None);
        assert_eq!(fx.store.get(CredentialName::Refresh, true), None);
        assert_eq!(fx.navigator.notices(), vec![SessionNotice::session_expired()]);
        assert_eq!(fx.navigator.routes(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_other_status_is_not_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let outcome = fx.coordinator.refresh().await;
        assert_eq!(outcome, Err(RefreshFailure::Rejected { status: 500 }));
        assert!(!outcome.unwrap_err().is_terminal());
        assert_eq!(fx.store.get(CredentialName::Access, false).as_deref(), Some("old-access"));
        assert!(fx.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_access_token_field_is_not_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
            .mount(&server)
            .await;

        let fx = fixture(&server);
        assert!(matches!(
            fx.coordinator.refresh().await,
            Err(RefreshFailure::MalformedResponse(_))
        ));
        assert_eq!(fx.store.get(CredentialName::Access, false).as_deref(), Some("old-access"));
        assert!(fx.navigator.notices().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_stale_credential() {
        let server = MockServer::start().await;
        let fx = fixture(&server);
        drop(server);

        assert!(matches!(
            fx.coordinator.refresh().await,
            Err(RefreshFailure::Transport(_))
        ));
        assert_eq!(fx.store.get(CredentialName::Access, false).as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "shared"}))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let (a, b, c) = tokio::join!(
            fx.coordinator.refresh(),
            fx.coordinator.refresh(),
            fx.coordinator.refresh()
        );
        assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));
        assert_eq!(fx.store.get(CredentialName::Access, false).as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_hit_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "again"})))
            .expect(2)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        assert_eq!(fx.coordinator.refresh().await, Ok(()));
        assert_eq!(fx.coordinator.refresh().await, Ok(()));
    }
}
