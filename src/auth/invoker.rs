//! Authenticated call wrapper
//!
//! Any business call shaped `Fn(args, RequestOptions) -> Future<Output = Result<T>>`
//! can be wrapped once with [`AuthenticatedInvoker::wrap`]. Every invocation
//! then checks the access credential, renews it when it is close to expiry,
//! and dispatches with `Authorization: Bearer <access credential>`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::Result;
use crate::error::Error;
use super::claims;
use super::refresh::RefreshCoordinator;
use super::store::{CredentialName, CredentialStore};

/// Trailing options argument of a business call
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(AUTHORIZATION)
    }

    /// Copy these options onto an outgoing reqwest request
    pub fn apply(self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.headers(self.headers)
    }
}

/// Source of the current Unix time in seconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// Attaches and renews credentials for wrapped calls
#[derive(Clone)]
pub struct AuthenticatedInvoker {
    store: Arc<CredentialStore>,
    refresher: RefreshCoordinator,
    refresh_threshold_secs: i64,
    clock: Clock,
}

impl AuthenticatedInvoker {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: RefreshCoordinator,
        refresh_threshold_secs: i64,
    ) -> Self {
        Self {
            store,
            refresher,
            refresh_threshold_secs,
            clock: system_clock(),
        }
    }

    /// Replace the clock used for the expiry check
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    /// Wrap a business call so every invocation goes through this invoker
    pub fn wrap<F>(&self, call: F) -> AuthenticatedCall<F> {
        AuthenticatedCall {
            invoker: self.clone(),
            call,
        }
    }

    /// Run `call` once with credentials attached
    pub async fn invoke<F, A, Fut, T>(
        &self,
        call: &F,
        args: A,
        options: Option<RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T>
    where
        F: Fn(A, RequestOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(claims) = claims::decode(&self.store, CredentialName::Access, false)? else {
            tracing::debug!("No access credential, dispatching anonymously");
            let options = options.unwrap_or_default();
            return until_cancelled(cancel, call(args, options)).await?;
        };

        let now = (self.clock)();
        let seconds_remaining = claims.seconds_remaining(now);

        if seconds_remaining < self.refresh_threshold_secs {
            tracing::debug!(
                "Access credential expires in {}s, renewing before dispatch",
                seconds_remaining
            );
            if let Err(failure) = until_cancelled(cancel, self.refresher.begin()).await? {
                tracing::debug!("Call abandoned after failed refresh: {}", failure);
                return Err(Error::CallAbandoned);
            }
        }

        let options = self.attach(options)?;
        until_cancelled(cancel, call(args, options)).await?
    }

    /// Merge the current authorization header into `options`.
    ///
    /// The header is read from the store at this moment so a refresh that
    /// just finished is picked up. A caller-supplied header is left alone.
    fn attach(&self, options: Option<RequestOptions>) -> Result<RequestOptions> {
        let mut options = options.unwrap_or_default();
        if options.authorization().is_some() {
            return Ok(options);
        }

        if let Some(token) = self.store.get(CredentialName::Access, false) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                Error::MalformedCredential(format!("not usable as a header value: {}", e))
            })?;
            options.headers.insert(AUTHORIZATION, value);
        }
        Ok(options)
    }
}

async fn until_cancelled<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = T>,
) -> Result<T> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            value = fut => Ok(value),
        },
        None => Ok(fut.await),
    }
}

/// A business call bound to an [`AuthenticatedInvoker`]
#[derive(Clone)]
pub struct AuthenticatedCall<F> {
    invoker: AuthenticatedInvoker,
    call: F,
}

impl<F> AuthenticatedCall<F> {
    pub async fn call<A, Fut, T>(&self, args: A, options: Option<RequestOptions>) -> Result<T>
    where
        F: Fn(A, RequestOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.invoker.invoke(&self.call, args, options, None).await
    }

    /// Like [`call`](Self::call), resolving to `Error::Cancelled` if `cancel`
    /// fires before the result arrives
    pub async fn call_with_cancel<A, Fut, T>(
        &self,
        args: A,
        options: Option<RequestOptions>,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        F: Fn(A, RequestOptions) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.invoker.invoke(&self.call, args, options, Some(cancel)).await
    }
}
