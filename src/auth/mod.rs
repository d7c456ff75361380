//! Authentication module for the chat-room client
//!
//! This module provides:
//! - Credential storage in a durable or session-scoped backend
//! - Unverified decoding of credential claims
//! - Single-flight renewal of the access credential
//! - A wrapper that attaches bearer credentials to outgoing calls
//! - Forced re-login when the refresh credential is refused

mod claims;
mod failure;
mod invoker;
mod navigator;
mod refresh;
mod session;
mod store;

pub use claims::{decode, decode_payload, Claims, Role};
pub use failure::SessionFailureHandler;
pub use invoker::{AuthenticatedCall, AuthenticatedInvoker, Clock, RequestOptions};
pub use navigator::{HeadlessNavigator, Navigator, SessionNotice};
pub use refresh::{PendingOutcome, RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use session::AuthSession;
pub use store::{
    BackendKind, CredentialBackend, CredentialName, CredentialStore, FileBackend, MemoryBackend,
};
