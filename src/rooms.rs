//! Chat-room endpoints
//!
//! Every endpoint is wrapped once, at construction, by the
//! [`AuthenticatedInvoker`], so callers never handle credentials.

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::auth::{AuthenticatedCall, AuthenticatedInvoker, RequestOptions};
use crate::config::Config;
use crate::error::Error;

const ROOMS_PATH: &str = "api/chat-rooms";
const ROOM_NAME_VALIDATION_PATH: &str = "api/chat-rooms/room-name-validation";

pub const ROOM_NAME_LENGTH: (usize, usize) = (2, 20);
pub const MAX_USERS_RANGE: (u32, u32) = (2, 1000);
pub const ROOM_PASSWORD_LENGTH: (usize, usize) = (6, 128);

/// A room as submitted by the creation form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomDraft {
    pub name: String,
    pub max_users: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub is_permanent: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

impl ChatRoomDraft {
    pub fn new(name: impl Into<String>, max_users: u32) -> Self {
        Self {
            name: name.into(),
            max_users,
            password: None,
            is_encrypted: false,
            is_permanent: false,
            is_hidden: false,
        }
    }

    /// Check the form rules, collecting one message per offending field
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(objection) = room_name_objection(&self.name) {
            errors.push(objection);
        }

        if self.max_users < MAX_USERS_RANGE.0 || self.max_users > MAX_USERS_RANGE.1 {
            errors.push(format!(
                "Member count must be between {} and {}",
                MAX_USERS_RANGE.0, MAX_USERS_RANGE.1
            ));
        }

        if self.is_encrypted {
            let password = self.password.as_deref().unwrap_or("").trim();
            let len = password.chars().count();
            if len == 0 {
                errors.push("Password is required".to_string());
            } else if len < ROOM_PASSWORD_LENGTH.0 || len > ROOM_PASSWORD_LENGTH.1 {
                errors.push(format!(
                    "Password must be between {} and {} characters",
                    ROOM_PASSWORD_LENGTH.0, ROOM_PASSWORD_LENGTH.1
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// A room as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomSummary {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub current_users: u32,
    #[serde(default)]
    pub max_users: u32,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub is_permanent: bool,
}

#[derive(Debug, Deserialize)]
struct NameValidation {
    #[serde(default)]
    error: Option<String>,
}

type Endpoint<A, T> = Box<dyn Fn(A, RequestOptions) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Client for the chat-room endpoints
pub struct RoomsClient {
    create: AuthenticatedCall<Endpoint<ChatRoomDraft, ()>>,
    list: AuthenticatedCall<Endpoint<(), Vec<ChatRoomSummary>>>,
    validate_name: AuthenticatedCall<Endpoint<String, Option<String>>>,
}

impl RoomsClient {
    pub fn new(config: &Config, invoker: &AuthenticatedInvoker) -> Result<Self> {
        let http = Client::new();
        let rooms_url = config.endpoint(ROOMS_PATH)?;
        let name_url = config.endpoint(ROOM_NAME_VALIDATION_PATH)?;

        let create: Endpoint<ChatRoomDraft, ()> = {
            let http = http.clone();
            let url = rooms_url.clone();
            Box::new(move |draft: ChatRoomDraft, options: RequestOptions| {
                send_empty(options.apply(http.post(url.clone()).json(&draft))).boxed()
            })
        };

        let list: Endpoint<(), Vec<ChatRoomSummary>> = {
            let http = http.clone();
            Box::new(move |_: (), options: RequestOptions| {
                send_json::<Vec<ChatRoomSummary>>(options.apply(http.get(rooms_url.clone()))).boxed()
            })
        };

        let validate_name: Endpoint<String, Option<String>> =
            Box::new(move |name: String, options: RequestOptions| {
                let request = options.apply(http.get(name_url.clone()).query(&[("name", name)]));
                async move {
                    let result: NameValidation = send_json(request).await?;
                    Ok::<_, Error>(result.error.filter(|e| !e.is_empty()))
                }
                .boxed()
            });

        Ok(Self {
            create: invoker.wrap(create),
            list: invoker.wrap(list),
            validate_name: invoker.wrap(validate_name),
        })
    }

    /// Validate locally, then submit the room
    pub async fn create_room(&self, draft: &ChatRoomDraft) -> Result<()> {
        draft.validate()?;
        tracing::debug!("Creating room {}", draft.name);
        self.create.call(draft.clone(), None).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<ChatRoomSummary>> {
        self.list.call((), None).await
    }

    /// Ask the server whether `name` is available; `Some` carries its objection
    /// Check a room name locally, then ask the server whether it is taken
    pub async fn validate_room_name(&self, name: &str) -> Result<Option<String>> {
        if let Some(objection) = room_name_objection(name) {
            return Ok(Some(objection));
        }
        self.validate_name.call(name.trim().to_string(), None).await
    }
}

fn room_name_objection(name: &str) -> Option<String> {
    let len = name.trim().chars().count();
    if len == 0 {
        Some("Room name is required".to_string())
    } else if len < ROOM_NAME_LENGTH.0 || len > ROOM_NAME_LENGTH.1 {
        Some(format!(
            "Room name must be between {} and {} characters",
            ROOM_NAME_LENGTH.0, ROOM_NAME_LENGTH.1
        ))
    } else {
        None
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::from_status(status, message))
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = check_status(request.send().await?).await?;
    Ok(response.json().await?)
}

async fn send_empty(request: RequestBuilder) -> Result<()> {
    check_status(request.send().await?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, CredentialStore, HeadlessNavigator};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> String {
        let payload = json!({
            "exp": chrono::Utc::now().timestamp() + 3600,
            "role": 1,
            "unique_name": "carol"
        });
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn client(server: &MockServer) -> (AuthSession, RoomsClient) {
        let config = Config {
            server_url: server.uri(),
            ..Config::default()
        };
        let session = AuthSession::with_store(
            &config,
            Arc::new(CredentialStore::in_memory(true)),
            Arc::new(HeadlessNavigator::new()),
        )
        .unwrap();
        let rooms = RoomsClient::new(&config, session.invoker()).unwrap();
        (session, rooms)
    }

    #[test]
    fn test_valid_draft() {
        let mut draft = ChatRoomDraft::new("Lobby", 10);
        assert!(draft.validate().is_ok());

        draft.is_encrypted = true;
        draft.password = Some("secret1".to_string());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_invalid_draft_collects_all_errors() {
        let mut draft = ChatRoomDraft::new("x", 1);
        draft.is_encrypted = true;

        match draft.validate() {
            Err(Error::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_name_length_counts_characters() {
        assert!(ChatRoomDraft::new("聊天", 2).validate().is_ok());
        assert!(ChatRoomDraft::new("  ", 2).validate().is_err());
        assert!(ChatRoomDraft::new("a".repeat(21), 2).validate().is_err());
    }

    #[test]
    fn test_password_ignored_when_not_encrypted() {
        let mut draft = ChatRoomDraft::new("Lobby", 1000);
        draft.password = Some("123".to_string());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_serializes_camel_case() {
        let value = serde_json::to_value(ChatRoomDraft::new("Lobby", 5)).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Lobby",
                "maxUsers": 5,
                "isEncrypted": false,
                "isPermanent": false,
                "isHidden": false
            })
        );
    }

    #[tokio::test]
    async fn test_create_room_sends_bearer() {
        let server = MockServer::start().await;
        let (session, rooms) = client(&server);
        let access = token();
        session.sign_in(&access, "refresh", true).unwrap();

        Mock::given(method("POST"))
            .and(path("/api/chat-rooms"))
            .and(header("authorization", format!("Bearer {}", access).as_str()))
            .and(body_json(json!({
                "name": "Lobby",
                "maxUsers": 8,
                "isEncrypted": false,
                "isPermanent": false,
                "isHidden": false
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        rooms.create_room(&ChatRoomDraft::new("Lobby", 8)).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_room_rejects_invalid_draft_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        let (_session, rooms) = client(&server);

        let result = rooms.create_room(&ChatRoomDraft::new("", 8)).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_rooms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat-rooms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "name": "Lobby", "currentUsers": 3, "maxUsers": 10},
                {"id": "2", "name": "Garden", "isEncrypted": true}
            ])))
            .mount(&server)
            .await;
        let (_session, rooms) = client(&server);

        let listed = rooms.list_rooms().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].current_users, 3);
        assert!(listed[1].is_encrypted);
    }

    #[tokio::test]
    async fn test_unauthorized_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("login first"))
            .mount(&server)
            .await;
        let (_session, rooms) = client(&server);

        assert!(matches!(rooms.list_rooms().await, Err(Error::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_validate_room_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat-rooms/room-name-validation"))
            .and(query_param("name", "Lobby"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Room name is taken"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/chat-rooms/room-name-validation"))
            .and(query_param("name", "Fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": ""})))
            .mount(&server)
            .await;
        let (_session, rooms) = client(&server);

        assert_eq!(
            rooms.validate_room_name(" Lobby ").await.unwrap().as_deref(),
            Some("Room name is taken")
        );
        assert_eq!(rooms.validate_room_name("Fresh").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_short_room_name_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": ""})))
            .expect(0)
            .mount(&server)
            .await;
        let (_session, rooms) = client(&server);

        assert_eq!(
            rooms.validate_room_name("  ").await.unwrap().as_deref(),
            Some("Room name is required")
        );
        assert!(rooms.validate_room_name("x").await.unwrap().is_some());
    }
}
