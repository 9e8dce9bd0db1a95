//! REST client for the Incident Navigator backend.
//!
//! Every endpoint answers with the envelope `{"error": int, "message": str, "data": ..}`;
//! a non-zero `error` is surfaced as [`ApiError::Rejected`].
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use navigator_logging::{nav_debug, nav_info, nav_warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::Reference;

/// Bearer token shared by every client talking to the same backend.
#[derive(Clone, Default)]
pub struct AuthToken(Arc<RwLock<Option<String>>>);

impl AuthToken {
    pub fn new(token: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(token)))
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.0.write() {
            *guard = Some(token.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.0.write() {
            *guard = None;
        }
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self
            .get()
            .map(|token| navigator_logging::secret_fingerprint(&token));
        f.debug_tuple("AuthToken").field(&shown).finish()
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("Internal server error")]
    Server,
    #[error("Error {code}: {message}")]
    Rejected {
        status: u16,
        code: i64,
        message: String,
    },
    #[error("unexpected response (http {status}): {message}")]
    Decode { status: u16, message: String },
    #[error("response carried no data")]
    MissingData,
}

impl ApiError {
    /// Application error code, `-1` for transport-level failures.
    pub fn code(&self) -> i64 {
        match self {
            ApiError::Rejected { code, .. } => *code,
            ApiError::Server => 500,
            _ => -1,
        }
    }

    /// The server's message for rejections, the full description otherwise.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 401, .. })
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Identity returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Entry of the chat list. Timestamps are milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, alias = "modified_at")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MessageParts {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

/// Stored message status codes.
pub const STATUS_ERROR: i64 = -1;
pub const STATUS_PENDING: i64 = 0;
pub const STATUS_SUCCESS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiMessage {
    /// `"user"` or `"model"`.
    pub source: String,
    #[serde(default = "default_status")]
    pub status: i64,
    #[serde(default)]
    pub parts: MessageParts,
}

impl ApiMessage {
    pub fn is_user(&self) -> bool {
        self.source == "user"
    }
}

fn default_status() -> i64 {
    STATUS_SUCCESS
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatHistory {
    pub chat_id: String,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    token: AuthToken,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, token: AuthToken) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&settings.base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Resolves a path relative to the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidUrl(err.to_string()))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let body = json!({ "email": email, "password": password });
        match self.call::<Session>(Method::POST, "auth/login", &[], Some(body)).await {
            Ok(Some(session)) => {
                nav_info!("Logged in as {} <{}>", session.username, session.email);
                self.token.set(session.token.clone());
                Ok(session)
            }
            Ok(None) => {
                self.token.clear();
                Err(ApiError::MissingData)
            }
            Err(err) => {
                self.token.clear();
                Err(err)
            }
        }
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "email": email, "username": username, "password": password });
        self.call::<Value>(Method::POST, "auth/register", &[], Some(body))
            .await
            .map(|_| ())
    }

    /// Forgets the local token first, then tells the server.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.token.clear();
        self.call::<Value>(Method::POST, "auth/logout", &[], None)
            .await
            .map(|_| ())
    }

    pub async fn current_user(&self) -> Result<UserInfo, ApiError> {
        self.call::<UserInfo>(Method::GET, "auth/@me", &[], None)
            .await?
            .ok_or(ApiError::MissingData)
    }

    /// Exchanges the session for a fresh token. A rejection drops the token.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        match self.call::<TokenData>(Method::POST, "auth/refresh", &[], None).await {
            Ok(Some(data)) => {
                self.token.set(data.token.clone());
                Ok(data.token)
            }
            Ok(None) => Err(ApiError::MissingData),
            Err(err) => {
                if matches!(err, ApiError::Rejected { .. }) {
                    self.token.clear();
                }
                Err(err)
            }
        }
    }

    pub async fn new_chat(&self, name: Option<&str>) -> Result<ChatSummary, ApiError> {
        let body = match name {
            Some(name) => json!({ "name": name }),
            None => json!({}),
        };
        self.call::<ChatSummary>(Method::POST, "chat/new", &[], Some(body))
            .await?
            .ok_or(ApiError::MissingData)
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        Ok(self
            .call::<Vec<ChatSummary>>(Method::GET, "chat/list", &[], None)
            .await?
            .unwrap_or_default())
    }

    pub async fn chat_info(&self, chat_id: &str) -> Result<ChatSummary, ApiError> {
        self.call::<ChatSummary>(Method::GET, "chat/info", &[("id", chat_id)], None)
            .await?
            .ok_or(ApiError::MissingData)
    }

    pub async fn rename_chat(&self, chat_id: &str, name: &str) -> Result<(), ApiError> {
        let body = json!({ "id": chat_id, "name": name });
        self.call::<Value>(Method::PUT, "chat/rename", &[], Some(body))
            .await
            .map(|_| ())
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        let body = json!({ "id": chat_id });
        self.call::<Value>(Method::DELETE, "chat/delete", &[], Some(body))
            .await
            .map(|_| ())
    }

    pub async fn chat_messages(&self, chat_id: &str) -> Result<ChatHistory, ApiError> {
        self.call::<ChatHistory>(Method::GET, "chat/msgs", &[("chat_id", chat_id)], None)
            .await?
            .ok_or(ApiError::MissingData)
    }

    /// Non-streaming send: the server answers once the whole reply exists.
    pub async fn send_message(
        &self,
        chat_id: &str,
        message: &str,
        industries: &[String],
    ) -> Result<ApiMessage, ApiError> {
        let body = json!({ "chat_id": chat_id, "message": message, "industries": industries });
        self.call::<ApiMessage>(Method::POST, "chat/send", &[], Some(body))
            .await?
            .ok_or(ApiError::MissingData)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Option<T>, ApiError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        nav_debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(token) = self.token.get() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            nav_warn!("{} answered 500", path);
            return Err(ApiError::Server);
        }
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
                status: status.as_u16(),
                message: err.to_string(),
            })?;

        if envelope.error != 0 {
            nav_warn!(
                "{} rejected status={} code={} message={}",
                path,
                status.as_u16(),
                envelope.error,
                envelope.message
            );
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                code: envelope.error,
                message: envelope.message,
            });
        }
        Ok(envelope.data)
    }
}

/// Parses the base URL, making sure relative joins keep its whole path.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(raw).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(format!("{raw} cannot be a base url")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(navigator_logging::redact_bearer(&err.to_string()))
}
