use crate::utils::types::{de_id, de_opt_id};
use crate::utils::{ClientError, ExtraData, OutputNumber, Role, SearchRecord};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5591";
const LOGIN_PATH: &str = "/auth/login";
const SECOND_OUTPUT_SUFFIX: &str = "_second";

/// Key for the processing-status resource of one output of the active chat.
pub fn poll_key(chat_id: &str, output: OutputNumber) -> String {
    match output {
        OutputNumber::First => chat_id.to_string(),
        OutputNumber::Second => format!("{}{}", chat_id, SECOND_OUTPUT_SUFFIX),
    }
}

// ============================================================================
// API Types - Request
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub user_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct PreferRequest {
    preferred_output: u8,
}

// ============================================================================
// API Types - Chat
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct StartChatResponse {
    #[serde(deserialize_with = "de_id")]
    chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserMessageDump {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantMessageDump {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub output_number: Option<u8>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub search_output: Option<String>,
    #[serde(default)]
    pub critic_score: Option<f64>,
    #[serde(default)]
    pub is_updating: bool,
}

impl AssistantMessageDump {
    pub fn output(&self, fallback: OutputNumber) -> OutputNumber {
        self.output_number
            .and_then(OutputNumber::from_u8)
            .unwrap_or(fallback)
    }
}

/// One user turn with its assistant output(s). Returned by `POST /assistant/chat`
/// and embedded in stored transcripts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub user_message: Option<UserMessageDump>,
    #[serde(default)]
    pub assistant_message: Option<AssistantMessageDump>,
    #[serde(default)]
    pub assistant_message2: Option<AssistantMessageDump>,
    #[serde(default)]
    pub preferred_assistant: Option<u8>,
}

impl ChatReply {
    pub fn preferred_output(&self) -> Option<OutputNumber> {
        self.preferred_assistant.and_then(OutputNumber::from_u8)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatTranscript {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub allow_second_assistant: bool,
    #[serde(default)]
    pub messages: Vec<ChatReply>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreEntry {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub critic_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoresResponse {
    #[serde(default)]
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SecondAssistantResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    allow_second_assistant: Option<bool>,
}

// ============================================================================
// API Types - Processing Status
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Processing,
    Completed,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Snapshot of the server's background work on one assistant output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessingStatus {
    pub status: ProcessingState,
    pub step: Option<String>,
    pub progress: Option<f64>,
    pub completed: bool,
    pub final_response: Option<String>,
    pub assistant_response: Option<String>,
    pub error: Option<String>,
    pub regenerated_response: Option<String>,
    pub regenerated_critic: Option<Value>,
    pub ner_result: Option<Value>,
    pub search_call_result: Option<Value>,
    pub search_result: Option<SearchRecord>,
    pub thinking: Option<String>,
    pub critic_result: Option<Value>,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        self.completed || self.status == ProcessingState::Error
    }

    pub fn is_error(&self) -> bool {
        self.status == ProcessingState::Error
    }

    pub fn extra_data(&self) -> ExtraData {
        ExtraData {
            ner_result: self.ner_result.clone(),
            search_call_result: self.search_call_result.clone(),
            search_result: self.search_result.clone(),
            thinking: self.thinking.clone(),
            critic_result: self.critic_result.clone(),
            regenerated_content: self.regenerated_response.clone(),
            regenerated_critic: self.regenerated_critic.clone(),
        }
    }
}

// ============================================================================
// API Types - Simulation
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Paused,
    Stopped,
    Killed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
struct RunStatusResponse {
    #[serde(default)]
    status: RunStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypingStatus {
    pub user_typing: bool,
    pub assistant_typing: bool,
    pub creating_persona: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

/// `/simulation/messages` answers either a bare array or `{messages: [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SimulationMessages {
    List(Vec<SimulationMessage>),
    Wrapped {
        #[serde(default)]
        messages: Vec<SimulationMessage>,
    },
}

impl SimulationMessages {
    fn into_vec(self) -> Vec<SimulationMessage> {
        match self {
            SimulationMessages::List(messages) => messages,
            SimulationMessages::Wrapped { messages } => messages,
        }
    }
}

/// Body of the `/start`, `/continue` and `/stop` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleResponse {
    pub success: Option<String>,
    pub info: Option<String>,
    pub message: Option<String>,
}

impl LifecycleResponse {
    pub fn text_or(&self, fallback: &str) -> String {
        self.success
            .as_deref()
            .or(self.message.as_deref())
            .or(self.info.as_deref())
            .unwrap_or(fallback)
            .to_string()
    }

    /// `/start` reports an already-running simulation through `info`.
    pub fn is_info(&self) -> bool {
        self.info.is_some() && self.success.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CriticScoreResponse {
    #[serde(default)]
    score: Option<Value>,
}

// ============================================================================
// Backend traits
// ============================================================================

/// The subset of the chat API the background pollers depend on.
pub trait ChatBackend: Send + Sync + 'static {
    fn fetch_status(&self, key: String) -> BoxFuture<'_, Result<ProcessingStatus, ClientError>>;
    fn fetch_scores(&self, chat_id: String) -> BoxFuture<'_, Result<Vec<ScoreEntry>, ClientError>>;
}

pub trait SimulationBackend: Send + Sync + 'static {
    fn running_status(&self) -> BoxFuture<'_, Result<RunStatus, ClientError>>;
    fn messages(&self) -> BoxFuture<'_, Result<Vec<SimulationMessage>, ClientError>>;
    fn typing(&self) -> BoxFuture<'_, Result<TypingStatus, ClientError>>;
    fn critic_score(&self) -> BoxFuture<'_, Result<Option<f64>, ClientError>>;
}

// ============================================================================
// Assistant Client
// ============================================================================

#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: Arc<String>,
}

impl PartialEq for AssistantClient {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url
    }
}

impl AssistantClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ClientError::Transport {
                url: base_url.to_string(),
                detail: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: Arc::new(base_url.trim_end_matches('/').to_string()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        read_json(&url, response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        read_json(&url, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        read_json(&url, response).await
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Logs in with the form endpoint. The server redirects away from the login
    /// page on success and re-renders it on bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let url = self.url(LOGIN_PATH);
        let response = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| transport(&url, e))?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                message: "Login failed".to_string(),
            });
        }
        if lands_on_login(&response) {
            warn!(username, "login rejected");
            return Err(ClientError::Api {
                status: 401,
                message: "Invalid credentials".to_string(),
            });
        }

        info!(username, "logged in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let url = self.url("/auth/logout");
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        info!("logged out");
        Ok(())
    }

    // ========================================================================
    // Chat
    // ========================================================================

    pub async fn start_chat(&self) -> Result<String, ClientError> {
        let response: StartChatResponse = self.post("/assistant/chat/start").await?;
        info!(chat_id = %response.chat_id, "chat started");
        Ok(response.chat_id)
    }

    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        debug!(
            chat_id = ?request.chat_id,
            input_len = request.user_input.len(),
            "sending user turn"
        );
        self.post_json("/assistant/chat", request).await
    }

    pub async fn prefer_output(
        &self,
        chat_id: &str,
        parent_id: &str,
        output: OutputNumber,
    ) -> Result<(), ClientError> {
        let path = format!("/assistant/chat/{}/message/{}/prefer", chat_id, parent_id);
        let body = PreferRequest {
            preferred_output: output.as_u8(),
        };
        let response: SuccessResponse = self.post_json(&path, &body).await?;
        if !response.success {
            return Err(ClientError::Api {
                status: 200,
                message: "Preference was not recorded".to_string(),
            });
        }
        Ok(())
    }

    pub async fn fetch_scores(&self, chat_id: &str) -> Result<Vec<ScoreEntry>, ClientError> {
        let path = format!("/assistant/chat/score/{}", chat_id);
        let response: ScoresResponse = self.post(&path).await?;
        Ok(response.scores)
    }

    pub async fn fetch_status(&self, key: &str) -> Result<ProcessingStatus, ClientError> {
        self.get(&format!("/assistant/chat/processing/{}", key)).await
    }

    /// Returns the server's view of the flag after the change.
    pub async fn set_second_assistant(
        &self,
        chat_id: &str,
        enable: bool,
    ) -> Result<bool, ClientError> {
        let action = if enable { "enable" } else { "disable" };
        let path = format!("/assistant/chat/{}_second_assistant/{}", action, chat_id);
        let response: SecondAssistantResponse = self.post(&path).await?;
        if !response.success {
            return Err(ClientError::Api {
                status: 200,
                message: format!("Failed to {} second assistant", action),
            });
        }
        Ok(response.allow_second_assistant.unwrap_or(enable))
    }

    pub async fn fetch_transcript(&self, chat_id: &str) -> Result<ChatTranscript, ClientError> {
        self.get(&format!("/assistant/chat/{}", chat_id)).await
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    pub async fn start_simulation(&self) -> Result<LifecycleResponse, ClientError> {
        self.get("/start").await
    }

    pub async fn continue_simulation(&self) -> Result<LifecycleResponse, ClientError> {
        self.get("/continue").await
    }

    pub async fn stop_simulation(&self) -> Result<LifecycleResponse, ClientError> {
        self.get("/stop").await
    }

    pub async fn simulation_status(&self) -> Result<RunStatus, ClientError> {
        let response: RunStatusResponse = self.get("/simulation/status/running").await?;
        Ok(response.status)
    }

    pub async fn simulation_messages(&self) -> Result<Vec<SimulationMessage>, ClientError> {
        let response: SimulationMessages = self.get("/simulation/messages").await?;
        Ok(response.into_vec())
    }

    pub async fn simulation_typing(&self) -> Result<TypingStatus, ClientError> {
        self.get("/simulation/status/typing").await
    }

    pub async fn simulation_critic(&self) -> Result<Option<f64>, ClientError> {
        let response: CriticScoreResponse = self.get("/critic").await?;
        Ok(response.score.as_ref().and_then(score_value))
    }
}

impl ChatBackend for AssistantClient {
    fn fetch_status(&self, key: String) -> BoxFuture<'_, Result<ProcessingStatus, ClientError>> {
        async move { AssistantClient::fetch_status(self, &key).await }.boxed()
    }

    fn fetch_scores(&self, chat_id: String) -> BoxFuture<'_, Result<Vec<ScoreEntry>, ClientError>> {
        async move { AssistantClient::fetch_scores(self, &chat_id).await }.boxed()
    }
}

impl SimulationBackend for AssistantClient {
    fn running_status(&self) -> BoxFuture<'_, Result<RunStatus, ClientError>> {
        self.simulation_status().boxed()
    }

    fn messages(&self) -> BoxFuture<'_, Result<Vec<SimulationMessage>, ClientError>> {
        self.simulation_messages().boxed()
    }

    fn typing(&self) -> BoxFuture<'_, Result<TypingStatus, ClientError>> {
        self.simulation_typing().boxed()
    }

    fn critic_score(&self) -> BoxFuture<'_, Result<Option<f64>, ClientError>> {
        self.simulation_critic().boxed()
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn transport(url: &str, error: reqwest::Error) -> ClientError {
    warn!(url, error = %error, "request failed");
    ClientError::Transport {
        url: url.to_string(),
        detail: error.to_string(),
    }
}

fn lands_on_login(response: &Response) -> bool {
    response.url().path().starts_with(LOGIN_PATH)
}

async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
    if lands_on_login(&response) || response.status().as_u16() == 401 {
        return Err(ClientError::Unauthorized);
    }

    let status = response.status();
    let body = response.text().await.map_err(|e| transport(url, e))?;

    decode_body(status.as_u16(), status.is_success(), &body)
}

/// Maps a response body to `T`, turning `{"error": ...}` bodies and non-2xx
/// statuses into `ClientError::Api`.
fn decode_body<T: DeserializeOwned>(
    status: u16,
    success: bool,
    body: &str,
) -> Result<T, ClientError> {
    let value: Option<Value> = serde_json::from_str(body).ok();

    if let Some(message) = value.as_ref().and_then(error_message) {
        return Err(ClientError::Api { status, message });
    }
    if !success {
        let message = value
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(ClientError::Api { status, message });
    }

    let value = value.ok_or_else(|| {
        ClientError::parse("response body", format!("not JSON (len={})", body.len()))
    })?;
    serde_json::from_value(value).map_err(|e| ClientError::parse("response body", e))
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_chat_request_omits_missing_chat_id() {
        let first = ChatRequest {
            user_input: "hello".to_string(),
            chat_id: None,
        };
        assert_eq!(serde_json::to_value(&first).unwrap(), json!({"user_input": "hello"}));

        let next = ChatRequest {
            user_input: "again".to_string(),
            chat_id: Some("c1".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&next).unwrap(),
            json!({"user_input": "again", "chat_id": "c1"})
        );
    }

    #[test]
    fn test_poll_key_suffix() {
        assert_eq!(poll_key("abc", OutputNumber::First), "abc");
        assert_eq!(poll_key("abc", OutputNumber::Second), "abc_second");
    }

    #[test]
    fn test_decode_chat_reply() {
        let body = r#"{
            "id": "m1",
            "chat_id": "c1",
            "preferred_assistant": null,
            "user_message": {"id": "u1", "message_id": "m1", "content": "Hi", "role": "user"},
            "assistant_message": {"id": "a1", "message_id": "m1", "output_number": 1,
                "role": "assistant", "content": "Hello", "search_output": null,
                "critic_score": null, "is_updating": true},
            "assistant_message2": null
        }"#;
        let reply: ChatReply = decode_body(200, true, body).unwrap();
        assert_eq!(reply.chat_id.as_deref(), Some("c1"));
        assert_eq!(reply.user_message.unwrap().content, "Hi");
        let assistant = reply.assistant_message.unwrap();
        assert_eq!(assistant.output(OutputNumber::Second), OutputNumber::First);
        assert!(assistant.is_updating);
        assert!(reply.assistant_message2.is_none());
    }

    #[test]
    fn test_error_field_becomes_api_error() {
        let err = decode_body::<ChatReply>(400, false, r#"{"error": "No message provided"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 400,
                message: "No message provided".to_string()
            }
        );

        // An error field in a 200 body is still an application error.
        let err = decode_body::<ScoresResponse>(200, true, r#"{"error": {"message": "boom"}}"#)
            .unwrap_err();
        assert_eq!(err.user_message(), "boom");
    }

    #[test]
    fn test_non_json_body_is_parse_error() {
        let err = decode_body::<ScoresResponse>(200, true, "<html>").unwrap_err();
        assert!(matches!(err, ClientError::Parse { .. }));

        let err = decode_body::<ScoresResponse>(502, false, "<html>").unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 502,
                message: "HTTP 502".to_string()
            }
        );
    }

    #[test]
    fn test_processing_status_defaults_and_terminal() {
        let status: ProcessingStatus =
            serde_json::from_str(r#"{"status": "processing", "step": "extracting_ner", "progress": 10}"#)
                .unwrap();
        assert_eq!(status.status, ProcessingState::Processing);
        assert!(!status.is_terminal());

        let status: ProcessingStatus =
            serde_json::from_str(r#"{"status": "all_completed", "completed": true}"#).unwrap();
        assert_eq!(status.status, ProcessingState::Unknown);
        assert!(status.is_terminal());

        let status: ProcessingStatus =
            serde_json::from_str(r#"{"status": "error", "error": "boom"}"#).unwrap();
        assert!(status.is_terminal());
        assert!(status.is_error());
    }

    #[test]
    fn test_simulation_messages_both_shapes() {
        let bare: SimulationMessages =
            serde_json::from_str(r#"[{"role": "user", "content": "hi"}]"#).unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let wrapped: SimulationMessages = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "yo"}]}"#,
        )
        .unwrap();
        let messages = wrapped.into_vec();
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_run_status_unknown_values() {
        let parsed: RunStatusResponse = serde_json::from_str(r#"{"status": "exploded"}"#).unwrap();
        assert_eq!(parsed.status, RunStatus::Unknown);
        let parsed: RunStatusResponse = serde_json::from_str(r#"{"status": "killed"}"#).unwrap();
        assert_eq!(parsed.status, RunStatus::Killed);
    }

    #[test]
    fn test_lifecycle_text_fallbacks() {
        let started: LifecycleResponse =
            serde_json::from_str(r#"{"success": "Simulation started"}"#).unwrap();
        assert_eq!(started.text_or("fallback"), "Simulation started");
        assert!(!started.is_info());

        let already: LifecycleResponse =
            serde_json::from_str(r#"{"info": "Simulation is already running"}"#).unwrap();
        assert!(already.is_info());

        let empty = LifecycleResponse::default();
        assert_eq!(
            empty.text_or("Simulation stopped successfully!"),
            "Simulation stopped successfully!"
        );
    }

    #[test]
    fn test_score_value_accepts_strings() {
        assert_eq!(score_value(&json!(7)), Some(7.0));
        assert_eq!(score_value(&json!("8.5")), Some(8.5));
        assert_eq!(score_value(&json!(null)), None);
    }
}
