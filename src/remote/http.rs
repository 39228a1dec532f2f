use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;

use super::{RemoteAck, RemoteError, SessionUplink, SpeechPrompt};
use crate::db::models::{PracticeSession, SpeechResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the Parlo backend.
///
/// The bearer token is replaceable at runtime: when a drain surfaces an
/// auth-expired failure, the host runs its re-authentication flow and calls
/// `set_auth_token` before triggering the next drain.
pub struct HttpSessionUplink {
    client: Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionRequest<'a> {
    client_id: &'a str,
    user_id: &'a str,
    mode: &'a str,
    level: &'a str,
    kind: &'a str,
    tag_ids: &'a [String],
    total_speeches: u32,
    correct_count: u32,
    incorrect_count: u32,
    started_at: String,
    completed_at: Option<String>,
    results: &'a [SpeechResult],
}

impl HttpSessionUplink {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build session uplink client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            auth_token: RwLock::new(auth_token),
        })
    }

    pub fn set_auth_token(&self, token: impl Into<String>) {
        let mut guard = match self.auth_token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(token.into());
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let guard = match self.auth_token.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl SessionUplink for HttpSessionUplink {
    async fn push_session(&self, session: &PracticeSession) -> Result<RemoteAck, RemoteError> {
        let payload = UploadSessionRequest {
            client_id: &session.id,
            user_id: &session.user_id,
            mode: &session.mode,
            level: &session.level,
            kind: &session.kind,
            tag_ids: &session.tag_ids,
            total_speeches: session.total_speeches,
            correct_count: session.correct_count,
            incorrect_count: session.incorrect_count,
            started_at: session.started_at.to_rfc3339(),
            completed_at: session.completed_at.map(|dt| dt.to_rfc3339()),
            results: &session.results,
        };

        let url = format!("{}/v1/sessions", self.base_url);
        debug!("Uploading session {} to {url}", session.id);

        let request = self.authorize(self.client.post(&url)).json(&payload);
        let response = request
            .send()
            .await
            .map_err(|err| RemoteError::Transient(err.to_string()))?;

        match classify_status(response.status()) {
            StatusClass::Ok => response
                .json::<RemoteAck>()
                .await
                .map_err(|err| RemoteError::Transient(format!("invalid ack payload: {err}"))),
            StatusClass::AuthExpired => Err(RemoteError::AuthExpired),
            StatusClass::Rejected => {
                let body = response.text().await.unwrap_or_default();
                Err(RemoteError::Rejected(body))
            }
            StatusClass::Transient => Err(RemoteError::Transient(format!(
                "server returned {}",
                response.status()
            ))),
        }
    }

    async fn fetch_speeches(&self, count: u32) -> Result<Vec<SpeechPrompt>, RemoteError> {
        let url = format!("{}/v1/speeches?count={count}", self.base_url);

        let request = self.authorize(self.client.get(&url));
        let response = request
            .send()
            .await
            .map_err(|err| RemoteError::Transient(err.to_string()))?;

        match classify_status(response.status()) {
            StatusClass::Ok => response
                .json::<Vec<SpeechPrompt>>()
                .await
                .map_err(|err| RemoteError::Transient(format!("invalid speech payload: {err}"))),
            StatusClass::AuthExpired => Err(RemoteError::AuthExpired),
            StatusClass::Rejected => {
                let body = response.text().await.unwrap_or_default();
                Err(RemoteError::Rejected(body))
            }
            StatusClass::Transient => Err(RemoteError::Transient(format!(
                "server returned {}",
                response.status()
            ))),
        }
    }
}

enum StatusClass {
    Ok,
    AuthExpired,
    Rejected,
    Transient,
}

fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Ok
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StatusClass::AuthExpired
    } else if status.is_client_error() {
        StatusClass::Rejected
    } else {
        StatusClass::Transient
    }
}
