use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use session_stress_core::prelude::{
    OperationalState, SessionId, SessionService, SessionStatus, UserId,
};
use session_stress_instruments::{report_operation, OperationRecord, Reporter};
use url::Url;

use crate::error::KasmApiError;
use crate::models::{
    ApiRequest, Empty, ErrorBody, ExecCommandRequest, ExecConfig, GetImagesResponse,
    GetUserRequest, GetUserResponse, Image, KasmRef, KasmStatusResponse, RequestKasmRequest,
    RequestKasmResponse, TargetUser,
};

/// Connection settings for [KasmClientInstrumented].
#[derive(Debug, Clone)]
pub struct KasmClientConfig {
    /// Base URL of the developer API, for example `https://kasm.example.com/api/public`.
    pub api_host: String,
    pub api_key: String,
    pub api_secret: String,
    /// Applied to every HTTP request.
    pub timeout: Duration,
    pub destroy_attempts: u32,
    /// Delay before the first destroy retry. Doubles after every failed attempt.
    pub destroy_backoff: Duration,
}

impl KasmClientConfig {
    pub fn new(
        api_host: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout: Duration::from_secs(30),
            destroy_attempts: 3,
            destroy_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_destroy_backoff(mut self, destroy_backoff: Duration) -> Self {
        self.destroy_backoff = destroy_backoff;
        self
    }
}

/// A client for the Kasm developer API that times every call with the [Reporter].
pub struct KasmClientInstrumented {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
    destroy_attempts: u32,
    destroy_backoff: Duration,
    reporter: Arc<Reporter>,
}

impl KasmClientInstrumented {
    pub fn new(config: KasmClientConfig, reporter: Arc<Reporter>) -> Result<Self, KasmApiError> {
        // Endpoints are joined onto the host, which only keeps the last path segment if the
        // base ends with a slash.
        let host = format!("{}/", config.api_host.trim_end_matches('/'));
        let base_url = Url::parse(&host).map_err(|source| KasmApiError::InvalidHost {
            host: config.api_host.clone(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(KasmApiError::Client)?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            api_secret: config.api_secret,
            destroy_attempts: config.destroy_attempts.max(1),
            destroy_backoff: config.destroy_backoff,
            reporter,
        })
    }

    pub async fn get_user(&self, username: &str) -> Result<UserId, KasmApiError> {
        const ENDPOINT: &str = "get_user";
        self.instrumented(ENDPOINT, async {
            let body = self
                .post(
                    ENDPOINT,
                    GetUserRequest {
                        target_user: TargetUser { username },
                    },
                )
                .await?;
            let response: GetUserResponse = decode(ENDPOINT, &body)?;

            match response.user {
                Some(user) if !user.user_id.is_empty() => Ok(UserId(user.user_id)),
                _ => Err(KasmApiError::MissingField {
                    endpoint: ENDPOINT.to_string(),
                    field: "user.user_id",
                }),
            }
        })
        .await
    }

    /// Request a new session. The id is passed through as given, including when it is empty.
    pub async fn request_kasm(
        &self,
        user_id: &UserId,
        image_id: &str,
    ) -> Result<Option<SessionId>, KasmApiError> {
        const ENDPOINT: &str = "request_kasm";
        self.instrumented(ENDPOINT, async {
            let body = self
                .post(
                    ENDPOINT,
                    RequestKasmRequest {
                        user_id: &user_id.0,
                        image_id,
                        enable_sharing: false,
                    },
                )
                .await?;
            let response: RequestKasmResponse = decode(ENDPOINT, &body)?;
            Ok(response.kasm_id.map(SessionId))
        })
        .await
    }

    pub async fn get_kasm_status(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<SessionStatus, KasmApiError> {
        const ENDPOINT: &str = "get_kasm_status";
        self.instrumented(ENDPOINT, async {
            let body = self
                .post(
                    ENDPOINT,
                    KasmRef {
                        user_id: &user_id.0,
                        kasm_id: &session_id.0,
                    },
                )
                .await;

            let response: KasmStatusResponse = match body.and_then(|body| decode(ENDPOINT, &body))
            {
                Ok(response) => response,
                Err(e) if e.is_currently_requested() => {
                    return Ok(SessionStatus::new(OperationalState::Requested));
                }
                Err(e) => return Err(e),
            };

            let kasm = response.kasm.ok_or_else(|| KasmApiError::MissingField {
                endpoint: ENDPOINT.to_string(),
                field: "kasm",
            })?;

            let mut status =
                SessionStatus::new(OperationalState::from_service(&kasm.operational_status));
            status.progress = kasm
                .operational_progress
                .map(|p| p.clamp(0.0, 100.0).round() as u8);
            status.message = kasm.operational_message.filter(|m| !m.is_empty());
            Ok(status)
        })
        .await
    }

    pub async fn exec_command_kasm(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        command: &str,
    ) -> Result<(), KasmApiError> {
        const ENDPOINT: &str = "exec_command_kasm";
        self.instrumented(ENDPOINT, async {
            let body = self
                .post(
                    ENDPOINT,
                    ExecCommandRequest {
                        user_id: &user_id.0,
                        kasm_id: &session_id.0,
                        exec_config: ExecConfig { cmd: command },
                    },
                )
                .await?;
            check_error_message(ENDPOINT, &body)
        })
        .await
    }

    /// Destroy a session, retrying with exponential backoff if the request does not reach the
    /// service or the service fails to respond. An error reported by the service is not retried.
    pub async fn destroy_kasm(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), KasmApiError> {
        let mut backoff = self.destroy_backoff;
        let mut attempt = 1;
        loop {
            match self.destroy_once(session_id, user_id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.destroy_attempts => {
                    log::error!(
                        "Attempt {attempt} to destroy session {session_id} failed: {e}. Retrying in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(KasmApiError::DestroyAttemptsExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn destroy_once(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), KasmApiError> {
        const ENDPOINT: &str = "destroy_kasm";
        self.instrumented(ENDPOINT, async {
            let body = self
                .post(
                    ENDPOINT,
                    KasmRef {
                        user_id: &user_id.0,
                        kasm_id: &session_id.0,
                    },
                )
                .await?;

            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed == "{}" {
                return Ok(());
            }
            check_error_message(ENDPOINT, trimmed)?;
            Err(KasmApiError::UnexpectedResponse {
                endpoint: ENDPOINT.to_string(),
                body: trimmed.to_string(),
            })
        })
        .await
    }

    /// The images visible to the API key.
    pub async fn get_images(&self) -> Result<Vec<Image>, KasmApiError> {
        const ENDPOINT: &str = "get_images";
        self.instrumented(ENDPOINT, async {
            let body = self.post(ENDPOINT, Empty {}).await?;
            let response: GetImagesResponse = decode(ENDPOINT, &body)?;
            Ok(response.images)
        })
        .await
    }

    /// POST the payload with the API credentials and return the body of a 200 response.
    async fn post<P: Serialize>(&self, endpoint: &str, payload: P) -> Result<String, KasmApiError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|source| KasmApiError::InvalidHost {
                host: self.base_url.to_string(),
                source,
            })?;
        log::debug!("POST {url}");

        let request = ApiRequest {
            api_key: &self.api_key,
            api_key_secret: &self.api_secret,
            payload,
        };
        let http_err = |source| KasmApiError::Http {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(http_err)?;
        let status = response.status();
        let body = response.text().await.map_err(http_err)?;

        if status != reqwest::StatusCode::OK {
            return Err(KasmApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    async fn instrumented<T>(
        &self,
        endpoint: &str,
        fut: impl Future<Output = Result<T, KasmApiError>>,
    ) -> Result<T, KasmApiError> {
        let operation_record = OperationRecord::new(format!("kasm_{endpoint}"));
        let result = fut.await;
        report_operation(&self.reporter, operation_record, &result);
        result
    }
}

fn check_error_message(endpoint: &str, body: &str) -> Result<(), KasmApiError> {
    if body.trim().is_empty() {
        return Ok(());
    }
    let error_body: ErrorBody =
        serde_json::from_str(body).map_err(|source| KasmApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;

    match error_body.error_message {
        Some(message) if !message.is_empty() => Err(KasmApiError::Api {
            endpoint: endpoint.to_string(),
            message,
        }),
        _ => Ok(()),
    }
}

/// Decode a 200 response, which may still carry an `error_message` instead of a result.
fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, KasmApiError> {
    check_error_message(endpoint, body)?;
    serde_json::from_str(body).map_err(|source| KasmApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[async_trait]
impl SessionService for KasmClientInstrumented {
    async fn lookup_user(&self, username: &str) -> anyhow::Result<UserId> {
        Ok(self.get_user(username).await?)
    }

    async fn create_session(
        &self,
        user_id: &UserId,
        image_id: &str,
    ) -> anyhow::Result<Option<SessionId>> {
        Ok(self.request_kasm(user_id, image_id).await?)
    }

    async fn poll_status(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> anyhow::Result<SessionStatus> {
        Ok(self.get_kasm_status(session_id, user_id).await?)
    }

    async fn exec_command(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        command: &str,
    ) -> anyhow::Result<()> {
        Ok(self.exec_command_kasm(session_id, user_id, command).await?)
    }

    async fn destroy(&self, session_id: &SessionId, user_id: &UserId) -> anyhow::Result<()> {
        Ok(self.destroy_kasm(session_id, user_id).await?)
    }
}
