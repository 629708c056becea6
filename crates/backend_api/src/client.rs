use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{parse_error_message, BackendApiError};
use crate::headers::build_headers;
use crate::payload::{
    ChatRequest, ExistsResponse, LoginRequest, LoginResponse, RefreshResponse, SessionPing,
    VerifyResponse,
};
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::sse::FrameDecoder;
use crate::url::{
    auth_url, chat_url, health_url, session_exists_url, session_heartbeat_url, session_history_url,
};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// HTTP client for one backend service.
///
/// Owns streaming chat, replay history, health probes, session liveness,
/// and the auth endpoint quartet. Auth calls are never auto-retried; only
/// opening the chat stream applies the bounded retry policy.
#[derive(Debug)]
pub struct BackendApiClient {
    http: Client,
    config: BackendConfig,
}

impl BackendApiClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(BackendApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn request_headers(&self, streaming: bool) -> Result<HeaderMap, BackendApiError> {
        let headers = build_headers(&self.config, streaming)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    BackendApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    BackendApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    fn build_chat_request(&self, request: &ChatRequest) -> Result<RequestBuilder, BackendApiError> {
        let headers = self.request_headers(true)?;
        Ok(self
            .http
            .post(chat_url(&self.config.base_url))
            .headers(headers)
            .json(request))
    }

    async fn send_chat_with_retry(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, BackendApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if is_cancelled(cancellation) {
                return Err(BackendApiError::Cancelled);
            }

            let response = self.build_chat_request(request)?.send();
            let response = await_or_cancel(response, cancellation)
                .await?
                .map_err(BackendApiError::from);

            match response {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_else(|_| {
                            status
                                .canonical_reason()
                                .unwrap_or("request failed")
                                .to_string()
                        });
                    let message = parse_error_message(status, &body);

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(BackendApiError::Unauthorized(message));
                    }

                    last_error = Some(message.clone());
                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(BackendApiError::Status(status, message));
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES {
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(BackendApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(BackendApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Open the chat stream and invoke `on_frame` per decoded frame until
    /// the stream closes or the cancellation signal fires. On cancellation
    /// the reader is dropped and already-delivered frames stand as-is.
    pub async fn stream_chat<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_frame: F,
    ) -> Result<(), BackendApiError>
    where
        F: FnMut(Value),
    {
        let response = self.send_chat_with_retry(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut decoder = FrameDecoder::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(BackendApiError::Cancelled);
            }
            let chunk = chunk.map_err(BackendApiError::from)?;
            for frame in decoder.feed(&chunk) {
                on_frame(frame);
            }
        }

        if is_cancelled(cancellation) {
            return Err(BackendApiError::Cancelled);
        }

        Ok(())
    }

    /// Collect the whole stream into a frame vector.
    pub async fn stream_chat_collected(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<Value>, BackendApiError> {
        let mut frames = Vec::new();
        self.stream_chat(request, cancellation, |frame| frames.push(frame))
            .await?;
        Ok(frames)
    }

    /// Fetch the persisted replay log: an ordered array of the same frame
    /// shapes the live stream carries.
    pub async fn fetch_history(&self, session_id: &str) -> Result<Vec<Value>, BackendApiError> {
        let headers = self.request_headers(false)?;
        let response = self
            .http
            .get(session_history_url(&self.config.base_url, session_id))
            .headers(headers)
            .send()
            .await?;

        let response = self.reject_error_status(response).await?;
        let frames = response.json::<Vec<Value>>().await?;
        Ok(frames)
    }

    /// One-shot existence check for a session. A 404 is a definitive "does
    /// not exist", not an error.
    pub async fn session_exists(&self, session_id: &str) -> Result<bool, BackendApiError> {
        let headers = self.request_headers(false)?;
        let response = self
            .http
            .get(session_exists_url(&self.config.base_url, session_id))
            .headers(headers)
            .timeout(self.config.probe_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = self.reject_error_status(response).await?;
        let exists = response.json::<ExistsResponse>().await?;
        Ok(exists.exists)
    }

    /// Extend session liveness. No payload comes back.
    pub async fn ping_session(&self, ping: &SessionPing) -> Result<(), BackendApiError> {
        let headers = self.request_headers(false)?;
        let response = self
            .http
            .post(session_heartbeat_url(&self.config.base_url, &ping.session_id))
            .headers(headers)
            .json(ping)
            .send()
            .await?;

        self.reject_error_status(response).await?;
        Ok(())
    }

    /// Probe backend reachability: 2xx means healthy, any other status
    /// means reachable-but-unhealthy, transport failure propagates.
    pub async fn check_health(&self) -> Result<bool, BackendApiError> {
        let response = self
            .http
            .get(health_url(&self.config.base_url))
            .timeout(self.config.probe_timeout)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// Exchange a password for a bearer token.
    pub async fn login(&self, password: &str) -> Result<String, BackendApiError> {
        let response = self
            .http
            .post(auth_url(&self.config.base_url, "login"))
            .json(&LoginRequest {
                password: password.to_owned(),
            })
            .send()
            .await?;

        let response = self.reject_error_status(response).await?;
        let login = response.json::<LoginResponse>().await?;
        Ok(login.token)
    }

    /// Ask the backend whether a token is still valid. Runs under the short
    /// probe timeout so callers can tell "timed out" from "rejected".
    pub async fn verify(&self, token: &str) -> Result<bool, BackendApiError> {
        let response = self
            .http
            .post(auth_url(&self.config.base_url, "verify"))
            .headers(bearer_headers(token)?)
            .timeout(self.config.probe_timeout)
            .send()
            .await?;

        let response = self.reject_error_status(response).await?;
        let verify = response.json::<VerifyResponse>().await?;
        Ok(verify.valid)
    }

    /// Request a refreshed token. Scheduled by the token store; never
    /// retried here on failure.
    pub async fn refresh(&self, token: &str) -> Result<RefreshResponse, BackendApiError> {
        let response = self
            .http
            .post(auth_url(&self.config.base_url, "refresh"))
            .headers(bearer_headers(token)?)
            .send()
            .await?;

        let response = self.reject_error_status(response).await?;
        let refresh = response.json::<RefreshResponse>().await?;
        Ok(refresh)
    }

    /// Invalidate a token server-side.
    pub async fn logout(&self, token: &str) -> Result<(), BackendApiError> {
        let response = self
            .http
            .post(auth_url(&self.config.base_url, "logout"))
            .headers(bearer_headers(token)?)
            .send()
            .await?;

        self.reject_error_status(response).await?;
        Ok(())
    }

    async fn reject_error_status(&self, response: Response) -> Result<Response, BackendApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = parse_error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            Err(BackendApiError::Unauthorized(message))
        } else {
            Err(BackendApiError::Status(status, message))
        }
    }
}

fn bearer_headers(token: &str) -> Result<HeaderMap, BackendApiError> {
    if token.trim().is_empty() {
        return Err(BackendApiError::MissingToken);
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| BackendApiError::MissingToken)?,
    );
    Ok(headers)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, BackendApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(BackendApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(BackendApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
