use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};

use crate::constants::{API_KEY_HEADER, USER_AGENT};
use crate::error::TransportError;
use crate::fetcher::parse_retry_after;

/// One logical request against the monitoring API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Label used in logs, usually the site id
    pub context: String,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            context: context.into(),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// What came back for one dispatched request
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Server-suggested wait before retrying, if any
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Dispatches a single request. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport backed by reqwest, attaching the API key to every request
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .query(&request.query)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let body = response.text().await.map_err(classify)?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Retryable(err.to_string())
    } else {
        TransportError::Fatal(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! In-memory transport replaying canned replies per path.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum Reply {
        Ok(String),
        Status(StatusCode),
        Throttled(Option<Duration>),
        Network,
    }

    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedTransport {
        pub fn script(self, path: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .extend(replies);
            self
        }

        pub fn calls(&self, path: &str) -> u32 {
            self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(request.path.clone())
                .or_default() += 1;

            let reply = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&request.path)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Reply::Status(StatusCode::NOT_FOUND));

            let (status, retry_after, body) = match reply {
                Reply::Ok(body) => (StatusCode::OK, None, body),
                Reply::Status(status) => (status, None, String::new()),
                Reply::Throttled(hint) => (StatusCode::TOO_MANY_REQUESTS, hint, String::new()),
                Reply::Network => {
                    return Err(TransportError::Retryable("connection reset".into()))
                }
            };
            Ok(ApiResponse {
                status,
                retry_after,
                body,
            })
        }
    }
}
