use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

pub use reqwest::Method;

/// Request is one round trip to the remote store, relative to its base URL
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of a query parameter, if set
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response keeps the raw transport metadata of one round trip
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub body: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Store specific error number (`errorNum`) of a failed call
    pub fn error_num(&self) -> Option<u32> {
        self.body
            .get("errorNum")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn message(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            body => body
                .get("errorMessage")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Turn a non-success status into `Error::RemoteStore`
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        tracing::warn!(status = self.status, url = %self.url, "Remote store returned an error");
        Err(Error::RemoteStore {
            status: self.status,
            error_num: self.error_num(),
            message: self.message(),
        })
    }
}

/// Transport carries requests to the remote store
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// reqwest backed transport speaking JSON over HTTP(S)
pub struct HttpTransport {
    base_url: String,
    client: HttpClient,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let mut builder =
            HttpClient::builder().timeout(Duration::from_secs(config.timeout_secs));

        if config.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            base_url: config.url(),
            client: builder.build()?,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .query(&request.query);

        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(e) if (200..300).contains(&status) => {
                    return Err(Error::InvalidResponse(format!(
                        "can't parse reply from {}: {}",
                        url, e
                    )));
                }
                // keep the raw text so the error message survives
                Err(_) => Value::String(text),
            }
        };

        tracing::debug!(status, url = %url, "Received response");
        Ok(Response { status, url, body })
    }
}
