use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tessera_core::{NetworkError, NetworkErrorKind};
use url::Url;

use crate::config::ConfigError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Form(Vec<(String, String)>),
    /// Pre-encoded body with the caller's own content type, e.g. multipart.
    Raw { content_type: String, bytes: Bytes },
}

/// Owned description of one call. Cloneable so the pipeline can re-issue it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_raw_body(mut self, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Raw {
            content_type: content_type.into(),
            bytes: bytes.into(),
        };
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Response with a fully buffered body. Stages read `body` without consuming
/// it, so it is still intact when the caller decodes it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| {
                let mime = mime.trim().to_ascii_lowercase();
                mime == "application/json" || mime.ends_with("+json")
            })
            .unwrap_or(false)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    default_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: Url, default_timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            default_timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `path` to the base URL, keeping any base path such as `/v1`.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let url = self.url_for(request).map_err(|err| {
            NetworkError::new(NetworkErrorKind::Other, format!("invalid request url: {err}"))
        })?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .timeout(request.timeout.unwrap_or(self.default_timeout));
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                if !request.headers.contains_key(CONTENT_TYPE) {
                    builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                }
                builder.body(encoded)
            }
            RequestBody::Raw {
                content_type,
                bytes,
            } => {
                if !request.headers.contains_key(CONTENT_TYPE) {
                    builder = builder.header(CONTENT_TYPE, content_type.as_str());
                }
                builder.body(bytes.clone())
            }
        };

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(network_error)?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn network_error(err: reqwest::Error) -> NetworkError {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Other
    };
    NetworkError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn url_for_keeps_base_path_and_appends_query() {
        let transport = HttpTransport::new(
            Url::parse("https://auth.tessera.dev/v1/").expect("url"),
            Duration::from_secs(1),
        )
        .expect("transport");
        let request = ApiRequest::get("/client").with_query("_is_native", "1");
        assert_eq!(
            transport.url_for(&request).expect("url").as_str(),
            "https://auth.tessera.dev/v1/client?_is_native=1"
        );
    }

    #[test]
    fn is_json_accepts_parameters_and_suffixes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(ApiResponse::new(StatusCode::OK, headers.clone(), "{}").is_json());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        assert!(ApiResponse::new(StatusCode::OK, headers.clone(), "{}").is_json());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(!ApiResponse::new(StatusCode::OK, headers, "{}").is_json());
        assert!(!ApiResponse::new(StatusCode::OK, HeaderMap::new(), "{}").is_json());
    }
}
