//! Typed outcome of every remote call.
//!
//! An [`ApiResult`] is either a success or exactly one of four failure kinds.
//! Nothing that produces one is allowed to panic or return an `Err` instead,
//! so callers handle every path by matching on [`Outcome`] or by calling
//! [`ApiResult::fold`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Status code of an error response, always within `400..=599`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HttpCode(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("http failure code must be within 400..=599, got {0}")]
pub struct InvalidHttpCode(pub u16);

impl HttpCode {
    pub const MIN: u16 = 400;
    pub const MAX: u16 = 599;

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_server_error(self) -> bool {
        self.0 >= 500
    }
}

impl TryFrom<u16> for HttpCode {
    type Error = InvalidHttpCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidHttpCode(value))
        }
    }
}

impl fmt::Display for HttpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connect,
    Other,
}

impl NetworkErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// No response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("network {kind}: {message}")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl NetworkError {
    #[must_use]
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Connect, message)
    }
}

/// Anything that is neither a transport nor a domain failure: decode errors,
/// a panicking producer, a missing precondition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnknownError {
    pub message: String,
}

impl UnknownError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for UnknownError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(format!("decode failed: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Failure<E> {
    Network(NetworkError),
    Http { code: HttpCode, error: Option<E> },
    Api(Option<E>),
    Unknown(UnknownError),
}

impl<E> Failure<E> {
    /// Domain error carried by `Http` and `Api` failures, when one was decoded.
    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Http { error, .. } | Self::Api(error) => error.as_ref(),
            Self::Network(_) | Self::Unknown(_) => None,
        }
    }

    #[must_use]
    pub fn http_code(&self) -> Option<HttpCode> {
        match self {
            Self::Http { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Api(_) => "api",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(err) => write!(f, "{err}"),
            Self::Http {
                code,
                error: Some(error),
            } => write!(f, "http {code}: {error}"),
            Self::Http { code, error: None } => write!(f, "http {code}"),
            Self::Api(Some(error)) => write!(f, "api error: {error}"),
            Self::Api(None) => f.write_str("api error"),
            Self::Unknown(err) => write!(f, "unknown error: {err}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Failure<E> {}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    Success(T),
    Failure(Failure<E>),
}

/// Identifies one piece of metadata attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagKey(&'static str);

impl TagKey {
    pub const ORIGINAL_REQUEST: Self = Self("original_request");
    pub const RAW_RESPONSE: Self = Self("raw_response");

    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// Immutable metadata map. Adding a tag produces a new map.
#[derive(Clone, Default)]
pub struct Tags {
    entries: Arc<HashMap<TagKey, Arc<dyn Any + Send + Sync>>>,
}

impl Tags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<V: Any + Send + Sync>(&self, key: TagKey, value: V) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key, Arc::new(value));
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Entries of `other` win on key collisions.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        for (key, value) in other.entries.iter() {
            entries.insert(*key, Arc::clone(value));
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    #[must_use]
    pub fn get<V: Any>(&self, key: TagKey) -> Option<&V> {
        let value: &(dyn Any + Send + Sync) = self.entries.get(&key)?.as_ref();
        value.downcast_ref::<V>()
    }

    #[must_use]
    pub fn contains(&self, key: TagKey) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.keys().map(|key| key.name()))
            .finish()
    }
}

#[derive(Clone)]
pub struct ApiResult<T, E> {
    outcome: Outcome<T, E>,
    tags: Tags,
}

impl<T, E> ApiResult<T, E> {
    #[must_use]
    pub fn success(value: T) -> Self {
        Self {
            outcome: Outcome::Success(value),
            tags: Tags::default(),
        }
    }

    #[must_use]
    pub fn failure(failure: Failure<E>) -> Self {
        Self {
            outcome: Outcome::Failure(failure),
            tags: Tags::default(),
        }
    }

    /// # Panics
    ///
    /// Panics when `code` is outside `400..=599`. Building an HTTP failure from
    /// a successful or nonsensical status is a bug in the caller.
    #[must_use]
    pub fn http_failure(code: u16, error: Option<E>) -> Self {
        match Self::try_http_failure(code, error) {
            Ok(result) => result,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_http_failure(code: u16, error: Option<E>) -> Result<Self, InvalidHttpCode> {
        let code = HttpCode::try_from(code)?;
        Ok(Self::failure(Failure::Http { code, error }))
    }

    #[must_use]
    pub fn api_failure(error: Option<E>) -> Self {
        Self::failure(Failure::Api(error))
    }

    #[must_use]
    pub fn network_failure(error: NetworkError) -> Self {
        Self::failure(Failure::Network(error))
    }

    #[must_use]
    pub fn unknown_failure(error: impl Into<UnknownError>) -> Self {
        Self::failure(Failure::Unknown(error.into()))
    }

    /// Returns the same outcome carrying `tags` in addition to any tags it
    /// already had.
    #[must_use]
    pub fn with_tags(self, tags: &Tags) -> Self {
        Self {
            tags: self.tags.merged(tags),
            outcome: self.outcome,
        }
    }

    #[must_use]
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome<T, E> {
        &self.outcome
    }

    #[must_use]
    pub fn into_outcome(self) -> Outcome<T, E> {
        self.outcome
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure_ref(&self) -> Option<&Failure<E>> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> Result<T, Failure<E>> {
        match self.outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(failure),
        }
    }

    /// Runs exactly one of the two branches, exactly once.
    pub fn fold<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_failure: impl FnOnce(Failure<E>) -> R,
    ) -> R {
        match self.outcome {
            Outcome::Success(value) => on_success(value),
            Outcome::Failure(failure) => on_failure(failure),
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U, E> {
        let outcome = match self.outcome {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(failure) => Outcome::Failure(failure),
        };
        ApiResult {
            outcome,
            tags: self.tags,
        }
    }
}

impl<T, E> From<Failure<E>> for ApiResult<T, E> {
    fn from(value: Failure<E>) -> Self {
        Self::failure(value)
    }
}

// Tags are metadata and take no part in equality.
impl<T: PartialEq, E: PartialEq> PartialEq for ApiResult<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.outcome == other.outcome
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for ApiResult<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiResult")
            .field("outcome", &self.outcome)
            .field("tags", &self.tags)
            .finish()
    }
}
