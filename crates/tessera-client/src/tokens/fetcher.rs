use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tessera_core::{endpoints, ErrorResponse, Session, TokenResource};
use tracing::{debug, warn};

use super::cache::{cache_key, CacheEntry, TokenCache};
use crate::api::{ApiClient, ResponseShape};
use crate::single_flight::SingleFlight;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, Default)]
pub struct GetTokenOptions {
    pub template: Option<String>,
    /// Ignore the cached token; the fresh one is still cached.
    pub skip_cache: bool,
    /// Overrides the configured expiration buffer.
    pub expiration_buffer: Option<Duration>,
}

impl GetTokenOptions {
    #[must_use]
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Self::default()
        }
    }
}

/// Session tokens: cache first, then one network call per cache key.
#[derive(Clone)]
pub struct TokenFetcher {
    api: ApiClient,
    cache: TokenCache,
    flight: Arc<SingleFlight<String, Arc<TokenResource>, ErrorResponse>>,
    default_buffer: Duration,
    timeout: StdDuration,
}

impl TokenFetcher {
    #[must_use]
    pub fn new(
        api: ApiClient,
        cache: TokenCache,
        default_buffer: Duration,
        timeout: StdDuration,
    ) -> Self {
        Self {
            api,
            cache,
            flight: Arc::new(SingleFlight::new()),
            default_buffer,
            timeout,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// `None` means no token is available right now; callers retry later.
    pub async fn get_token(
        &self,
        session: &Session,
        options: &GetTokenOptions,
    ) -> Option<Arc<TokenResource>> {
        let template = options.template.as_deref();
        let key = cache_key(&session.id, template);
        let buffer = options.expiration_buffer.unwrap_or(self.default_buffer);

        if !options.skip_cache {
            if let Some(entry) = self.cache.get(&key) {
                if entry.is_fresh(Utc::now(), buffer) {
                    debug!(event = "token_cache_hit", key = %key);
                    return Some(entry.token);
                }
            }
        }

        let api = self.api.clone();
        let cache = self.cache.clone();
        let request = ApiRequest::post(endpoints::session_tokens(&session.id, template))
            .with_timeout(self.timeout);
        let cache_slot = key.clone();
        let result = self
            .flight
            .run_exclusive(key.clone(), move || async move {
                api.call::<TokenResource>(request, ResponseShape::Plain)
                    .await
                    .map(|token| {
                        let token = Arc::new(token);
                        cache.put(cache_slot, CacheEntry::from_token(Arc::clone(&token)));
                        token
                    })
            })
            .await;

        match result.into_result() {
            Ok(token) => {
                debug!(event = "token_fetched", key = %key);
                Some(token)
            }
            Err(failure) => {
                warn!(event = "token_fetch_failed", key = %key, error = %failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{response, ScriptedTransport};
    use crate::pipeline::Pipeline;
    use crate::telemetry::TracingTelemetry;

    fn fetcher(transport: Arc<ScriptedTransport>) -> TokenFetcher {
        let api = ApiClient::new(
            Pipeline::builder(transport).build(),
            Arc::new(TracingTelemetry),
            false,
        );
        TokenFetcher::new(
            api,
            TokenCache::new(),
            Duration::seconds(10),
            StdDuration::from_secs(15),
        )
    }

    #[tokio::test]
    async fn requests_use_token_path_and_timeout() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(response(
            200,
            r#"{"jwt":"a.b.c"}"#,
        ))]));
        let fetcher = fetcher(transport.clone());
        let token = fetcher
            .get_token(&Session::new("sess_1"), &GetTokenOptions::template("api"))
            .await
            .expect("token");
        assert_eq!(token.jwt, "a.b.c");

        let sent = transport.sent();
        assert_eq!(sent[0].path, "/sessions/sess_1/tokens/api");
        assert_eq!(sent[0].timeout, Some(StdDuration::from_secs(15)));
        assert!(fetcher.cache().get("sess_1-api").is_some());
    }

    #[tokio::test]
    async fn failure_yields_none_and_caches_nothing() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(response(
            500,
            r#"{"errors":[]}"#,
        ))]));
        let fetcher = fetcher(transport);
        let token = fetcher
            .get_token(&Session::new("sess_1"), &GetTokenOptions::default())
            .await;
        assert!(token.is_none());
        assert!(fetcher.cache().is_empty());
    }
}
