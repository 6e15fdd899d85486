//! Async DeepL client with retry logic

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, ToolError};
use crate::core::models::{AccountUsage, CharacterUsage, TranslationRequest, TranslationResult};
use crate::core::usage_tracker::UsageTracker;

/// DeepL accepts at most this many texts per request
pub const MAX_TEXTS_PER_REQUEST: usize = 50;

#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    text: &'a [String],
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formality: Option<&'static str>,
    preserve_formatting: bool,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    #[serde(default)]
    detected_source_language: Option<String>,
    text: String,
}

/// Async translation client with concurrency limit and retries
#[derive(Debug, Clone)]
pub struct AsyncTranslator {
    client: reqwest::Client,
    config: Arc<TranslatorConfig>,
    semaphore: Arc<Semaphore>,
    usage_tracker: Arc<UsageTracker>,
}

impl AsyncTranslator {
    /// Create a new async translator
    pub fn new(config: TranslatorConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let usage_tracker = Arc::new(UsageTracker::new(config.char_limit));

        Ok(Self {
            client,
            config: Arc::new(config),
            semaphore,
            usage_tracker,
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        let config = TranslatorConfig::from_env()?;
        Self::new(config)
    }

    /// Translate a single request
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let mut results = self
            .translate_texts(std::slice::from_ref(&request.text), request)
            .await?;
        results.pop().ok_or_else(|| ToolError::InvalidResponseError {
            message: "No translation in response".to_string(),
        })
    }

    /// Translate many texts sharing the options of `template`, preserving order
    pub async fn translate_batch(
        &self,
        texts: &[String],
        template: &TranslationRequest,
    ) -> Result<Vec<TranslationResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_TEXTS_PER_REQUEST) {
            results.extend(self.translate_texts(chunk, template).await?);
        }
        Ok(results)
    }

    async fn translate_texts(
        &self,
        texts: &[String],
        template: &TranslationRequest,
    ) -> Result<Vec<TranslationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chars: usize = texts.iter().map(|t| t.chars().count()).sum();
        if !self.usage_tracker.can_use(chars).await {
            return Err(ToolError::QuotaExceededError);
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ToolError::ConfigError {
                message: format!("translator semaphore closed: {}", e),
            })?;

        let results = self.send_with_retry(texts, template).await?;

        if let Err(e) = self.usage_tracker.record(chars).await {
            warn!("Failed to track character usage: {}", e);
        }

        Ok(results)
    }

    async fn send_with_retry(
        &self,
        texts: &[String],
        template: &TranslationRequest,
    ) -> Result<Vec<TranslationResult>> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.config.retry_delay_ms * 2_u64.pow(attempt - 1);
                debug!("Retry attempt {} after {}ms", attempt, delay);
                sleep(Duration::from_millis(delay)).await;
            }

            match self.send_request(texts, template).await {
                Ok(results) => {
                    if attempt > 0 {
                        info!("Successfully translated after {} retries", attempt);
                    }
                    return Ok(results);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    warn!("Translation request failed: {}", e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send actual HTTP request
    async fn send_request(
        &self,
        texts: &[String],
        template: &TranslationRequest,
    ) -> Result<Vec<TranslationResult>> {
        let body = TranslateBody {
            text: texts,
            target_lang: template.target_lang.to_uppercase(),
            source_lang: template.source_lang.as_ref().map(|s| s.to_uppercase()),
            formality: template.formality.as_api_value(),
            preserve_formatting: template.preserve_formatting,
        };

        let response = self
            .client
            .post(self.config.endpoint_url("/v2/translate"))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_response(response).await);
        }

        let parsed: TranslateResponse =
            response
                .json()
                .await
                .map_err(|e| ToolError::InvalidResponseError {
                    message: e.to_string(),
                })?;

        if parsed.translations.len() != texts.len() {
            return Err(ToolError::InvalidResponseError {
                message: format!(
                    "Expected {} translations, got {}",
                    texts.len(),
                    parsed.translations.len()
                ),
            });
        }

        Ok(parsed
            .translations
            .into_iter()
            .zip(texts)
            .map(|(t, source)| TranslationResult {
                translation: t.text,
                detected_source_lang: t.detected_source_language,
                billed_characters: source.chars().count(),
            })
            .collect())
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ToolError {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let error_text = response.text().await.unwrap_or_default();

        match status_code {
            429 => ToolError::RateLimitError { retry_after },
            456 => ToolError::QuotaExceededError,
            _ => ToolError::ApiError {
                status: status_code,
                message: error_text,
            },
        }
    }

    /// Query account usage
    pub async fn usage(&self) -> Result<AccountUsage> {
        let response = self
            .client
            .get(self.config.endpoint_url("/v2/usage"))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.config.api_key))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::InvalidResponseError {
                message: e.to_string(),
            })
    }

    /// Characters sent during this run
    pub async fn get_usage(&self) -> CharacterUsage {
        self.usage_tracker.get_stats().await
    }

    /// Whether the per-run character budget is almost spent
    pub async fn is_quota_low(&self) -> bool {
        self.usage_tracker.is_low().await
    }
}

fn map_transport_error(e: reqwest::Error) -> ToolError {
    if e.is_timeout() {
        ToolError::TimeoutError
    } else {
        ToolError::NetworkError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Spawn a fake DeepL that prefixes every text with `ES:`
    pub(crate) async fn spawn_fake_deepl(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));

        async fn translate(
            State((calls, fail_first)): State<(Arc<AtomicUsize>, usize)>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> (StatusCode, Json<serde_json::Value>) {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < fail_first {
                return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})));
            }
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth != "DeepL-Auth-Key test-key" {
                return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
            }
            let translations: Vec<_> = body["text"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|t| {
                    serde_json::json!({
                        "detected_source_language": "EN",
                        "text": format!("ES:{}", t.as_str().unwrap_or_default()),
                    })
                })
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "translations": translations })),
            )
        }

        async fn usage() -> Json<serde_json::Value> {
            Json(serde_json::json!({ "character_count": 180, "character_limit": 500000 }))
        }

        let app = Router::new()
            .route("/v2/translate", post(translate))
            .route("/v2/usage", get(usage))
            .with_state((calls.clone(), fail_first));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), calls)
    }

    pub(crate) fn test_config(endpoint: &str) -> TranslatorConfig {
        TranslatorConfig {
            api_key: "test-key".to_string(),
            api_endpoint: endpoint.to_string(),
            max_concurrent: 2,
            max_retries: 2,
            retry_delay_ms: 1,
            timeout_ms: 5000,
            char_limit: None,
        }
    }

    #[tokio::test]
    async fn test_translator_creation() {
        let translator = AsyncTranslator::new(test_config("http://localhost"));
        tokio_test::assert_ok!(translator);
    }

    #[tokio::test]
    async fn test_translator_rejects_empty_key() {
        let mut config = test_config("http://localhost");
        config.api_key = String::new();
        tokio_test::assert_err!(AsyncTranslator::new(config));
    }

    #[tokio::test]
    async fn test_translate_single() {
        let (endpoint, _) = spawn_fake_deepl(0).await;
        let translator = AsyncTranslator::new(test_config(&endpoint)).unwrap();

        let request = TranslationRequest::new("Hello", "es").with_source_lang("en");
        let result = translator.translate(&request).await.unwrap();

        assert_eq!(result.translation, "ES:Hello");
        assert_eq!(result.detected_source_lang.as_deref(), Some("EN"));
        assert_eq!(translator.get_usage().await.used, 5);
    }

    #[tokio::test]
    async fn test_translate_batch_preserves_order_across_chunks() {
        let (endpoint, calls) = spawn_fake_deepl(0).await;
        let translator = AsyncTranslator::new(test_config(&endpoint)).unwrap();

        let texts: Vec<String> = (0..(MAX_TEXTS_PER_REQUEST + 3))
            .map(|i| format!("t{}", i))
            .collect();
        let template = TranslationRequest::new("", "ES");
        let results = translator.translate_batch(&texts, &template).await.unwrap();

        assert_eq!(results.len(), texts.len());
        assert_eq!(results[0].translation, "ES:t0");
        assert_eq!(results[52].translation, "ES:t52");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (endpoint, calls) = spawn_fake_deepl(2).await;
        let translator = AsyncTranslator::new(test_config(&endpoint)).unwrap();

        let result = translator
            .translate(&TranslationRequest::new("Hola", "ES"))
            .await
            .unwrap();

        assert_eq!(result.translation, "ES:Hola");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (endpoint, calls) = spawn_fake_deepl(10).await;
        let translator = AsyncTranslator::new(test_config(&endpoint)).unwrap();

        let err = translator
            .translate(&TranslationRequest::new("Hola", "ES"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::ApiError { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_forbidden_is_not_retried() {
        let (endpoint, calls) = spawn_fake_deepl(0).await;
        let mut config = test_config(&endpoint);
        config.api_key = "wrong".to_string();
        let translator = AsyncTranslator::new(config).unwrap();

        let err = translator
            .translate(&TranslationRequest::new("Hola", "ES"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::ApiError { status: 403, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_char_limit_blocks_before_network() {
        let (endpoint, calls) = spawn_fake_deepl(0).await;
        let mut config = test_config(&endpoint);
        config.char_limit = Some(3);
        let translator = AsyncTranslator::new(config).unwrap();

        let err = translator
            .translate(&TranslationRequest::new("Hello", "ES"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::QuotaExceededError));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_account_usage() {
        let (endpoint, _) = spawn_fake_deepl(0).await;
        let translator = AsyncTranslator::new(test_config(&endpoint)).unwrap();

        let usage = translator.usage().await.unwrap();
        assert_eq!(usage.character_count, 180);
        assert_eq!(usage.remaining(), 499_820);
    }
}
