use super::{ChatRequest, DownloadedFile, MessageContent};
use crate::config::Config;
use crate::error::ApiError;
use crate::services::rate_limit::ApiRateLimits;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Images up to this size are sent inline as data URLs.
pub const MAX_INLINE_IMAGE_BYTES: u64 = 8 * 1024 * 1024;
const RESET_TIME_HEADER: &str = "x-ratelimit-reset-time";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Longest wait taken from a reset header; later resets are clamped.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 1],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a MessageContent,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ShapesClient {
    http: reqwest::Client,
    completions_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
    limits: ApiRateLimits,
}

impl ShapesClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            completions_url: format!("{}/chat/completions", config.shapes_api_url),
            model: config.shapes_model(),
            api_key: config.shapes_api_key.clone(),
            max_retries: config.shapes_max_retries,
            limits: ApiRateLimits::default(),
        }
    }

    /// The shared HTTP client, bounded by `SHAPES_TIMEOUT_SECS`.
    pub fn http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.shapes_timeout_secs))
            .build()
    }

    fn build_request(&self, req: &ChatRequest) -> reqwest::RequestBuilder {
        let body = CompletionRequest {
            model: &self.model,
            messages: [RequestMessage {
                role: "user",
                content: &req.content,
            }],
        };

        let mut builder = self.http.post(&self.completions_url).json(&body);
        builder = match &req.credentials {
            Some(creds) => builder
                .bearer_auth("not-needed")
                .header("X-App-ID", &creds.app_id)
                .header("X-User-Auth", &creds.auth_token),
            None => builder.bearer_auth(&self.api_key),
        };
        if let Some(user_id) = req.user_id {
            builder = builder.header("X-User-Id", user_id.to_string());
        }
        if let Some(channel_id) = req.channel_id {
            builder = builder.header("X-Channel-Id", channel_id.to_string());
        }
        builder
    }

    async fn send_once(&self, req: &ChatRequest) -> Result<String, ApiError> {
        let res = self.build_request(req).send().await?;
        let status = res.status().as_u16();
        let header = |name: &str| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let reset = header(RESET_TIME_HEADER);
        let remaining = header(REMAINING_HEADER);
        if status == 429 {
            warn!(
                "Shapes API rate limited (reset: {:?}, remaining: {:?})",
                reset, remaining
            );
        }

        let body = res.text().await?;
        classify_response(status, reset.as_deref(), unix_now(), &body)
    }

    /// One chat completion, with `SHAPES_MAX_RETRIES` extra attempts for
    /// transient failures. Rate limits are remembered per user/default key.
    pub async fn complete(&self, req: &ChatRequest) -> Result<String, ApiError> {
        let key = ApiRateLimits::key_for(req.user_id, req.credentials.is_some());
        self.limits.check(&key, Instant::now())?;

        let mut attempt = 0;
        loop {
            match self.send_once(req).await {
                Err(ApiError::RateLimited { retry_after }) => {
                    if let Some(wait) = retry_after {
                        self.limits.record(&key, wait, Instant::now());
                    }
                    return Err(ApiError::RateLimited { retry_after });
                }
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let backoff = Duration::from_secs(1 << attempt.min(5));
                    warn!(
                        "Shapes API attempt {} failed ({}), retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!("Shapes API error: {}", e);
                    return Err(e);
                }
                Ok(text) => return Ok(text),
            }
        }
    }

    /// A short bot-initiated line, trimmed of wrapping quotes.
    pub async fn generate_line(&self, prompt: &str) -> Result<String, ApiError> {
        let text = self.complete(&ChatRequest::system_prompt(prompt)).await?;
        let line = text.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if line.is_empty() {
            return Err(ApiError::InvalidResponse("empty completion".to_string()));
        }
        Ok(line.to_string())
    }

    pub async fn download_file(&self, url: &str) -> Result<DownloadedFile, ApiError> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: format!("download of {} failed", url),
            });
        }

        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = res.bytes().await?.to_vec();
        debug!("Downloaded {} ({} bytes)", url, data.len());

        Ok(DownloadedFile {
            filename: filename_for(url, content_type.as_deref()),
            data,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> reqwest::Result<Vec<u8>> {
        let res = self.http.get(url).send().await?.error_for_status()?;
        Ok(res.bytes().await?.to_vec())
    }

    /// Small images become base64 data URLs; anything else stays a link.
    pub async fn inline_image(&self, url: &str, size: u64, content_type: Option<&str>) -> String {
        if size > MAX_INLINE_IMAGE_BYTES {
            return url.to_string();
        }

        match self.fetch_bytes(url).await {
            Ok(bytes) => format!(
                "data:{};base64,{}",
                content_type.unwrap_or("image/png"),
                general_purpose::STANDARD.encode(&bytes)
            ),
            Err(e) => {
                warn!("Could not inline image {}: {}", url, e);
                url.to_string()
            }
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn is_transient(err: &ApiError) -> bool {
    match err {
        ApiError::Timeout | ApiError::Network(_) => true,
        ApiError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Map an HTTP outcome to the completion text or an [`ApiError`].
///
/// `reset_header` is `X-RateLimit-Reset-Time` in unix seconds.
pub(crate) fn classify_response(
    status: u16,
    reset_header: Option<&str>,
    now_unix: f64,
    body: &str,
) -> Result<String, ApiError> {
    match status {
        200..=299 => {
            let parsed: CompletionResponse = serde_json::from_str(body)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.unwrap_or_default().trim().to_string())
                .ok_or_else(|| ApiError::InvalidResponse("no choices in response".to_string()))
        }
        429 => {
            let retry_after = reset_header
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .map(|reset| reset - now_unix)
                .filter(|wait| *wait > 0.0)
                .map(|wait| wait.min(MAX_RATE_LIMIT_WAIT.as_secs_f64()))
                .and_then(|wait| Duration::try_from_secs_f64(wait).ok());
            Err(ApiError::RateLimited { retry_after })
        }
        401 => Err(ApiError::Unauthorized),
        _ => Err(ApiError::Status {
            status,
            message: body.chars().take(200).collect(),
        }),
    }
}

fn filename_for(url: &str, content_type: Option<&str>) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .unwrap_or_default();
    if last.contains('.') {
        return last.to_string();
    }

    match content_type {
        Some(ct) if ct.starts_with("image/") || ct.starts_with("audio/") => {
            let (kind, ext) = ct.split_once('/').unwrap_or(("file", "bin"));
            let ext = ext.split(';').next().unwrap_or("bin").trim();
            format!("{}.{}", kind, ext)
        }
        _ => "file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::services::auth::UserCredentials;

    fn client() -> ShapesClient {
        let config = test_config();
        ShapesClient::new(&config, reqwest::Client::new())
    }

    fn request(credentials: Option<UserCredentials>) -> ChatRequest {
        ChatRequest {
            content: MessageContent::Text("Ada: hi".to_string()),
            user_id: Some(42),
            channel_id: Some(7),
            credentials,
        }
    }

    #[test]
    fn test_success_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Hello! "}}]}"#;
        assert_eq!(classify_response(200, None, 0.0, body).unwrap(), "Hello!");

        let err = classify_response(200, None, 0.0, r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        let err = classify_response(200, None, 0.0, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_429_is_rate_limited_with_reset() {
        let err = classify_response(429, Some("1000.5"), 998.0, "slow down").unwrap_err();
        match &err {
            ApiError::RateLimited { retry_after } => {
                assert_eq!(*retry_after, Some(Duration::from_secs_f64(2.5)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            err.user_message(Some("Custom failure {status}")),
            "I'm being rate limited. Please try again in 2.5 seconds."
        );

        let err = classify_response(429, None, 0.0, "").unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after: None }));
        let err = classify_response(429, Some("10"), 50.0, "").unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after: None }));
    }

    #[test]
    fn test_429_with_far_future_reset_is_clamped() {
        for raw in ["1e30", "1e19", "inf"] {
            match classify_response(429, Some(raw), 0.0, "").unwrap_err() {
                ApiError::RateLimited { retry_after } => {
                    assert_eq!(retry_after, Some(MAX_RATE_LIMIT_WAIT), "header {}", raw);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        let err = classify_response(429, Some("NaN"), 0.0, "").unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after: None }));
    }

    #[test]
    fn test_other_statuses() {
        assert!(matches!(
            classify_response(401, None, 0.0, "").unwrap_err(),
            ApiError::Unauthorized
        ));
        let err = classify_response(503, None, 0.0, &"x".repeat(500)).unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_headers_with_api_key() {
        let built = client().build_request(&request(None)).build().unwrap();
        assert_eq!(built.url().as_str(), "https://api.shapes.inc/v1/chat/completions");
        let headers = built.headers();
        assert_eq!(headers["authorization"], "Bearer key");
        assert_eq!(headers["x-user-id"], "42");
        assert_eq!(headers["x-channel-id"], "7");
        assert!(headers.get("x-app-id").is_none());

        let body: serde_json::Value =
            serde_json::from_slice(built.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["model"], "shapesinc/tester");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Ada: hi");
    }

    #[test]
    fn test_request_headers_with_user_auth() {
        let creds = UserCredentials {
            app_id: "app-1".to_string(),
            auth_token: "tok-1".to_string(),
        };
        let built = client().build_request(&request(Some(creds))).build().unwrap();
        let headers = built.headers();
        assert_eq!(headers["authorization"], "Bearer not-needed");
        assert_eq!(headers["x-app-id"], "app-1");
        assert_eq!(headers["x-user-auth"], "tok-1");
    }

    #[tokio::test]
    async fn test_remembered_rate_limit_fails_fast() {
        let client = client();
        client
            .limits
            .record("default", Duration::from_secs(60), Instant::now());
        // No network call happens: the remembered reset short-circuits
        let err = client.complete(&request(None)).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_filenames() {
        assert_eq!(
            filename_for("https://files.shapes.inc/abc/cat.png?x=1", None),
            "cat.png"
        );
        assert_eq!(
            filename_for("https://files.shapes.inc/abc", Some("audio/mpeg")),
            "audio.mpeg"
        );
        assert_eq!(filename_for("https://files.shapes.inc/abc", None), "file");
    }
}
