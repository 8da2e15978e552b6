use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::decode::decode_document;
use crate::surface::{Surface, SurfaceProvider};
use crate::{PageSnapshot, SurfaceError, SurfaceFailure};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("postharvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// A server-rendered page. Each capture re-fetches the document; scrolling
/// has nothing to reveal, so the height settles after the first tick.
///
/// [`HttpProvider`] fetches the document once on open, so a target that cannot
/// be loaded never reaches the collector.
#[derive(Debug)]
pub struct HttpSurface {
    url: Url,
    client: reqwest::Client,
    settings: FetchSettings,
    last: Mutex<Option<PageSnapshot>>,
}

impl HttpSurface {
    pub fn new(url: Url, settings: FetchSettings) -> Result<Self, SurfaceError> {
        let limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(policy)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| SurfaceError::new(SurfaceFailure::Unreachable, err.to_string()))?;

        Ok(Self {
            url,
            client,
            settings,
            last: Mutex::new(None),
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn fetch_document(&self) -> Result<PageSnapshot, SurfaceError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SurfaceError::new(
                SurfaceFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let too_large = |actual: u64| {
            SurfaceError::new(
                SurfaceFailure::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(actual),
                },
                "response too large",
            )
        };
        if let Some(len) = response.content_length() {
            if len > self.settings.max_bytes {
                return Err(too_large(len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(SurfaceError::new(
                    SurfaceFailure::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        let html = decode_document(&bytes, content_type.as_deref())?;
        engine_debug!("fetched {} ({} bytes)", final_url, bytes.len());
        Ok(PageSnapshot {
            url: final_url,
            html,
            captured_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    fn remember(&self, snapshot: &PageSnapshot) {
        match self.last.lock() {
            Ok(mut last) => *last = Some(snapshot.clone()),
            Err(_) => engine_warn!("http surface cache poisoned; height will be re-fetched"),
        }
    }

    fn remembered_height(&self) -> Option<u64> {
        self.last
            .lock()
            .ok()
            .and_then(|last| last.as_ref().map(|doc| doc.html.len() as u64))
    }
}

#[async_trait]
impl Surface for HttpSurface {
    async fn location(&self) -> Result<String, SurfaceError> {
        Ok(self.url.to_string())
    }

    async fn content_height(&self) -> Result<u64, SurfaceError> {
        if let Some(height) = self.remembered_height() {
            return Ok(height);
        }
        let snapshot = self.fetch_document().await?;
        self.remember(&snapshot);
        Ok(snapshot.html.len() as u64)
    }

    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn capture(&self) -> Result<PageSnapshot, SurfaceError> {
        let snapshot = self.fetch_document().await?;
        self.remember(&snapshot);
        Ok(snapshot)
    }
}

/// Treats targets as absolute http(s) URLs. Opening fetches the page.
#[derive(Debug, Clone, Default)]
pub struct HttpProvider {
    settings: FetchSettings,
}

impl HttpProvider {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SurfaceProvider for HttpProvider {
    async fn open(&self, target: &str) -> Result<Arc<dyn Surface>, SurfaceError> {
        let url = Url::parse(target)
            .map_err(|err| SurfaceError::new(SurfaceFailure::InvalidLocation, err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SurfaceError::new(
                SurfaceFailure::InvalidLocation,
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        let surface = HttpSurface::new(url, self.settings.clone())?;
        let first = surface.fetch_document().await?;
        engine_debug!("opened {} ({} chars)", first.url, first.html.len());
        surface.remember(&first);
        Ok(Arc::new(surface))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SurfaceError {
    if err.is_timeout() {
        return SurfaceError::new(SurfaceFailure::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return SurfaceError::new(SurfaceFailure::RedirectLimitExceeded, err.to_string());
    }
    SurfaceError::new(SurfaceFailure::Unreachable, err.to_string())
}
