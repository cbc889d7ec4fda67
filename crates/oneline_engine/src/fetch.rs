use std::time::Duration;

use futures_util::StreamExt;
use oneline_core::CandidateUrl;
use oneline_logging::{oneline_debug, oneline_warn};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Response, StatusCode};
use url::Url;

use crate::config::ConfigError;
use crate::deadline::{Interrupted, StageContext};
use crate::decode::{decode_html, decode_html_lossy};
use crate::types::{FetchFailure, FetchResult, PipelineError, Stage};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; OnelineSummarizer/0.1; +https://example.invalid)";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Bounds the whole redirect chain, not each hop.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

#[async_trait::async_trait]
pub trait HtmlFetcher: Send + Sync {
    /// `ctx` is the caller's scope; the fetcher nests its own deadline inside it.
    async fn fetch(
        &self,
        url: &CandidateUrl,
        ctx: &StageContext,
    ) -> Result<FetchResult, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

enum Hop {
    Redirect(Url),
    Done(FetchResult),
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, ConfigError> {
        // Redirects are followed by hand so every hop shares one deadline.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn follow_chain(&self, start: &Url) -> Result<FetchResult, PipelineError> {
        let mut current = start.clone();
        let mut redirects = 0usize;
        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(map_reqwest_error)?;
            match self.handle_response(&current, response, redirects).await? {
                Hop::Redirect(next) => {
                    redirects += 1;
                    if redirects > self.settings.redirect_limit {
                        oneline_warn!("Redirect limit exceeded at {}", current);
                        return Err(PipelineError::fetch(FetchFailure::TooManyRedirects));
                    }
                    oneline_debug!("Redirect {} from {} to {}", redirects, current, next);
                    current = next;
                }
                Hop::Done(result) => return Ok(result),
            }
        }
    }

    async fn handle_response(
        &self,
        current: &Url,
        response: Response,
        redirects: usize,
    ) -> Result<Hop, PipelineError> {
        let status = response.status();
        if is_redirect(status) {
            let location = response
                .headers()
                .get(LOCATION)
                .ok_or_else(|| PipelineError::fetch(FetchFailure::MissingRedirectTarget))?;
            let next = location
                .to_str()
                .ok()
                .and_then(|target| current.join(target).ok())
                .ok_or_else(|| PipelineError::fetch(FetchFailure::InvalidRedirectTarget))?;
            return Ok(Hop::Redirect(next));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::fetch(FetchFailure::NotFound));
        }
        if !status.is_success() {
            return Err(PipelineError::fetch(FetchFailure::HttpStatus(status.as_u16())));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(Some(content_len)));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                oneline_warn!("Rejecting {} with content type {}", current, ct);
                return Err(PipelineError::fetch(FetchFailure::UnsupportedContentType));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(Some(next_len)));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = match decode_html(&bytes, content_type.as_deref()) {
            Ok(decoded) => decoded,
            Err(err) => {
                oneline_warn!("{}; decoding {} lossily", err, current);
                decode_html_lossy(&bytes, content_type.as_deref())
            }
        };
        oneline_debug!(
            "Fetched {} bytes from {} as {}",
            bytes.len(),
            current,
            decoded.encoding_label
        );

        Ok(Hop::Done(FetchResult {
            html: decoded.html,
            final_url: current.to_string(),
            http_status: status.as_u16(),
            redirect_count: redirects,
            content_type,
            encoding: decoded.encoding_label,
        }))
    }

    fn too_large(&self, actual: Option<u64>) -> PipelineError {
        PipelineError::fetch(FetchFailure::TooLarge {
            max_bytes: self.settings.max_bytes,
            actual,
        })
    }
}

#[async_trait::async_trait]
impl HtmlFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &CandidateUrl,
        ctx: &StageContext,
    ) -> Result<FetchResult, PipelineError> {
        let scope = ctx.child(self.settings.timeout);
        match scope.run(self.follow_chain(url.as_url())).await {
            Ok(result) => result,
            Err(interrupted) => {
                if interrupted == Interrupted::DeadlineElapsed {
                    oneline_warn!("Fetch of {} timed out after {:?}", url, self.settings.timeout);
                }
                Err(interrupted.into_error(Stage::Fetching))
            }
        }
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn map_reqwest_error(err: reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        return PipelineError::timeout(Stage::Fetching);
    }
    oneline_warn!("Transport error while fetching: {}", err);
    PipelineError::fetch(FetchFailure::Network)
}
