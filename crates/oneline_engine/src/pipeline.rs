use std::sync::Arc;
use std::time::Instant;

use oneline_core::{validate_url, CandidateUrl, ValidatedSummary};
use oneline_logging::{oneline_debug, oneline_info, oneline_warn};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, EngineConfig, PipelineSettings};
use crate::deadline::StageContext;
use crate::extract::MainTextExtractor;
use crate::fetch::{HtmlFetcher, ReqwestFetcher};
use crate::gemini::GeminiClient;
use crate::generate::Summarizer;
use crate::types::{FailureKind, PipelineError, Stage};

/// Receives the stage each run enters.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, stage: Stage);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn stage(&self, _stage: Stage) {}
}

/// Validate, fetch, extract, summarize; under one overall deadline.
pub struct Pipeline {
    fetcher: Arc<dyn HtmlFetcher>,
    extractor: MainTextExtractor,
    summarizer: Summarizer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn HtmlFetcher>,
        extractor: MainTextExtractor,
        summarizer: Summarizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            summarizer,
            settings,
        }
    }

    /// Builds the reqwest fetcher, default extractor and Gemini summarizer.
    ///
    /// A missing API key is not rejected here; runs then fail at the
    /// summarization stage. Use [`EngineConfig::validate`] to catch it early.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let fetcher = ReqwestFetcher::new(config.fetch)?;
        let model = GeminiClient::new(&config.gemini)?;
        Ok(Self::new(
            Arc::new(fetcher),
            MainTextExtractor::default(),
            Summarizer::new(Arc::new(model), config.summarizer),
            config.pipeline,
        ))
    }

    pub async fn run(&self, raw_url: &str) -> Result<ValidatedSummary, PipelineError> {
        self.run_with(raw_url, &CancellationToken::new(), &NoopSink).await
    }

    pub async fn run_with(
        &self,
        raw_url: &str,
        parent: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<ValidatedSummary, PipelineError> {
        let started = Instant::now();
        sink.stage(Stage::Validating);
        let url = validate_url(raw_url).map_err(|rejection| {
            oneline_info!("Rejected input: {}", rejection);
            PipelineError::from(rejection)
        })?;
        if parent.is_cancelled() {
            return Err(PipelineError::new(FailureKind::Cancelled));
        }

        let scope = StageContext::with_parent(self.settings.overall_timeout, parent);
        let outcome = tokio::select! {
            biased;
            _ = tokio::time::sleep_until(scope.deadline()) => {
                Err(PipelineError::new(FailureKind::OverallTimeout))
            }
            result = self.run_stages(&url, &scope, sink) => result,
        };
        // Abandoned stages see their tokens fire.
        scope.cancel();

        match &outcome {
            Ok(summary) => oneline_info!(
                "Summarized {} in {:?} ({} chars)",
                url,
                started.elapsed(),
                summary.char_len()
            ),
            Err(err) => {
                oneline_warn!("Run for {} failed after {:?}: {}", url, started.elapsed(), err)
            }
        }
        outcome
    }

    async fn run_stages(
        &self,
        url: &CandidateUrl,
        scope: &StageContext,
        sink: &dyn ProgressSink,
    ) -> Result<ValidatedSummary, PipelineError> {
        sink.stage(Stage::Fetching);
        oneline_info!("Fetching {}", url);
        let page = self.fetcher.fetch(url, scope).await?;
        oneline_debug!(
            "Fetched {} (HTTP {}, {} redirects, {})",
            page.final_url,
            page.http_status,
            page.redirect_count,
            page.encoding
        );

        sink.stage(Stage::Extracting);
        oneline_info!("Extracting text from {}", page.final_url);
        let text = self.extractor.extract(&page.html, &page.final_url)?;
        oneline_debug!("Extracted {} chars", text.char_len());

        if scope.is_cancelled() {
            return Err(PipelineError::new(FailureKind::Cancelled));
        }

        sink.stage(Stage::Summarizing);
        oneline_info!("Summarizing {}", url);
        self.summarizer.summarize(&text, scope).await
    }
}
