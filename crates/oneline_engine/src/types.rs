use std::fmt;

use oneline_core::{char_len, normalize_whitespace, UrlRejection, ValidatedSummary};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validating,
    Fetching,
    Extracting,
    Summarizing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted {
        job_id: JobId,
        result: Result<ValidatedSummary, PipelineError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub html: String,
    /// Last URL of the redirect chain, the one that answered with 2xx.
    pub final_url: String,
    pub http_status: u16,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub encoding: String,
}

/// Minimum length of usable page text, in characters.
pub const MIN_TEXT_CHARS: usize = 200;

/// Whitespace-normalized page text of at least a minimum length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Normalizes `raw` and accepts it when at least `min_chars` remain.
    pub fn from_raw(raw: &str, min_chars: usize) -> Option<Self> {
        let text = normalize_whitespace(raw);
        (char_len(&text) >= min_chars).then_some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    NotFound,
    HttpStatus(u16),
    MissingRedirectTarget,
    InvalidRedirectTarget,
    TooManyRedirects,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    TooShort,
    Parse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    /// No API credential configured; a configuration problem, never retried.
    MissingCredential,
    EmptyResponse,
    ApiStatus(u16),
    MalformedResponse,
    Transport,
    FormatRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput(UrlRejection),
    FetchFailed(FetchFailure),
    /// A stage-local deadline elapsed.
    Timeout { stage: Stage },
    ExtractionFailed(ExtractionFailure),
    GenerationFailed(GenerationFailure),
    OverallTimeout,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidInput(rejection) => write!(f, "{rejection}"),
            FailureKind::FetchFailed(failure) => match failure {
                FetchFailure::NotFound => write!(f, "not found"),
                FetchFailure::HttpStatus(code) => write!(f, "fetch failed (HTTP {code})"),
                FetchFailure::MissingRedirectTarget => write!(f, "missing redirect target"),
                FetchFailure::InvalidRedirectTarget => write!(f, "invalid redirect target"),
                FetchFailure::TooManyRedirects => write!(f, "too many redirects"),
                FetchFailure::TooLarge { max_bytes, actual: Some(n) } => {
                    write!(f, "response too large (max {max_bytes} bytes, got {n})")
                }
                FetchFailure::TooLarge { max_bytes, actual: None } => {
                    write!(f, "response too large (max {max_bytes} bytes)")
                }
                FetchFailure::UnsupportedContentType => write!(f, "unsupported content type"),
                FetchFailure::Network => write!(f, "error while fetching page"),
            },
            FailureKind::Timeout { stage } => match stage {
                Stage::Fetching => write!(f, "content fetch timed out"),
                Stage::Summarizing => write!(f, "summary generation timed out"),
                other => write!(f, "{other:?} timed out"),
            },
            FailureKind::ExtractionFailed(failure) => match failure {
                ExtractionFailure::TooShort => write!(f, "could not extract article body"),
                ExtractionFailure::Parse => write!(f, "text extraction failed"),
            },
            FailureKind::GenerationFailed(failure) => match failure {
                GenerationFailure::MissingCredential => write!(f, "missing credential"),
                GenerationFailure::EmptyResponse => write!(f, "empty model response"),
                GenerationFailure::ApiStatus(code) => write!(f, "model API error (HTTP {code})"),
                GenerationFailure::MalformedResponse => {
                    write!(f, "model API returned an unreadable response")
                }
                GenerationFailure::Transport => write!(f, "model API request failed"),
                GenerationFailure::FormatRejected => {
                    write!(f, "summary did not satisfy format constraints")
                }
            },
            FailureKind::OverallTimeout => write!(f, "processing timed out"),
            FailureKind::Cancelled => write!(f, "processing cancelled"),
        }
    }
}

/// The only error type that crosses a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PipelineError {
    pub kind: FailureKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: kind.to_string(),
        }
    }

    pub(crate) fn fetch(failure: FetchFailure) -> Self {
        Self::new(FailureKind::FetchFailed(failure))
    }

    pub(crate) fn extraction(failure: ExtractionFailure) -> Self {
        Self::new(FailureKind::ExtractionFailed(failure))
    }

    pub(crate) fn generation(failure: GenerationFailure) -> Self {
        Self::new(FailureKind::GenerationFailed(failure))
    }

    pub(crate) fn timeout(stage: Stage) -> Self {
        Self::new(FailureKind::Timeout { stage })
    }
}

impl From<UrlRejection> for PipelineError {
    fn from(rejection: UrlRejection) -> Self {
        Self::new(FailureKind::InvalidInput(rejection))
    }
}
