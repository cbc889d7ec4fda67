//! Oneline engine: page fetching, text extraction, model calls and the pipeline that joins them.
mod config;
mod deadline;
mod decode;
mod engine;
mod extract;
mod fetch;
mod gemini;
mod generate;
mod pipeline;
mod types;

pub use config::{ApiKey, ConfigError, EngineConfig, PipelineSettings};
pub use deadline::{Interrupted, StageContext};
pub use decode::{decode_html, decode_html_lossy, DecodeError, DecodedHtml};
pub use engine::{EngineError, EngineHandle};
pub use extract::{ExtractionStrategy, FlattenStrategy, MainTextExtractor, ReadabilityStrategy};
pub use fetch::{FetchSettings, HtmlFetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use gemini::{GeminiClient, GeminiSettings, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use generate::{
    first_prompt, retry_prompt, system_instruction, ModelClient, Prompt, Summarizer,
    SummarizerSettings, MAX_MODEL_INPUT_CHARS, MIN_MODEL_INPUT_CHARS,
};
pub use pipeline::{NoopSink, Pipeline, ProgressSink};
pub use types::{
    EngineEvent, ExtractedText, ExtractionFailure, FailureKind, FetchFailure, FetchResult,
    GenerationFailure, JobId, JobProgress, PipelineError, Stage, MIN_TEXT_CHARS,
};
