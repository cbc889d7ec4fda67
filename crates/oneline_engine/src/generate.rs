use std::sync::Arc;
use std::time::Duration;

use oneline_core::{clean_model_output, truncate_for_model, ValidatedSummary, MAX_SUMMARY_CHARS};
use oneline_logging::{oneline_debug, oneline_info, oneline_warn};

use crate::deadline::StageContext;
use crate::types::{ExtractedText, FailureKind, GenerationFailure, PipelineError, Stage};

/// Longest page text sent to the model, in characters.
pub const MAX_MODEL_INPUT_CHARS: usize = 8000;
/// Shortest cut accepted when trimming long text at a line boundary.
pub const MIN_MODEL_INPUT_CHARS: usize = 3000;

const EXAMPLE_INPUT: &str =
    "A社は新型の小型衛星を発表した。打ち上げは来年春を予定しており、通信事業への参入を目指す。";
const EXAMPLE_OUTPUT: &str = "A社が新型小型衛星を発表し、来年春の打ち上げで通信事業への参入を目指す";

/// One model request: a system instruction plus a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system_instruction: String,
    pub user_text: String,
}

/// A text-generation backend. One call is one model invocation.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the raw model output. Implementations must stop when `ctx`
    /// expires or is cancelled.
    async fn generate(&self, prompt: &Prompt, ctx: &StageContext) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    /// Deadline for each model invocation; the retry gets a fresh one.
    pub attempt_timeout: Duration,
    pub max_input_chars: usize,
    pub min_input_chars: usize,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(5),
            max_input_chars: MAX_MODEL_INPUT_CHARS,
            min_input_chars: MIN_MODEL_INPUT_CHARS,
        }
    }
}

/// Asks the model for a one-sentence Japanese summary and holds the answer to
/// the format contract, with exactly one stricter retry.
pub struct Summarizer {
    model: Arc<dyn ModelClient>,
    settings: SummarizerSettings,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ModelClient>, settings: SummarizerSettings) -> Self {
        Self { model, settings }
    }

    pub async fn summarize(
        &self,
        text: &ExtractedText,
        ctx: &StageContext,
    ) -> Result<ValidatedSummary, PipelineError> {
        let input = truncate_for_model(
            text.as_str(),
            self.settings.max_input_chars,
            self.settings.min_input_chars,
        );

        let failure = match self.attempt(1, &first_prompt(input), ctx).await {
            Ok(summary) => return Ok(summary),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => err,
        };
        oneline_warn!("Summary attempt 1 failed: {}; retrying with stricter prompt", failure);

        let summary = self.attempt(2, &retry_prompt(input), ctx).await?;
        oneline_info!("Summary accepted on retry");
        Ok(summary)
    }

    async fn attempt(
        &self,
        number: u32,
        prompt: &Prompt,
        ctx: &StageContext,
    ) -> Result<ValidatedSummary, PipelineError> {
        let scope = ctx.child(self.settings.attempt_timeout);
        let raw = match scope.run(self.model.generate(prompt, &scope)).await {
            Ok(result) => result?,
            Err(interrupted) => return Err(interrupted.into_error(Stage::Summarizing)),
        };
        let cleaned = clean_model_output(&raw);
        ValidatedSummary::new(&cleaned).map_err(|violation| {
            oneline_debug!("Attempt {} output rejected: {}", number, violation);
            PipelineError::generation(GenerationFailure::FormatRejected)
        })
    }
}

/// Credential problems and cancellation end the run; everything else gets the retry.
fn is_retryable(err: &PipelineError) -> bool {
    !matches!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::MissingCredential) | FailureKind::Cancelled
    )
}

pub fn system_instruction() -> String {
    [
        "あなたはウェブ記事を要約する日本語編集者です。".to_string(),
        format!("出力は日本語の一文のみで、{MAX_SUMMARY_CHARS}文字以内とします。"),
        "客観的かつ中立に書き、固有名詞を優先し、主観的な評価や煽り表現は使いません。".to_string(),
        "URL、絵文字、記号による装飾、箇条書きは使いません。".to_string(),
        "本文が複数の話題を含む場合は、最も比重の大きい話題だけを要約します。".to_string(),
    ]
    .join("\n")
}

pub fn first_prompt(text: &str) -> Prompt {
    let user_text = [
        format!("以下の本文を日本語の一文、{MAX_SUMMARY_CHARS}文字以内で要約してください。"),
        "URL・絵文字・ハッシュタグは使わないでください。".to_string(),
        "複数の話題がある場合は中心となる話題を要約してください。".to_string(),
        "【例】".to_string(),
        format!("入力: {EXAMPLE_INPUT}"),
        format!("出力: {EXAMPLE_OUTPUT}"),
        "【本文】".to_string(),
        text.to_string(),
    ]
    .join("\n");
    Prompt {
        system_instruction: system_instruction(),
        user_text,
    }
}

pub fn retry_prompt(text: &str) -> Prompt {
    let user_text = [
        "前回の出力は条件を満たしていませんでした。".to_string(),
        format!(
            "必ず日本語の「一文のみ」「{MAX_SUMMARY_CHARS}文字以内」で出力してください。URL・絵文字・ハッシュタグは禁止です。"
        ),
        "短く端的に要約してください。".to_string(),
        "本文:".to_string(),
        text.to_string(),
    ]
    .join("\n");
    Prompt {
        system_instruction: system_instruction(),
        user_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_text_and_limits() {
        let first = first_prompt("本文テキスト");
        assert!(first.user_text.ends_with("本文テキスト"));
        assert!(first.user_text.contains(EXAMPLE_OUTPUT));
        assert!(first.system_instruction.contains("80文字以内"));

        let retry = retry_prompt("本文テキスト");
        assert!(retry.user_text.starts_with("前回の出力は"));
        assert!(!retry.user_text.contains("【例】"));
        assert!(retry.user_text.len() < first.user_text.len());
    }
}
