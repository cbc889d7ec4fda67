use oneline_core::UrlRejection;
use oneline_engine::{FailureKind, FetchFailure, GenerationFailure, PipelineError};

/// `EX_CONFIG` from sysexits.
pub const EXIT_CONFIG: u8 = 78;

pub fn exit_code(err: &PipelineError) -> u8 {
    match err.kind {
        FailureKind::InvalidInput(_) => 2,
        FailureKind::FetchFailed(_) => 3,
        FailureKind::ExtractionFailed(_) => 4,
        FailureKind::GenerationFailed(GenerationFailure::MissingCredential) => EXIT_CONFIG,
        FailureKind::GenerationFailed(_) => 5,
        FailureKind::Timeout { .. } | FailureKind::OverallTimeout => 6,
        FailureKind::Cancelled => 7,
    }
}

/// Message shown to the person running the command.
pub fn user_message(err: &PipelineError) -> &'static str {
    match err.kind {
        FailureKind::InvalidInput(rejection) => match rejection {
            UrlRejection::Empty => "URLを入力してください",
            UrlRejection::TooLong => "URLが長すぎます",
            UrlRejection::UnsupportedScheme => "http/https のURLのみ対応しています",
            UrlRejection::Malformed => "URLの形式が正しくありません",
        },
        FailureKind::FetchFailed(FetchFailure::NotFound) => "ページが見つかりませんでした",
        FailureKind::FetchFailed(_) => "ページを取得できませんでした",
        FailureKind::ExtractionFailed(_) => "本文を抽出できませんでした",
        FailureKind::GenerationFailed(GenerationFailure::MissingCredential) => {
            "APIキーが設定されていません"
        }
        FailureKind::GenerationFailed(_) => "要約を生成できませんでした",
        FailureKind::Timeout { .. } | FailureKind::OverallTimeout => "処理がタイムアウトしました",
        FailureKind::Cancelled => "処理が中断されました",
    }
}

/// Exit status for a batch: the first failure in input order decides.
pub fn batch_exit_code<'a, T: 'a>(
    results: impl IntoIterator<Item = &'a Result<T, PipelineError>>,
) -> u8 {
    results
        .into_iter()
        .find_map(|result| result.as_ref().err())
        .map_or(0, exit_code)
}
