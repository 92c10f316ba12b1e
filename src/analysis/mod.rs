//! Analysis Gateway
//!
//! 외부 문서 서식 분석 서비스 연동 모듈.
//! 분석은 best-effort이며, 어떤 실패도 업로드를 중단시키지 않습니다.

pub mod client;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

use crate::models::AnalysisResult;

pub use client::HttpFormattingAnalyzer;
pub use types::{AnalysisError, DocumentFormat};

/// 분석 대상 문서
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// 저장된 파일의 실제 경로
    pub file_path: &'a Path,
    /// 분석 서비스에 전달할 원본 파일명
    pub filename: &'a str,
    pub chapter_number: i64,
}

/// 서식 분석 capability.
/// 실패는 에러가 아니라 `success: false` 결과로 반환합니다.
#[async_trait]
pub trait FormattingAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> AnalysisResult;
}
