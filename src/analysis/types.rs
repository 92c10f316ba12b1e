//! 서식 분석 서비스 응답 타입 및 분류

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::models::AnalysisResult;
use crate::utils::file_extension;

/// 분석 서비스가 받는 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// 확장자로 형식 판별 (PDF, DOCX 외에는 None)
    pub fn detect(path: &Path) -> Option<Self> {
        match file_extension(&path.to_string_lossy()).as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// 분석 실패 사유. 모두 복구 가능하며 업로드를 중단시키지 않습니다.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("unsupported format")]
    UnsupportedFormat,

    #[error("HTTP {status}{}", .detail.as_ref().map(|d| format!(", {}", d)).unwrap_or_default())]
    Status { status: u16, detail: Option<String> },

    #[error("HTTP 0, {0}")]
    Transport(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unexpected response structure")]
    UnexpectedStructure,

    #[error("file unreadable: {0}")]
    Unreadable(String),
}

/// `formatting_analysis` 객체에서 추출한 결과
#[derive(Debug, Clone, PartialEq)]
pub struct FormattingReport {
    pub overall_score: f64,
    pub recommendations: Vec<String>,
    pub raw: Value,
}

impl FormattingReport {
    pub fn from_payload(raw: Value) -> Result<Self, AnalysisError> {
        let analysis = raw
            .get("formatting_analysis")
            .and_then(Value::as_object)
            .ok_or(AnalysisError::UnexpectedStructure)?;

        let overall_score = analysis
            .get("overall_score")
            .and_then(score_value)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);

        let recommendations = analysis
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(recommendation_text).collect())
            .unwrap_or_default();

        Ok(Self {
            overall_score,
            recommendations,
            raw,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "Formatting score: {:.0}/100, {} recommendation(s)",
            self.overall_score,
            self.recommendations.len()
        )
    }

    pub fn into_result(self) -> AnalysisResult {
        let summary = self.summary();
        AnalysisResult {
            success: true,
            score: Some(self.overall_score),
            summary: Some(summary),
            recommendations: self.recommendations,
            raw_report: Some(self.raw),
            error_message: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn score_value(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    score.filter(|v| v.is_finite())
}

fn recommendation_text(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => ["message", "text", "description", "recommendation"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| item.to_string()),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// 상태 코드 + 본문으로 응답 분류
pub fn classify_response(status: u16, body: &str) -> Result<FormattingReport, AnalysisError> {
    if status != 200 {
        let detail = body.trim();
        return Err(AnalysisError::Status {
            status,
            detail: (!detail.is_empty()).then(|| truncate(detail, 200)),
        });
    }
    if body.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    let raw: Value =
        serde_json::from_str(body).map_err(|e| AnalysisError::InvalidPayload(e.to_string()))?;
    FormattingReport::from_payload(raw)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
