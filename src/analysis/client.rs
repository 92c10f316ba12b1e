//! 서식 분석 서비스 HTTP 클라이언트
//!
//! 업로드된 챕터 파일을 multipart로 전송하고 응답을 AnalysisResult로 정규화합니다.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use url::Url;

use super::types::{classify_response, AnalysisError, DocumentFormat};
use super::{AnalysisRequest, FormattingAnalyzer};
use crate::config::AnalyzerConfig;
use crate::error::{PortalError, PortalResult};
use crate::models::AnalysisResult;

/// HTTP 서식 분석 클라이언트
pub struct HttpFormattingAnalyzer {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpFormattingAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> PortalResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PortalError::Config(format!("Failed to build analyzer client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisResult, AnalysisError> {
        // 지원하지 않는 형식은 네트워크 호출 없이 바로 거절
        let format =
            DocumentFormat::detect(request.file_path).ok_or(AnalysisError::UnsupportedFormat)?;

        let bytes = tokio::fs::read(request.file_path)
            .await
            .map_err(|e| AnalysisError::Unreadable(e.to_string()))?;

        let part = Part::bytes(bytes)
            .file_name(request.filename.to_string())
            .mime_str(format.mime_type())
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("chapter_number", request.chapter_number.to_string());

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status == 200 => return Err(AnalysisError::Transport(e.to_string())),
            Err(e) => {
                return Err(AnalysisError::Status {
                    status,
                    detail: Some(e.to_string()),
                })
            }
        };

        classify_response(status, &body).map(|report| report.into_result())
    }
}

#[async_trait]
impl FormattingAnalyzer for HttpFormattingAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> AnalysisResult {
        match self.request(&request).await {
            Ok(result) => {
                tracing::info!(
                    "chapter {} analyzed: {}",
                    request.chapter_number,
                    result.summary.as_deref().unwrap_or("")
                );
                result
            }
            Err(AnalysisError::UnsupportedFormat) => {
                tracing::debug!(
                    "skipping analysis of {}: unsupported format",
                    request.file_path.display()
                );
                AnalysisResult::failed(AnalysisError::UnsupportedFormat.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    "formatting analysis failed for chapter {} ({}): {}",
                    request.chapter_number,
                    request.filename,
                    e
                );
                AnalysisResult::failed(e.to_string())
            }
        }
    }
}
