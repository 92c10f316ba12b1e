#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use tempfile::TempDir;
use url::Url;

use chapter_vault::analysis::{AnalysisRequest, FormattingAnalyzer, HttpFormattingAnalyzer};
use chapter_vault::audit::{AuditError, AuditSink};
use chapter_vault::commands::UploadChapterArgs;
use chapter_vault::config::{AnalyzerConfig, PortalConfig, VersionNumbering};
use chapter_vault::db::Database;
use chapter_vault::models::{AnalysisResult, AuditEvent};
use chapter_vault::state::AppState;

/// 임시 디렉토리 위의 AppState
pub fn vault(
    dir: &TempDir,
    numbering: VersionNumbering,
    analyzer: Option<Arc<dyn FormattingAnalyzer>>,
) -> AppState {
    let mut config = PortalConfig::with_data_dir(dir.path());
    config.numbering = numbering;
    let db = Database::new(&config.database_path)
        .unwrap()
        .with_numbering(numbering);
    db.initialize().unwrap();
    AppState::new(config, db, analyzer)
}

pub fn upload_args(group_id: i64, chapter_number: i64, filename: &str, body: &[u8]) -> UploadChapterArgs {
    UploadChapterArgs {
        group_id,
        chapter_number,
        original_filename: filename.to_string(),
        bytes: Bytes::copy_from_slice(body),
        analyze: true,
    }
}

/// 네트워크 없이 고정 점수를 돌려주는 분석기
pub struct StubAnalyzer {
    pub calls: AtomicUsize,
    pub score: f64,
}

impl StubAnalyzer {
    pub fn new(score: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            score,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FormattingAnalyzer for StubAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> AnalysisResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.file_path.exists(), "analyzer must see the stored file");
        AnalysisResult {
            success: true,
            score: Some(self.score),
            summary: Some(format!("stub report for {}", request.filename)),
            recommendations: vec!["Use 1.5 line spacing".to_string()],
            raw_report: None,
            error_message: None,
            timestamp: 0,
        }
    }
}

/// 항상 실패하는 감사 싱크
pub struct BrokenAuditSink;

impl AuditSink for BrokenAuditSink {
    fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Store("audit table is read-only".to_string()))
    }
}

/// 로컬 목 분석 서비스. (endpoint, 호출 횟수) 반환
pub async fn spawn_analysis_service(
    status: StatusCode,
    body: &'static str,
) -> (Url, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/analyze-formatting",
        post(move |mut multipart: Multipart| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                while let Ok(Some(_field)) = multipart.next_field().await {}
                (status, body.to_string())
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let url = Url::parse(&format!("http://{}/analyze-formatting", addr)).unwrap();
    (url, hits)
}

pub fn http_analyzer(endpoint: Url) -> Arc<dyn FormattingAnalyzer> {
    let mut config = AnalyzerConfig::new(endpoint);
    config.connect_timeout = Duration::from_secs(2);
    config.request_timeout = Duration::from_secs(5);
    Arc::new(HttpFormattingAnalyzer::new(&config).unwrap())
}
