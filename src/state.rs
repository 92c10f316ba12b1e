//! Application state shared across handlers

use std::sync::Arc;

use crate::analysis::{FormattingAnalyzer, HttpFormattingAnalyzer};
use crate::audit::{AuditSink, LedgerAuditSink};
use crate::config::PortalConfig;
use crate::db::{Database, DbState};
use crate::error::PortalResult;
use crate::storage::BlobStore;

pub struct AppState {
    pub config: PortalConfig,
    pub db: DbState,
    pub blobs: BlobStore,
    pub analyzer: Option<Arc<dyn FormattingAnalyzer>>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// 설정으로부터 DB, 저장소, 분석 클라이언트를 구성
    pub fn from_config(config: PortalConfig) -> PortalResult<Self> {
        std::fs::create_dir_all(&config.content_root)?;

        let db = Database::new(&config.database_path)?.with_numbering(config.numbering);
        db.initialize()?;
        tracing::info!("Ledger database ready at {}", config.database_path.display());

        let analyzer: Option<Arc<dyn FormattingAnalyzer>> = match &config.analyzer {
            Some(analyzer_config) => {
                let client = HttpFormattingAnalyzer::new(analyzer_config)?;
                tracing::info!("Formatting analyzer: {}", client.endpoint());
                Some(Arc::new(client))
            }
            None => {
                tracing::info!("Formatting analyzer not configured; uploads are not analyzed");
                None
            }
        };

        Ok(Self::new(config, db, analyzer))
    }

    /// 이미 열린 DB로 구성 (감사 로그는 같은 DB에 기록)
    pub fn new(
        config: PortalConfig,
        db: Database,
        analyzer: Option<Arc<dyn FormattingAnalyzer>>,
    ) -> Self {
        let db = DbState::new(db);
        let blobs = BlobStore::new(config.content_root.clone());
        let audit: Arc<dyn AuditSink> = Arc::new(LedgerAuditSink::new(db.clone()));
        Self {
            config,
            db,
            blobs,
            analyzer,
            audit,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
