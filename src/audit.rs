//! Audit Sink
//!
//! 업로드/삭제 라이프사이클 이벤트를 append-only 로그로 남깁니다.
//! 기록 실패는 진단 로그로만 남기고 호출자에게 전파하지 않습니다.

use std::sync::Arc;

use thiserror::Error;

use crate::db::DbState;
use crate::models::AuditEvent;

pub const CATEGORY_CHAPTERS: &str = "chapter_submission";
pub const ACTION_UPLOAD: &str = "upload_chapter";
pub const ACTION_DELETE: &str = "delete_chapter";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store unavailable: {0}")]
    Store(String),
}

/// 감사 이벤트 기록 인터페이스
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// `audit_logs` 테이블에 기록하는 기본 구현
pub struct LedgerAuditSink {
    db: DbState,
}

impl LedgerAuditSink {
    pub fn new(db: DbState) -> Self {
        Self { db }
    }
}

impl AuditSink for LedgerAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let db = self.db.lock().map_err(|e| AuditError::Store(e.to_string()))?;
        db.insert_audit_event(event)
            .map(|_| ())
            .map_err(|e| AuditError::Store(e.to_string()))
    }
}

/// fire-and-forget 기록. 주 작업이 커밋된 뒤에만 호출합니다.
pub async fn record_best_effort(sink: Arc<dyn AuditSink>, event: AuditEvent) {
    let action = event.action_kind.clone();
    match tokio::task::spawn_blocking(move || sink.record(&event)).await {
        Ok(Ok(())) => tracing::debug!("audit event recorded: {}", action),
        Ok(Err(e)) => tracing::warn!("audit event {} dropped: {}", action, e),
        Err(e) => tracing::warn!("audit task for {} failed: {}", action, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ActorContext, AuditSeverity};

    struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Store("disk full".to_string()))
        }
    }

    fn sample_event(details: &str) -> AuditEvent {
        let actor = ActorContext {
            actor_id: Some("7".to_string()),
            actor_name: "Lee".to_string(),
            actor_role: "student".to_string(),
            ip_address: Some("192.168.0.10".to_string()),
        };
        AuditEvent::new(&actor, ACTION_UPLOAD, CATEGORY_CHAPTERS, details.to_string(), AuditSeverity::Info)
    }

    #[tokio::test]
    async fn test_ledger_sink_appends_events() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let state = DbState::new(db);
        let sink: Arc<dyn AuditSink> = Arc::new(LedgerAuditSink::new(state.clone()));

        record_best_effort(sink.clone(), sample_event("first")).await;
        record_best_effort(sink, sample_event("second")).await;

        let events = state.lock().unwrap().list_audit_events(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.details, "second");
        assert_eq!(events[1].event.details, "first");
        assert_eq!(events[0].event.actor_name, "Lee");
        assert_eq!(events[0].event.severity, AuditSeverity::Info);
        assert!(events[0].id > events[1].id);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        record_best_effort(Arc::new(BrokenSink), sample_event("lost")).await;
    }
}
