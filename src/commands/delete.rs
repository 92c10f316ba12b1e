//! Delete Commands
//!
//! 버전 삭제: 조회 → 블롭 제거(best-effort) → 원장 삭제 + current 재계산 → 감사

use serde::{Deserialize, Serialize};

use crate::audit::{self, ACTION_DELETE, CATEGORY_CHAPTERS};
use crate::error::{PortalError, PortalResult};
use crate::models::{ActorContext, AuditEvent, AuditSeverity, ChapterVersion, LineageKey};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeleteChapterArgs {
    pub group_id: i64,
    pub chapter_number: i64,
    pub version: i64,
}

/// 삭제 결과. `deleted`가 None이면 이미 없던 버전 (멱등 no-op)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub deleted: Option<ChapterVersion>,
    pub current_version: Option<i64>,
}

/// 호환용 응답 봉투: 실패도 200으로 내보냄
#[derive(Debug, Clone, Serialize)]
pub struct DeleteEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PortalResult<DeleteReport>> for DeleteEnvelope {
    fn from(result: &PortalResult<DeleteReport>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// 챕터 버전 삭제
pub async fn delete_chapter(
    state: &AppState,
    actor: &ActorContext,
    args: DeleteChapterArgs,
) -> PortalResult<DeleteReport> {
    if args.group_id <= 0 || args.chapter_number <= 0 || args.version <= 0 {
        return Err(PortalError::InvalidRequest(format!(
            "group_id, chapter_number and version must be positive (got {}, {}, {})",
            args.group_id, args.chapter_number, args.version
        )));
    }
    let key = LineageKey::new(args.group_id, args.chapter_number);
    let version = args.version;

    let Some(existing) = state.db.run(move |db| db.find_version(key, version)).await? else {
        tracing::debug!("{} version {} already absent; nothing to delete", key, version);
        return not_found_report(state, key).await;
    };

    // 블롭 제거 실패는 원장 삭제를 막지 않음
    if let Err(e) = state.blobs.remove(&existing.file_path).await {
        tracing::warn!(
            "{} version {}: could not remove blob {}: {}",
            key,
            version,
            existing.file_path,
            e
        );
    }

    let Some(removal) = state.db.run(move |db| db.delete_version(key, version)).await? else {
        // 동시 삭제가 먼저 커밋됨
        tracing::debug!("{} version {} removed concurrently", key, version);
        return not_found_report(state, key).await;
    };

    tracing::info!(
        "{}: deleted version {}; current is now {:?}",
        key,
        version,
        removal.current_version
    );

    let details = format!(
        "Deleted chapter {} version {} ({}) for group {}",
        key.chapter_number,
        version,
        removal.removed.display_name(),
        key.group_id
    );
    audit::record_best_effort(
        state.audit.clone(),
        AuditEvent::new(actor, ACTION_DELETE, CATEGORY_CHAPTERS, details, AuditSeverity::Warning),
    )
    .await;

    Ok(DeleteReport {
        deleted: Some(removal.removed),
        current_version: removal.current_version,
    })
}

async fn not_found_report(state: &AppState, key: LineageKey) -> PortalResult<DeleteReport> {
    let current = state.db.run(move |db| db.current_version(key)).await?;
    Ok(DeleteReport {
        deleted: None,
        current_version: current.map(|row| row.version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shapes() {
        let ok: PortalResult<DeleteReport> = Ok(DeleteReport {
            deleted: None,
            current_version: None,
        });
        let json = serde_json::to_value(DeleteEnvelope::from(&ok)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));

        let err: PortalResult<DeleteReport> =
            Err(PortalError::InvalidRequest("version must be positive".to_string()));
        let json = serde_json::to_value(DeleteEnvelope::from(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid request: version must be positive");
    }
}
