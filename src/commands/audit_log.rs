//! Audit Log Commands

use crate::error::{PortalError, PortalResult};
use crate::models::AuditRecord;
use crate::state::AppState;

pub const MAX_AUDIT_PAGE: usize = 500;

/// 최근 감사 이벤트 (최신순)
pub async fn list_audit_events(state: &AppState, limit: usize) -> PortalResult<Vec<AuditRecord>> {
    if limit == 0 || limit > MAX_AUDIT_PAGE {
        return Err(PortalError::InvalidRequest(format!(
            "limit must be between 1 and {}",
            MAX_AUDIT_PAGE
        )));
    }
    state.db.run(move |db| db.list_audit_events(limit)).await
}
