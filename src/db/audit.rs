//! 감사 로그 테이블 (append-only)

use rusqlite::params;

use super::Database;
use crate::error::PortalResult;
use crate::models::{AuditEvent, AuditRecord, AuditSeverity};

impl Database {
    /// 감사 이벤트 추가. 새 행 id 반환.
    pub fn insert_audit_event(&self, event: &AuditEvent) -> PortalResult<i64> {
        self.conn.execute(
            "INSERT INTO audit_logs
                 (actor_id, actor_name, actor_role, action_kind, category, details,
                  severity, ip_address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.actor_id,
                event.actor_name,
                event.actor_role,
                event.action_kind,
                event.category,
                event.details,
                event.severity.as_str(),
                event.ip_address,
                event.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 최근 감사 이벤트 (최신순)
    pub fn list_audit_events(&self, limit: usize) -> PortalResult<Vec<AuditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, actor_id, actor_name, actor_role, action_kind, category, details,
                    severity, ip_address, created_at
             FROM audit_logs ORDER BY id DESC LIMIT ?1",
        )?;

        let iter = stmt.query_map([limit as i64], |row| {
            let severity: String = row.get(7)?;
            Ok(AuditRecord {
                id: row.get(0)?,
                event: AuditEvent {
                    actor_id: row.get(1)?,
                    actor_name: row.get(2)?,
                    actor_role: row.get(3)?,
                    action_kind: row.get(4)?,
                    category: row.get(5)?,
                    details: row.get(6)?,
                    severity: AuditSeverity::parse(&severity),
                    ip_address: row.get(8)?,
                    created_at: row.get(9)?,
                },
            })
        })?;

        let mut out = Vec::new();
        for row in iter {
            out.push(row?);
        }
        Ok(out)
    }
}
