//! Version Ledger
//!
//! (group, chapter) 계보별 버전 번호 발급과 current 플래그를 관리합니다.
//! - 계보에 버전이 하나 이상 있으면 current 행은 정확히 하나이며, 남은 버전 중 최대값입니다.
//! - Monotonic 정책에서는 삭제 이후에도 버전 번호를 재사용하지 않습니다.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{is_constraint_violation, Database};
use crate::config::VersionNumbering;
use crate::error::{PortalError, PortalResult};
use crate::models::{ChapterVersion, LineageKey, NewChapterVersion};

const VERSION_COLUMNS: &str = "group_id, chapter_number, version, file_path, original_filename, \
     file_size, content_sha256, is_current, uploaded_at";

/// 삭제 결과: 지워진 행과 재계산된 current 버전
#[derive(Debug, Clone)]
pub struct VersionRemoval {
    pub removed: ChapterVersion,
    pub current_version: Option<i64>,
}

fn map_version(row: &Row<'_>) -> rusqlite::Result<ChapterVersion> {
    Ok(ChapterVersion {
        group_id: row.get(0)?,
        chapter_number: row.get(1)?,
        version: row.get(2)?,
        file_path: row.get(3)?,
        original_filename: row.get(4)?,
        file_size: row.get(5)?,
        content_sha256: row.get(6)?,
        is_current: row.get(7)?,
        uploaded_at: row.get(8)?,
    })
}

fn next_version_in(
    conn: &Connection,
    key: LineageKey,
    numbering: VersionNumbering,
) -> PortalResult<i64> {
    let max_existing: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM chapter_versions
         WHERE group_id = ?1 AND chapter_number = ?2",
        params![key.group_id, key.chapter_number],
        |row| row.get(0),
    )?;

    let last_issued = match numbering {
        VersionNumbering::Monotonic => conn
            .query_row(
                "SELECT last_version FROM chapter_lineages
                 WHERE group_id = ?1 AND chapter_number = ?2",
                params![key.group_id, key.chapter_number],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .unwrap_or(0),
        VersionNumbering::ReuseAfterPurge => 0,
    };

    Ok(max_existing.max(last_issued) + 1)
}

fn find_version_in(
    conn: &Connection,
    key: LineageKey,
    version: i64,
) -> PortalResult<Option<ChapterVersion>> {
    let sql = format!(
        "SELECT {} FROM chapter_versions
         WHERE group_id = ?1 AND chapter_number = ?2 AND version = ?3",
        VERSION_COLUMNS
    );
    let row = conn
        .query_row(
            &sql,
            params![key.group_id, key.chapter_number, version],
            map_version,
        )
        .optional()?;
    Ok(row)
}

fn insert_version_in(
    conn: &Connection,
    key: LineageKey,
    version: i64,
    numbering: VersionNumbering,
    new: &NewChapterVersion,
) -> PortalResult<ChapterVersion> {
    let expected = next_version_in(conn, key, numbering)?;
    if version < expected {
        return Err(PortalError::Conflict(format!(
            "{} version {} already issued (next is {})",
            key, version, expected
        )));
    }

    // 형제 버전의 current 해제 → 새 행을 current로 삽입 (partial unique index 순서 보장)
    conn.execute(
        "UPDATE chapter_versions SET is_current = 0
         WHERE group_id = ?1 AND chapter_number = ?2 AND is_current = 1",
        params![key.group_id, key.chapter_number],
    )?;

    let uploaded_at = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO chapter_versions
             (group_id, chapter_number, version, file_path, original_filename,
              file_size, content_sha256, is_current, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
        params![
            key.group_id,
            key.chapter_number,
            version,
            new.file_path,
            new.original_filename,
            new.file_size,
            new.content_sha256,
            uploaded_at,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            PortalError::Conflict(format!("{} version {} already exists", key, version))
        } else {
            PortalError::Database(e)
        }
    })?;

    conn.execute(
        "INSERT INTO chapter_lineages (group_id, chapter_number, last_version)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(group_id, chapter_number)
         DO UPDATE SET last_version = MAX(last_version, excluded.last_version)",
        params![key.group_id, key.chapter_number, version],
    )?;

    Ok(ChapterVersion {
        group_id: key.group_id,
        chapter_number: key.chapter_number,
        version,
        file_path: new.file_path.clone(),
        original_filename: new.original_filename.clone(),
        file_size: new.file_size,
        content_sha256: new.content_sha256.clone(),
        is_current: true,
        uploaded_at,
    })
}

/// 남은 버전 중 최대값을 current로 지정. 남은 버전이 없으면 None.
fn recompute_current_in(conn: &Connection, key: LineageKey) -> PortalResult<Option<i64>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM chapter_versions
         WHERE group_id = ?1 AND chapter_number = ?2",
        params![key.group_id, key.chapter_number],
        |row| row.get(0),
    )?;

    let Some(max) = max else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE chapter_versions SET is_current = 0
         WHERE group_id = ?1 AND chapter_number = ?2 AND is_current = 1 AND version <> ?3",
        params![key.group_id, key.chapter_number, max],
    )?;
    conn.execute(
        "UPDATE chapter_versions SET is_current = 1
         WHERE group_id = ?1 AND chapter_number = ?2 AND version = ?3",
        params![key.group_id, key.chapter_number, max],
    )?;
    Ok(Some(max))
}

impl Database {
    /// 다음에 발급될 버전 번호 (조회 전용)
    pub fn next_version(&self, key: LineageKey) -> PortalResult<i64> {
        next_version_in(&self.conn, key, self.numbering)
    }

    /// 지정한 번호로 버전을 삽입하고 current로 만듭니다.
    /// 이미 발급된 번호이거나 최신이 아니면 Conflict.
    pub fn insert_version(
        &self,
        key: LineageKey,
        version: i64,
        new: &NewChapterVersion,
    ) -> PortalResult<ChapterVersion> {
        if version <= 0 {
            return Err(PortalError::InvalidRequest(format!(
                "version must be positive, got {}",
                version
            )));
        }
        let tx = self.begin_immediate()?;
        let row = insert_version_in(&tx, key, version, self.numbering, new)?;
        tx.commit()?;
        Ok(row)
    }

    /// 번호 계산과 삽입을 하나의 트랜잭션으로 수행합니다.
    pub fn insert_next_version(
        &self,
        key: LineageKey,
        new: &NewChapterVersion,
    ) -> PortalResult<ChapterVersion> {
        let tx = self.begin_immediate()?;
        let version = next_version_in(&tx, key, self.numbering)?;
        let row = insert_version_in(&tx, key, version, self.numbering, new)?;
        tx.commit()?;
        tracing::debug!("{} issued version {}", key, row.version);
        Ok(row)
    }

    pub fn find_version(&self, key: LineageKey, version: i64) -> PortalResult<Option<ChapterVersion>> {
        find_version_in(&self.conn, key, version)
    }

    /// 버전 조회 (없으면 VersionNotFound)
    pub fn get_version(&self, key: LineageKey, version: i64) -> PortalResult<ChapterVersion> {
        self.find_version(key, version)?
            .ok_or(PortalError::VersionNotFound {
                group_id: key.group_id,
                chapter_number: key.chapter_number,
                version,
            })
    }

    /// 계보의 current 버전
    pub fn current_version(&self, key: LineageKey) -> PortalResult<Option<ChapterVersion>> {
        let sql = format!(
            "SELECT {} FROM chapter_versions
             WHERE group_id = ?1 AND chapter_number = ?2 AND is_current = 1",
            VERSION_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![key.group_id, key.chapter_number], map_version)
            .optional()?;
        Ok(row)
    }

    /// 계보의 모든 버전 (최신순)
    pub fn list_versions(&self, key: LineageKey) -> PortalResult<Vec<ChapterVersion>> {
        let sql = format!(
            "SELECT {} FROM chapter_versions
             WHERE group_id = ?1 AND chapter_number = ?2
             ORDER BY version DESC",
            VERSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let iter = stmt.query_map(params![key.group_id, key.chapter_number], map_version)?;
        let mut out = Vec::new();
        for row in iter {
            out.push(row?);
        }
        Ok(out)
    }

    /// 버전 삭제 + current 재계산 (단일 트랜잭션).
    /// 행이 없으면 Ok(None) — 호출자는 이를 멱등 삭제로 취급합니다.
    pub fn delete_version(&self, key: LineageKey, version: i64) -> PortalResult<Option<VersionRemoval>> {
        let tx = self.begin_immediate()?;
        let Some(removed) = find_version_in(&tx, key, version)? else {
            return Ok(None);
        };

        tx.execute(
            "DELETE FROM analysis_reports
             WHERE group_id = ?1 AND chapter_number = ?2 AND version = ?3",
            params![key.group_id, key.chapter_number, version],
        )?;
        tx.execute(
            "DELETE FROM chapter_versions
             WHERE group_id = ?1 AND chapter_number = ?2 AND version = ?3",
            params![key.group_id, key.chapter_number, version],
        )?;
        let current_version = recompute_current_in(&tx, key)?;
        tx.commit()?;

        Ok(Some(VersionRemoval {
            removed,
            current_version,
        }))
    }
}
