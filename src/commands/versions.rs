//! Version Query Commands
//!
//! 버전 목록/current/다운로드/저장된 분석 결과/재분석

use bytes::Bytes;

use super::upload::analyze_version;
use crate::error::{PortalError, PortalResult};
use crate::models::{AnalysisResult, ChapterVersion, LineageKey};
use crate::state::AppState;

fn check_key(key: LineageKey) -> PortalResult<()> {
    if key.group_id <= 0 || key.chapter_number <= 0 {
        return Err(PortalError::InvalidRequest(format!(
            "group_id and chapter_number must be positive (got {}, {})",
            key.group_id, key.chapter_number
        )));
    }
    Ok(())
}

/// 계보의 모든 버전 (최신순)
pub async fn list_versions(state: &AppState, key: LineageKey) -> PortalResult<Vec<ChapterVersion>> {
    check_key(key)?;
    state.db.run(move |db| db.list_versions(key)).await
}

/// 현재 버전. 버전이 없으면 LineageEmpty
pub async fn current_version(state: &AppState, key: LineageKey) -> PortalResult<ChapterVersion> {
    check_key(key)?;
    state
        .db
        .run(move |db| db.current_version(key))
        .await?
        .ok_or(PortalError::LineageEmpty {
            group_id: key.group_id,
            chapter_number: key.chapter_number,
        })
}

/// 특정 버전의 파일 내용
pub async fn download_version(
    state: &AppState,
    key: LineageKey,
    version: i64,
) -> PortalResult<(ChapterVersion, Bytes)> {
    check_key(key)?;
    let row = state.db.run(move |db| db.get_version(key, version)).await?;
    let bytes = state.blobs.read(&row.file_path).await?;
    if bytes.len() as i64 != row.file_size {
        tracing::warn!(
            "{} version {}: stored blob is {} bytes, ledger recorded {}",
            key,
            version,
            bytes.len(),
            row.file_size
        );
    }
    Ok((row, bytes))
}

/// 저장된 분석 결과. 버전은 있지만 분석 기록이 없으면 None
pub async fn load_analysis(
    state: &AppState,
    key: LineageKey,
    version: i64,
) -> PortalResult<Option<AnalysisResult>> {
    check_key(key)?;
    state
        .db
        .run(move |db| {
            db.get_version(key, version)?;
            db.load_analysis(key, version)
        })
        .await
}

/// 현재 버전을 다시 분석하고 결과를 저장
pub async fn reanalyze_current(
    state: &AppState,
    key: LineageKey,
) -> PortalResult<(ChapterVersion, AnalysisResult)> {
    if state.analyzer.is_none() {
        return Err(PortalError::InvalidRequest(
            "formatting analyzer is not configured".to_string(),
        ));
    }
    let row = current_version(state, key).await?;
    let result = analyze_version(state, &row)
        .await
        .ok_or_else(|| PortalError::Internal("formatting analyzer disappeared".to_string()))?;
    Ok((row, result))
}
