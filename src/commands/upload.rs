//! Upload Commands
//!
//! 챕터 업로드 오케스트레이션:
//! Received → Stored → Versioned → [Analyzed] → Audited → Complete

use std::future::Future;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::analysis::AnalysisRequest;
use crate::audit::{self, ACTION_UPLOAD, CATEGORY_CHAPTERS};
use crate::error::{PortalError, PortalResult};
use crate::models::{
    ActorContext, AnalysisResult, AuditEvent, AuditSeverity, ChapterVersion, LineageKey,
    NewChapterVersion,
};
use crate::state::AppState;
use crate::storage::BlobStore;

#[derive(Debug, Clone)]
pub struct UploadChapterArgs {
    pub group_id: i64,
    pub chapter_number: i64,
    pub original_filename: String,
    pub bytes: Bytes,
    /// false면 분석기를 호출하지 않음
    pub analyze: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub group_id: i64,
    pub chapter_number: i64,
    pub version: i64,
    pub is_current: bool,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
}

fn validate(state: &AppState, args: &UploadChapterArgs) -> PortalResult<()> {
    if args.group_id <= 0 {
        return Err(PortalError::InvalidRequest(format!(
            "group_id must be positive, got {}",
            args.group_id
        )));
    }
    if args.chapter_number <= 0 {
        return Err(PortalError::InvalidRequest(format!(
            "chapter_number must be positive, got {}",
            args.chapter_number
        )));
    }
    if args.original_filename.trim().is_empty() {
        return Err(PortalError::InvalidRequest("filename is required".to_string()));
    }
    if args.bytes.is_empty() {
        return Err(PortalError::InvalidRequest("uploaded file is empty".to_string()));
    }
    let max = state.config.max_upload_bytes;
    if args.bytes.len() > max {
        return Err(PortalError::InvalidRequest(format!(
            "file too large: {}MB (max {}MB)",
            args.bytes.len() / (1024 * 1024),
            max / (1024 * 1024)
        )));
    }
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Conflict이면 한 번만 다시 시도. 두 번째 Conflict는 그대로 반환
async fn retry_on_conflict<T, F, Fut>(key: LineageKey, mut attempt: F) -> PortalResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortalResult<T>>,
{
    match attempt().await {
        Err(e) if e.is_conflict() => {
            tracing::warn!("{}: {}; retrying with a fresh version number", key, e);
            attempt().await
        }
        other => other,
    }
}

async fn insert_with_retry(
    state: &AppState,
    key: LineageKey,
    new: NewChapterVersion,
) -> PortalResult<ChapterVersion> {
    retry_on_conflict(key, move || {
        let new = new.clone();
        state.db.run(move |db| db.insert_next_version(key, &new))
    })
    .await
}

/// 분석기 호출 + 결과 저장 (둘 다 best-effort). 분석기가 없으면 None.
pub(crate) async fn analyze_version(
    state: &AppState,
    row: &ChapterVersion,
) -> Option<AnalysisResult> {
    let analyzer = state.analyzer.clone()?;

    let result = match state.blobs.locate(&row.file_path) {
        Ok(path) => {
            analyzer
                .analyze(AnalysisRequest {
                    file_path: &path,
                    filename: &row.original_filename,
                    chapter_number: row.chapter_number,
                })
                .await
        }
        Err(e) => AnalysisResult::failed(e.to_string()),
    };

    let key = row.lineage();
    let version = row.version;
    let stored = result.clone();
    if let Err(e) = state
        .db
        .run(move |db| db.save_analysis(key, version, &stored))
        .await
    {
        tracing::warn!("{} version {}: analysis result not persisted: {}", key, version, e);
    }

    Some(result)
}

/// 챕터 파일 업로드
pub async fn upload_chapter(
    state: &AppState,
    actor: &ActorContext,
    args: UploadChapterArgs,
) -> PortalResult<UploadOutcome> {
    validate(state, &args)?;
    let key = LineageKey::new(args.group_id, args.chapter_number);
    let original_filename = args.original_filename.trim().to_string();

    // Stored: 실패 시 원장 변경 없이 중단
    let storage_key = BlobStore::chapter_key(key.group_id, key.chapter_number, &original_filename);
    state.blobs.put(&storage_key, &args.bytes).await?;

    let new = NewChapterVersion {
        file_path: storage_key.clone(),
        original_filename,
        file_size: args.bytes.len() as i64,
        content_sha256: sha256_hex(&args.bytes),
    };

    // Versioned
    let row = match insert_with_retry(state, key, new).await {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("{}: ledger insert failed after storing {}: {}", key, storage_key, e);
            if let Err(cleanup) = state.blobs.remove(&storage_key).await {
                tracing::error!("orphaned blob {} could not be removed: {}", storage_key, cleanup);
            }
            return Err(e);
        }
    };
    tracing::info!(
        "{}: stored version {} ({}, {} bytes)",
        key,
        row.version,
        row.original_filename,
        row.file_size
    );

    // Analyzed
    let analysis = if args.analyze {
        analyze_version(state, &row).await
    } else {
        None
    };

    // Audited
    let details = format!(
        "Uploaded chapter {} version {} ({}) for group {}",
        row.chapter_number, row.version, row.original_filename, row.group_id
    );
    audit::record_best_effort(
        state.audit.clone(),
        AuditEvent::new(actor, ACTION_UPLOAD, CATEGORY_CHAPTERS, details, AuditSeverity::Info),
    )
    .await;

    Ok(UploadOutcome {
        success: true,
        group_id: row.group_id,
        chapter_number: row.chapter_number,
        version: row.version,
        is_current: row.is_current,
        file_path: row.file_path,
        original_filename: row.original_filename,
        file_size: row.file_size,
        content_sha256: row.content_sha256,
        analysis,
    })
}
