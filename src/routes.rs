//! HTTP Routes
//!
//! 업로드/삭제 트리거와 조회용 엔드포인트

use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{
    ConnectInfo, DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State,
};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::analysis::DocumentFormat;
use crate::commands::{self, DeleteChapterArgs, DeleteEnvelope, UploadChapterArgs, UploadOutcome};
use crate::error::{PortalError, PortalResult};
use crate::models::{ActorContext, LineageKey};
use crate::state::AppState;
use crate::utils::sanitize_filename;

/// multipart 경계/헤더 여유분
const MULTIPART_OVERHEAD: usize = 64 * 1024;
const DEFAULT_AUDIT_LIMIT: usize = 50;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/groups/:group_id/chapters/:chapter_number/versions",
            get(list_versions).post(upload_version),
        )
        .route(
            "/api/groups/:group_id/chapters/:chapter_number/current",
            get(current_version),
        )
        .route(
            "/api/groups/:group_id/chapters/:chapter_number/versions/:version/file",
            get(download_version),
        )
        .route(
            "/api/groups/:group_id/chapters/:chapter_number/versions/:version/analysis",
            get(version_analysis),
        )
        .route(
            "/api/groups/:group_id/chapters/:chapter_number/analysis",
            post(reanalyze_current),
        )
        .route("/api/chapters/delete", post(delete_version))
        .route("/api/audit", get(list_audit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 요청 헤더와 소켓 주소로 요청 주체를 구성.
/// X-Forwarded-For는 신뢰할 수 있는 프록시 뒤에서만 사용합니다.
pub(crate) fn actor_from(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> ActorContext {
    let defaults = ActorContext::anonymous();
    let forwarded = if trust_forwarded_for {
        header_value(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty())
    } else {
        None
    };

    ActorContext {
        actor_id: header_value(headers, "x-actor-id"),
        actor_name: header_value(headers, "x-actor-name").unwrap_or(defaults.actor_name),
        actor_role: header_value(headers, "x-actor-role").unwrap_or(defaults.actor_role),
        ip_address: forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())),
    }
}

fn peer_addr(peer: Option<ConnectInfo<SocketAddr>>) -> Option<SocketAddr> {
    peer.map(|ConnectInfo(addr)| addr)
}

fn parse_flag(value: &str) -> PortalResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PortalError::InvalidRequest(format!(
            "analyze must be true or false, got '{}'",
            other
        ))),
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> PortalError {
    PortalError::InvalidRequest(format!("invalid multipart body: {}", e.body_text()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_version(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number)): Path<(i64, i64)>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    mut multipart: Multipart,
) -> PortalResult<Json<UploadOutcome>> {
    let actor = actor_from(&headers, peer_addr(peer), state.config.trust_forwarded_for);

    let mut file: Option<(String, Bytes)> = None;
    let mut analyze = true;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some((filename, data));
            }
            Some("analyze") => {
                let value = field.text().await.map_err(bad_multipart)?;
                analyze = parse_flag(&value)?;
            }
            _ => {}
        }
    }

    let (original_filename, bytes) = file
        .ok_or_else(|| PortalError::InvalidRequest("multipart field 'file' is required".to_string()))?;

    let outcome = commands::upload_chapter(
        &state,
        &actor,
        UploadChapterArgs {
            group_id,
            chapter_number,
            original_filename,
            bytes,
            analyze,
        },
    )
    .await?;
    Ok(Json(outcome))
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number)): Path<(i64, i64)>,
) -> PortalResult<Json<Value>> {
    let versions = commands::list_versions(&state, LineageKey::new(group_id, chapter_number)).await?;
    Ok(Json(json!({ "success": true, "versions": versions })))
}

async fn current_version(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number)): Path<(i64, i64)>,
) -> PortalResult<Json<Value>> {
    let current = commands::current_version(&state, LineageKey::new(group_id, chapter_number)).await?;
    Ok(Json(json!({ "success": true, "version": current })))
}

async fn download_version(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number, version)): Path<(i64, i64, i64)>,
) -> PortalResult<impl IntoResponse> {
    let key = LineageKey::new(group_id, chapter_number);
    let (row, bytes) = commands::download_version(&state, key, version).await?;

    let content_type = DocumentFormat::detect(FsPath::new(&row.original_filename))
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(row.display_name())
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn version_analysis(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number, version)): Path<(i64, i64, i64)>,
) -> PortalResult<Json<Value>> {
    let key = LineageKey::new(group_id, chapter_number);
    let analysis = commands::load_analysis(&state, key, version).await?;
    Ok(Json(json!({ "success": true, "version": version, "analysis": analysis })))
}

async fn reanalyze_current(
    State(state): State<Arc<AppState>>,
    Path((group_id, chapter_number)): Path<(i64, i64)>,
) -> PortalResult<Json<Value>> {
    let key = LineageKey::new(group_id, chapter_number);
    let (row, analysis) = commands::reanalyze_current(&state, key).await?;
    Ok(Json(json!({
        "success": true,
        "version": row.version,
        "analysis": analysis,
    })))
}

/// JSON 또는 form-encoded 본문에서 삭제 인자를 읽음
async fn parse_delete_args(request: Request) -> PortalResult<DeleteChapterArgs> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let Json(args) = Json::<DeleteChapterArgs>::from_request(request, &())
            .await
            .map_err(|e| PortalError::InvalidRequest(e.body_text()))?;
        Ok(args)
    } else {
        let Form(args) = Form::<DeleteChapterArgs>::from_request(request, &())
            .await
            .map_err(|e| PortalError::InvalidRequest(e.body_text()))?;
        Ok(args)
    }
}

/// 실패도 HTTP 200 + `{success:false, error}`로 응답
async fn delete_version(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Json<DeleteEnvelope> {
    let actor = actor_from(&headers, peer_addr(peer), state.config.trust_forwarded_for);
    let result = match parse_delete_args(request).await {
        Ok(args) => commands::delete_chapter(&state, &actor, args).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        tracing::warn!(code = e.code(), "delete request failed: {}", e);
    }
    Json(DeleteEnvelope::from(&result))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<usize>,
}

async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> PortalResult<Json<Value>> {
    let events =
        commands::list_audit_events(&state, query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT)).await?;
    Ok(Json(json!({ "success": true, "events": events })))
}
