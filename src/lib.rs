//! Chapter Vault - 논문 챕터 제출 버전 관리 서버
//!
//! 챕터 파일 저장, 버전 원장(SQLite), 서식 분석 연동, 감사 로그를 담당합니다.

pub mod analysis;
pub mod audit;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::PortalConfig;
use crate::error::PortalResult;
use crate::state::AppState;

const DEFAULT_LOG_FILTER: &str = "chapter_vault=info,tower_http=info";

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

/// `RUST_LOG` 기반 로깅 초기화 (바이너리에서 한 번만 호출)
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// .env 파일을 먼저 읽어야 그 안의 `RUST_LOG`가 필터에 반영됨
pub fn bootstrap() {
    config::load_env_files();
    init_tracing();
}

/// 환경 설정을 읽어 서버를 기동 (`bootstrap` 이후 호출)
pub async fn run() -> PortalResult<()> {
    let config = PortalConfig::from_env()?;
    serve(config).await
}

pub async fn serve(config: PortalConfig) -> PortalResult<()> {
    let bind_addr = config.bind_addr;
    tracing::info!("Content root: {}", config.content_root.display());
    tracing::info!("Version numbering: {:?}", config.numbering);

    let state = Arc::new(AppState::from_config(config)?);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Chapter Vault listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_file_log_filter_is_applied() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "RUST_LOG=chapter_vault=trace\n").unwrap();

        std::env::remove_var("RUST_LOG");
        assert!(!log_filter().to_string().contains("chapter_vault=trace"));

        config::load_env_files_from(dir.path());
        assert!(log_filter().to_string().contains("chapter_vault=trace"));
        std::env::remove_var("RUST_LOG");
    }
}
