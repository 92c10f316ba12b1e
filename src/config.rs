//! Configuration
//!
//! 환경 변수(.env.local / .env 포함)에서 서비스 설정을 읽어옵니다.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::{PortalError, PortalResult};

const ENV_PREFIX: &str = "CHAPTER_VAULT_";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// 버전 번호 발급 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionNumbering {
    /// 삭제 후에도 번호를 재사용하지 않음 (계보별 카운터 유지)
    Monotonic,
    /// 남아있는 버전의 max + 1 (모두 삭제되면 1부터 다시 시작)
    ReuseAfterPurge,
}

impl VersionNumbering {
    fn parse(value: &str) -> PortalResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monotonic" => Ok(VersionNumbering::Monotonic),
            "reuse" | "reuse-after-purge" => Ok(VersionNumbering::ReuseAfterPurge),
            other => Err(PortalError::Config(format!(
                "unknown version numbering policy: {}",
                other
            ))),
        }
    }
}

/// 외부 서식 분석 서비스 설정
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl AnalyzerConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub bind_addr: SocketAddr,
    pub content_root: PathBuf,
    pub database_path: PathBuf,
    pub analyzer: Option<AnalyzerConfig>,
    pub numbering: VersionNumbering,
    pub max_upload_bytes: usize,
    /// 리버스 프록시 뒤에서만 true: X-Forwarded-For를 클라이언트 IP로 사용
    pub trust_forwarded_for: bool,
}

impl PortalConfig {
    /// data 디렉토리 하나 기준의 기본 설정 (테스트/임베딩용)
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            content_root: data_dir.join("uploads"),
            database_path: data_dir.join("chapter-vault.db"),
            analyzer: None,
            numbering: VersionNumbering::Monotonic,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            trust_forwarded_for: false,
        }
    }

    /// 프로세스 환경 변수에서 설정 로드
    pub fn from_env() -> PortalResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 key → value 조회 함수로부터 설정 구성
    pub fn from_lookup<F>(lookup: F) -> PortalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .map_err(|e| PortalError::Config(format!("invalid bind address {}: {}", bind_raw, e)))?;

        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));
        let mut config = Self::with_data_dir(&data_dir);
        config.bind_addr = bind_addr;

        if let Some(root) = get("CONTENT_ROOT") {
            config.content_root = PathBuf::from(root);
        }
        if let Some(db) = get("DB_PATH") {
            config.database_path = PathBuf::from(db);
        }
        if let Some(policy) = get("VERSION_NUMBERING") {
            config.numbering = VersionNumbering::parse(&policy)?;
        }
        if let Some(mb) = get("MAX_UPLOAD_MB") {
            let mb = parse_positive("MAX_UPLOAD_MB", &mb)?;
            config.max_upload_bytes = (mb as usize).saturating_mul(1024 * 1024);
        }

        if let Some(flag) = get("TRUST_PROXY") {
            config.trust_forwarded_for = parse_flag("TRUST_PROXY", &flag)?;
        }

        if let Some(raw_url) = get("ANALYZER_URL") {
            let endpoint = Url::parse(&raw_url)
                .map_err(|e| PortalError::Config(format!("invalid analyzer url {}: {}", raw_url, e)))?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(PortalError::Config(format!(
                    "analyzer url must be http or https: {}",
                    raw_url
                )));
            }

            let mut analyzer = AnalyzerConfig::new(endpoint);
            if let Some(secs) = get("ANALYZER_CONNECT_TIMEOUT_SECS") {
                analyzer.connect_timeout =
                    Duration::from_secs(parse_positive("ANALYZER_CONNECT_TIMEOUT_SECS", &secs)?);
            }
            if let Some(secs) = get("ANALYZER_TIMEOUT_SECS") {
                analyzer.request_timeout =
                    Duration::from_secs(parse_positive("ANALYZER_TIMEOUT_SECS", &secs)?);
            }
            config.analyzer = Some(analyzer);
        }

        Ok(config)
    }
}

fn parse_positive(name: &str, raw: &str) -> PortalResult<u64> {
    match raw.parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(PortalError::Config(format!(
            "{}{} must be a positive integer, got {:?}",
            ENV_PREFIX, name, raw
        ))),
    }
}

fn parse_flag(name: &str, raw: &str) -> PortalResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PortalError::Config(format!(
            "{}{} must be true or false, got {:?}",
            ENV_PREFIX, name, raw
        ))),
    }
}

fn find_upwards(start: PathBuf, filename: &str, max_hops: usize) -> Option<PathBuf> {
    let mut cur = start;
    for _ in 0..=max_hops {
        let candidate = cur.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        if !cur.pop() {
            break;
        }
    }
    None
}

/// .env.local → .env 순서로 로드 (이미 설정된 변수는 덮어쓰지 않음)
pub fn load_env_files() {
    if let Ok(cwd) = std::env::current_dir() {
        load_env_files_from(&cwd);
    }
}

/// `start`에서 위로 올라가며 .env 파일 탐색
pub fn load_env_files_from(start: &Path) {
    for name in [".env.local", ".env"] {
        if let Some(path) = find_upwards(start.to_path_buf(), name, 4) {
            match dotenvy::from_path(&path) {
                Ok(()) => tracing::debug!("loaded environment from {}", path.display()),
                Err(e) => tracing::warn!("failed to parse {}: {}", path.display(), e),
            }
        }
    }
}
