//! Database Module
//!
//! SQLite 기반 버전 원장(ledger) 관리

mod audit;
mod reports;
mod schema;
mod versions;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::config::VersionNumbering;
use crate::error::{PortalError, PortalResult};

pub use versions::VersionRemoval;

/// 다른 프로세스가 쓰기 잠금을 잡고 있을 때 대기할 최대 시간
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// 공유 데이터베이스 핸들 (요청 간 공유 상태)
#[derive(Clone)]
pub struct DbState(Arc<Mutex<Database>>);

impl DbState {
    pub fn new(db: Database) -> Self {
        Self(Arc::new(Mutex::new(db)))
    }

    /// 동기 잠금 (blocking 컨텍스트 전용)
    pub fn lock(&self) -> PortalResult<MutexGuard<'_, Database>> {
        self.0
            .lock()
            .map_err(|e| PortalError::Lock(format!("Failed to acquire database lock: {}", e)))
    }

    /// 원장 작업을 blocking 풀에서 실행합니다.
    /// 요청 future가 취소되어도 시작된 트랜잭션은 끝까지 실행되거나 롤백됩니다.
    pub async fn run<T, F>(&self, f: F) -> PortalResult<T>
    where
        F: FnOnce(&Database) -> PortalResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let db = state.lock()?;
            f(&db)
        })
        .await
        .map_err(|e| PortalError::Internal(format!("ledger task failed: {}", e)))?
    }
}

/// 데이터베이스 래퍼
pub struct Database {
    conn: Connection,
    numbering: VersionNumbering,
}

impl Database {
    /// 새 데이터베이스 연결 생성
    pub fn new(path: &Path) -> Result<Self, PortalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// 메모리 DB (테스트용)
    pub fn open_in_memory() -> Result<Self, PortalError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, PortalError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("sqlite journal mode: {}", mode);
        Ok(Self {
            conn,
            numbering: VersionNumbering::Monotonic,
        })
    }

    /// 버전 번호 발급 정책 지정
    pub fn with_numbering(mut self, numbering: VersionNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn numbering(&self) -> VersionNumbering {
        self.numbering
    }

    /// 데이터베이스 스키마 초기화
    pub fn initialize(&self) -> Result<(), PortalError> {
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        Ok(())
    }

    /// 쓰기 잠금을 즉시 획득하는 트랜잭션.
    /// read-then-write 시퀀스(번호 계산 + insert, delete + current 재계산)를 직렬화합니다.
    fn begin_immediate(&self) -> Result<Transaction<'_>, PortalError> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

/// 제약 조건 위반 여부
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
