//! Database Schema
//!
//! SQLite 테이블 스키마 정의

/// 데이터베이스 스키마 생성 SQL
pub const CREATE_SCHEMA: &str = r#"
-- 계보(group, chapter)별 마지막 발급 버전 번호
CREATE TABLE IF NOT EXISTS chapter_lineages (
    group_id INTEGER NOT NULL,
    chapter_number INTEGER NOT NULL,
    last_version INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_id, chapter_number)
);

-- 챕터 버전 테이블
CREATE TABLE IF NOT EXISTS chapter_versions (
    group_id INTEGER NOT NULL,
    chapter_number INTEGER NOT NULL,
    version INTEGER NOT NULL CHECK (version > 0),
    file_path TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    content_sha256 TEXT NOT NULL,
    is_current INTEGER NOT NULL DEFAULT 0 CHECK (is_current IN (0, 1)),
    uploaded_at INTEGER NOT NULL,
    PRIMARY KEY (group_id, chapter_number, version)
);

-- 계보당 current 행은 최대 1개
CREATE UNIQUE INDEX IF NOT EXISTS idx_chapter_versions_current
    ON chapter_versions(group_id, chapter_number) WHERE is_current = 1;

-- 버전별 서식 분석 결과
CREATE TABLE IF NOT EXISTS analysis_reports (
    group_id INTEGER NOT NULL,
    chapter_number INTEGER NOT NULL,
    version INTEGER NOT NULL,
    success INTEGER NOT NULL,
    score REAL,
    summary TEXT,
    recommendations_json TEXT NOT NULL,  -- JSON Array
    raw_report_json TEXT,
    error_message TEXT,
    analyzed_at INTEGER NOT NULL,
    PRIMARY KEY (group_id, chapter_number, version),
    FOREIGN KEY (group_id, chapter_number, version)
        REFERENCES chapter_versions(group_id, chapter_number, version) ON DELETE CASCADE
);

-- 감사 로그 (append-only)
CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id TEXT,
    actor_name TEXT NOT NULL,
    actor_role TEXT NOT NULL,
    action_kind TEXT NOT NULL,
    category TEXT NOT NULL,
    details TEXT NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('info', 'warning', 'error')),
    ip_address TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs(created_at);
CREATE INDEX IF NOT EXISTS idx_audit_logs_action ON audit_logs(action_kind);
"#;
