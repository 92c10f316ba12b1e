//! Chapter Vault Data Models
//!
//! 버전 원장, 분석 결과, 감사 이벤트의 Rust 데이터 모델

use serde::{Deserialize, Serialize};

/// (group, chapter) 단위의 버전 계보 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageKey {
    pub group_id: i64,
    pub chapter_number: i64,
}

impl LineageKey {
    pub fn new(group_id: i64, chapter_number: i64) -> Self {
        Self {
            group_id,
            chapter_number,
        }
    }
}

impl std::fmt::Display for LineageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group {} chapter {}", self.group_id, self.chapter_number)
    }
}

/// 제출된 챕터 버전 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterVersion {
    pub group_id: i64,
    pub chapter_number: i64,
    pub version: i64,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_sha256: String,
    pub is_current: bool,
    pub uploaded_at: i64,
}

impl ChapterVersion {
    pub fn lineage(&self) -> LineageKey {
        LineageKey::new(self.group_id, self.chapter_number)
    }

    /// 감사 로그에 남길 이름: 원본 파일명 → 저장 키 → "unknown"
    pub fn display_name(&self) -> &str {
        if !self.original_filename.trim().is_empty() {
            &self.original_filename
        } else if !self.file_path.trim().is_empty() {
            &self.file_path
        } else {
            "unknown"
        }
    }
}

/// 원장에 새 버전을 기록하기 위한 입력
#[derive(Debug, Clone)]
pub struct NewChapterVersion {
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_sha256: String,
}

/// 서식 분석 결과 (업로드된 버전 하나에 귀속)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub score: Option<f64>,
    pub summary: Option<String>,
    pub recommendations: Vec<String>,
    pub raw_report: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub timestamp: i64,
}

impl AnalysisResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            score: None,
            summary: None,
            recommendations: Vec::new(),
            raw_report: None,
            error_message: Some(message.into()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 요청 주체 정보 (세션 전역 상태 대신 명시적으로 전달)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: Option<String>,
    pub actor_name: String,
    pub actor_role: String,
    pub ip_address: Option<String>,
}

impl ActorContext {
    pub fn anonymous() -> Self {
        Self {
            actor_id: None,
            actor_name: "anonymous".to_string(),
            actor_role: "unknown".to_string(),
            ip_address: None,
        }
    }
}

impl Default for ActorContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "warning" => AuditSeverity::Warning,
            "error" => AuditSeverity::Error,
            _ => AuditSeverity::Info,
        }
    }
}

/// 감사 이벤트 (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: Option<String>,
    pub actor_name: String,
    pub actor_role: String,
    pub action_kind: String,
    pub category: String,
    pub details: String,
    pub severity: AuditSeverity,
    pub ip_address: Option<String>,
    pub created_at: i64,
}

impl AuditEvent {
    pub fn new(
        actor: &ActorContext,
        action_kind: &str,
        category: &str,
        details: String,
        severity: AuditSeverity,
    ) -> Self {
        Self {
            actor_id: actor.actor_id.clone(),
            actor_name: actor.actor_name.clone(),
            actor_role: actor.actor_role.clone(),
            action_kind: action_kind.to_string(),
            category: category.to_string(),
            details,
            severity,
            ip_address: actor.ip_address.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 저장된 감사 이벤트 (id 포함)
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    #[serde(flatten)]
    pub event: AuditEvent,
}
