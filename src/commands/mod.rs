//! Chapter Vault Commands
//!
//! HTTP 핸들러가 호출하는 라이프사이클 오케스트레이터

pub mod audit_log;
pub mod delete;
pub mod upload;
pub mod versions;

pub use audit_log::list_audit_events;
pub use delete::{delete_chapter, DeleteChapterArgs, DeleteEnvelope, DeleteReport};
pub use upload::{upload_chapter, UploadChapterArgs, UploadOutcome};
pub use versions::{current_version, download_version, list_versions, load_analysis, reanalyze_current};
