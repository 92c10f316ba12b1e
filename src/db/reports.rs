//! 버전별 서식 분석 결과 저장

use rusqlite::{params, OptionalExtension};

use super::{is_constraint_violation, Database};
use crate::error::{PortalError, PortalResult};
use crate::models::{AnalysisResult, LineageKey};

impl Database {
    /// 분석 결과 저장 (같은 버전의 이전 결과는 덮어씀)
    pub fn save_analysis(
        &self,
        key: LineageKey,
        version: i64,
        result: &AnalysisResult,
    ) -> PortalResult<()> {
        let raw_report = result
            .raw_report
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO analysis_reports
                     (group_id, chapter_number, version, success, score, summary,
                      recommendations_json, raw_report_json, error_message, analyzed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    key.group_id,
                    key.chapter_number,
                    version,
                    result.success,
                    result.score,
                    result.summary,
                    serde_json::to_string(&result.recommendations)?,
                    raw_report,
                    result.error_message,
                    result.timestamp,
                ],
            )
            .map_err(|e| {
                // FK 위반 = 대상 버전이 이미 삭제됨
                if is_constraint_violation(&e) {
                    PortalError::VersionNotFound {
                        group_id: key.group_id,
                        chapter_number: key.chapter_number,
                        version,
                    }
                } else {
                    PortalError::Database(e)
                }
            })?;
        Ok(())
    }

    /// 저장된 분석 결과 조회
    pub fn load_analysis(&self, key: LineageKey, version: i64) -> PortalResult<Option<AnalysisResult>> {
        let row = self
            .conn
            .query_row(
                "SELECT success, score, summary, recommendations_json, raw_report_json,
                        error_message, analyzed_at
                 FROM analysis_reports
                 WHERE group_id = ?1 AND chapter_number = ?2 AND version = ?3",
                params![key.group_id, key.chapter_number, version],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((success, score, summary, recommendations_json, raw_report_json, error_message, timestamp)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(AnalysisResult {
            success,
            score,
            summary,
            recommendations: serde_json::from_str(&recommendations_json)?,
            raw_report: raw_report_json
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?,
            error_message,
            timestamp,
        }))
    }
}
