//! Compact correction path.
//!
//! When committed content violates a hard constraint (typically a user edit
//! that pushed a bullet over 200 chars), the engine sends only the
//! violations and the affected entries — not the whole session — and splices
//! the corrected entries back in place.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::cv::WorkRole;
use cvt_domain::error::Result;
use cvt_domain::session::SessionRecord;
use cvt_providers::{StageCall, StageCaller};
use cvt_validator::limits::{MAX_BULLET_LEN, MAX_WORK_BULLETS};
use cvt_validator::ValidationIssue;

use crate::prompts;

pub const STAGE: &str = "correction";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CorrectedRoles {
    #[serde(default)]
    roles: Vec<WorkRole>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "roles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date_range": { "type": "string" },
                        "employer": { "type": "string" },
                        "title": { "type": "string" },
                        "bullets": {
                            "type": "array",
                            "maxItems": MAX_WORK_BULLETS,
                            "items": { "type": "string", "maxLength": MAX_BULLET_LEN }
                        }
                    },
                    "required": ["date_range", "employer", "title", "bullets"]
                }
            }
        },
        "required": ["roles"]
    })
}

/// Indices of work roles an issue list touches (paths like
/// `work_experience[2].bullets[0]`).
fn affected_role_indices(issues: &[ValidationIssue]) -> Vec<usize> {
    let mut indices: Vec<usize> = issues
        .iter()
        .filter_map(|issue| {
            issue
                .field_path
                .strip_prefix("work_experience[")?
                .split(']')
                .next()?
                .parse()
                .ok()
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Fix the work roles the issues point at. Entries not named in the issues
/// are left untouched; the corrected ones are spliced back by index.
pub async fn correct_work_roles(
    caller: &StageCaller,
    record: &mut SessionRecord,
    issues: &[ValidationIssue],
) -> Result<usize> {
    let indices = affected_role_indices(issues);
    if indices.is_empty() {
        return Ok(0);
    }

    let affected: Vec<&WorkRole> = indices
        .iter()
        .filter_map(|&i| record.cv_data.work_experience.get(i))
        .collect();
    let payload = json!({
        "violations": issues
            .iter()
            .map(|i| format!("{} ({} over limit {})", i.message, i.excess, i.limit))
            .collect::<Vec<_>>(),
        "entries": affected,
    })
    .to_string();

    let expected = affected.len();
    let out = caller
        .call_stage::<CorrectedRoles, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::CORRECTION.to_owned(),
                payload,
                schema: schema(),
            },
            move |corrected| {
                let mut violations = Vec::new();
                if corrected.roles.len() != expected {
                    violations.push(format!(
                        "expected {expected} corrected entries, got {}",
                        corrected.roles.len()
                    ));
                }
                for (i, role) in corrected.roles.iter().enumerate() {
                    for (j, bullet) in role.bullets.iter().enumerate() {
                        let len = bullet.chars().count();
                        if len > MAX_BULLET_LEN {
                            violations.push(format!(
                                "roles[{i}].bullets[{j}] still {len} chars"
                            ));
                        }
                    }
                }
                violations
            },
        )
        .await?;

    for (slot, corrected) in indices.iter().zip(out.value.roles) {
        if let Some(role) = record.cv_data.work_experience.get_mut(*slot) {
            *role = corrected;
        }
    }
    record.push_provenance(out.provenance);
    Ok(indices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::config::LlmConfig;
    use cvt_providers::MockProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn only_affected_roles_are_rewritten() {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.work_experience = vec![
            WorkRole {
                date_range: "2020".into(),
                employer: "Acme".into(),
                location: None,
                title: "Eng".into(),
                bullets: vec!["fine".into()],
            },
            WorkRole {
                date_range: "2021".into(),
                employer: "Globex".into(),
                location: None,
                title: "Eng".into(),
                bullets: vec!["x".repeat(210)],
            },
        ];

        let report = cvt_validator::validate(&record.cv_data);
        let issues: Vec<ValidationIssue> = report
            .errors
            .iter()
            .filter(|e| e.field_path.starts_with("work_experience["))
            .cloned()
            .collect();
        assert_eq!(affected_role_indices(&issues), vec![1]);

        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({ "roles": [
                { "date_range": "2021", "employer": "Globex", "title": "Eng",
                  "bullets": ["trimmed"] }
            ]}),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        let fixed = correct_work_roles(&caller, &mut record, &issues)
            .await
            .unwrap();
        assert_eq!(fixed, 1);
        assert_eq!(record.cv_data.work_experience[0].bullets[0], "fine");
        assert_eq!(record.cv_data.work_experience[1].bullets[0], "trimmed");
    }
}
