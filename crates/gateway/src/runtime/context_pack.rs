//! Context pack builder.
//!
//! A bounded, phase-specific capsule of session state the client can show
//! to its conversation layer. Deterministic: pre-read state in, capped text
//! out, plus a machine-readable truncation report. Never authoritative —
//! the session record stays the single source of truth.

use serde::Serialize;
use serde_json::json;

use cvt_domain::session::SessionRecord;
use cvt_validator::ValidationReport;

use crate::runtime::readiness::Readiness;

/// Per-section character cap.
const MAX_PER_SECTION: usize = 2_000;
/// Cap on the whole capsule.
const TOTAL_MAX: usize = 8_000;

#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub name: String,
    pub chars: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextPack {
    /// Concatenated capsule text, section-tagged.
    pub text: String,
    pub sections: Vec<SectionReport>,
    pub truncated_total: bool,
}

fn truncate_section(content: &str) -> (String, bool) {
    if content.chars().count() <= MAX_PER_SECTION {
        (content.to_owned(), false)
    } else {
        let kept: String = content.chars().take(MAX_PER_SECTION).collect();
        (format!("{kept}\n[...truncated]"), true)
    }
}

/// Build the capsule for the session's current phase.
pub fn build(
    record: &SessionRecord,
    validation: &ValidationReport,
    gate: &Readiness,
) -> ContextPack {
    let cv = &record.cv_data;

    let mut sections: Vec<(String, String)> = Vec::new();

    sections.push((
        "progress".into(),
        format!(
            "stage: {}\nvisited: {}\nversion: {}",
            record.metadata.stage,
            record
                .metadata
                .stage_history
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" -> "),
            record.metadata.version,
        ),
    ));

    sections.push((
        "candidate".into(),
        format!(
            "name: {}\nemail: {}\nphone: {}\nroles: {}\neducation: {}\nskills: {}/{}",
            cv.full_name,
            cv.email,
            cv.phone,
            cv.work_experience.len(),
            cv.education.len(),
            cv.it_ai_skills.len(),
            cv.technical_operational_skills.len(),
        ),
    ));

    if let Some(summary) = &record.metadata.job_summary {
        sections.push((
            "job".into(),
            json!({
                "role_title": summary.get("role_title"),
                "company": summary.get("company"),
                "must_haves": summary.get("must_haves"),
            })
            .to_string(),
        ));
    }

    sections.push((
        "readiness".into(),
        format!(
            "can_generate: {}\nmissing: {}\nvalidation: {}",
            gate.can_generate,
            gate.missing.join(", "),
            validation.summary(),
        ),
    ));

    let mut text = String::new();
    let mut reports = Vec::new();
    let mut truncated_total = false;

    for (name, content) in sections {
        let (capped, truncated) = truncate_section(&content);
        let block = format!("## {name}\n{capped}\n\n");

        if text.chars().count() + block.chars().count() > TOTAL_MAX {
            truncated_total = true;
            reports.push(SectionReport {
                name,
                chars: 0,
                truncated: true,
            });
            continue;
        }
        reports.push(SectionReport {
            name,
            chars: capped.chars().count(),
            truncated,
        });
        text.push_str(&block);
    }

    ContextPack {
        text,
        sections: reports,
        truncated_total,
    }
}
