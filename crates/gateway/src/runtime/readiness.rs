//! Readiness gate.
//!
//! Pure predicate over session state deciding whether the final PDF may be
//! rendered. The renderer path refuses while `can_generate` is false; the
//! structured reason feeds the next-step UI actions.

use serde::Serialize;

use cvt_domain::session::SessionRecord;
use cvt_stages::proposal;
use cvt_validator::ValidationReport;

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub can_generate: bool,
    pub required_present: bool,
    pub confirmed_flags: bool,
    /// Everything still standing between the user and a PDF, in fix order.
    pub missing: Vec<String>,
}

/// Evaluate the gate. The validator report is passed in so callers can
/// reuse it in their response.
pub fn evaluate(record: &SessionRecord, validation: &ValidationReport) -> Readiness {
    let cv = &record.cv_data;
    let mut missing = Vec::new();

    if cv.work_experience.is_empty() {
        missing.push("work_experience".to_owned());
    }
    if cv.education.is_empty() {
        missing.push("education".to_owned());
    }
    if !record.metadata.confirmed_flags.contact_confirmed {
        missing.push("contact_confirmed".to_owned());
    }
    if !record.metadata.confirmed_flags.education_confirmed {
        missing.push("education_confirmed".to_owned());
    }
    if cv.full_name.is_empty() {
        missing.push("full_name".to_owned());
    }
    if cv.email.is_empty() {
        missing.push("email".to_owned());
    }
    if cv.phone.is_empty() {
        missing.push("phone".to_owned());
    }

    let required_present = !cv.full_name.is_empty()
        && !cv.email.is_empty()
        && !cv.phone.is_empty()
        && !cv.work_experience.is_empty()
        && !cv.education.is_empty();
    let confirmed_flags = record.metadata.confirmed_flags.contact_confirmed
        && record.metadata.confirmed_flags.education_confirmed;

    if !validation.ok {
        missing.push("validation".to_owned());
    }
    if proposal::any_preview_outstanding(record) {
        missing.push("pending_proposal".to_owned());
    }

    Readiness {
        can_generate: missing.is_empty(),
        required_present,
        confirmed_flags,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::cv::{EducationEntry, WorkRole};
    use cvt_domain::WizardStage;

    fn ready_record() -> SessionRecord {
        let mut r = SessionRecord::bootstrap(24, Utc::now());
        r.cv_data.full_name = "John Doe".into();
        r.cv_data.email = "j@d.com".into();
        r.cv_data.phone = "+1 555".into();
        r.cv_data.work_experience = vec![WorkRole {
            date_range: "2020–2024".into(),
            employer: "Acme".into(),
            location: None,
            title: "Eng".into(),
            bullets: vec!["Led team".into()],
        }];
        r.cv_data.education = vec![EducationEntry {
            date_range: "2016–2020".into(),
            institution: "MIT".into(),
            title: "BSc".into(),
            details: vec![],
        }];
        r.metadata.confirmed_flags.contact_confirmed = true;
        r.metadata.confirmed_flags.education_confirmed = true;
        r
    }

    #[test]
    fn fresh_session_is_blocked_with_full_missing_list() {
        let r = SessionRecord::bootstrap(24, Utc::now());
        let report = cvt_validator::validate(&r.cv_data);
        let readiness = evaluate(&r, &report);
        assert!(!readiness.can_generate);
        for expected in [
            "work_experience",
            "education",
            "contact_confirmed",
            "education_confirmed",
        ] {
            assert!(
                readiness.missing.iter().any(|m| m == expected),
                "missing should contain {expected}"
            );
        }
    }

    #[test]
    fn complete_confirmed_session_can_generate() {
        let r = ready_record();
        let report = cvt_validator::validate(&r.cv_data);
        let readiness = evaluate(&r, &report);
        assert!(readiness.can_generate, "missing: {:?}", readiness.missing);
        assert!(readiness.required_present);
        assert!(readiness.confirmed_flags);
    }

    #[test]
    fn outstanding_preview_blocks_generation() {
        let mut r = ready_record();
        proposal::set_preview(
            &mut r,
            WizardStage::WorkExperience,
            serde_json::json!({"roles": []}),
        );
        let report = cvt_validator::validate(&r.cv_data);
        let readiness = evaluate(&r, &report);
        assert!(!readiness.can_generate);
        assert!(readiness.missing.contains(&"pending_proposal".to_owned()));
    }
}
