//! Canonical schema validator.
//!
//! Pure and deterministic: no I/O, no LLM. Enforces required-field presence,
//! per-field length limits, per-section count caps, bullet caps, and the
//! additive page-fit model. Warnings never block generation; errors do.

pub mod height;
pub mod limits;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cvt_domain::cv::CvData;
use limits::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Report types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One violation or warning, addressable by field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path, e.g. `work_experience[0].bullets[2]`.
    pub field_path: String,
    pub current: usize,
    pub limit: usize,
    pub excess: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn over(field_path: impl Into<String>, current: usize, limit: usize, what: &str) -> Self {
        let field_path = field_path.into();
        Self {
            message: format!("{field_path}: {what} is {current}, limit {limit}"),
            suggestion: Some(format!("shorten {field_path} by {}", current - limit)),
            field_path,
            current,
            limit,
            excess: current - limit,
        }
    }

    fn required(field_path: impl Into<String>, what: &str) -> Self {
        let field_path = field_path.into();
        Self {
            message: format!("{field_path}: {what} is required"),
            suggestion: Some(format!("provide {field_path}")),
            field_path,
            current: 0,
            limit: 1,
            excess: 0,
        }
    }
}

/// Validator output. `ok` means no errors; warnings may still be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub estimated_pages: f32,
}

impl ValidationReport {
    /// Field-level details for the error response shape.
    pub fn details_json(&self) -> Value {
        serde_json::to_value(&self.errors).unwrap_or_default()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} error(s), {} warning(s), ~{:.1} pages",
            self.errors.len(),
            self.warnings.len(),
            self.estimated_pages
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// validate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate the canonical résumé against the limits table and the two-page
/// budget.
pub fn validate(cv: &CvData) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // ── Required contact fields ────────────────────────────────────
    check_required_text(
        "full_name",
        &cv.full_name,
        MAX_FULL_NAME,
        &mut errors,
    );
    check_required_text("email", &cv.email, MAX_EMAIL, &mut errors);
    if cv.email.chars().count() > 0 && !cv.email.contains('@') {
        errors.push(ValidationIssue {
            field_path: "email".into(),
            current: cv.email.chars().count(),
            limit: MAX_EMAIL,
            excess: 0,
            message: "email: not a valid address".into(),
            suggestion: Some("provide an address like name@example.com".into()),
        });
    }
    let phone_len = cv.phone.chars().count();
    if phone_len == 0 {
        errors.push(ValidationIssue::required("phone", "phone number"));
    } else if phone_len < MIN_PHONE {
        errors.push(ValidationIssue {
            field_path: "phone".into(),
            current: phone_len,
            limit: MIN_PHONE,
            excess: 0,
            message: format!("phone: {phone_len} chars is shorter than {MIN_PHONE}"),
            suggestion: Some("provide a full phone number".into()),
        });
    } else if phone_len > MAX_PHONE {
        errors.push(ValidationIssue::over("phone", phone_len, MAX_PHONE, "length"));
    }

    // ── Optional scalar fields ─────────────────────────────────────
    if cv.address_lines.len() > MAX_ADDRESS_LINES {
        errors.push(ValidationIssue::over(
            "address_lines",
            cv.address_lines.len(),
            MAX_ADDRESS_LINES,
            "item count",
        ));
    }
    for (i, line) in cv.address_lines.iter().enumerate() {
        check_max_len(
            format!("address_lines[{i}]"),
            line,
            MAX_ADDRESS_LINE_LEN,
            &mut errors,
        );
    }

    let profile_len = cv.profile.chars().count();
    if profile_len > 0 {
        if profile_len < MIN_PROFILE {
            warnings.push(ValidationIssue {
                field_path: "profile".into(),
                current: profile_len,
                limit: MIN_PROFILE,
                excess: 0,
                message: format!("profile: {profile_len} chars is shorter than {MIN_PROFILE}"),
                suggestion: Some("expand the profile to 2–3 sentences".into()),
            });
        } else if profile_len > MAX_PROFILE {
            errors.push(ValidationIssue::over(
                "profile",
                profile_len,
                MAX_PROFILE,
                "length",
            ));
        }
    }

    // ── Work experience ────────────────────────────────────────────
    if cv.work_experience.is_empty() {
        errors.push(ValidationIssue::required(
            "work_experience",
            "at least one role",
        ));
    } else if cv.work_experience.len() > MAX_WORK_ROLES {
        errors.push(ValidationIssue::over(
            "work_experience",
            cv.work_experience.len(),
            MAX_WORK_ROLES,
            "item count",
        ));
    }
    for (i, role) in cv.work_experience.iter().enumerate() {
        let path = format!("work_experience[{i}]");
        if role.bullets.is_empty() {
            errors.push(ValidationIssue::required(
                format!("{path}.bullets"),
                "at least one bullet",
            ));
        } else if role.bullets.len() > MAX_WORK_BULLETS {
            errors.push(ValidationIssue::over(
                format!("{path}.bullets"),
                role.bullets.len(),
                MAX_WORK_BULLETS,
                "bullet count",
            ));
        }
        for (j, bullet) in role.bullets.iter().enumerate() {
            check_bullet(
                format!("{path}.bullets[{j}]"),
                bullet,
                &mut errors,
                &mut warnings,
            );
        }
    }

    // ── Further experience ─────────────────────────────────────────
    if cv.further_experience.len() > MAX_FURTHER_PROJECTS {
        errors.push(ValidationIssue::over(
            "further_experience",
            cv.further_experience.len(),
            MAX_FURTHER_PROJECTS,
            "item count",
        ));
    }
    for (i, project) in cv.further_experience.iter().enumerate() {
        let path = format!("further_experience[{i}]");
        if project.bullets.len() > MAX_PROJECT_BULLETS {
            errors.push(ValidationIssue::over(
                format!("{path}.bullets"),
                project.bullets.len(),
                MAX_PROJECT_BULLETS,
                "bullet count",
            ));
        }
        for (j, bullet) in project.bullets.iter().enumerate() {
            check_bullet(
                format!("{path}.bullets[{j}]"),
                bullet,
                &mut errors,
                &mut warnings,
            );
        }
    }

    // ── Education ──────────────────────────────────────────────────
    if cv.education.is_empty() {
        errors.push(ValidationIssue::required(
            "education",
            "at least one entry",
        ));
    } else if cv.education.len() > MAX_EDUCATION_ENTRIES {
        errors.push(ValidationIssue::over(
            "education",
            cv.education.len(),
            MAX_EDUCATION_ENTRIES,
            "item count",
        ));
    }
    for (i, entry) in cv.education.iter().enumerate() {
        if entry.details.len() > MAX_EDUCATION_DETAILS {
            errors.push(ValidationIssue::over(
                format!("education[{i}].details"),
                entry.details.len(),
                MAX_EDUCATION_DETAILS,
                "detail count",
            ));
        }
    }

    // ── Languages & skills ─────────────────────────────────────────
    if cv.languages.len() > MAX_LANGUAGES {
        errors.push(ValidationIssue::over(
            "languages",
            cv.languages.len(),
            MAX_LANGUAGES,
            "item count",
        ));
    }
    check_skill_list("it_ai_skills", &cv.it_ai_skills, &mut errors, &mut warnings);
    check_skill_list(
        "technical_operational_skills",
        &cv.technical_operational_skills,
        &mut errors,
        &mut warnings,
    );

    // ── Bounded optional lists ─────────────────────────────────────
    for (name, list) in [
        ("certifications", &cv.certifications),
        ("trainings", &cv.trainings),
        ("publications", &cv.publications),
        ("references", &cv.references),
        ("interests", &cv.interests),
    ] {
        if list.len() > MAX_OPTIONAL_LIST_ITEMS {
            errors.push(ValidationIssue::over(
                name,
                list.len(),
                MAX_OPTIONAL_LIST_ITEMS,
                "item count",
            ));
        }
        for (i, item) in list.iter().enumerate() {
            check_max_len(
                format!("{name}[{i}]"),
                item,
                MAX_OPTIONAL_ITEM_LEN,
                &mut errors,
            );
        }
    }

    // ── Page fit ───────────────────────────────────────────────────
    let estimated_pages = height::estimate_pages(cv);
    let overflow = height::overflow_mm(cv);
    if overflow > 0.0 {
        errors.push(ValidationIssue {
            field_path: "(document)".into(),
            current: height::estimate_mm(cv) as usize,
            limit: (height::USABLE_TWO_PAGES_MM - height::BUFFER_MM) as usize,
            excess: overflow as usize,
            message: format!(
                "content exceeds the two-page budget by ~{overflow:.0} mm (~{estimated_pages:.1} pages)"
            ),
            suggestion: Some("trim bullets or drop optional sections".into()),
        });
    }

    ValidationReport {
        ok: errors.is_empty(),
        errors,
        warnings,
        estimated_pages,
    }
}

// ── Checks ─────────────────────────────────────────────────────────

fn check_required_text(
    path: &str,
    value: &str,
    max: usize,
    errors: &mut Vec<ValidationIssue>,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.push(ValidationIssue::required(path, "a value"));
    } else if len > max {
        errors.push(ValidationIssue::over(path, len, max, "length"));
    }
}

fn check_max_len(
    path: String,
    value: &str,
    max: usize,
    errors: &mut Vec<ValidationIssue>,
) {
    let len = value.chars().count();
    if len > max {
        errors.push(ValidationIssue::over(path, len, max, "length"));
    }
}

/// Hard error above [`MAX_BULLET_LEN`], warning above [`SOFT_BULLET_LEN`].
fn check_bullet(
    path: String,
    bullet: &str,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let len = bullet.chars().count();
    if len > MAX_BULLET_LEN {
        errors.push(ValidationIssue::over(path, len, MAX_BULLET_LEN, "length"));
    } else if len > SOFT_BULLET_LEN {
        warnings.push(ValidationIssue {
            field_path: path.clone(),
            current: len,
            limit: SOFT_BULLET_LEN,
            excess: len - SOFT_BULLET_LEN,
            message: format!("{path}: {len} chars reads long; aim for under {SOFT_BULLET_LEN}"),
            suggestion: Some("tighten the phrasing".into()),
        });
    }
}

/// Skill lists are filled by the unification stage to 5–8 items; a short
/// non-empty list is only a warning, an overlong one is an error.
fn check_skill_list(
    name: &str,
    list: &[String],
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    if list.len() > MAX_SKILLS {
        errors.push(ValidationIssue::over(name, list.len(), MAX_SKILLS, "item count"));
    } else if !list.is_empty() && list.len() < MIN_SKILLS {
        warnings.push(ValidationIssue {
            field_path: name.into(),
            current: list.len(),
            limit: MIN_SKILLS,
            excess: 0,
            message: format!("{name}: {} items, aim for {MIN_SKILLS}–{MAX_SKILLS}", list.len()),
            suggestion: Some("run skills unification to fill the list".into()),
        });
    }
    for (i, item) in list.iter().enumerate() {
        let len = item.chars().count();
        if len > MAX_SKILL_LEN {
            errors.push(ValidationIssue::over(
                format!("{name}[{i}]"),
                len,
                MAX_SKILL_LEN,
                "length",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvt_domain::cv::{EducationEntry, WorkRole};

    fn minimal_valid_cv() -> CvData {
        CvData {
            full_name: "John Doe".into(),
            email: "j@d.com".into(),
            phone: "+1 555".into(),
            work_experience: vec![WorkRole {
                date_range: "2020–2024".into(),
                employer: "Acme".into(),
                location: None,
                title: "Eng".into(),
                bullets: vec!["Led team".into(), "Shipped X".into()],
            }],
            education: vec![EducationEntry {
                date_range: "2016–2020".into(),
                institution: "MIT".into(),
                title: "BSc".into(),
                details: vec![],
            }],
            ..CvData::default()
        }
    }

    #[test]
    fn minimal_cv_passes_clean() {
        let report = validate(&minimal_valid_cv());
        assert!(report.ok, "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert!(report.estimated_pages <= 2.0);
    }

    #[test]
    fn empty_work_experience_is_required_error() {
        let mut cv = minimal_valid_cv();
        cv.work_experience.clear();
        let report = validate(&cv);
        assert!(!report.ok);
        assert!(report
            .errors
            .iter()
            .any(|e| e.field_path == "work_experience" && e.message.contains("required")));
    }

    #[test]
    fn bullet_length_boundaries() {
        let mut cv = minimal_valid_cv();

        // Exactly 100: clean pass.
        cv.work_experience[0].bullets = vec!["x".repeat(100)];
        let report = validate(&cv);
        assert!(report.ok && report.warnings.is_empty());

        // 101: warning, still ok.
        cv.work_experience[0].bullets = vec!["x".repeat(101)];
        let report = validate(&cv);
        assert!(report.ok);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].excess, 1);

        // 201: hard error.
        cv.work_experience[0].bullets = vec!["x".repeat(201)];
        let report = validate(&cv);
        assert!(!report.ok);
        assert_eq!(report.errors[0].excess, 1);
        assert_eq!(report.errors[0].limit, 200);
    }

    #[test]
    fn validate_is_idempotent_on_passing_input() {
        let cv = minimal_valid_cv();
        let first = validate(&cv);
        let second = validate(&cv);
        assert_eq!(first, second);
    }

    #[test]
    fn issue_structure_carries_excess_and_suggestion() {
        let mut cv = minimal_valid_cv();
        cv.full_name = "x".repeat(60);
        let report = validate(&cv);
        let issue = &report.errors[0];
        assert_eq!(issue.field_path, "full_name");
        assert_eq!(issue.current, 60);
        assert_eq!(issue.limit, 50);
        assert_eq!(issue.excess, 10);
        assert!(issue.suggestion.is_some());
    }

    #[test]
    fn page_overflow_is_an_error() {
        let mut cv = minimal_valid_cv();
        let long = "y".repeat(200);
        cv.work_experience = (0..5)
            .map(|_| WorkRole {
                date_range: "2020".into(),
                employer: "E".into(),
                location: None,
                title: "T".into(),
                bullets: vec![long.clone(); 4],
            })
            .collect();
        cv.profile = "p".repeat(400);
        cv.further_experience = (0..3)
            .map(|_| cvt_domain::cv::Project {
                date_range: None,
                organization: "O".into(),
                title: "T".into(),
                bullets: vec![long.clone(); 3],
            })
            .collect();
        cv.education = (0..3)
            .map(|_| EducationEntry {
                date_range: "2016".into(),
                institution: "U".into(),
                title: "MSc".into(),
                details: vec![long.clone(), long.clone()],
            })
            .collect();
        cv.languages = (0..5)
            .map(|_| cvt_domain::cv::LanguageItem::Plain("German (C1)".into()))
            .collect();
        cv.it_ai_skills = vec!["Python".into(); 8];
        cv.technical_operational_skills = vec!["SAP".into(); 8];
        let report = validate(&cv);
        assert!(!report.ok);
        assert!(report
            .errors
            .iter()
            .any(|e| e.field_path == "(document)"));
        assert!(report.estimated_pages > 2.0);
    }
}
