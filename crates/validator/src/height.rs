//! Additive height model.
//!
//! Sums per-section contributions in millimeters and compares against the
//! two-page budget. The numbers mirror the rendered template: a section
//! header, a role header, a wrapped bullet line each have a fixed height, so
//! summing them predicts the page count without rasterizing anything.

use cvt_domain::cv::CvData;

/// Usable vertical space across both pages (A4 minus margins), in mm.
pub const USABLE_TWO_PAGES_MM: f32 = 594.0;
/// Safety buffer kept free for rendering variance.
pub const BUFFER_MM: f32 = 20.0;
/// Usable space per single page.
pub const USABLE_PAGE_MM: f32 = USABLE_TWO_PAGES_MM / 2.0;

/// Approximate characters per rendered body line.
const CHARS_PER_LINE: usize = 95;
/// Height of one body line.
const LINE_MM: f32 = 4.5;
/// Height of a section header.
const SECTION_HEADER_MM: f32 = 8.0;
/// Fixed header block: name, contact row, optional photo.
const HEADER_BLOCK_MM: f32 = 40.0;
/// Role / entry header line (dates, employer, title).
const ENTRY_HEADER_MM: f32 = 10.0;
/// Compact rows (languages, skills) render two columns.
const COMPACT_ROW_MM: f32 = 5.5;

/// Number of wrapped lines a text occupies.
fn wrapped_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.chars().count().div_ceil(CHARS_PER_LINE)
    }
}

fn text_mm(text: &str) -> f32 {
    wrapped_lines(text) as f32 * LINE_MM
}

fn two_column_mm(items: usize) -> f32 {
    items.div_ceil(2) as f32 * COMPACT_ROW_MM
}

/// Estimate the rendered height of the résumé in millimeters.
pub fn estimate_mm(cv: &CvData) -> f32 {
    let mut mm = HEADER_BLOCK_MM;

    if !cv.profile.is_empty() {
        mm += SECTION_HEADER_MM + text_mm(&cv.profile);
    }

    if !cv.work_experience.is_empty() {
        mm += SECTION_HEADER_MM;
        for role in &cv.work_experience {
            mm += ENTRY_HEADER_MM;
            for bullet in &role.bullets {
                mm += text_mm(bullet).max(LINE_MM);
            }
        }
    }

    if !cv.further_experience.is_empty() {
        mm += SECTION_HEADER_MM;
        for project in &cv.further_experience {
            mm += ENTRY_HEADER_MM;
            for bullet in &project.bullets {
                mm += text_mm(bullet).max(LINE_MM);
            }
        }
    }

    if !cv.education.is_empty() {
        mm += SECTION_HEADER_MM;
        for entry in &cv.education {
            mm += ENTRY_HEADER_MM;
            for detail in &entry.details {
                mm += text_mm(detail).max(LINE_MM);
            }
        }
    }

    if !cv.languages.is_empty() {
        mm += SECTION_HEADER_MM + two_column_mm(cv.languages.len());
    }

    let skills = cv.it_ai_skills.len() + cv.technical_operational_skills.len();
    if skills > 0 {
        mm += SECTION_HEADER_MM + two_column_mm(skills);
    }

    for list in [
        &cv.certifications,
        &cv.trainings,
        &cv.publications,
        &cv.references,
        &cv.interests,
    ] {
        if !list.is_empty() {
            mm += SECTION_HEADER_MM + list.len() as f32 * COMPACT_ROW_MM;
        }
    }

    if cv.data_privacy.is_some() {
        mm += SECTION_HEADER_MM + LINE_MM;
    }

    mm
}

/// Estimated page count for the résumé.
pub fn estimate_pages(cv: &CvData) -> f32 {
    estimate_mm(cv) / USABLE_PAGE_MM
}

/// Millimeters over the two-page budget, zero when it fits.
pub fn overflow_mm(cv: &CvData) -> f32 {
    (estimate_mm(cv) - (USABLE_TWO_PAGES_MM - BUFFER_MM)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvt_domain::cv::WorkRole;

    #[test]
    fn blank_cv_fits_comfortably() {
        let cv = CvData::blank();
        assert!(estimate_pages(&cv) < 1.0);
        assert_eq!(overflow_mm(&cv), 0.0);
    }

    #[test]
    fn model_is_additive_and_deterministic() {
        let mut cv = CvData::blank();
        let base = estimate_mm(&cv);
        cv.work_experience.push(WorkRole {
            date_range: "2020–2024".into(),
            employer: "Acme".into(),
            location: None,
            title: "Engineer".into(),
            bullets: vec!["Did things".into()],
        });
        let one_role = estimate_mm(&cv);
        assert!(one_role > base);
        assert_eq!(one_role, estimate_mm(&cv));
    }

    #[test]
    fn stuffed_cv_overflows() {
        let mut cv = CvData::blank();
        let long = "x".repeat(200);
        for _ in 0..5 {
            cv.work_experience.push(WorkRole {
                date_range: "2020".into(),
                employer: "E".into(),
                location: None,
                title: "T".into(),
                bullets: vec![long.clone(); 4],
            });
        }
        cv.profile = "p".repeat(400);
        for _ in 0..3 {
            cv.further_experience.push(cvt_domain::cv::Project {
                date_range: None,
                organization: "O".into(),
                title: "T".into(),
                bullets: vec![long.clone(); 3],
            });
            cv.education.push(cvt_domain::cv::EducationEntry {
                date_range: "2016".into(),
                institution: "U".into(),
                title: "MSc".into(),
                details: vec![long.clone(), long.clone()],
            });
        }
        for _ in 0..5 {
            cv.languages
                .push(cvt_domain::cv::LanguageItem::Plain("German (C1)".into()));
        }
        cv.it_ai_skills = vec!["Python".into(); 8];
        cv.technical_operational_skills = vec!["SAP".into(); 8];
        assert!(overflow_mm(&cv) > 0.0);
        assert!(estimate_pages(&cv) > 2.0);
    }
}
