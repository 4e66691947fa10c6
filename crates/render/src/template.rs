//! The one HTML template.
//!
//! The renderer accepts exactly one canonical schema; this module is where
//! that schema becomes markup. The same HTML backs the `preview_html` debug
//! tool and the PDF path, so what the user previews is what rasterizes.

use cvt_domain::cv::{CvData, LanguageItem};

/// Bumped together with `RendererConfig::template_version` on layout
/// changes; participates in the render signature through config.
pub const TEMPLATE_VERSION: &str = "v1";

fn esc(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn list_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", esc(item)))
        .collect()
}

/// Render the résumé HTML.
pub fn cv_html(cv: &CvData) -> String {
    let mut sections = String::new();

    if !cv.profile.is_empty() {
        sections.push_str(&format!(
            "<section class=\"profile\"><h2>Profile</h2><p>{}</p></section>",
            esc(&cv.profile)
        ));
    }

    if !cv.work_experience.is_empty() {
        let mut entries = String::new();
        for role in &cv.work_experience {
            let location = role
                .location
                .as_deref()
                .map(|l| format!(", {}", esc(l)))
                .unwrap_or_default();
            entries.push_str(&format!(
                "<article><h3>{} — {}{}</h3><span class=\"dates\">{}</span><ul>{}</ul></article>",
                esc(&role.title),
                esc(&role.employer),
                location,
                esc(&role.date_range),
                list_items(&role.bullets),
            ));
        }
        sections.push_str(&format!(
            "<section class=\"work\"><h2>Work Experience</h2>{entries}</section>"
        ));
    }

    if !cv.further_experience.is_empty() {
        let mut entries = String::new();
        for project in &cv.further_experience {
            let dates = project
                .date_range
                .as_deref()
                .map(esc)
                .unwrap_or_default();
            entries.push_str(&format!(
                "<article><h3>{} — {}</h3><span class=\"dates\">{dates}</span><ul>{}</ul></article>",
                esc(&project.title),
                esc(&project.organization),
                list_items(&project.bullets),
            ));
        }
        sections.push_str(&format!(
            "<section class=\"further\"><h2>Further Experience</h2>{entries}</section>"
        ));
    }

    if !cv.education.is_empty() {
        let mut entries = String::new();
        for entry in &cv.education {
            entries.push_str(&format!(
                "<article><h3>{} — {}</h3><span class=\"dates\">{}</span><ul>{}</ul></article>",
                esc(&entry.title),
                esc(&entry.institution),
                esc(&entry.date_range),
                list_items(&entry.details),
            ));
        }
        sections.push_str(&format!(
            "<section class=\"education\"><h2>Education</h2>{entries}</section>"
        ));
    }

    if !cv.languages.is_empty() {
        let items: Vec<String> = cv.languages.iter().map(LanguageItem::display).collect();
        sections.push_str(&format!(
            "<section class=\"languages\"><h2>Languages</h2><ul>{}</ul></section>",
            list_items(&items)
        ));
    }

    if !cv.it_ai_skills.is_empty() || !cv.technical_operational_skills.is_empty() {
        sections.push_str(&format!(
            "<section class=\"skills\"><h2>Skills</h2>\
             <h3>IT &amp; AI</h3><ul>{}</ul>\
             <h3>Technical &amp; Operational</h3><ul>{}</ul></section>",
            list_items(&cv.it_ai_skills),
            list_items(&cv.technical_operational_skills),
        ));
    }

    for (title, list) in [
        ("Certifications", &cv.certifications),
        ("Trainings", &cv.trainings),
        ("Publications", &cv.publications),
        ("References", &cv.references),
        ("Interests", &cv.interests),
    ] {
        if !list.is_empty() {
            sections.push_str(&format!(
                "<section><h2>{title}</h2><ul>{}</ul></section>",
                list_items(list)
            ));
        }
    }

    if let Some(privacy) = &cv.data_privacy {
        sections.push_str(&format!(
            "<footer class=\"privacy\">{}</footer>",
            esc(privacy)
        ));
    }

    let photo = cv
        .photo_url
        .as_deref()
        .map(|uri| format!("<img class=\"photo\" src=\"{uri}\" alt=\"\">"))
        .unwrap_or_default();
    let address = esc(&cv.address_lines.join(" · "));

    format!(
        "<!DOCTYPE html><html lang=\"{}\"><head><meta charset=\"utf-8\">\
         <title>{}</title></head><body class=\"cv {}\">\
         <header>{photo}<h1>{}</h1>\
         <p class=\"contact\">{} · {} · {address}</p></header>{sections}</body></html>",
        cv.language,
        esc(&cv.full_name),
        TEMPLATE_VERSION,
        esc(&cv.full_name),
        esc(&cv.email),
        esc(&cv.phone),
    )
}

/// Render the cover-letter HTML. `paragraphs` come from the cover-letter
/// stage; the header reuses the candidate's contact block.
pub fn cover_letter_html(cv: &CvData, salutation: &str, paragraphs: &[String], closing: &str) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", esc(p)))
        .collect();
    format!(
        "<!DOCTYPE html><html lang=\"{}\"><head><meta charset=\"utf-8\">\
         <title>Cover letter — {}</title></head><body class=\"cover-letter {}\">\
         <header><h1>{}</h1><p class=\"contact\">{} · {}</p></header>\
         <main><p class=\"salutation\">{}</p>{body}\
         <p class=\"closing\">{}<br>{}</p></main></body></html>",
        cv.language,
        esc(&cv.full_name),
        TEMPLATE_VERSION,
        esc(&cv.full_name),
        esc(&cv.email),
        esc(&cv.phone),
        esc(salutation),
        esc(closing),
        esc(&cv.full_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvt_domain::cv::WorkRole;

    #[test]
    fn html_escapes_user_content() {
        let mut cv = CvData::blank();
        cv.full_name = "Jane <script>".into();
        let html = cv_html(&cv);
        assert!(html.contains("Jane &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn target_role_is_never_rendered() {
        let mut cv = CvData::blank();
        cv.target_role = Some("Secret Target".into());
        cv.work_experience.push(WorkRole {
            date_range: "2020".into(),
            employer: "Acme".into(),
            location: None,
            title: "Eng".into(),
            bullets: vec!["b".into()],
        });
        let html = cv_html(&cv);
        assert!(!html.contains("Secret Target"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let html = cv_html(&CvData::blank());
        assert!(!html.contains("Work Experience"));
        assert!(!html.contains("Education"));
    }
}
