//! The canonical résumé representation.
//!
//! There is exactly one résumé shape in the system; every stage engine reads
//! and writes this model, the validator enforces its limits, and the renderer
//! accepts nothing else. All fields default so that a bootstrap session can
//! start from a blank object.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output language
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Closed set of supported output languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
    Pl,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
            Language::Pl => "pl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "de" => Some(Language::De),
            "pl" => Some(Language::Pl),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Section entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One work-experience role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkRole {
    #[serde(default)]
    pub date_range: String,
    #[serde(default)]
    pub employer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub title: String,
    /// 1–4 bullets, each hard-capped at 200 chars.
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// One education entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EducationEntry {
    #[serde(default)]
    pub date_range: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub title: String,
    /// 0–2 detail lines.
    #[serde(default)]
    pub details: Vec<String>,
}

/// One further-experience project (side projects, volunteering, etc.).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub title: String,
    /// 0–3 bullets.
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// A language entry — either a structured `{ language, level }` object or a
/// plain string like `"German (C1)"`. Uploaded documents produce both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LanguageItem {
    Entry {
        language: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<String>,
    },
    Plain(String),
}

impl LanguageItem {
    /// Rendered single-line form.
    pub fn display(&self) -> String {
        match self {
            LanguageItem::Entry {
                language,
                level: Some(level),
            } => format!("{language} ({level})"),
            LanguageItem::Entry {
                language,
                level: None,
            } => language.clone(),
            LanguageItem::Plain(s) => s.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CvData
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The single canonical résumé object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CvData {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// 1–2 address lines.
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    /// Profile summary, 50–400 chars when present.
    #[serde(default)]
    pub profile: String,
    /// Targeting metadata only — never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_role: Option<String>,
    #[serde(default)]
    pub work_experience: Vec<WorkRole>,
    #[serde(default)]
    pub further_experience: Vec<Project>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub languages: Vec<LanguageItem>,
    #[serde(default)]
    pub it_ai_skills: Vec<String>,
    #[serde(default)]
    pub technical_operational_skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trainings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_privacy: Option<String>,
    /// Inline data URI when a photo was extracted from the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub language: Language,
}

impl CvData {
    /// The canonical empty object written on bootstrap. No legacy state is
    /// ever merged into it.
    pub fn blank() -> Self {
        Self::default()
    }

    /// True when no user-visible content has been entered yet.
    pub fn is_blank(&self) -> bool {
        self.full_name.is_empty()
            && self.email.is_empty()
            && self.work_experience.is_empty()
            && self.education.is_empty()
    }
}
