//! Stage prompts.
//!
//! Each stage owns one template; `{target_language}` is interpolated before
//! the prompt leaves this module. The base factual-JSON-only prompt lives in
//! the call layer, so these stay focused on the stage's task.

use cvt_domain::cv::Language;

pub const JOB_POSTING: &str = "Extract the structured facts of this job posting. \
Capture the role title, company, location, the listed responsibilities, the \
hard requirements (must_haves), the optional requirements (nice_to_haves), \
the concrete tools and technologies named, and the recurring keywords. Use \
only phrases that appear in the posting.";

pub const BULK_TRANSLATION: &str = "Translate every text field of this résumé \
into {target_language}. Keep the JSON structure, field names, item counts, \
and ordering exactly as given. Do not translate proper nouns, employer \
names, institution names, or product names. Dates stay unchanged.";

pub const WORK_EXPERIENCE: &str = "Tailor the candidate's work experience to \
the job summary. Select and reorder the most relevant roles, rewrite bullets \
to foreground matching responsibilities and keywords, and split or merge \
bullets where it sharpens the story. Produce 3 to 4 roles with 2 to 4 \
bullets each and 8 to 12 bullets in total, every bullet under 200 \
characters. Write in {target_language}. Use only employers, date ranges, \
and achievements present in the input; never invent metrics.";

pub const SKILLS: &str = "Unify the candidate's skills into two disjoint \
lists: it_ai_skills (software, data, AI tooling) and \
technical_operational_skills (domain, process, operational strengths). \
Produce 5 to 8 entries per list, each at most 50 characters, written in \
{target_language}, with no entry repeated across the lists. Use only tools \
and skills present in the input.";

pub const FURTHER_EXPERIENCE: &str = "Condense the candidate's further \
experience (projects, volunteering, side work) into at most 3 entries with \
at most 3 bullets each, written in {target_language}. Keep only entries \
that support the target role. Use only organizations and activities present \
in the input.";

pub const EDUCATION: &str = "Translate these education entries into \
{target_language}. Keep the same number of entries and the same ordering. \
Institution names stay in their original language; degree titles are \
translated.";

pub const COVER_LETTER: &str = "Write a concise cover letter for this \
candidate and job in {target_language}: a salutation, 2 to 4 short \
paragraphs, and a closing. Ground every claim in the candidate's résumé. \
You may reference the employer's needs from the posting, but never claim \
hands-on experience with a tool that appears only in the posting.";

pub const CORRECTION: &str = "Some entries violate hard limits. Rewrite only \
the listed entries so each violation is fixed; keep meaning, language, and \
everything not listed unchanged.";

/// Interpolate `{target_language}` into a stage template.
pub fn with_language(template: &str, language: Language) -> String {
    let name = match language {
        Language::En => "English",
        Language::De => "German",
        Language::Pl => "Polish",
    };
    template.replace("{target_language}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_replaces_placeholder() {
        let prompt = with_language(WORK_EXPERIENCE, Language::De);
        assert!(prompt.contains("German"));
        assert!(!prompt.contains("{target_language}"));
    }
}
