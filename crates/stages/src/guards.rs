//! Hallucination guards.
//!
//! Declarative post-parse rules shared by the stage engines: a proposal may
//! reorder, rewrite, and condense, but it may not introduce facts absent
//! from its inputs. All checks are case-insensitive containment over the
//! concatenated input text.

/// Normalized haystack built from every input text a stage call saw.
pub struct InputCorpus {
    lowered: String,
}

impl InputCorpus {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lowered = String::new();
        for part in parts {
            lowered.push_str(&part.as_ref().to_lowercase());
            lowered.push('\n');
        }
        Self { lowered }
    }

    /// Whether a phrase appears anywhere in the inputs.
    pub fn contains(&self, phrase: &str) -> bool {
        let needle = phrase.trim().to_lowercase();
        !needle.is_empty() && self.lowered.contains(&needle)
    }
}

/// Every employer / organization / institution in `names` must come from the
/// inputs. Returns one violation per invented name.
pub fn check_no_new_names<'a>(
    corpus: &InputCorpus,
    names: impl IntoIterator<Item = &'a str>,
    what: &str,
) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !corpus.contains(name))
        .map(|name| format!("{what} \"{name}\" does not appear in the inputs"))
        .collect()
}

/// Numbers are where invented metrics show up. Every digit group in the
/// proposed texts must already exist somewhere in the inputs.
pub fn check_no_new_metrics<'a>(
    corpus: &InputCorpus,
    texts: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut violations = Vec::new();
    for text in texts {
        for number in digit_groups(text) {
            if !corpus.contains(&number) {
                violations.push(format!(
                    "metric \"{number}\" does not appear in the inputs"
                ));
            }
        }
    }
    violations.sort();
    violations.dedup();
    violations
}

/// Skills/tools proposed by unification must exist in the candidate's
/// materials.
pub fn check_no_new_tools<'a>(
    corpus: &InputCorpus,
    skills: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    skills
        .into_iter()
        .filter(|skill| !corpus.contains(skill))
        .map(|skill| format!("skill \"{skill}\" does not appear in the inputs"))
        .collect()
}

/// Phrases that turn a tool mention into an experience claim.
const CLAIM_MARKERS: &[&str] = &[
    "hands-on",
    "experience with",
    "experienced in",
    "proficient",
    "skilled in",
    "worked with",
];

/// A cover letter may mention a posting-only tool, but not claim experience
/// with it. `posting_only_tools` are tools named in the posting and absent
/// from the candidate's materials.
pub fn check_no_posting_only_claims<'a>(
    paragraphs: impl IntoIterator<Item = &'a str>,
    posting_only_tools: &[String],
) -> Vec<String> {
    let mut violations = Vec::new();
    for paragraph in paragraphs {
        let lowered = paragraph.to_lowercase();
        for tool in posting_only_tools {
            let tool_lower = tool.to_lowercase();
            if !lowered.contains(&tool_lower) {
                continue;
            }
            if CLAIM_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                violations.push(format!(
                    "claims experience with \"{tool}\" which appears only in the posting"
                ));
            }
        }
    }
    violations.sort();
    violations.dedup();
    violations
}

fn digit_groups(text: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invented_employer_is_flagged() {
        let corpus = InputCorpus::new(["Acme Corp, 2020-2024, Engineer"]);
        let violations = check_no_new_names(&corpus, ["Acme Corp", "Globex"], "employer");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("Globex"));
    }

    #[test]
    fn invented_metric_is_flagged() {
        let corpus = InputCorpus::new(["Improved throughput by 30% across 4 teams"]);
        assert!(check_no_new_metrics(&corpus, ["Cut latency 30%"]).is_empty());
        let violations = check_no_new_metrics(&corpus, ["Saved 95% of costs"]);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn posting_only_tool_mention_without_claim_passes() {
        let tools = vec!["Terraform".to_owned()];
        assert!(check_no_posting_only_claims(
            ["Your team's Terraform setup sounds exciting to learn."],
            &tools
        )
        .is_empty());
        let violations = check_no_posting_only_claims(
            ["I have hands-on experience with Terraform."],
            &tools,
        );
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn unknown_tool_in_skills_is_flagged() {
        let corpus = InputCorpus::new(["Python, SQL, Excel"]);
        assert!(check_no_new_tools(&corpus, ["Python", "SQL"]).is_empty());
        assert_eq!(check_no_new_tools(&corpus, ["Kubernetes"]).len(), 1);
    }
}
