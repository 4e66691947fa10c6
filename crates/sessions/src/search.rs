//! In-memory reverse index for session search.
//!
//! Maps lowercase words drawn from searchable session fields (name, target
//! role, employers, institutions) to session IDs with match counts. Built at
//! startup from the store and kept live as sessions are written.

use std::collections::HashMap;

use parking_lot::RwLock;

use cvt_domain::session::SessionRecord;

use crate::store::SessionStore;

const MAX_PREVIEW_LEN: usize = 160;
const MAX_RESULTS: usize = 50;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single search result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub session_id: String,
    pub match_count: usize,
    /// First matching field content, truncated for display.
    pub preview: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionIndex
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reverse index: word -> { session_id -> count }.
pub struct SessionIndex {
    index: RwLock<HashMap<String, HashMap<String, usize>>>,
    previews: RwLock<HashMap<String, String>>,
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIndex {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            previews: RwLock::new(HashMap::new()),
        }
    }

    /// Build the index by scanning every readable session in the store.
    pub fn build_from_store(store: &SessionStore) -> Self {
        let index = Self::new();
        for record in store.list_records() {
            index.index_record(&record);
        }
        index
    }

    /// The fields a session is findable by.
    fn searchable_text(record: &SessionRecord) -> Vec<String> {
        let cv = &record.cv_data;
        let mut texts = vec![cv.full_name.clone(), cv.email.clone()];
        if let Some(role) = &cv.target_role {
            texts.push(role.clone());
        }
        for work in &cv.work_experience {
            texts.push(work.employer.clone());
            texts.push(work.title.clone());
        }
        for edu in &cv.education {
            texts.push(edu.institution.clone());
        }
        texts.retain(|t| !t.is_empty());
        texts
    }

    /// (Re-)index one session record; previous entries for the session are
    /// replaced.
    pub fn index_record(&self, record: &SessionRecord) {
        let session_id = record.session_id.to_string();
        self.remove(&session_id);

        let texts = Self::searchable_text(record);
        let mut index = self.index.write();
        for text in &texts {
            for word in words(text) {
                *index
                    .entry(word)
                    .or_default()
                    .entry(session_id.clone())
                    .or_insert(0) += 1;
            }
        }
        if let Some(first) = texts.first() {
            let preview: String = first.chars().take(MAX_PREVIEW_LEN).collect();
            self.previews.write().insert(session_id, preview);
        }
    }

    pub fn remove(&self, session_id: &str) {
        let mut index = self.index.write();
        index.retain(|_, sessions| {
            sessions.remove(session_id);
            !sessions.is_empty()
        });
        self.previews.write().remove(session_id);
    }

    /// Search for sessions matching any word of the query; results are
    /// ranked by total match count.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let index = self.index.read();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for word in words(query) {
            if let Some(sessions) = index.get(&word) {
                for (session_id, count) in sessions {
                    *counts.entry(session_id.clone()).or_insert(0) += count;
                }
            }
        }
        drop(index);

        let previews = self.previews.read();
        let mut hits: Vec<SearchHit> = counts
            .into_iter()
            .map(|(session_id, match_count)| SearchHit {
                preview: previews.get(&session_id).cloned().unwrap_or_default(),
                session_id,
                match_count,
            })
            .collect();
        hits.sort_by(|a, b| b.match_count.cmp(&a.match_count));
        hits.truncate(MAX_RESULTS);
        hits
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2)
        .map(|w| w.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record_named(name: &str, employer: &str) -> SessionRecord {
        let mut r = SessionRecord::bootstrap(24, Utc::now());
        r.cv_data.full_name = name.into();
        r.cv_data.work_experience.push(cvt_domain::cv::WorkRole {
            date_range: "2020".into(),
            employer: employer.into(),
            location: None,
            title: "Engineer".into(),
            bullets: vec!["b".into()],
        });
        r
    }

    #[test]
    fn finds_by_name_and_employer() {
        let index = SessionIndex::new();
        let r1 = record_named("Jane Kowalska", "Acme");
        let r2 = record_named("John Doe", "Globex");
        index.index_record(&r1);
        index.index_record(&r2);

        let hits = index.search("kowalska");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, r1.session_id.to_string());

        let hits = index.search("globex");
        assert_eq!(hits[0].session_id, r2.session_id.to_string());
    }

    #[test]
    fn reindex_replaces_old_words() {
        let index = SessionIndex::new();
        let mut r = record_named("Jane", "Acme");
        index.index_record(&r);
        r.cv_data.full_name = "Janina".into();
        index.index_record(&r);

        assert!(index.search("jane").is_empty());
        assert_eq!(index.search("janina").len(), 1);
    }

    #[test]
    fn unmatched_query_is_empty() {
        let index = SessionIndex::new();
        index.index_record(&record_named("Jane", "Acme"));
        assert!(index.search("zzz").is_empty());
    }
}
