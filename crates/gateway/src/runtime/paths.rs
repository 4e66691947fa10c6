//! Field-path grammar for `update_field`.
//!
//! Paths address into the canonical object: `profile`,
//! `work_experience[0].bullets[2]`, `education[1].title`. Lists auto-expand
//! at their head — index == current length appends a default entry — so a
//! client can build a role bullet-by-bullet across stateless turns.

use serde_json::Value;

use cvt_domain::cv::CvData;
use cvt_domain::error::{Error, Result};

/// Top-level fields a path may start with. Anything else is rejected rather
/// than silently dropped by deserialization.
const CV_FIELDS: &[&str] = &[
    "full_name",
    "email",
    "phone",
    "address_lines",
    "nationality",
    "birth_date",
    "profile",
    "target_role",
    "work_experience",
    "further_experience",
    "education",
    "languages",
    "it_ai_skills",
    "technical_operational_skills",
    "certifications",
    "trainings",
    "publications",
    "references",
    "interests",
    "data_privacy",
    "photo_url",
    "language",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Parse `a.b[0].c` into typed segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(bad_path(path, "empty segment"));
        }
        let (name, indices) = match part.find('[') {
            None => (part, ""),
            Some(pos) => (&part[..pos], &part[pos..]),
        };
        if name.is_empty() {
            return Err(bad_path(path, "segment starts with an index"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(bad_path(path, "invalid field name"));
        }
        segments.push(Segment::Field(name.to_owned()));

        let mut rest = indices;
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                return Err(bad_path(path, "unterminated index"));
            };
            let index: usize = stripped[..end]
                .parse()
                .map_err(|_| bad_path(path, "index is not a number"))?;
            segments.push(Segment::Index(index));
            rest = &stripped[end + 1..];
        }
        if !rest.is_empty() {
            return Err(bad_path(path, "trailing characters after index"));
        }
    }
    Ok(segments)
}

fn bad_path(path: &str, why: &str) -> Error {
    Error::ValidationFailed {
        summary: format!("invalid field path \"{path}\": {why}"),
        details: serde_json::json!([{ "field_path": path, "message": why }]),
    }
}

/// Apply one update to the canonical object.
///
/// The walk is typed end to end: the mutation happens on the JSON form, and
/// the result must deserialize back into [`CvData`] — a type-mismatching
/// write fails instead of half-applying.
pub fn apply_update(cv: &mut CvData, path: &str, value: Value) -> Result<()> {
    let segments = parse_path(path)?;
    let Some(Segment::Field(first)) = segments.first() else {
        return Err(bad_path(path, "path must start with a field"));
    };
    if !CV_FIELDS.contains(&first.as_str()) {
        return Err(bad_path(path, "unknown field"));
    }

    let mut root = serde_json::to_value(&*cv)?;
    set_at(&mut root, &segments, value, path)?;

    *cv = serde_json::from_value(root).map_err(|e| Error::ValidationFailed {
        summary: format!("value does not fit field \"{path}\": {e}"),
        details: serde_json::json!([{ "field_path": path, "message": e.to_string() }]),
    })?;
    Ok(())
}

fn set_at(root: &mut Value, segments: &[Segment], value: Value, path: &str) -> Result<()> {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        match segment {
            Segment::Field(name) => {
                let obj = current.as_object_mut().ok_or_else(|| {
                    bad_path(path, "field access on a non-object")
                })?;
                if last {
                    obj.insert(name.clone(), value);
                    return Ok(());
                }
                // Missing intermediate: create what the next segment needs.
                let next_is_index = matches!(segments[i + 1], Segment::Index(_));
                current = obj.entry(name.clone()).or_insert_with(|| {
                    if next_is_index {
                        Value::Array(Vec::new())
                    } else {
                        Value::Object(serde_json::Map::new())
                    }
                });
                if current.is_null() {
                    *current = if next_is_index {
                        Value::Array(Vec::new())
                    } else {
                        Value::Object(serde_json::Map::new())
                    };
                }
            }
            Segment::Index(index) => {
                let arr = current.as_array_mut().ok_or_else(|| {
                    bad_path(path, "index access on a non-list")
                })?;
                // Auto-expand the list head: index == len appends.
                if *index == arr.len() {
                    arr.push(Value::Object(serde_json::Map::new()));
                } else if *index > arr.len() {
                    return Err(bad_path(path, "index past the end of the list"));
                }
                if last {
                    arr[*index] = value;
                    return Ok(());
                }
                current = &mut arr[*index];
            }
        }
    }
    Ok(())
}
