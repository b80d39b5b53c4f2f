//! Job metadata extraction output and the artifact file names derived from it.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::generation::cleaning::{clean, JSON_STEPS};
use crate::llm_client::LlmError;

const UNKNOWN_TOKEN: &str = "Unknown";
const SHORT_ID_LEN: usize = 8;
/// Per-token byte cap. Keeps the longest stem well under the 255-byte
/// file name limit even for non-ASCII titles.
const MAX_TOKEN_BYTES: usize = 60;

/// Company and role title pulled out of a job description.
/// Absent or `null` fields become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the metadata task's answer. Tolerates fenced JSON.
pub fn parse_metadata(raw: &str) -> Result<JobMetadata, LlmError> {
    let json = clean(raw, JSON_STEPS);
    Ok(serde_json::from_str(&json)?)
}

/// Reduces free text to a filename-safe token.
///
/// Alphanumerics (any script) are kept, runs of whitespace, `-` and `_`
/// collapse to a single `_`, everything else is dropped. The result is cut
/// to `MAX_TOKEN_BYTES` on a char boundary. Empty input yields `Unknown`.
pub fn sanitize_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
        }
    }

    truncate_on_char_boundary(&mut out, MAX_TOKEN_BYTES);
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        UNKNOWN_TOKEN.to_string()
    } else {
        trimmed.to_string()
    }
}

fn truncate_on_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// File stems for every artifact a job produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactNames {
    pub cv_stem: String,
    pub cover_letter_stem: String,
    pub message_stem: String,
}

impl ArtifactNames {
    pub fn new(metadata: &JobMetadata, job_id: Uuid) -> Self {
        let simple = job_id.simple().to_string();
        let short_id = &simple[..SHORT_ID_LEN];
        let suffix = format!(
            "{}_{}_{}",
            sanitize_token(&metadata.title),
            sanitize_token(&metadata.company),
            short_id
        );

        Self {
            cv_stem: format!("CV_{suffix}"),
            cover_letter_stem: format!("CoverLetter_{suffix}"),
            message_stem: format!("Message_{suffix}"),
        }
    }

    pub fn cv_source(&self) -> String {
        format!("{}.tex", self.cv_stem)
    }

    pub fn cv_document(&self) -> String {
        format!("{}.pdf", self.cv_stem)
    }

    pub fn cover_letter_source(&self) -> String {
        format!("{}.tex", self.cover_letter_stem)
    }

    pub fn cover_letter_document(&self) -> String {
        format!("{}.pdf", self.cover_letter_stem)
    }

    pub fn message(&self) -> String {
        format!("{}.txt", self.message_stem)
    }
}
