//! The result artifact: the one structured value that crosses the process
//! boundary from worker to control plane.

use serde::{Deserialize, Serialize};

/// Outcome of one worker invocation.
///
/// Serialized as a single JSON object with camelCase keys. Optional fields
/// that are absent from the JSON deserialize as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultArtifact {
    pub success: bool,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
}

/// Prefix of the diagnostic message carried by artifacts synthesized from
/// unparseable content.
pub const PARSE_FAILURE_PREFIX: &str = "failed to parse result artifact";

impl ResultArtifact {
    /// A successful run with the given output.
    pub fn success(
        input: Option<String>,
        output: impl Into<String>,
        lesson_id: Option<String>,
    ) -> Self {
        Self {
            success: true,
            input,
            output: Some(output.into()),
            error_message: None,
            lesson_id,
        }
    }

    /// A failed run. `output` is always `None` on failure.
    pub fn failure(
        input: Option<String>,
        error_message: impl Into<String>,
        lesson_id: Option<String>,
    ) -> Self {
        Self {
            success: false,
            input,
            output: None,
            error_message: Some(error_message.into()),
            lesson_id,
        }
    }

    /// Parse an artifact from the raw file (or inline sentinel) content.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content.trim_start_matches('\u{feff}'))
    }

    /// Parse `content`, replacing unparseable input with a synthesized
    /// failure artifact whose error message embeds the parse error.
    pub fn parse_or_synthesize(content: &str) -> Self {
        match Self::from_json(content) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    length = content.len(),
                    tail = %tail(content, 100),
                    "result artifact is not valid JSON"
                );
                Self::failure(None, format!("{PARSE_FAILURE_PREFIX}: {e}"), None)
            }
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The output, but only when the run succeeded and produced non-blank text.
    pub fn trusted_output(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.output.as_deref().filter(|o| !o.trim().is_empty())
    }
}

/// Last `max_chars` characters of `s`, for diagnostics.
fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let artifact = ResultArtifact::failure(Some("hi".into()), "boom", Some("echo".into()));
        let json = artifact.to_json().unwrap();
        assert!(json.contains("\"errorMessage\":\"boom\""), "got: {json}");
        assert!(json.contains("\"lessonId\":\"echo\""), "got: {json}");
        assert!(json.contains("\"output\":null"), "got: {json}");
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let original = ResultArtifact {
            success: true,
            input: Some("in".into()),
            output: Some("# Title\n\nbody".into()),
            error_message: None,
            lesson_id: Some("hello".into()),
        };
        let parsed = ResultArtifact::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn missing_optional_fields_are_none() {
        let parsed =
            ResultArtifact::from_json(r#"{"success":true,"output":"Hello","input":"hi"}"#).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.output.as_deref(), Some("Hello"));
        assert_eq!(parsed.input.as_deref(), Some("hi"));
        assert!(parsed.error_message.is_none());
        assert!(parsed.lesson_id.is_none());
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let parsed = ResultArtifact::from_json("\u{feff}{\"success\":false}").unwrap();
        assert!(!parsed.success);
    }

    #[test]
    fn malformed_content_synthesizes_failure() {
        let artifact = ResultArtifact::parse_or_synthesize("{\"success\": tru");
        assert!(!artifact.success);
        assert!(artifact.output.is_none());
        let msg = artifact.error_message.unwrap();
        assert!(msg.starts_with(PARSE_FAILURE_PREFIX), "got: {msg}");
    }

    #[test]
    fn trusted_output_requires_success_and_text() {
        let ok = ResultArtifact::success(None, "done", None);
        assert_eq!(ok.trusted_output(), Some("done"));

        let blank = ResultArtifact::success(None, "  \n", None);
        assert_eq!(blank.trusted_output(), None);

        let failed = ResultArtifact {
            success: false,
            output: Some("stale".into()),
            ..Default::default()
        };
        assert_eq!(failed.trusted_output(), None);
    }

    #[test]
    fn tail_handles_multibyte_text() {
        assert_eq!(tail("héllo wörld", 5), "wörld");
        assert_eq!(tail("abc", 10), "abc");
    }
}
