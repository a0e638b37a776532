//! Document text carried by OCR completion events and content responses.

use serde::Deserialize;

/// Shapes the OCR result arrives in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DocumentPayload {
    Raw(String),
    Structured {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, rename = "plainTextContent")]
        plain_text_content: Option<String>,
    },
}

impl DocumentPayload {
    /// Decode a stage payload; anything that is neither a string nor an object is rejected.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Primary content wins over the plain-text fallback; empty text counts as absent.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Raw(text) => Some(text).filter(|t| !t.is_empty()),
            Self::Structured {
                content,
                plain_text_content,
            } => content
                .filter(|t| !t.is_empty())
                .or(plain_text_content.filter(|t| !t.is_empty())),
        }
    }
}

/// Extract displayable document text from an OCR payload.
pub fn document_text(value: &serde_json::Value) -> Option<String> {
    DocumentPayload::from_value(value).and_then(DocumentPayload::into_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_text() {
        assert_eq!(document_text(&json!("# Title")).as_deref(), Some("# Title"));
        assert!(document_text(&json!("")).is_none());
    }

    #[test]
    fn test_content_preferred_over_plain_text() {
        let value = json!({"content": "## Rich", "plainTextContent": "plain"});
        assert_eq!(document_text(&value).as_deref(), Some("## Rich"));

        let value = json!({"content": "", "plainTextContent": "plain"});
        assert_eq!(document_text(&value).as_deref(), Some("plain"));
    }

    #[test]
    fn test_unusable_payloads() {
        assert!(document_text(&json!(null)).is_none());
        assert!(document_text(&json!(42)).is_none());
        assert!(document_text(&json!({"other": "x"})).is_none());
    }
}
