use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of the persisted highlight map: the normalized URL of a document.
pub type DocumentUrl = String;

/// Free-form classification label attached to a highlight.
pub type Category = String;

/// Opaque, stable identifier of one highlight record.
///
/// Generated once when a highlight is first created and carried verbatim
/// through persistence and restore.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(String);

impl HighlightId {
    pub const PREFIX: &'static str = "hl_";

    /// Fresh id that will not collide with ids restored from storage.
    pub fn generate() -> Self {
        HighlightId(format!(
            "{}{}",
            Self::PREFIX,
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn new(raw: impl Into<String>) -> Self {
        HighlightId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HighlightId {
    fn from(raw: &str) -> Self {
        HighlightId(raw.to_string())
    }
}

/// The fixed marker palette offered to users.
///
/// The engine treats colors as opaque strings; this is only the set of
/// defaults a front end picks from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighlightColor {
    Orange,
    Yellow,
    Green,
    Turquoise,
    Cyan,
    Blue,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 6] = [
        HighlightColor::Orange,
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Turquoise,
        HighlightColor::Cyan,
        HighlightColor::Blue,
    ];

    pub fn css(self) -> &'static str {
        match self {
            HighlightColor::Orange => "hsl(14, 100%, 53%)",
            HighlightColor::Yellow => "hsl(44, 100%, 77%)",
            HighlightColor::Green => "hsl(153, 53%, 53%)",
            HighlightColor::Turquoise => "hsl(171, 100%, 41%)",
            HighlightColor::Cyan => "hsl(207, 61%, 53%)",
            HighlightColor::Blue => "hsl(229, 53%, 53%)",
        }
    }

    /// Case-insensitive lookup by palette name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| format!("{c:?}").eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css())
    }
}

/// Persisted form of one highlight.
///
/// This is the only shape that crosses the storage boundary; live tree
/// handles never appear here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightDescriptor {
    pub id: HighlightId,
    pub parent_selector: String,
    pub text_start_at: usize,
    pub text_end_at: usize,
    pub text_content: String,
    pub color: String,
    #[serde(default)]
    pub category: Option<Category>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = HighlightId::generate();
        let b = HighlightId::generate();
        assert!(a.as_str().starts_with(HighlightId::PREFIX));
        assert_ne!(a, b);
    }

    #[test]
    fn palette_lookup() {
        assert_eq!(
            HighlightColor::from_name("turquoise"),
            Some(HighlightColor::Turquoise)
        );
        assert_eq!(HighlightColor::from_name("magenta"), None);
        assert_eq!(HighlightColor::Yellow.css(), "hsl(44, 100%, 77%)");
    }

    #[test]
    fn descriptor_uses_camel_case_keys() {
        let descriptor = HighlightDescriptor {
            id: HighlightId::new("hl_1"),
            parent_selector: "p:nth-of-type(1)".into(),
            text_start_at: 22,
            text_end_at: 27,
            text_content: "click".into(),
            color: HighlightColor::Yellow.css().into(),
            category: None,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["parentSelector"], "p:nth-of-type(1)");
        assert_eq!(json["textStartAt"], 22);
        assert_eq!(json["category"], serde_json::Value::Null);
        let raw = r#"{"id":"hl_1","parentSelector":"p:nth-of-type(1)","textStartAt":22,
            "textEndAt":27,"textContent":"click","color":"hsl(44, 100%, 77%)"}"#;
        let parsed: HighlightDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, descriptor);
    }
}
