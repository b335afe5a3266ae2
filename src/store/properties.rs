use std::collections::BTreeMap;

use serde::Serialize;

/// Longest text content Notion accepts in one rich-text run.
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Field name -> value, written in one create or update call.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Typed value of a single store column.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    Url(String),
    Select(String),
    Number(u64),
    RichText(String),
}

impl PropertyValue {
    /// Notion request shape, with text content sanitized.
    pub fn to_wire(&self) -> WireProperty {
        match self {
            PropertyValue::Title(s) => WireProperty::Title(vec![TextRun::new(s)]),
            PropertyValue::Url(s) => WireProperty::Url(s.clone()),
            PropertyValue::Select(s) => WireProperty::Select(SelectOption { name: s.clone() }),
            PropertyValue::Number(n) => WireProperty::Number(*n),
            PropertyValue::RichText(s) => WireProperty::RichText(vec![TextRun::new(s)]),
        }
    }
}

/// Serializes as `{"title": [...]}`, `{"url": "..."}` and so on.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireProperty {
    Title(Vec<TextRun>),
    Url(String),
    Select(SelectOption),
    Number(u64),
    RichText(Vec<TextRun>),
}

#[derive(Debug, Serialize)]
pub struct TextRun {
    text: TextContent,
}

#[derive(Debug, Serialize)]
struct TextContent {
    content: String,
}

impl TextRun {
    fn new(content: &str) -> Self {
        Self {
            text: TextContent {
                content: sanitize_for_notion(content),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectOption {
    name: String,
}

/// Request body `properties` object.
pub fn to_wire_properties(properties: &Properties) -> BTreeMap<&str, WireProperty> {
    properties
        .iter()
        .map(|(name, value)| (name.as_str(), value.to_wire()))
        .collect()
}

/// Strip control characters and cap the length at what a text run accepts.
pub fn sanitize_for_notion(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .take(MAX_TEXT_LENGTH)
        .collect()
}
