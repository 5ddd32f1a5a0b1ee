//! Minimal XML element tree with indented serialization.
//!
//! The job description consumer reads plain nested elements with text
//! leaves — no attributes, no namespaces — so the builder covers exactly
//! that. Output layout matches the usual two-space ElementTree indent the
//! execution engine's examples use.

use std::fmt::Display;

const XML_DECLARATION: &str = "<?xml version='1.0' encoding='utf-8'?>";

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Leaf element holding one text value.
    pub fn leaf(name: impl Into<String>, value: impl Display) -> Self {
        let mut element = Self::new(name);
        element.text = Some(value.to_string());
        element
    }

    pub fn push(&mut self, child: XmlElement) -> &mut XmlElement {
        self.children.push(child);
        self.children.last_mut().expect("just pushed")
    }

    /// Append a text leaf, builder-chain style.
    pub fn push_value(&mut self, name: &str, value: impl Display) -> &mut Self {
        self.children.push(Self::leaf(name, value));
        self
    }

    /// Serialize the tree as a standalone document.
    pub fn to_document(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push('\n');
        self.write_into(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);

        match (&self.text, self.children.is_empty()) {
            (Some(text), true) if text.is_empty() => {
                out.push_str(&format!("<{0} />", self.name));
            }
            (Some(text), true) => {
                out.push_str(&format!("<{0}>{1}</{0}>", self.name, escape(text)));
            }
            (None, true) => {
                out.push_str(&format!("<{0} />", self.name));
            }
            _ => {
                out.push_str(&format!("<{}>", self.name));
                if let Some(text) = &self.text {
                    out.push_str(&escape(text));
                }
                for child in &self.children {
                    out.push('\n');
                    child.write_into(out, depth + 1);
                }
                out.push('\n');
                out.push_str(&indent);
                out.push_str(&format!("</{}>", self.name));
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Space-separated sequence, the engine's list-of-numbers convention.
pub fn space_separated<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
