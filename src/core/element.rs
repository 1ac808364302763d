//! Named-field document trees and the codec that persists them
//!
//! Records never touch bytes directly. A record turns itself into an
//! [`Element`] tree, the store wraps it in a [`Document`] together with the
//! identity key, and a [`RecordCodec`] turns documents into file contents.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// One element of a document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    /// Set an attribute only when the value is present
    pub fn with_opt_attr<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_attr(key, v),
            None => self,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute that must be present; `item` names the record in the error
    pub fn required_attr(&self, key: &str, item: &str) -> Result<&str> {
        self.attr(key)
            .ok_or_else(|| StoreError::decode(item, format!("<{}> lacks '{}'", self.name, key)))
    }

    /// Parse an optional attribute
    pub fn parse_attr<T: FromStr>(&self, key: &str, item: &str) -> Result<Option<T>> {
        match self.attr(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                StoreError::decode(item, format!("'{}' is not a valid {} value", raw, key))
            }),
        }
    }

    /// Parse an attribute that must be present
    pub fn parse_required<T: FromStr>(&self, key: &str, item: &str) -> Result<T> {
        self.parse_attr(key, item)?
            .ok_or_else(|| StoreError::decode(item, format!("<{}> lacks '{}'", self.name, key)))
    }

    /// Fail unless this element has the expected name
    pub fn expect_name(&self, expected: &str, item: &str) -> Result<()> {
        if self.name == expected {
            Ok(())
        } else {
            Err(StoreError::decode(
                item,
                format!("expected <{}>, found <{}>", expected, self.name),
            ))
        }
    }
}

/// What is written to disk for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identity key of the record
    pub key: String,
    pub element: Element,
}

/// Serializes documents to and from file contents
///
/// The store treats the codec as opaque: it only needs a stable file
/// extension to recognise documents in a folder.
pub trait RecordCodec: Send + Sync {
    /// Extension of document files, without the dot
    fn file_extension(&self) -> &'static str;

    fn encode(&self, document: &Document) -> Result<Vec<u8>>;

    /// `name` identifies the file in decode errors
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Document>;
}

/// Pretty-printed JSON element trees
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(document)?)
    }

    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Document> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::decode(name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("star")
            .with_attr("catalog", "Hipparcos")
            .with_attr("ra", 83.633)
            .with_opt_attr("mag", None::<f64>)
            .with_child(Element::new("note").with_text("double"))
    }

    #[test]
    fn test_attribute_access() -> Result<()> {
        let e = sample();
        assert_eq!(e.attr("catalog"), Some("Hipparcos"));
        assert_eq!(e.parse_required::<f64>("ra", "x")?, 83.633);
        assert_eq!(e.parse_attr::<f64>("mag", "x")?, None);
        assert!(e.required_attr("dec", "x").is_err());
        assert_eq!(e.child("note").and_then(|n| n.text.as_deref()), Some("double"));
        Ok(())
    }

    #[test]
    fn test_bad_number_is_decode_error() {
        let e = Element::new("star").with_attr("ra", "north");
        let err = e.parse_attr::<f64>("ra", "HIP 7").unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("HIP 7"));
    }

    #[test]
    fn test_json_codec() -> Result<()> {
        let codec = JsonCodec;
        let doc = Document {
            key: "Hipparcos:1".to_string(),
            element: sample(),
        };
        let bytes = codec.encode(&doc)?;
        assert_eq!(codec.decode("a.json", &bytes)?, doc);

        let err = codec.decode("broken.json", b"{ not json").unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("broken.json"));
        Ok(())
    }
}
