//! CoRE Link Format (RFC 6690) codec
//!
//! Parses link-value lists such as
//! `</sensors/temp>;rt="temperature-c";if="sensor",</sensors/light>;ct=40`
//! into [`WebLink`] records and renders them back, on top of the
//! `coap_lite::link_format` reader and writer.

use std::collections::BTreeMap;
use std::fmt;

use coap_lite::link_format::{LinkFormatParser, LinkFormatWrite};
use serde::{Deserialize, Serialize};

use crate::error::{RdCacheError, Result};

/// Attributes whose quoted value is a space-separated list of values
const LIST_ATTRIBUTES: &[&str] = &["rt", "if", "rel", "rev"];

/// Attribute map of a link: each key carries an ordered set of values
///
/// A flag attribute (`;obs`) is stored as a single empty value and rendered
/// with an empty quoted value (`;obs=""`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkAttributes {
    map: BTreeMap<String, Vec<String>>,
}

impl LinkAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to `key`, ignoring a value that is already present
    pub fn add(&mut self, key: &str, value: &str) {
        let values = self.map.entry(key.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    /// Replace every value of `key` with a single value
    pub fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), vec![value.to_string()]);
    }

    /// Remove `key` and its values, returning them if present
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.map.remove(key)
    }

    /// Values of `key` in insertion order (empty if absent)
    pub fn get(&self, key: &str) -> &[String] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).first().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One link-value: a URI reference and its attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLink {
    pub uri: String,
    pub attributes: LinkAttributes,
}

impl WebLink {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            attributes: LinkAttributes::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.add(key, value);
        self
    }
}

impl fmt::Display for WebLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = LinkFormatWrite::new(f);
        write_link(&mut out, self)?;
        out.finish().map_err(|_| fmt::Error)
    }
}

fn write_link<T: fmt::Write + ?Sized>(
    out: &mut LinkFormatWrite<'_, T>,
    link: &WebLink,
) -> fmt::Result {
    let mut attrs = out.link(&link.uri);
    for (key, values) in link.attributes.iter() {
        let present: Vec<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();

        if present.is_empty() {
            attrs = attrs.attr_quoted(key, "");
        } else if LIST_ATTRIBUTES.contains(&key) {
            attrs = attrs.attr_quoted(key, &present.join(" "));
        } else {
            for value in present {
                attrs = match value.parse::<u32>() {
                    Ok(number) if number.to_string() == value => attrs.attr_u32(key, number),
                    _ => attrs.attr_quoted(key, value),
                };
            }
        }
    }
    attrs.finish().map_err(|_| fmt::Error)
}

/// Render links as a comma-separated link-value list
pub fn render(links: &[WebLink]) -> String {
    let mut buffer = String::new();
    let mut out = LinkFormatWrite::new(&mut buffer);
    for link in links {
        if write_link(&mut out, link).is_err() {
            break;
        }
    }
    let _ = out.finish();
    buffer
}

/// Parse a link-format document
///
/// Links are returned in document order, repeated URIs included. An empty
/// document yields no links.
pub fn parse(text: &str) -> Result<Vec<WebLink>> {
    let mut links = Vec::new();

    for item in LinkFormatParser::new(text) {
        let (uri, attributes) = item
            .map_err(|e| RdCacheError::MalformedLinkFormat(format!("{:?}", e)))?;

        let mut link = WebLink::new(uri.trim());
        for (key, value) in attributes {
            let key = key.trim();
            if key.is_empty() {
                return Err(RdCacheError::MalformedLinkFormat(format!(
                    "empty attribute name in link <{}>",
                    link.uri
                )));
            }

            let value: String = value.collect();
            if LIST_ATTRIBUTES.contains(&key) && !value.is_empty() {
                for part in value.split_whitespace() {
                    link.attributes.add(key, part);
                }
            } else {
                link.attributes.add(key, &value);
            }
        }
        links.push(link);
    }

    Ok(links)
}
