//! Composite resource IDs.
//!
//! Lightdash objects are addressed by several UUIDs at once (a space lives
//! inside a project, a member's access is keyed by project and user). Those
//! keys are packed into one slash-separated ID such as
//! `projects/{project_uuid}/spaces/{space_uuid}`, which is what users pass to
//! `import`.

use std::collections::HashMap;

use regex::Regex;

use crate::error::ProviderError;

const VALUE_PATTERN: &str = "[A-Za-z0-9_-]+";

/// A slash-separated ID pattern with `{name}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdTemplate(&'static str);

impl IdTemplate {
    /// Create a template such as `"projects/{project_uuid}/spaces/{space_uuid}"`.
    pub const fn new(pattern: &'static str) -> Self {
        Self(pattern)
    }

    /// The raw pattern.
    pub fn pattern(&self) -> &'static str {
        self.0
    }

    /// Placeholder names in order of appearance.
    pub fn keys(&self) -> Vec<&'static str> {
        self.0.split('/').filter_map(placeholder).collect()
    }

    /// Fill in the placeholders.
    ///
    /// `values` must supply one non-empty value per placeholder, in order.
    pub fn format(&self, values: &[&str]) -> Result<String, ProviderError> {
        let mut values = values.iter();
        let mut parts = Vec::new();
        for segment in self.0.split('/') {
            match placeholder(segment) {
                Some(key) => {
                    let value = values
                        .next()
                        .filter(|v| is_valid_value(v))
                        .ok_or_else(|| {
                            ProviderError::InvalidId(format!(
                                "missing or invalid value for '{}' in {}",
                                key, self.0
                            ))
                        })?;
                    parts.push(*value);
                }
                None => parts.push(segment),
            }
        }
        if values.next().is_some() {
            return Err(ProviderError::InvalidId(format!(
                "too many values for {}",
                self.0
            )));
        }
        Ok(parts.join("/"))
    }

    /// The anchored regex that matches IDs of this template, with one named
    /// capture group per placeholder.
    pub fn regex(&self) -> Result<Regex, ProviderError> {
        let segments: Vec<String> = self
            .0
            .split('/')
            .map(|segment| match placeholder(segment) {
                Some(key) => format!("(?P<{}>{})", key, VALUE_PATTERN),
                None => regex::escape(segment),
            })
            .collect();
        let source = format!("^{}$", segments.join("/"));
        Regex::new(&source).map_err(|e| {
            ProviderError::InvalidId(format!("invalid ID template {}: {}", self.0, e))
        })
    }

    /// Extract placeholder values from an ID.
    pub fn parse(&self, id: &str) -> Result<ParsedId, ProviderError> {
        let re = self.regex()?;
        let captures = re.captures(id).ok_or_else(|| {
            ProviderError::InvalidId(format!(
                "'{}' does not match the expected format {}",
                id, self.0
            ))
        })?;

        let values = self
            .keys()
            .into_iter()
            .filter_map(|key| captures.name(key).map(|m| (key, m.as_str().to_string())))
            .collect();
        Ok(ParsedId { values })
    }
}

/// Placeholder values extracted from a composite ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    values: HashMap<&'static str, String>,
}

impl ParsedId {
    /// The value for a placeholder.
    pub fn get(&self, key: &str) -> Result<&str, ProviderError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::InvalidId(format!("no '{}' in parsed ID", key)))
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

fn is_valid_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPACE: IdTemplate = IdTemplate::new("projects/{project_uuid}/spaces/{space_uuid}");

    #[test]
    fn test_keys() {
        assert_eq!(SPACE.keys(), vec!["project_uuid", "space_uuid"]);
    }

    #[test]
    fn test_format_and_parse() {
        let id = SPACE
            .format(&["3675b69e-8324-4110-bdca-059031aa8da3", "a1b2"])
            .unwrap();
        assert_eq!(id, "projects/3675b69e-8324-4110-bdca-059031aa8da3/spaces/a1b2");

        let parsed = SPACE.parse(&id).unwrap();
        assert_eq!(parsed.get("project_uuid").unwrap(), "3675b69e-8324-4110-bdca-059031aa8da3");
        assert_eq!(parsed.get("space_uuid").unwrap(), "a1b2");
        assert!(parsed.get("group_uuid").is_err());
    }

    #[test]
    fn test_parse_rejects_mismatches() {
        assert!(SPACE.parse("projects/p1/spaces").is_err());
        assert!(SPACE.parse("projects/p1/groups/s1").is_err());
        assert!(SPACE.parse("projects//spaces/s1").is_err());
        assert!(SPACE.parse("projects/p1/spaces/s1/extra").is_err());
        assert!(SPACE.parse("projects/p 1/spaces/s1").is_err());

        let err = SPACE.parse("spaces/s1").unwrap_err();
        assert!(err.to_string().contains("projects/{project_uuid}/spaces/{space_uuid}"));
    }

    #[test]
    fn test_regex_is_anchored() {
        let re = SPACE.regex().unwrap();
        assert_eq!(
            re.as_str(),
            "^projects/(?P<project_uuid>[A-Za-z0-9_-]+)/spaces/(?P<space_uuid>[A-Za-z0-9_-]+)$"
        );
        assert!(!re.is_match("x/projects/p1/spaces/s1"));

        let dotted = IdTemplate::new("orgs/{org_uuid}/v1.0");
        assert!(dotted.parse("orgs/o1/v1.0").is_ok());
        assert!(dotted.parse("orgs/o1/v1x0").is_err());
    }

    #[test]
    fn test_format_rejects_bad_values() {
        assert!(SPACE.format(&["p1"]).is_err());
        assert!(SPACE.format(&["p1", ""]).is_err());
        assert!(SPACE.format(&["p1", "s1", "extra"]).is_err());
        assert!(SPACE.format(&["p/1", "s1"]).is_err());
    }
}
