//! Compiled path patterns.
//!
//! Patterns mix literal segments with `{name}` placeholders and optional
//! `{name?}` placeholders. Placeholders span whole segments; duplicate and
//! trailing slashes in the pattern are not significant.

use std::collections::HashMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::errors::{HttpError, HttpResult};

// Reserved characters that must not appear raw inside a generated segment
const SEGMENT_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param { name: String, required: bool },
}

/// A route pattern compiled once at registration.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(source: &str) -> HttpResult<Self> {
        let segments = parse_segments(source)?;
        let regex = compile_regex(source, &segments)?;
        Ok(Self {
            source: source.to_string(),
            regex,
            segments,
        })
    }

    /// The pattern as registered
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a request path, returning the percent-decoded named captures.
    /// Optional placeholders that did not match are absent from the map.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let mut params = HashMap::new();
        let mut group = 1;
        for segment in &self.segments {
            if let Segment::Param { name, .. } = segment {
                if let Some(value) = captures.get(group) {
                    params.insert(
                        name.clone(),
                        percent_decode_str(value.as_str())
                            .decode_utf8_lossy()
                            .into_owned(),
                    );
                }
                group += 1;
            }
        }
        Some(params)
    }

    /// Rebuild a concrete URL from the pattern. Required placeholders must
    /// be supplied; omitted optional placeholders drop their segment; extra
    /// parameters become a query string.
    pub fn expand(&self, params: &[(&str, &str)]) -> HttpResult<String> {
        let mut url = String::new();
        let mut used = vec![false; params.len()];
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    url.push('/');
                    url.push_str(text);
                }
                Segment::Param { name, required } => {
                    let position = params.iter().position(|(key, _)| *key == name.as_str());
                    match position {
                        Some(index) => {
                            used[index] = true;
                            url.push('/');
                            url.push_str(
                                &utf8_percent_encode(params[index].1, SEGMENT_ENCODE).to_string(),
                            );
                        }
                        None if *required => {
                            return Err(HttpError::internal(format!(
                                "missing parameter '{name}' for route pattern '{}'",
                                self.source
                            )));
                        }
                        None => {}
                    }
                }
            }
        }
        if url.is_empty() {
            url.push('/');
        }
        let leftovers: Vec<(&str, &str)> = params
            .iter()
            .zip(&used)
            .filter(|(_, was_used)| !**was_used)
            .map(|(pair, _)| *pair)
            .collect();
        if !leftovers.is_empty() {
            let query = serde_urlencoded::to_string(&leftovers).map_err(|err| {
                HttpError::internal(format!("could not encode query string: {err}"))
            })?;
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }
}

fn parse_segments(source: &str) -> HttpResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut seen = Vec::new();
    for raw in source.trim_start_matches('/').split('/') {
        if raw.is_empty() {
            continue;
        }
        if raw.starts_with('{') && raw.ends_with('}') {
            let inner = &raw[1..raw.len() - 1];
            let (name, required) = match inner.strip_suffix('?') {
                Some(name) => (name, false),
                None => (inner, true),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(HttpError::internal(format!(
                    "invalid placeholder '{raw}' in route pattern '{source}'"
                )));
            }
            if seen.contains(&name) {
                return Err(HttpError::internal(format!(
                    "duplicate placeholder '{name}' in route pattern '{source}'"
                )));
            }
            seen.push(name);
            segments.push(Segment::Param {
                name: name.to_string(),
                required,
            });
        } else if raw.contains('{') || raw.contains('}') {
            return Err(HttpError::internal(format!(
                "placeholders must span a whole segment in route pattern '{source}'"
            )));
        } else {
            segments.push(Segment::Literal(raw.to_string()));
        }
    }
    Ok(segments)
}

fn compile_regex(source: &str, segments: &[Segment]) -> HttpResult<Regex> {
    let mut pattern = String::from("^");
    if segments.is_empty() {
        pattern.push('/');
    }
    for (index, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => {
                pattern.push('/');
                pattern.push_str(&regex::escape(text));
            }
            Segment::Param { required: true, .. } => pattern.push_str("/([^/]+)"),
            Segment::Param {
                required: false, ..
            } => {
                // A leading optional segment must still let the bare root
                // path match
                if index == 0 {
                    pattern.push_str("/?");
                }
                pattern.push_str("(?:/([^/]+))?");
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|err| {
        HttpError::internal(format!("route pattern '{source}' failed to compile: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Matching ====================

    #[test]
    fn test_literal_pattern_matches_exactly() {
        let pattern = PathPattern::new("/products").expect("valid pattern");
        assert!(pattern.matches("/products").is_some());
        assert!(pattern.matches("/products/1").is_none());
        assert!(pattern.matches("/product").is_none());
    }

    #[test]
    fn test_root_pattern_matches_the_root_path() {
        let pattern = PathPattern::new("/").expect("valid pattern");
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
    }

    #[test]
    fn test_placeholders_capture_by_name() {
        let pattern = PathPattern::new("/products/{id}/reviews/{review_id}")
            .expect("valid pattern");
        let params = pattern.matches("/products/42/reviews/7").expect("matches");
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert_eq!(params.get("review_id"), Some(&"7".to_string()));
    }

    #[test]
    fn test_placeholder_does_not_cross_segments() {
        let pattern = PathPattern::new("/products/{id}").expect("valid pattern");
        assert!(pattern.matches("/products/1/reviews").is_none());
    }

    #[test]
    fn test_optional_placeholder_may_be_absent() {
        let pattern = PathPattern::new("/products/{page?}").expect("valid pattern");
        let with = pattern.matches("/products/2").expect("matches");
        assert_eq!(with.get("page"), Some(&"2".to_string()));
        let without = pattern.matches("/products").expect("matches");
        assert!(without.get("page").is_none());
    }

    #[test]
    fn test_leading_optional_placeholder_allows_the_root() {
        let pattern = PathPattern::new("/{page?}").expect("valid pattern");
        assert!(pattern.matches("/").is_some());
        let params = pattern.matches("/about").expect("matches");
        assert_eq!(params.get("page"), Some(&"about".to_string()));
    }

    #[test]
    fn test_captured_values_are_percent_decoded() {
        let pattern = PathPattern::new("/tags/{name}").expect("valid pattern");
        let params = pattern.matches("/tags/salted%20butter").expect("matches");
        assert_eq!(params.get("name"), Some(&"salted butter".to_string()));
    }

    #[test]
    fn test_literal_dots_are_not_wildcards() {
        let pattern = PathPattern::new("/files/v1.2/{name}").expect("valid pattern");
        assert!(pattern.matches("/files/v1.2/report").is_some());
        assert!(pattern.matches("/files/v1x2/report").is_none());
    }

    #[test]
    fn test_trailing_slash_in_pattern_is_not_significant() {
        let pattern = PathPattern::new("/products/").expect("valid pattern");
        assert!(pattern.matches("/products").is_some());
    }

    // ==================== Rejected patterns ====================

    #[test]
    fn test_partial_segment_placeholder_is_rejected() {
        assert!(PathPattern::new("/v{version}/users").is_err());
    }

    #[test]
    fn test_empty_and_malformed_names_are_rejected() {
        assert!(PathPattern::new("/products/{}").is_err());
        assert!(PathPattern::new("/products/{my id}").is_err());
    }

    #[test]
    fn test_duplicate_placeholder_is_rejected() {
        assert!(PathPattern::new("/a/{x}/b/{x}").is_err());
    }

    // ==================== Expansion ====================

    #[test]
    fn test_expand_substitutes_parameters() {
        let pattern = PathPattern::new("/products/{id}").expect("valid pattern");
        assert_eq!(
            pattern.expand(&[("id", "42")]).expect("expands"),
            "/products/42"
        );
    }

    #[test]
    fn test_expand_requires_required_parameters() {
        let pattern = PathPattern::new("/products/{id}").expect("valid pattern");
        assert!(pattern.expand(&[]).is_err());
    }

    #[test]
    fn test_expand_drops_omitted_optional_segments() {
        let pattern = PathPattern::new("/products/{page?}").expect("valid pattern");
        assert_eq!(pattern.expand(&[]).expect("expands"), "/products");
    }

    #[test]
    fn test_expand_encodes_values_and_appends_extras_as_query() {
        let pattern = PathPattern::new("/tags/{name}").expect("valid pattern");
        let url = pattern
            .expand(&[("name", "salted butter"), ("sort", "asc")])
            .expect("expands");
        assert_eq!(url, "/tags/salted%20butter?sort=asc");
    }
}
