//! The text-scanning seam: directive and section-tag matching.
//!
//! Fragments are not guaranteed to be well-formed XML, so matching is
//! deliberately lenient — line-anchored directives, first-match tagged
//! regions, no real XML parser. Everything regex lives here so the matching
//! strategy can be swapped without touching the pipeline.

use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

static ATTRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)=["']([^"']+)["']"#).unwrap());

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*<loom:include\s+([^>]+?)\s*/>[ \t]*\r?$").unwrap()
});

static SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)<loom:source\s+path="([^"]+)"\s*/>[ \t]*\r?$"#).unwrap()
});

/// Parses `key="value"` / `key='value'` pairs out of a tag's attribute text.
pub fn parse_attributes(text: &str) -> HashMap<String, String> {
    ATTRS
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// A matched include directive: the byte range of the whole directive line
/// and its raw attributes.
#[derive(Debug, Clone)]
pub struct DirectiveMatch {
    pub range: Range<usize>,
    pub attrs: HashMap<String, String>,
}

/// Finds every `<loom:include … />` directive. Only directives that begin a
/// line (leading whitespace allowed) and occupy it entirely are recognized —
/// mentions inside prose stay untouched.
pub fn find_include_directives(text: &str) -> Vec<DirectiveMatch> {
    INCLUDE
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            DirectiveMatch {
                range: whole.range(),
                attrs: parse_attributes(caps.get(1).unwrap().as_str()),
            }
        })
        .collect()
}

/// A matched `<loom:source path="…" />` tag with its leading indentation.
#[derive(Debug, Clone)]
pub struct SourceMatch {
    pub range: Range<usize>,
    pub indent: String,
    pub path: String,
}

/// Finds every line-anchored `<loom:source path="…" />` tag.
pub fn find_source_tags(text: &str) -> Vec<SourceMatch> {
    SOURCE
        .captures_iter(text)
        .map(|caps| SourceMatch {
            range: caps.get(0).unwrap().range(),
            indent: caps[1].to_string(),
            path: caps[2].to_string(),
        })
        .collect()
}

fn region_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}[^>]*>(.*?)</{tag}>")).expect("valid tag regex")
}

/// First `<tag …>…</tag>` region in `text`, case-insensitive. Returns the
/// byte ranges of the whole region and of its inner text.
pub fn first_tagged_region(text: &str, tag: &str) -> Option<(Range<usize>, Range<usize>)> {
    let caps = region_regex(tag).captures(text)?;
    Some((caps.get(0).unwrap().range(), caps.get(1).unwrap().range()))
}

/// Inner text of the first `<tag>` region, if any.
pub fn first_tagged_inner<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    first_tagged_region(text, tag).map(|(_, inner)| &text[inner])
}

/// `text` with the first `<tag>` region removed entirely.
pub fn strip_first_tagged(text: &str, tag: &str) -> String {
    match first_tagged_region(text, tag) {
        Some((full, _)) => format!("{}{}", &text[..full.start], &text[full.end..]),
        None => text.to_string(),
    }
}
