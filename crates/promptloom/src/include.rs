use crate::error::{LoomError, Result};
use crate::fragment::{Fragment, relative_identity};
use crate::pipeline::{StepContext, StepOutcome, TransformStep};
use crate::scan;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// A 1-based inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// A recognized include directive, parsed out of one fragment line.
#[derive(Debug, Clone)]
pub struct IncludeDirective {
    pub target: String,
    pub lines: Option<Vec<LineRange>>,
    pub expand: bool,
}

impl IncludeDirective {
    /// Returns `None` when the attributes are malformed (no `path`, or an
    /// unparseable `lines` spec) — the directive then stays in the text as
    /// ordinary prose rather than erroring.
    fn from_attrs(attrs: &HashMap<String, String>) -> Option<Self> {
        let target = attrs.get("path")?.clone();
        let lines = match attrs.get("lines") {
            Some(spec) => Some(parse_ranges(spec)?),
            None => None,
        };
        let expand = attrs.get("expand").is_some_and(|v| v == "true");
        Some(Self {
            target,
            lines,
            expand,
        })
    }
}

/// Parses `start:end[,start:end…]` into ranges. Ranges may overlap or be
/// given out of order; they are applied in the order listed.
fn parse_ranges(spec: &str) -> Option<Vec<LineRange>> {
    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let (start, end) = part.split_once(':')?;
        let start: usize = start.trim().parse().ok()?;
        let end: usize = end.trim().parse().ok()?;
        if start == 0 {
            return None;
        }
        ranges.push(LineRange { start, end });
    }
    Some(ranges)
}

/// Selects the union of `ranges` from `content`, in the order listed,
/// clamped to the end of the file.
pub fn slice_lines(content: &str, ranges: &[LineRange]) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut selected = Vec::new();
    for range in ranges {
        for i in range.start..=range.end {
            if i > lines.len() {
                break;
            }
            selected.push(lines[i - 1]);
        }
    }
    selected.join("\n")
}

/// Expands `<loom:include path="…" [lines="…"] [expand="true"] />`
/// directives.
///
/// A path beginning with `/` resolves against the process working directory
/// (marker stripped); anything else resolves against the directory holding
/// the current fragment. Each directive line is replaced by the (possibly
/// line-sliced) target content. With `expand="true"` the unsliced target is
/// also enqueued as a fragment of its own, so its includes and sections get
/// processed. An unreadable target aborts the whole run.
pub struct IncludeResolver;

impl TransformStep for IncludeResolver {
    fn name(&self) -> &'static str {
        "include-resolver"
    }

    fn apply(&self, fragment: Fragment, ctx: &StepContext) -> Result<StepOutcome> {
        let Some(content) = fragment.content().map(str::to_string) else {
            return Ok(StepOutcome::unchanged(fragment));
        };
        let matches = scan::find_include_directives(&content);
        if matches.is_empty() {
            return Ok(StepOutcome::unchanged(fragment));
        }

        let mut rewritten = String::with_capacity(content.len());
        let mut cursor = 0;
        let mut new_fragments = Vec::new();

        for m in &matches {
            let Some(directive) = IncludeDirective::from_attrs(&m.attrs) else {
                // Unrecognized attributes: keep the line as ordinary text.
                rewritten.push_str(&content[cursor..m.range.end]);
                cursor = m.range.end;
                continue;
            };

            let target = resolve_target(&directive.target, &fragment, ctx);
            let full = fs::read_to_string(&target).map_err(|source| {
                LoomError::IncludeUnreadable {
                    target: target.clone(),
                    fragment: fragment.relative_path.clone(),
                    source,
                }
            })?;
            let spliced = match &directive.lines {
                Some(ranges) => slice_lines(&full, ranges),
                None => full.clone(),
            };

            rewritten.push_str(&content[cursor..m.range.start]);
            rewritten.push_str(&spliced);
            cursor = m.range.end;

            if directive.expand {
                let rel = relative_identity(&target, &ctx.specs_dir, &ctx.cwd);
                new_fragments.push(Fragment::loaded(target, rel, 0, full));
            }
        }
        rewritten.push_str(&content[cursor..]);

        Ok(StepOutcome {
            fragment: fragment.with_content(rewritten),
            new_fragments,
        })
    }
}

fn resolve_target(target: &str, fragment: &Fragment, ctx: &StepContext) -> PathBuf {
    match target.strip_prefix('/') {
        Some(stripped) => ctx.cwd.join(stripped),
        None => fragment.base_dir(&ctx.cwd).join(target),
    }
}
