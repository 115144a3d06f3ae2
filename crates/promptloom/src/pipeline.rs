use crate::error::Result;
use crate::fragment::Fragment;
use crate::scan;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Paths the transformation steps resolve against.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub specs_dir: PathBuf,
    pub cwd: PathBuf,
}

/// What one step produced for one fragment: the (possibly rewritten)
/// fragment itself, plus any fragments to enqueue for their own pass.
pub struct StepOutcome {
    pub fragment: Fragment,
    pub new_fragments: Vec<Fragment>,
}

impl StepOutcome {
    pub fn unchanged(fragment: Fragment) -> Self {
        Self {
            fragment,
            new_fragments: Vec::new(),
        }
    }
}

/// A single transformation over one fragment's text.
///
/// Steps are handed to the pipeline as an explicit ordered list; nothing is
/// registered at module scope.
pub trait TransformStep {
    fn name(&self) -> &'static str;
    fn apply(&self, fragment: Fragment, ctx: &StepContext) -> Result<StepOutcome>;
}

/// Drives the step list over a FIFO worklist of fragments.
///
/// A visited set of absolute paths guarantees each physical file is
/// transformed at most once, which both deduplicates repeated references and
/// breaks include cycles: the second occurrence of a path is a no-op skip,
/// so the worklist always drains.
pub struct Pipeline {
    steps: Vec<Box<dyn TransformStep>>,
    ctx: StepContext,
}

impl Pipeline {
    pub fn new(ctx: StepContext, steps: Vec<Box<dyn TransformStep>>) -> Self {
        Self { steps, ctx }
    }

    /// The standard step order: source-tag rewrite, then include resolution.
    pub fn standard(ctx: StepContext) -> Self {
        Self::new(
            ctx,
            vec![
                Box::new(SourceRewrite),
                Box::new(crate::include::IncludeResolver),
            ],
        )
    }

    pub fn run(&self, initial: Vec<Fragment>) -> Result<Vec<Fragment>> {
        let mut worklist: VecDeque<Fragment> = initial.into();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut resolved = Vec::new();

        while let Some(fragment) = worklist.pop_front() {
            let key = visited_key(&fragment.path, &self.ctx.cwd);
            if !visited.insert(key) {
                log::debug!("skipping already-resolved fragment {}", fragment.relative_path);
                continue;
            }
            let mut fragment = fragment.ensure_loaded()?;
            for step in &self.steps {
                let outcome = step.apply(fragment, &self.ctx)?;
                fragment = outcome.fragment;
                worklist.extend(outcome.new_fragments);
            }
            resolved.push(fragment);
        }

        Ok(resolved)
    }
}

/// One stable identity per physical file, regardless of how a directive
/// spelled the path. Synthetic fragments keep their sentinel.
fn visited_key(path: &Path, cwd: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        }
    })
}

/// Rewrites line-anchored `<loom:source path="P" />` tags into a `<code>`
/// block wrapping an include directive for the same path — sugar for quoting
/// a source file. Runs before include resolution.
pub struct SourceRewrite;

impl TransformStep for SourceRewrite {
    fn name(&self) -> &'static str {
        "source-rewrite"
    }

    fn apply(&self, fragment: Fragment, _ctx: &StepContext) -> Result<StepOutcome> {
        let Some(content) = fragment.content() else {
            return Ok(StepOutcome::unchanged(fragment));
        };
        let matches = scan::find_source_tags(content);
        if matches.is_empty() {
            return Ok(StepOutcome::unchanged(fragment));
        }

        let mut rewritten = String::with_capacity(content.len());
        let mut cursor = 0;
        for m in &matches {
            rewritten.push_str(&content[cursor..m.range.start]);
            rewritten.push_str(&format!(
                "{indent}<code path=\"{path}\">\n   <loom:include path=\"{path}\" />\n</code>",
                indent = m.indent,
                path = m.path,
            ));
            cursor = m.range.end;
        }
        rewritten.push_str(&content[cursor..]);

        Ok(StepOutcome::unchanged(fragment.with_content(rewritten)))
    }
}
