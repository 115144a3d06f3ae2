use crate::augment::augment;
use crate::collect::collect;
use crate::error::{GenerateError, LoomError, Result};
use crate::fragment::Fragment;
use crate::ledger::Ledger;
use crate::output::{self, GeneratedFile};
use crate::paths::Workspace;
use crate::pipeline::{Pipeline, StepContext};
use crate::sections::{Sections, extract_sections};
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// The generation collaborator, seen from the pipeline's side: an opaque
/// call from the two prompt halves to a file set. Implementations live in
/// `promptloom-llm`; tests use stubs.
pub trait Generate {
    fn generate(
        &self,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<Vec<GeneratedFile>, GenerateError>;
}

/// What a successful round produced: the file set as returned by the model,
/// and where each file actually landed after collision renames.
pub struct RoundOutcome {
    pub files: Vec<GeneratedFile>,
    pub written: Vec<PathBuf>,
}

/// Drives the whole composition flow against one [`Workspace`].
///
/// All paths are explicit; the only process-global input is the working
/// directory captured at construction (and overridable for tests).
pub struct Engine {
    workspace: Workspace,
    cwd: PathBuf,
}

impl Engine {
    pub fn new(workspace: Workspace) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self { workspace, cwd })
    }

    pub fn with_cwd(workspace: Workspace, cwd: PathBuf) -> Self {
        Self { workspace, cwd }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn step_context(&self) -> StepContext {
        StepContext {
            specs_dir: self.workspace.specs_dir().to_path_buf(),
            cwd: self.cwd.clone(),
        }
    }

    /// Collect, filter against the ledger, augment, inject the
    /// runtime-context fragment, and run the transformation pipeline.
    ///
    /// Errors with [`LoomError::NoFragments`] when nothing new is left to
    /// send — every collected fragment was already incorporated in a prior
    /// round.
    pub fn resolve(&self, now: DateTime<Local>) -> Result<Vec<Fragment>> {
        let collected = collect(self.workspace.specs_dir())?;
        let members = Ledger::new(self.workspace.ledger_file()).members()?;
        let fresh: Vec<Fragment> = collected
            .into_iter()
            .filter(|f| !members.contains(&f.relative_path))
            .collect();
        let mut working = augment(fresh, self.workspace.specs_dir())?;
        if working.is_empty() {
            return Err(LoomError::NoFragments);
        }
        working.push(Fragment::runtime_context(now));
        Pipeline::standard(self.step_context()).run(working)
    }

    /// Compose a single ephemeral prompt instead of reading the specs tree.
    /// The pipeline still runs, so includes inside the text are expanded.
    /// The ledger is neither consulted nor extended by inline rounds.
    pub fn resolve_inline(&self, text: &str, now: DateTime<Local>) -> Result<Vec<Fragment>> {
        let initial = vec![Fragment::inline_prompt(text), Fragment::runtime_context(now)];
        Pipeline::standard(self.step_context()).run(initial)
    }

    pub fn render(&self, fragments: &[Fragment]) -> Sections {
        extract_sections(fragments)
    }

    /// Render, call the generator, and persist the round.
    pub fn generate_round(
        &self,
        generator: &dyn Generate,
        fragments: &[Fragment],
        now: DateTime<Utc>,
    ) -> Result<RoundOutcome> {
        let sections = self.render(fragments);
        let files = generator
            .generate(&sections.system, &sections.prompt)
            .map_err(LoomError::Generate)?;
        self.complete_round(fragments, &sections, files, now)
    }

    /// Persists a successful generation: write the files, then the manifest,
    /// and only then extend the ledger and the prompt history. A failure
    /// anywhere leaves everything after the failure point unwritten.
    pub fn complete_round(
        &self,
        fragments: &[Fragment],
        sections: &Sections,
        files: Vec<GeneratedFile>,
        now: DateTime<Utc>,
    ) -> Result<RoundOutcome> {
        let written = output::materialize(&files, &self.cwd, now)?;
        self.workspace.ensure_cache_dir()?;
        output::write_manifest(&self.workspace.manifest_file(), &files)?;

        let ledger = Ledger::new(self.workspace.ledger_file());
        ledger.record(
            fragments
                .iter()
                .filter(|f| f.is_file_backed())
                .map(|f| f.relative_path.as_str()),
        )?;
        output::append_prompt_history(&self.workspace.prompts_file(), &sections.prompt, now)?;

        Ok(RoundOutcome { files, written })
    }

    /// Re-materializes the last-output manifest without calling the model.
    pub fn replay(&self, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
        let manifest = output::load_manifest(&self.workspace.manifest_file())?;
        output::materialize(&manifest.files, &self.cwd, now)
    }
}
