#![doc = include_str!("../README.md")]

pub mod augment;
pub mod collect;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod include;
pub mod ledger;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod scan;
pub mod sections;

pub use augment::augment;
pub use collect::collect;
pub use engine::{Engine, Generate, RoundOutcome};
pub use error::{GenerateError, LoomError, Result};
pub use fragment::Fragment;
pub use include::IncludeResolver;
pub use ledger::Ledger;
pub use output::{GeneratedFile, OutputManifest};
pub use paths::Workspace;
pub use pipeline::{Pipeline, SourceRewrite, StepContext, StepOutcome, TransformStep};
pub use sections::{Sections, extract_sections};
