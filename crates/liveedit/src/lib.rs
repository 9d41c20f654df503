pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

pub use app::patch::PatchEngine;
pub use app::stamp::{StampOptions, StampOutcome, Stamper};
pub use domain::errors::PatchError;
pub use domain::location::{LocationIdentifier, SourcePosition};

/// Install the tracing subscriber described by `config`.
pub fn init(config: &infra::logging::LoggingConfig) -> anyhow::Result<()> {
    infra::logging::init(config)
}
