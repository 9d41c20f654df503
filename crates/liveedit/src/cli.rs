//! Command-line front end.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rayon::prelude::*;

use crate::app::patch::PatchEngine;
use crate::app::relay;
use crate::app::stamp::{StampOptions, StampOutcome, Stamper};
use crate::domain::location::LocationIdentifier;
use crate::infra::config::Config;
use crate::infra::logging::{self, LogSink};
use crate::infra::syntax::SyntaxTree;
use crate::infra::workspace::ProjectRoot;

const TEXT_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Parser)]
#[command(
    name = "liveedit",
    author,
    version,
    about = "Stamp JSX elements with their source location and patch their text in place",
    long_about = None
)]
pub struct Cli {
    /// Project root; identifiers are relative to it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inject location identifiers into source files
    Stamp {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write results under this directory instead of printing them.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Also write a `.map` source map next to each output file.
        #[arg(long, requires = "out_dir")]
        source_map: bool,
    },
    /// Replace the text of the element addressed by an identifier
    Patch {
        #[arg(long)]
        edit_id: String,
        #[arg(long)]
        value: String,
    },
    /// List the elements of a file with their identifiers
    Locate { file: PathBuf },
    /// Answer newline-delimited JSON patch requests on stdin
    Serve,
    /// Print shell completions
    Completions { shell: Shell },
}

pub fn run() -> Result<()> {
    Cli::parse().execute()
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        if let Commands::Completions { shell } = self.command {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "liveedit", &mut io::stdout());
            return Ok(());
        }

        let config = Config::load(&self.root)?;
        let mut logging_config = config.logging.to_logging_config().with_verbosity(self.verbose);
        if let Some(path) = self.log_file {
            logging_config.sink = LogSink::File(path);
        }
        logging::init(&logging_config)?;

        match self.command {
            Commands::Stamp {
                files,
                out_dir,
                source_map,
            } => stamp_files(&self.root, &config, &files, out_dir.as_deref(), source_map),
            Commands::Patch { edit_id, value } => {
                let engine = PatchEngine::from_config(&self.root, &config)?;
                let outcome = engine
                    .apply_patch(&edit_id, &value)
                    .map_err(|err| anyhow!("{}: {err}", err.kind()))?;
                println!("patched {}", outcome.file_path);
                Ok(())
            }
            Commands::Locate { file } => locate(&self.root, &config, &file),
            Commands::Serve => {
                let engine = PatchEngine::from_config(&self.root, &config)?;
                let stdin = io::stdin();
                let answered = relay::serve(&engine, stdin.lock(), io::stdout().lock())?;
                tracing::info!(answered, "input closed");
                Ok(())
            }
            Commands::Completions { .. } => Ok(()),
        }
    }
}

fn stamper(root: &Path, config: &Config) -> Result<Stamper> {
    let root = ProjectRoot::new(root, &config.paths.excluded)?;
    Ok(Stamper::new(root, StampOptions::from_config(config)))
}

fn stamp_files(
    root: &Path,
    config: &Config,
    files: &[PathBuf],
    out_dir: Option<&Path>,
    source_map: bool,
) -> Result<()> {
    let stamper = stamper(root, config)?;

    let results: Vec<(PathBuf, Result<(String, StampOutcome)>)> = files
        .par_iter()
        .map(|file| {
            let path = resolve_input(file);
            let outcome = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))
                .map(|content| {
                    let outcome = stamper.stamp(&path, &content);
                    (content, outcome)
                });
            (path, outcome)
        })
        .collect();

    let mut stdout = io::stdout().lock();
    let (mut transformed, mut unchanged, mut skipped) = (0, 0, 0);
    for (path, result) in results {
        let (content, outcome) = match result {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };

        let relative = stamper.root().relative_path(&path);
        match outcome {
            StampOutcome::Transformed(stamped) => {
                transformed += 1;
                match out_dir {
                    Some(dir) => {
                        let target = dir.join(&stamped.relative_path);
                        write_output(&target, &stamped.code)?;
                        if source_map {
                            let map = stamped.source_map(&content).to_json()?;
                            write_output(&append_extension(&target, "map"), &map)?;
                        }
                    }
                    None => stdout.write_all(stamped.code.as_bytes())?,
                }
            }
            StampOutcome::Unchanged => {
                unchanged += 1;
                match (out_dir, relative) {
                    (Some(dir), Some(relative)) => write_output(&dir.join(relative), &content)?,
                    (Some(_), None) => {}
                    (None, _) => stdout.write_all(content.as_bytes())?,
                }
            }
            StampOutcome::Skipped(reason) => {
                skipped += 1;
                tracing::warn!(path = %path.display(), ?reason, "file not stamped");
            }
        }
    }
    stdout.flush()?;

    eprintln!("stamped {transformed} file(s), {unchanged} unchanged, {skipped} skipped");
    Ok(())
}

fn locate(root: &Path, config: &Config, file: &Path) -> Result<()> {
    let stamper = stamper(root, config)?;
    let path = resolve_input(file);
    let dialect = stamper
        .dialect_for(&path)
        .ok_or_else(|| anyhow!("unsupported file type: {}", path.display()))?;
    let relative = stamper
        .root()
        .relative_path(&path)
        .ok_or_else(|| anyhow!("{} is outside the project", path.display()))?;
    let content =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let tree = SyntaxTree::parse(dialect, &content)?;
    if tree.has_errors() {
        tracing::warn!(path = %relative, "file has syntax errors");
    }

    let mut stdout = io::stdout().lock();
    for element in tree.elements() {
        let identifier = LocationIdentifier::new(relative.as_str(), element.position(&content));
        let text = element
            .text(&content)
            .map(preview)
            .unwrap_or_else(|| "-".to_owned());
        writeln!(
            stdout,
            "{identifier}\t<{}>\t{text}",
            element.tag_name(&content)
        )?;
    }
    Ok(())
}

/// Input files are taken relative to the working directory; symlinks are
/// resolved so they compare against the canonical project root.
fn resolve_input(file: &Path) -> PathBuf {
    file.canonicalize().unwrap_or_else(|_| file.to_path_buf())
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    let Some(parent) = path.parent() else {
        bail!("invalid output path {}", path.display());
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > TEXT_PREVIEW_CHARS {
        let truncated: String = flat.chars().take(TEXT_PREVIEW_CHARS).collect();
        format!("{truncated}…")
    } else {
        flat
    }
}
