//! Bulk loading of output streams
//!
//! The pipeline never knows how files reach the database. After every
//! output file is closed it hands each loadable stream to a [`BulkLoader`],
//! once, in the schema's stream order.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{LoadError, Result};
use crate::streams::Stream;

/// Physically loads one output file into its table
pub trait BulkLoader {
    /// Load `path` into the table of `stream`, returning a description of
    /// what was done for the diagnostics file.
    fn load(&mut self, stream: Stream, path: &Path) -> Result<String>;
}

/// Runs an external command per stream.
///
/// The template is split on whitespace; `{table}` and `{file}` are replaced
/// in every argument. No shell is involved.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    program: String,
    args: Vec<String>,
}

impl CommandLoader {
    pub fn new(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| LoadError::loader("-", "bulk-load command template is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Command line that would load `path` into `stream`'s table
    pub fn command_line(&self, stream: Stream, path: &Path) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| expand(part, stream, path))
            .collect()
    }
}

fn expand(part: &str, stream: Stream, path: &Path) -> String {
    part.replace("{table}", stream.table_name())
        .replace("{file}", &path.display().to_string())
}

impl BulkLoader for CommandLoader {
    fn load(&mut self, stream: Stream, path: &Path) -> Result<String> {
        let command_line = self.command_line(stream, path);
        let (program, args) = match command_line.split_first() {
            Some(split) => split,
            None => return Err(LoadError::loader(stream.table_name(), "empty command line")),
        };

        debug!(table = stream.table_name(), command = %command_line.join(" "), "Running bulk load");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| LoadError::loader(stream.table_name(), format!("{}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LoadError::loader(
                stream.table_name(),
                format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            ));
        }

        info!(table = stream.table_name(), file = %path.display(), "Bulk loaded");
        Ok(command_line.join(" "))
    }
}

/// Records load requests without performing them
#[derive(Debug, Clone, Default)]
pub struct NoopLoader {
    requests: Vec<(Stream, String)>,
}

impl NoopLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> &[(Stream, String)] {
        &self.requests
    }
}

impl BulkLoader for NoopLoader {
    fn load(&mut self, stream: Stream, path: &Path) -> Result<String> {
        let description = format!("no bulk-load command configured; {} left in {}", stream, path.display());
        self.requests.push((stream, path.display().to_string()));
        Ok(description)
    }
}

impl<L: BulkLoader + ?Sized> BulkLoader for Box<L> {
    fn load(&mut self, stream: Stream, path: &Path) -> Result<String> {
        (**self).load(stream, path)
    }
}
