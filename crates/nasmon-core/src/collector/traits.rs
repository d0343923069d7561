//! Seams between collectors and the host.
//!
//! Collectors never touch `std::fs` or `std::process` directly. File reads go
//! through [`FileSystem`] and external tools through [`CommandRunner`], so every
//! sampler can be driven by [`MockFs`](super::MockFs) and
//! [`MockRunner`](super::MockRunner) in tests.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::collector::error::{CollectError, ExecError};
use crate::hub::{Hub, Payload};

/// Abstraction for filesystem reads.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// Returns full paths of the direct children, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Runs external programs on behalf of collectors.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and returns its standard output.
    ///
    /// A non-zero exit status is an error; stderr is kept in the error.
    fn output(&self, program: &str, args: &[&str]) -> Result<String, ExecError>;

    /// Returns `true` if `program` can be found on `PATH`.
    fn exists(&self, program: &str) -> bool;
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[&str]) -> Result<String, ExecError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExecError::Failed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// A scheduled data source that produces one payload per pass.
///
/// Implementors only describe how to sample; publishing and fault handling
/// live in [`Collector::collect`] and in the scheduler.
pub trait Collector: Send + 'static {
    /// Short name used in logs (`"vm"`, `"system"`, ...).
    fn name(&self) -> &'static str;

    /// Topic this collector publishes to. Exactly one producer per topic.
    fn topic(&self) -> &'static str;

    /// Gathers one snapshot.
    ///
    /// Returns [`CollectError::MissingPrerequisite`] when a required tool is
    /// absent, or another error when the primary listing failed. Partial data
    /// from secondary sources is not an error.
    fn sample(&mut self) -> Result<Payload, CollectError>;

    /// Runs one pass: sample, then publish exactly one event on success.
    ///
    /// Returns the number of subscribers the event was delivered to.
    fn collect(&mut self, hub: &Hub) -> Result<usize, CollectError> {
        let payload = self.sample()?;
        Ok(hub.publish(self.topic(), payload))
    }
}
