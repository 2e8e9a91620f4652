//! Dataset mapping rules
//!
//! A relationship's `mapping` is a map of pattern to target. The first character
//! of each pattern selects the kind of rule:
//!
//! - `|...` - direct mapping: every source maps to the target. Must be the only entry.
//! - `*...` - exec mapping: the target (`!program args...`) decides per dataset.
//! - `...*` - glob mapping: datasets under the prefix are re-rooted under the target.
//!
//! # Example
//!
//! ```yaml
//! mapping:
//!   "tank/src*": "backup/src"
//!   "*acceptor": "!/usr/local/bin/decide --strict"
//! ```
//!
//! Rules are compiled in ascending pattern order, which is also the order they are
//! tried in when mapping a dataset.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::datasets::DatasetPath;
use crate::error::{DatasetPathError, MappingError};

type Result<T> = std::result::Result<T, MappingError>;

/// A single compiled mapping rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetMapping {
    /// Unconditional rename
    Direct(DirectMapping),

    /// Prefix re-rooting
    Glob(GlobMapping),

    /// Decision delegated to an external program
    Exec(ExecMapping),
}

/// Unconditional rename to a fixed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMapping {
    /// Source the rule is limited to; `None` matches the single implicit source
    pub source: Option<DatasetPath>,

    /// Target dataset
    pub target: DatasetPath,
}

/// Re-roots datasets under `prefix_path` beneath `target_root`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMapping {
    /// Datasets at or below this path match
    pub prefix_path: DatasetPath,

    /// Root the relative suffix is appended to
    pub target_root: DatasetPath,
}

/// Delegates the mapping decision to `name args...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecMapping {
    /// Program to run
    pub name: String,

    /// Program arguments
    pub args: Vec<String>,
}

/// Ordered alternatives for one relationship
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComboMapping {
    /// Compiled rules, sorted by their source pattern
    pub mappings: Vec<DatasetMapping>,
}

impl ComboMapping {
    /// Compile a raw pattern -> target map
    pub fn compile(raw: &BTreeMap<String, String>) -> Result<Self> {
        // Checked up front so sibling errors never mask it
        if raw.len() > 1
            && let Some(pattern) = raw.keys().find(|p| p.starts_with('|'))
        {
            return Err(MappingError::NonExclusiveDirectMapping {
                pattern: pattern.clone(),
                entries: raw.len(),
            });
        }

        let mut mappings = Vec::with_capacity(raw.len());
        for (pattern, target) in raw {
            mappings.push(compile_rule(pattern, target)?);
        }
        tracing::debug!("Compiled {} mapping rules", mappings.len());
        Ok(Self { mappings })
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Map `source` through the first rule that matches it
    pub async fn map(&self, source: &DatasetPath) -> Result<DatasetPath> {
        for mapping in &self.mappings {
            match mapping.map(source).await {
                Err(MappingError::NoMatch) => continue,
                result => return result,
            }
        }
        Err(MappingError::NoRuleMatched {
            path: source.to_string(),
        })
    }
}

fn compile_rule(pattern: &str, target: &str) -> Result<DatasetMapping> {
    let invalid = |source: DatasetPathError| MappingError::InvalidDatasetPath {
        pattern: pattern.to_string(),
        source,
    };

    if pattern.starts_with('|') {
        Ok(DatasetMapping::Direct(DirectMapping {
            source: None,
            target: DatasetPath::parse(target).map_err(invalid)?,
        }))
    } else if pattern.starts_with('*') {
        let command = target.strip_prefix('!').unwrap_or(target);
        let fields: Vec<&str> = command.split_whitespace().collect();
        let (name, args) = fields
            .split_first()
            .ok_or_else(|| MappingError::MissingAcceptorPath {
                pattern: pattern.to_string(),
            })?;
        Ok(DatasetMapping::Exec(ExecMapping {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }))
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
        Ok(DatasetMapping::Glob(GlobMapping {
            prefix_path: DatasetPath::parse(prefix).map_err(invalid)?,
            target_root: DatasetPath::parse(target).map_err(invalid)?,
        }))
    } else {
        Err(MappingError::UnrecognizedPattern {
            pattern: pattern.to_string(),
        })
    }
}

impl DatasetMapping {
    /// Map `source`, or fail with [`MappingError::NoMatch`] if the rule does not apply
    pub async fn map(&self, source: &DatasetPath) -> Result<DatasetPath> {
        match self {
            DatasetMapping::Direct(m) => m.map(source),
            DatasetMapping::Glob(m) => m.map(source),
            DatasetMapping::Exec(m) => m.map(source).await,
        }
    }
}

impl DirectMapping {
    fn map(&self, source: &DatasetPath) -> Result<DatasetPath> {
        match &self.source {
            Some(expected) if expected != source => Err(MappingError::NoMatch),
            _ => Ok(self.target.clone()),
        }
    }
}

impl GlobMapping {
    fn map(&self, source: &DatasetPath) -> Result<DatasetPath> {
        let suffix = source
            .trim_prefix(&self.prefix_path)
            .ok_or(MappingError::NoMatch)?;
        Ok(self.target_root.join(&suffix))
    }
}

impl ExecMapping {
    /// Write `source` to the program's stdin and read the target from its first output line.
    /// A line consisting of `!` means the program rejects the dataset.
    async fn map(&self, source: &DatasetPath) -> Result<DatasetPath> {
        let exec_error = |message: String| MappingError::Exec {
            program: self.name.clone(),
            message,
        };

        tracing::debug!("Running exec mapping {} for '{}'", self.name, source);

        let mut child = Command::new(&self.name)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| exec_error(format!("failed to start: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| exec_error("stdin not captured".to_string()))?;
        // The program may answer without reading its input
        match stdin.write_all(format!("{}\n", source).as_bytes()).await {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(exec_error(format!("failed to write request: {}", e)));
            }
            _ => {}
        }
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| exec_error("stdout not captured".to_string()))?;
        let mut line = String::new();
        let read = BufReader::new(stdout)
            .read_line(&mut line)
            .await
            .map_err(|e| exec_error(format!("failed to read response: {}", e)))?;

        // Only the first line is read
        let _ = child.start_kill();
        let _ = child.wait().await;

        if read == 0 {
            return Err(exec_error("unexpected end of output".to_string()));
        }

        let answer = line.trim();
        if answer == "!" {
            return Err(MappingError::NoMatch);
        }
        DatasetPath::parse(answer).map_err(|source| MappingError::InvalidDatasetPath {
            pattern: self.name.clone(),
            source,
        })
    }
}
