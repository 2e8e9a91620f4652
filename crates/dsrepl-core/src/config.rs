//! Topology configuration loading
//!
//! A topology document declares pools and the replication relationships between
//! them:
//!
//! ```yaml
//! pools:
//!   - name: offsite
//!     transport:
//!       ssh: { host: offsite.example.com, user: root }
//! pushs:
//!   - to: offsite
//!     datasets: [tank/home, tank/var]
//! pulls:
//!   - from: offsite
//!     mapping: { "tank/src*": "backup/offsite" }
//! sinks:
//!   - from: laptop
//!     mapping: { "|laptop": "backup/laptop" }
//! ```
//!
//! Sections are decoded in dependency order (pools first) and the first error
//! aborts the load.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::datasets::DatasetPath;
use crate::error::{Error, Result, Section};
use crate::mapping::ComboMapping;
use crate::pools::{Pool, PoolRegistry};
use crate::transport::RequestHandler;

/// File looked up when [`Config::load`] is given a directory
pub const CONFIG_FILE_NAME: &str = "dsrepl.yaml";

/// Collaborators injected while building a [`Config`]
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Handler that serves pools with a `local` transport
    pub local_handler: Option<Arc<dyn RequestHandler>>,
}

impl LoadOptions {
    /// Serve local transports with `handler`
    pub fn with_local_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.local_handler = Some(handler);
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("local_handler", &self.local_handler.is_some())
            .finish()
    }
}

/// Replicate datasets to a pool
#[derive(Debug, Clone, PartialEq)]
pub struct Push {
    /// Destination pool
    pub to: Arc<Pool>,

    /// Datasets to send, in document order
    pub datasets: Vec<DatasetPath>,
}

/// Accept datasets from a pool
#[derive(Debug, Clone, PartialEq)]
pub struct Pull {
    /// Source pool
    pub from: Arc<Pool>,

    /// Rename rules for received datasets
    pub mapping: ComboMapping,
}

/// Accept datasets from a peer that is not a declared pool
#[derive(Debug, Clone, PartialEq)]
pub struct Sink {
    /// Free-form source identifier
    pub from: String,

    /// Rename rules for received datasets
    pub mapping: ComboMapping,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPush {
    to: String,
    #[serde(default)]
    datasets: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRelationship {
    from: String,
    #[serde(default)]
    mapping: BTreeMap<String, String>,
}

/// A validated topology
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Declared pools
    pub pools: PoolRegistry,

    /// Push relationships
    pub pushs: Vec<Push>,

    /// Pull relationships
    pub pulls: Vec<Pull>,

    /// Sinks
    pub sinks: Vec<Sink>,

    /// SHA-256 of the source text (empty when built from a parsed value)
    pub digest: String,
}

impl Config {
    /// Load a topology from a file, or from `dsrepl.yaml` inside a directory
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("/etc/dsrepl")?;
    /// println!("{} pools", config.pools.len());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, &LoadOptions::default())
    }

    /// Load a topology with injected collaborators
    pub fn load_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        tracing::debug!("Reading topology from {}", config_path.display());
        let contents = std::fs::read_to_string(&config_path)?;
        Self::from_yaml_with(&contents, options)
    }

    /// Parse a topology document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with(yaml, &LoadOptions::default())
    }

    /// Parse a topology document with injected collaborators
    pub fn from_yaml_with(yaml: &str, options: &LoadOptions) -> Result<Self> {
        let root: Value = if yaml.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(yaml)?
        };
        let mut config = Self::from_value(root, options)?;
        config.digest = hex::encode(Sha256::digest(yaml.as_bytes()));
        Ok(config)
    }

    /// Build a topology from an already parsed document
    pub fn from_value(root: Value, options: &LoadOptions) -> Result<Self> {
        let root = match root {
            Value::Mapping(mapping) => mapping,
            // An empty file parses to null
            Value::Null => Mapping::new(),
            other => {
                return Err(Error::MalformedSection {
                    section: "root".to_string(),
                    found: value_kind(&other).to_string(),
                });
            }
        };

        let pools = PoolRegistry::decode(section(&root, Section::Pools)?, options)?;
        let pushs = decode_pushs(section(&root, Section::Pushs)?, &pools)?;
        let pulls = decode_pulls(section(&root, Section::Pulls)?, &pools)?;
        let sinks = decode_sinks(section(&root, Section::Sinks)?)?;

        tracing::info!(
            "Loaded topology: {} pools, {} pushs, {} pulls, {} sinks",
            pools.len(),
            pushs.len(),
            pulls.len(),
            sinks.len()
        );

        Ok(Self {
            pools,
            pushs,
            pulls,
            sinks,
            digest: String::new(),
        })
    }

    /// The pull accepting datasets from pool `name`
    pub fn find_pull(&self, name: &str) -> Option<&Pull> {
        self.pulls.iter().find(|p| p.from.name == name)
    }

    /// The sink accepting datasets from `from`
    pub fn find_sink(&self, from: &str) -> Option<&Sink> {
        self.sinks.iter().find(|s| s.from == from)
    }
}

fn section(root: &Mapping, section: Section) -> Result<&[Value]> {
    match root.get(section.key()) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(entries)) => Ok(entries.as_slice()),
        Some(other) => Err(Error::MalformedSection {
            section: section.key().to_string(),
            found: value_kind(other).to_string(),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Decode one section entry, attributing failures to `section[index]`
pub(crate) fn decode_entry<T: DeserializeOwned>(
    section: Section,
    index: usize,
    entry: &Value,
) -> Result<T> {
    serde_yaml::from_value(entry.clone()).map_err(|e| Error::Decode {
        section,
        index,
        message: e.to_string(),
    })
}

fn decode_pushs(entries: &[Value], pools: &PoolRegistry) -> Result<Vec<Push>> {
    let mut pushs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let raw: RawPush = decode_entry(Section::Pushs, index, entry)?;
        let to = pools.find_by_name(Section::Pushs, index, &raw.to)?;

        let datasets = raw
            .datasets
            .iter()
            .map(|ds| DatasetPath::parse(ds))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| Error::DatasetPath {
                section: Section::Pushs,
                index,
                source,
            })?;

        pushs.push(Push { to, datasets });
    }
    Ok(pushs)
}

fn decode_pulls(entries: &[Value], pools: &PoolRegistry) -> Result<Vec<Pull>> {
    let mut pulls = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let raw: RawRelationship = decode_entry(Section::Pulls, index, entry)?;
        let from = pools.find_by_name(Section::Pulls, index, &raw.from)?;
        let mapping = compile_mapping(Section::Pulls, index, &raw.mapping)?;
        pulls.push(Pull { from, mapping });
    }
    Ok(pulls)
}

fn decode_sinks(entries: &[Value]) -> Result<Vec<Sink>> {
    let mut sinks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let raw: RawRelationship = decode_entry(Section::Sinks, index, entry)?;
        let mapping = compile_mapping(Section::Sinks, index, &raw.mapping)?;
        sinks.push(Sink {
            from: raw.from,
            mapping,
        });
    }
    Ok(sinks)
}

fn compile_mapping(
    section: Section,
    index: usize,
    raw: &BTreeMap<String, String>,
) -> Result<ComboMapping> {
    ComboMapping::compile(raw).map_err(|source| Error::Mapping {
        section,
        index,
        source,
    })
}
