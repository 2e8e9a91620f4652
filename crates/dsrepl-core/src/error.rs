//! Error types for dsrepl-core

use std::fmt;

use thiserror::Error;

/// Result type alias for dsrepl-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level section of a topology document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// `pools`
    Pools,
    /// `pushs`
    Pushs,
    /// `pulls`
    Pulls,
    /// `sinks`
    Sinks,
}

impl Section {
    /// Key of the section in the document
    pub fn key(self) -> &'static str {
        match self {
            Section::Pools => "pools",
            Section::Pushs => "pushs",
            Section::Pulls => "pulls",
            Section::Sinks => "sinks",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Errors that can occur while loading a topology or talking to an endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse the YAML document
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A section (or the root) is not the expected shape
    #[error("section '{section}' must be a list, found {found}")]
    MalformedSection {
        /// Section key, or `root` for the document itself
        section: String,
        /// Kind of value that was found instead
        found: String,
    },

    /// An entry of a section does not match the expected shape
    #[error("{section}[{index}]: {message}")]
    Decode {
        /// Section holding the entry
        section: Section,
        /// Position of the entry in the section
        index: usize,
        /// Description of the mismatch
        message: String,
    },

    /// A pool's transport block is invalid
    #[error("pools[{index}] '{name}': {source}")]
    Transport {
        /// Position of the pool in the section
        index: usize,
        /// Pool name
        name: String,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// Two pools share a name
    #[error("pools[{index}]: pool '{name}' already declared at pools[{first}]")]
    DuplicatePool {
        /// Pool name
        name: String,
        /// Position of the first declaration
        first: usize,
        /// Position of the duplicate
        index: usize,
    },

    /// A push or pull names a pool that is not declared
    #[error("{section}[{index}]: pool '{name}' not defined")]
    ReferenceNotFound {
        /// Section holding the reference
        section: Section,
        /// Position of the entry in the section
        index: usize,
        /// Referenced pool name
        name: String,
    },

    /// A dataset path listed by a relationship is invalid
    #[error("{section}[{index}]: {source}")]
    DatasetPath {
        /// Section holding the entry
        section: Section,
        /// Position of the entry in the section
        index: usize,
        /// Underlying path error
        #[source]
        source: DatasetPathError,
    },

    /// A relationship's mapping rules are invalid
    #[error("{section}[{index}]: {source}")]
    Mapping {
        /// Section holding the entry
        section: Section,
        /// Position of the entry in the section
        index: usize,
        /// Underlying mapping error
        #[source]
        source: MappingError,
    },

    /// Could not establish a channel to an endpoint
    #[error("connect via {transport} transport failed: {message}")]
    Connect {
        /// Transport kind
        transport: String,
        /// Description of the error
        message: String,
    },

    /// Channel protocol error
    #[error("channel error: {message}")]
    Channel {
        /// Description of the error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while resolving a transport block
#[derive(Error, Debug)]
pub enum TransportError {
    /// Zero or several transport keys
    #[error("ambiguous transport type: expected exactly one of 'ssh' or 'local', found {}", describe_keys(.keys))]
    AmbiguousTransport {
        /// Keys that were present
        keys: Vec<String>,
    },

    /// The single key is not a known transport
    #[error("unknown transport type '{key}'")]
    UnknownTransportType {
        /// Offending key
        key: String,
    },

    /// The selected variant's fields could not be decoded
    #[error("could not parse {transport} transport: {message}")]
    TransportDecode {
        /// Variant name
        transport: String,
        /// Underlying decode error
        message: String,
    },
}

fn describe_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.iter()
            .map(|k| format!("'{}'", k))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Errors raised while compiling or applying mapping rules
#[derive(Error, Debug)]
pub enum MappingError {
    /// A direct mapping shares its map with other entries
    #[error("direct mapping '{pattern}' must be the only mapping, found {entries} entries")]
    NonExclusiveDirectMapping {
        /// The `|` pattern
        pattern: String,
        /// Number of entries in the map
        entries: usize,
    },

    /// A pattern or target is not a valid dataset path
    #[error("mapping '{pattern}': {source}")]
    InvalidDatasetPath {
        /// Pattern of the offending rule
        pattern: String,
        /// Underlying path error
        #[source]
        source: DatasetPathError,
    },

    /// An exec mapping target has no program
    #[error("exec mapping '{pattern}' without acceptor path")]
    MissingAcceptorPath {
        /// Pattern of the offending rule
        pattern: String,
    },

    /// A pattern matches none of the rule forms
    #[error("unrecognized mapping pattern '{pattern}'")]
    UnrecognizedPattern {
        /// The pattern
        pattern: String,
    },

    /// The rule does not apply to the given path
    #[error("no match")]
    NoMatch,

    /// No rule of a combo mapping applies to the given path
    #[error("no mapping rule matched '{path}'")]
    NoRuleMatched {
        /// Source dataset path
        path: String,
    },

    /// An exec mapping program failed
    #[error("exec mapping '{program}': {message}")]
    Exec {
        /// Program name
        program: String,
        /// Description of the failure
        message: String,
    },
}

/// A string that is not a valid dataset path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid dataset path '{path}': {reason}")]
pub struct DatasetPathError {
    /// Offending input
    pub path: String,
    /// Why it was rejected
    pub reason: String,
}
