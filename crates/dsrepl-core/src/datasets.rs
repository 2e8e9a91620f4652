//! Dataset paths
//!
//! A [`DatasetPath`] is the `/`-separated name of a dataset, e.g. `tank/backups/host1`.
//! The empty string is the empty (root) path.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DatasetPathError;

static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:\- ]+$").expect("valid component regex"));

/// Hierarchical dataset identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetPath {
    comps: Vec<String>,
}

impl DatasetPath {
    /// Parse a dataset path
    pub fn parse(s: &str) -> Result<Self, DatasetPathError> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        let invalid = |reason: String| DatasetPathError {
            path: s.to_string(),
            reason,
        };

        let mut comps = Vec::new();
        for (i, comp) in s.split('/').enumerate() {
            if comp.is_empty() {
                return Err(invalid(format!("component {} is empty", i)));
            }
            if let Some(c) = comp.chars().find(|c| *c == '@' || *c == '#') {
                return Err(invalid(format!(
                    "'{}' is reserved for snapshots and bookmarks",
                    c
                )));
            }
            if !COMPONENT.is_match(comp) {
                return Err(invalid(format!(
                    "component '{}' contains invalid characters",
                    comp
                )));
            }
            comps.push(comp.to_string());
        }

        Ok(Self { comps })
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.comps.len()
    }

    /// Whether this is the empty (root) path
    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    /// Path components
    pub fn components(&self) -> &[String] {
        &self.comps
    }

    /// Whether `prefix` is a component-wise prefix of this path
    pub fn has_prefix(&self, prefix: &DatasetPath) -> bool {
        self.comps.starts_with(&prefix.comps)
    }

    /// The remainder of this path after `prefix`, if it is a prefix
    pub fn trim_prefix(&self, prefix: &DatasetPath) -> Option<DatasetPath> {
        if !self.has_prefix(prefix) {
            return None;
        }
        Some(Self {
            comps: self.comps[prefix.len()..].to_vec(),
        })
    }

    /// Append `suffix` to this path
    pub fn join(&self, suffix: &DatasetPath) -> DatasetPath {
        let mut comps = self.comps.clone();
        comps.extend(suffix.comps.iter().cloned());
        Self { comps }
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.comps.join("/"))
    }
}

impl FromStr for DatasetPath {
    type Err = DatasetPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DatasetPath {
    type Error = DatasetPathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DatasetPath> for String {
    fn from(p: DatasetPath) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(s: &str) -> DatasetPath {
        DatasetPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_components() {
        let p = path("tank/backups/host1");
        assert_eq!(p.len(), 3);
        assert_eq!(p.components()[1], "backups");
        assert_eq!(p.to_string(), "tank/backups/host1");
    }

    #[test]
    fn test_empty_string_is_root() {
        let p = path("");
        assert!(p.is_empty());
        assert_eq!(p.to_string(), "");
    }

    #[rstest]
    #[case("tank//a")]
    #[case("/tank")]
    #[case("tank/")]
    #[case("tank@snap")]
    #[case("tank#book")]
    #[case("tank/a*b")]
    #[case("tank/ä")]
    fn test_rejects_invalid(#[case] input: &str) {
        let err = DatasetPath::parse(input).unwrap_err();
        assert_eq!(err.path, input);
    }

    #[test]
    fn test_accepts_zfs_characters() {
        let p = path("pool-1/data_set.v2/with space:x");
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_prefix_is_component_wise() {
        let p = path("tank/src/home");
        assert!(p.has_prefix(&path("tank/src")));
        assert!(p.has_prefix(&path("")));
        assert!(!p.has_prefix(&path("tank/sr")));
        assert!(!path("tank").has_prefix(&p));
    }

    #[test]
    fn test_trim_prefix_and_join() {
        let p = path("tank/src/home/alice");
        let rest = p.trim_prefix(&path("tank/src")).unwrap();
        assert_eq!(rest.to_string(), "home/alice");
        assert_eq!(path("backup").join(&rest).to_string(), "backup/home/alice");
        assert!(p.trim_prefix(&path("other")).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let p: DatasetPath = serde_yaml::from_str("tank/a").unwrap();
        assert_eq!(p, path("tank/a"));
        assert!(serde_yaml::from_str::<DatasetPath>("tank//a").is_err());
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"tank/a\"");
    }
}
