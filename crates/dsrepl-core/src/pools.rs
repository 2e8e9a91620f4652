//! Pool declarations and lookup

use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::config::{LoadOptions, decode_entry};
use crate::error::{Error, Result, Section};
use crate::transport::Transport;

/// A named endpoint and how to reach it
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    /// Pool name (unique within a document)
    pub name: String,

    /// Transport used to reach the pool
    pub transport: Transport,
}

/// Pools declared by a document, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolRegistry {
    pools: Vec<Arc<Pool>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPool {
    name: String,
    transport: Mapping,
}

impl PoolRegistry {
    /// Decode the entries of the `pools` section
    pub fn decode(entries: &[Value], options: &LoadOptions) -> Result<Self> {
        let mut pools: Vec<Arc<Pool>> = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let raw: RawPool = decode_entry(Section::Pools, index, entry)?;

            if raw.name.is_empty() {
                return Err(Error::Decode {
                    section: Section::Pools,
                    index,
                    message: "pool name must not be empty".to_string(),
                });
            }
            if let Some(first) = pools.iter().position(|p| p.name == raw.name) {
                return Err(Error::DuplicatePool {
                    name: raw.name,
                    first,
                    index,
                });
            }

            let transport =
                Transport::from_block(&raw.transport, options).map_err(|source| {
                    Error::Transport {
                        index,
                        name: raw.name.clone(),
                        source,
                    }
                })?;

            tracing::debug!("Pool '{}' uses {} transport", raw.name, transport.kind());
            pools.push(Arc::new(Pool {
                name: raw.name,
                transport,
            }));
        }

        Ok(Self { pools })
    }

    /// Look up a pool by name
    pub fn get(&self, name: &str) -> Option<&Arc<Pool>> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Look up the pool referenced by `section[index]`
    pub fn find_by_name(&self, section: Section, index: usize, name: &str) -> Result<Arc<Pool>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound {
                section,
                index,
                name: name.to_string(),
            })
    }

    /// Iterate pools in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Pool>> {
        self.pools.iter()
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pools are declared
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn entries(yaml: &str) -> Vec<Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn decode(yaml: &str) -> Result<PoolRegistry> {
        PoolRegistry::decode(&entries(yaml), &LoadOptions::default())
    }

    #[test]
    fn test_decode_pools() {
        let registry = decode(
            r#"
- name: backup
  transport:
    local: {}
- name: offsite
  transport:
    ssh:
      host: offsite.example.com
      user: root
"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["backup", "offsite"]);
        assert_eq!(registry.get("offsite").unwrap().transport.kind(), "ssh");
    }

    #[test]
    fn test_empty_section() {
        let registry = decode("[]").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_name() {
        let registry = decode("- name: backup\n  transport: {local: {}}").unwrap();
        let pool = registry.find_by_name(Section::Pushs, 0, "backup").unwrap();
        assert_eq!(pool.name, "backup");

        let err = registry
            .find_by_name(Section::Pushs, 3, "missing")
            .unwrap_err();
        match err {
            Error::ReferenceNotFound {
                section,
                index,
                name,
            } => {
                assert_eq!(section, Section::Pushs);
                assert_eq!(index, 3);
                assert_eq!(name, "missing");
            }
            other => panic!("Expected reference not found, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_pool_rejected() {
        let err = decode(
            r#"
- name: backup
  transport: {local: {}}
- name: backup
  transport: {local: {}}
"#,
        )
        .unwrap_err();
        match err {
            Error::DuplicatePool { name, first, index } => {
                assert_eq!(name, "backup");
                assert_eq!(first, 0);
                assert_eq!(index, 1);
            }
            other => panic!("Expected duplicate pool, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_error_carries_pool() {
        let err = decode(
            r#"
- name: ok
  transport: {local: {}}
- name: broken
  transport: {}
"#,
        )
        .unwrap_err();
        match err {
            Error::Transport {
                index,
                name,
                source: TransportError::AmbiguousTransport { .. },
            } => {
                assert_eq!(index, 1);
                assert_eq!(name, "broken");
            }
            other => panic!("Expected ambiguous transport, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_transport_is_decode_error() {
        let err = decode("- name: backup").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                section: Section::Pools,
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = decode("- name: ''\n  transport: {local: {}}").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
