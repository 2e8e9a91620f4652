//! dsrepl Core Library
//!
//! This crate turns a topology document into a validated [`Config`]:
//! - Pool declarations and their transports
//! - Push, pull and sink relationships bound to those pools
//! - Dataset mapping rules compiled from their pattern syntax
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Document   │────▶│    Pool     │────▶│ Relationship│────▶│   Config    │
//! │   (YAML)    │     │  Registry   │     │  + Mappings │     │ (immutable) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dsrepl_core::Config;
//!
//! let config = Config::load("/etc/dsrepl/dsrepl.yaml")?;
//! for pool in config.pools.iter() {
//!     println!("{}: {}", pool.name, pool.transport);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod datasets;
pub mod error;
pub mod mapping;
pub mod pools;
pub mod transport;

pub use config::{Config, LoadOptions, Pull, Push, Sink};
pub use datasets::DatasetPath;
pub use error::{Error, MappingError, Result, Section, TransportError};
pub use mapping::ComboMapping;
pub use pools::{Pool, PoolRegistry};
pub use transport::{Connect, RequestChannel, RequestHandler, Transport};
