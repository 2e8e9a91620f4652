//! CLI command implementations

pub mod map;
pub mod pools;
pub mod validate;
