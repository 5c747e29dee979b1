pub mod level;
pub mod field;
pub mod entry;
pub mod buffer;
pub mod encoder;
pub mod sink;
pub mod core;

pub mod host;
pub mod document;
pub mod index;
pub mod mirror;
pub mod backend;

#[cfg(feature = "opensearch")]
pub mod opensearch;

pub mod layer;
pub mod init;
pub mod env;
