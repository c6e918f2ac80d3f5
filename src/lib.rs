//! rowgraph - map flat joined query results onto nested, typed entities
//!
//! This crate provides:
//! - Safe named-parameter substitution for hand-written query text
//! - Shape descriptors resolving a type's fields against result columns
//! - Identity-aware hydration of joined rows into entity graphs
//! - An async client facade over a pluggable store driver

pub mod client;
pub mod config;
pub mod fixture;
pub mod hydrate;
pub mod shape;
pub mod tokenizer;
pub mod value;

pub use client::{cancel_pair, CancelHandle, CancelSignal, Client, ClientError, ErrorKind};
pub use config::ClientConfig;
pub use shape::{ColumnMetadata, Entity, EntityShape, FieldShape};
pub use tokenizer::{parameterize, Params};
pub use value::{DbValue, ScalarType};
