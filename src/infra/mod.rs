//! Infrastructure file handling.
//!
//! A small parsed-document abstraction over the declarative infrastructure
//! file, plus synthesis of the service block for one instance.

mod document;
mod service;

pub use document::{InfraDocument, ServiceBlock};
pub use service::render_service_block;
