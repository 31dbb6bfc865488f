//! Request pipeline and typed backend operations.

pub mod catalog;
pub mod engine;
pub mod envelope;
pub mod operations;

pub use catalog::hub_operations;
pub use engine::{ProxyEngine, ProxyReply, ProxyRequest};
pub use operations::{Operation, OperationCodec, OperationInput, OperationRegistry};
