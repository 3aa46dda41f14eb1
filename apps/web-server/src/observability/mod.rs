//! Observability module - request IDs carried through tracing spans.

mod request_id;

pub use request_id::{RequestId, RequestIdMiddleware};
