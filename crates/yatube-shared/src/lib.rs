//! # Yatube Shared
//!
//! Form payloads, form errors and error page context used by the web layer.

pub mod errors;
pub mod forms;
pub mod response;

pub use errors::FormErrors;
pub use response::ErrorPage;
