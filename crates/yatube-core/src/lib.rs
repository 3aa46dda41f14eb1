//! # Yatube Core
//!
//! The domain layer of the Yatube blogging platform.
//! This crate contains entities, pagination and the ports infrastructure
//! must implement. It has no infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod pagination;
pub mod ports;

pub use error::DomainError;
pub use pagination::{Page, PageWindow, Paginator};
