//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`name`]: validation of issuer / name / domain segments

pub mod error;
pub mod name;
