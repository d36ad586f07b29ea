//! Security Module
//!
//! Provides security middleware for the Manta API:
//! - Security headers

pub mod middleware;

pub use middleware::security_headers_middleware;
