//! HTTP handlers for portal-service.

pub mod accounts;
pub mod admin;
pub mod contact;
pub mod metrics;
pub mod pages;

pub use accounts::*;
pub use contact::*;
pub use metrics::*;
pub use pages::*;
