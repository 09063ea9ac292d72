//! Permit application ("hakemus") lifecycle and registry synchronization.
//!
//! The registry is authoritative once an application has been submitted; until then the
//! local draft is. Everything that reconciles the two lives under [`workflows::hakemus`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
