//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the poll cycle and the port interfaces it drives:
//! exchange adapters on the way in, metric sinks on the way out.

/// Port interfaces for exchanges and metric sinks.
pub mod ports;

/// Poll cycle orchestration and retry policy.
pub mod services;
