//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the Hub and its collaborators, and the port
//! interface that snapshot sources implement.

/// Port interfaces for external systems.
pub mod ports;

/// Hub, coordinating loop, worker pool gate and client queues.
pub mod services;
