//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Hub`: Owns the instrument store and subscription index, refreshes
//!   and broadcasts
//! - `coordinator`: Serializes registration and the poll timer
//! - `WorkerPoolGate`: Shared ceiling on concurrent fetches
//! - `ClientHandle`: Per-client bounded outbound queue

mod client;
pub mod coordinator;
mod gate;
mod hub;

pub use client::{ClientHandle, Delivery};
pub use coordinator::{HubError, HubHandle, Registration, spawn};
pub use gate::{GateError, WorkerPoolGate};
pub use hub::{Hub, HubConfig, HubStats, PollSummary, RefreshOutcome};
