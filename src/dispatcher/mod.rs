// src/dispatcher/mod.rs

//! The build-job server.
//!
//! - [`ledger`] is the pure in-flight accounting state.
//! - [`accounting`] is the actor that owns the ledger.
//! - [`job`] runs one submission: parse, generate, execute, report.
//! - [`component`] is the dispatcher lifecycle (`start`/`submit`/`stop`).
//! - [`protocol`] defines the wire frames.
//! - [`server`] and [`client`] are the two ends of the local endpoint.

pub mod accounting;
pub mod client;
pub mod component;
pub mod job;
pub mod ledger;
pub mod protocol;
pub mod server;

pub use accounting::{InflightJob, JobAccounting};
pub use component::{DispatcherComponent, LifecycleState};
pub use job::JobCancellation;
pub use protocol::{ClientRequest, JobResponse, SubmitJobRequest};
