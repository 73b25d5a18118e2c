//! `pastis-broker`: a central broker coordinating a fleet of heterogeneous
//! fuzzing engines against one target program.
//!
//! See `DESIGN.md` at the workspace root for the component breakdown and
//! the rationale behind each module's design.

pub mod assignment;
pub mod binary_registry;
pub mod broker;
pub mod client;
pub mod cli;
pub mod defect_report;
pub mod error;
pub mod logging;
pub mod policy;
pub mod seed_pool;
pub mod stats;
pub mod transport;
pub mod types;
pub mod workspace;

pub use broker::{Broker, BrokerConfig};
pub use error::Error;
