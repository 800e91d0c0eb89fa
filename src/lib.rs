//! Record service exposing CRUD and listing over gRPC, with newly created
//! records pushed to websocket subscribers from the store change feed.
//!
//! The entry point is [`NodeBuilder`]: it connects the [`RecordStore`] and
//! yields a [`Node`] whose [`Node::run`] serves both surfaces until the
//! shutdown signal fires.

mod config;
mod errors;
mod feed;
mod handler;
mod metrics;
mod network;
mod node;
pub mod proto;
mod storage;

pub use config::*;
pub use errors::*;
pub use feed::*;
pub use handler::*;
pub use network::*;
pub use node::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms10, ObjectivePercentile::P99);
