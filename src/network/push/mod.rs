//! Websocket push channel
//!
//! [`PushHub`] owns the subscriber registry, [`FanoutService`] feeds it from
//! the store change feed, and the warp route upgrades inbound connections
//! into hub subscriptions.

mod fanout_service;
mod push_hub;
mod ws_route;
pub use fanout_service::*;
pub use push_hub::*;
pub(crate) use ws_route::*;
