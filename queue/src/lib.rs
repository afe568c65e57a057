//! Async producer/consumer queue for tokio tasks.
//!
//! `AsyncQueue` is bounded or unbounded, removes from the oldest (FIFO) or the newest (LIFO) end,
//! moves batches atomically or incrementally, and lets observers await the moment it becomes full
//! or empty through its `EventBroker`.

pub mod collections;
pub mod config;
pub mod config_option;
pub mod element;
pub mod event_broker;
pub mod timing;

pub use self::{
  collections::*, config::*, config_option::*, element::*, event_broker::*, timing::*,
};
