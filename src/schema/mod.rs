//! Event log input schema
//!
//! This module defines the accepted event log records (CSV, NDJSON or JSON)
//! and the adapter that turns them into ordered events for extraction.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
