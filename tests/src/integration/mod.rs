//! # Integration Tests
//!
//! - `prepare_flow`: a prepare travels from the directory lookup to the
//!   in-memory backbone and is observed by a subscriber
//! - `runtime_flow`: the wired runtime behind its HTTP ingress

pub mod prepare_flow;
pub mod runtime_flow;
