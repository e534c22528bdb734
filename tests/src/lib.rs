//! # Transfer Switch Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Envelope building and topic resolution throughput
//! └── src/integration/  # Directory → envelope → backbone flows across crates
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p switch-tests
//!
//! # Integration flows only
//! cargo test -p switch-tests integration::
//!
//! # Benchmarks
//! cargo bench -p switch-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
