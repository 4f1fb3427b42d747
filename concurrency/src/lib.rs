// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Synchronization primitives used by the NAT table engine.
//!
//! The engine never names `std::sync` directly. Building with the `shuttle` feature swaps every
//! lock and reference counter for its `shuttle` counterpart, so that the locking discipline
//! around table creation and rule insertion can be explored by the `shuttle` scheduler.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

#[cfg(not(feature = "shuttle"))]
pub use std::sync;

#[cfg(feature = "shuttle")]
pub use shuttle::sync;

#[cfg(not(feature = "shuttle"))]
pub use std::thread;

#[cfg(feature = "shuttle")]
pub use shuttle::thread;
