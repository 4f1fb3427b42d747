// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing targets of the NAT engine and their runtime level control.
//!
//! Crates declare their targets with [`trace_target!`]; the declarations are gathered at link
//! time and loaded into a [`TracingControl`] the first time [`get_trace_ctl`] is called.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

pub mod control;
mod display;
pub mod targets;

pub use control::{TraceCtlError, TracingControl, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;
