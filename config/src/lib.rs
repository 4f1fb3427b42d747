// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration models for the NAT table engine. [`EngineConfig`] parameterizes the engine
//! itself, while a [`NatManifest`] describes the PDNs, tables and rules a controller wants
//! provisioned.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

pub mod engine;
pub mod errors;
pub mod manifest;

pub use engine::EngineConfig; // re-export
pub use errors::{ConfigError, ConfigResult}; // re-export
pub use manifest::{NatManifest, PdnConfig, Protocol, RuleConfig, TableConfig}; // re-export

/// Number of PDN slots the coprocessor provides.
pub const MAX_PDN: usize = 5;

use tracectl::trace_target;
trace_target!("nat-config", LevelFilter::INFO, &["config"]);
