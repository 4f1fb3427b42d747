// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(clippy::module_name_repetitions)]

//! Hardware-offloaded IPv4 Network Address Translation (NAT) tables
//!
//! This package builds and maintains the translation tables that a packet-processing coprocessor
//! walks to rewrite IPv4 addresses and ports. Tables live in a memory region shared with the
//! coprocessor. Each table is made of four contiguous sub-tables:
//!
//! - the base translation table, addressed by a hash of the destination side of a connection,
//! - the expansion translation table, holding the collision chains of the base table,
//! - the index table, addressed by a hash of the source side of a connection,
//! - the index expansion table, holding the collision chains of the index table.
//!
//! The [`NatEngine`] is the only entry point. It is generic over the hardware control channel
//! ([`NatHardware`]) and over the way reserved regions are mapped ([`RegionMapper`]), so that it
//! can drive the coprocessor or the in-process [`SimulatedHardware`].
//!
//! # Example
//!
//! ```
//! use ipanat_nat::{EngineConfig, HeapMapper, NatEngine, NatRule, PdnEntry, SimulatedHardware};
//! use std::net::Ipv4Addr;
//!
//! let engine = NatEngine::new(
//!     EngineConfig::default(),
//!     SimulatedHardware::default(),
//!     HeapMapper,
//! );
//! let public_ip = Ipv4Addr::new(10, 0, 0, 1);
//! let table = engine.create_table(public_ip, 100).unwrap();
//! engine.modify_pdn(0, PdnEntry::new(public_ip)).unwrap();
//!
//! let rule = NatRule {
//!     private_ip: Ipv4Addr::new(192, 168, 0, 1),
//!     private_port: 1234,
//!     target_ip: Ipv4Addr::new(8, 8, 8, 8),
//!     target_port: 80,
//!     public_port: 40000,
//!     protocol: 6,
//!     timestamp: 42,
//!     pdn_index: 0,
//!     redirect: false,
//! };
//! let handle = engine.add_rule(table, &rule).unwrap();
//! assert_eq!(engine.query_timestamp(table, handle).unwrap(), 42);
//! ```
//!
//! # Limitations
//!
//! - Only IPv4 tables are supported.
//! - Rule handles are only meaningful for the table that issued them, and only until that table
//!   is deleted.

mod arena;
mod chain;
pub mod checksum;
mod engine;
mod errors;
pub mod handle;
pub mod hash;
pub mod hw;
mod layout;
pub mod mmap;
mod pdn;
mod row;
mod rule;
pub mod sim;
pub mod sizing;
mod table;


pub use config::EngineConfig;
pub use engine::NatEngine;
pub use errors::{ErrorKind, NatError};
pub use handle::{RuleHandle, TableHandle};
pub use hw::{HwError, HwVersion, NatHardware, RegionMapper, SharedRegion};
pub use mmap::{DeviceMapper, HeapMapper};
pub use pdn::{MAX_PDN, PdnEntry};
pub use rule::NatRule;
pub use sim::SimulatedHardware;
pub use table::TableStats;

use tracectl::trace_target;
trace_target!("ipa-nat", LevelFilter::INFO, &["nat"]);
