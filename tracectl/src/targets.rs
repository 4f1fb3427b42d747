// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of tracing targets

use crate::LevelFilter;
use linkme::distributed_slice;

/// A tracing target as declared by [`trace_target!`](crate::trace_target).
#[derive(Debug)]
pub struct TargetDecl {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}

impl TargetDecl {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[distributed_slice]
pub static TRACING_TARGETS: [TargetDecl];

/// Declare the tracing target of the calling module, with a short name, a default level and
/// a list of tags.
///
/// The calling crate must depend on `linkme`.
#[macro_export]
macro_rules! trace_target {
    ($name:expr, $level:expr, $tags:expr) => {
        // The const scope lets a crate invoke the macro in several modules without the statics
        // clashing.
        const _: () = {
            use linkme::distributed_slice;
            use $crate::LevelFilter;
            use $crate::targets::{TRACING_TARGETS, TargetDecl};

            #[distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: TargetDecl = TargetDecl::new(module_path!(), $name, $level, $tags);
        };
    };
}
