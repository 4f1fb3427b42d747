// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::control::{TargetCfg, TargetDb};
use std::fmt::{Display, Formatter, Result};

const TARGET_WIDTH: usize = 40;

impl Display for TargetCfg {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{:<TARGET_WIDTH$} {:>6}  {}",
            self.target,
            self.level,
            self.tags.join(",")
        )
    }
}

impl Display for TargetDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f)?;
        writeln!(f, "{:<TARGET_WIDTH$} {:>6}  TAGS", "TARGET", "LEVEL")?;
        for cfg in self.targets.values() {
            writeln!(f, "{cfg}")?;
        }
        write!(f, "{:<TARGET_WIDTH$} {:>6}", "(default)", self.level)
    }
}

pub(crate) struct ByTag<'a>(pub(crate) &'a TargetDb);

impl Display for ByTag<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let db = self.0;
        writeln!(f)?;
        for (tag, members) in &db.tags {
            writeln!(f, "{tag}:")?;
            for cfg in members.iter().filter_map(|t| db.targets.get(t)) {
                writeln!(f, "    {:<TARGET_WIDTH$} {}", cfg.target, cfg.level)?;
            }
        }
        Ok(())
    }
}
