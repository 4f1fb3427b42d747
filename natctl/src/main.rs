// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod provision;

use crate::provision::{Report, provision, teardown};
use args::{CmdArgs, Parser};
use color_eyre::eyre::{Result, WrapErr};
use config::NatManifest;
use nat::{
    DeviceMapper, HeapMapper, HwVersion, NatEngine, NatHardware, RegionMapper, SimulatedHardware,
};
use tracectl::{get_trace_ctl, trace_target};
use tracing::{error, info};

trace_target!("natctl", LevelFilter::INFO, &[]);

fn run<H: NatHardware, M: RegionMapper>(
    engine: &NatEngine<H, M>,
    manifest: &NatManifest,
    keep: bool,
) -> Result<()> {
    let mut report = Report::default();
    let provisioned = provision(engine, manifest, &mut report);
    print!("{report}");

    if provisioned.is_err() || !keep {
        teardown(engine, &report).wrap_err("Failed to take the tables down")?;
    } else {
        info!("Keeping {} tables", report.tables.len());
    }
    provisioned.wrap_err("Provisioning failed")
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CmdArgs::parse();
    let tctl = get_trace_ctl();
    if let Some(tracing) = args.tracing() {
        tctl.setup_from_string(tracing)
            .inspect_err(|e| error!("Invalid tracing configuration: {e}"))
            .wrap_err("Invalid tracing configuration")?;
    }
    if args.show_tracing_tags() {
        tctl.dump_targets_by_tag();
        return Ok(());
    }
    if args.show_tracing_targets() {
        tctl.dump();
        return Ok(());
    }
    args.log();

    let manifest = match args.config() {
        Some(path) => NatManifest::load(path)
            .inspect_err(|e| error!("Bad manifest {}: {e}", path.display()))
            .wrap_err("Failed to load the manifest")?,
        None => {
            info!("No manifest given, nothing to provision");
            NatManifest::default()
        }
    };

    let hw = SimulatedHardware::new(HwVersion(args.hw_version()));
    let engine_config = manifest.engine.clone();
    match args.region_dir() {
        Some(dir) => {
            info!("Backing table regions with files in {}", dir.display());
            let engine = NatEngine::new(engine_config, hw.with_region_dir(dir), DeviceMapper);
            run(&engine, &manifest, args.keep())
        }
        None => {
            let engine = NatEngine::new(engine_config, hw, HeapMapper);
            run(&engine, &manifest, args.keep())
        }
    }
}
