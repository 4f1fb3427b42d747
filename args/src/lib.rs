// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Generation code the coprocessor reports for IPA v4.0.
const DEFAULT_HW_VERSION: u32 = 14;

#[derive(Parser, Debug)]
#[command(name = "natctl")]
#[command(version)]
#[command(about = "Provision hardware-offloaded IPv4 NAT tables", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct CmdArgs {
    #[arg(long, value_name = "FILE", help = "Provisioning manifest (YAML)")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "GENERATION",
        default_value_t = DEFAULT_HW_VERSION,
        help = "Coprocessor generation code reported by the simulated hardware (14 = v4.0)"
    )]
    hw_version: u32,

    #[arg(
        long,
        value_name = "DIR",
        help = "Back table regions with files in DIR, memory-mapped, instead of heap buffers"
    )]
    region_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Do not delete the tables on exit")]
    keep: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the available tracing tags and exit"
    )]
    show_tracing_tags: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,ipa-nat=debug"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
    pub fn hw_version(&self) -> u32 {
        self.hw_version
    }
    pub fn region_dir(&self) -> Option<&Path> {
        self.region_dir.as_deref()
    }
    pub fn keep(&self) -> bool {
        self.keep
    }
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    pub fn tracing(&self) -> Option<&str> {
        self.tracing.as_deref()
    }

    pub fn log(&self) {
        debug!("Command line arguments: {self:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::{CmdArgs, Parser};
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let args = CmdArgs::parse_from(["natctl"]);
        assert_eq!(args.config(), None);
        assert_eq!(args.hw_version(), 14);
        assert_eq!(args.region_dir(), None);
        assert!(!args.keep());
        assert!(!args.show_tracing_tags());
        assert_eq!(args.tracing(), None);
    }

    #[test]
    fn test_parse_all() {
        let args = CmdArgs::parse_from([
            "natctl",
            "--config",
            "nat.yaml",
            "--hw-version",
            "13",
            "--region-dir",
            "/tmp/regions",
            "--keep",
            "--show-tracing-targets",
            "--tracing",
            "default=warn,ipa-nat=debug",
        ]);
        assert_eq!(args.config(), Some(Path::new("nat.yaml")));
        assert_eq!(args.hw_version(), 13);
        assert_eq!(args.region_dir(), Some(Path::new("/tmp/regions")));
        assert!(args.keep());
        assert!(args.show_tracing_targets());
        assert_eq!(args.tracing(), Some("default=warn,ipa-nat=debug"));
    }

    #[test]
    fn test_reject_bad_version() {
        assert!(CmdArgs::try_parse_from(["natctl", "--hw-version", "v4"]).is_err());
    }
}
