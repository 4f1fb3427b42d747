// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Install a manifest on an engine, and take it down again

use config::{NatManifest, TableConfig};
use nat::{
    NatEngine, NatError, NatHardware, NatRule, PdnEntry, RegionMapper, RuleHandle, TableHandle,
    TableStats,
};
use std::fmt::Display;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub(crate) struct InstalledRule {
    pub(crate) handle: RuleHandle,
    pub(crate) rule: NatRule,
    pub(crate) timestamp: u32,
}

#[derive(Debug)]
pub(crate) struct InstalledTable {
    pub(crate) handle: TableHandle,
    pub(crate) public_ip: Ipv4Addr,
    pub(crate) rules: Vec<InstalledRule>,
    pub(crate) stats: Option<TableStats>,
}

/// What was installed so far. Filled in as provisioning goes, so that a partial installation
/// can be taken down.
#[derive(Debug, Default)]
pub(crate) struct Report {
    pub(crate) tables: Vec<InstalledTable>,
}

fn install_table<H: NatHardware, M: RegionMapper>(
    engine: &NatEngine<H, M>,
    config: &TableConfig,
    installed: &mut InstalledTable,
) -> Result<(), NatError> {
    for rule_config in &config.rules {
        let rule = NatRule::from(rule_config);
        let handle = engine.add_rule(installed.handle, &rule)?;
        let timestamp = engine.query_timestamp(installed.handle, handle)?;
        installed.rules.push(InstalledRule {
            handle,
            rule,
            timestamp,
        });
    }
    installed.stats = Some(engine.table_stats(installed.handle)?);
    Ok(())
}

/// Create the tables of `manifest`, apply its PDNs, then add its rules.
///
/// PDNs are applied after the tables are created since creating a table assigns its public
/// address to PDN 0.
pub(crate) fn provision<H: NatHardware, M: RegionMapper>(
    engine: &NatEngine<H, M>,
    manifest: &NatManifest,
    report: &mut Report,
) -> Result<(), NatError> {
    for table in &manifest.tables {
        let handle = engine
            .create_table(table.public_ip, table.entries)
            .inspect_err(|e| error!("Failed to create table for {}: {e}", table.public_ip))?;
        report.tables.push(InstalledTable {
            handle,
            public_ip: table.public_ip,
            rules: vec![],
            stats: None,
        });
    }

    for pdn in &manifest.pdns {
        let entry = PdnEntry {
            public_ip: pdn.public_ip,
            src_metadata: pdn.src_metadata,
            dst_metadata: pdn.dst_metadata,
        };
        engine
            .modify_pdn(pdn.index, entry)
            .inspect_err(|e| error!("Failed to set PDN {}: {e}", pdn.index))?;
    }

    for (config, installed) in manifest.tables.iter().zip(report.tables.iter_mut()) {
        install_table(engine, config, installed)
            .inspect_err(|e| error!("Failed to provision table {}: {e}", installed.handle))?;
        info!(
            "Table {} ({}) holds {} rules",
            installed.handle,
            installed.public_ip,
            installed.rules.len()
        );
    }
    Ok(())
}

/// Remove every rule, then every table of `report`. Keeps going on failure and returns the
/// first error.
pub(crate) fn teardown<H: NatHardware, M: RegionMapper>(
    engine: &NatEngine<H, M>,
    report: &Report,
) -> Result<(), NatError> {
    let mut first = Ok(());
    for table in &report.tables {
        for rule in &table.rules {
            if let Err(e) = engine.delete_rule(table.handle, rule.handle) {
                warn!("Failed to delete rule {} of table {}: {e}", rule.handle, table.handle);
                first = first.and(Err(e));
            }
        }
        match engine.delete_table(table.handle) {
            Ok(()) => debug!("Deleted table {}", table.handle),
            Err(e) => {
                warn!("Failed to delete table {}: {e}", table.handle);
                first = first.and(Err(e));
            }
        }
    }
    first
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for table in &self.tables {
            write!(f, "table {} public {}", table.handle, table.public_ip)?;
            if let Some(stats) = &table.stats {
                write!(
                    f,
                    " base {}/{} expansion {}/{}",
                    stats.base_in_use,
                    stats.base_entries,
                    stats.expansion_in_use,
                    stats.expansion_entries
                )?;
            }
            writeln!(f)?;
            for rule in &table.rules {
                let r = &rule.rule;
                writeln!(
                    f,
                    "  rule {:>5}: {}:{} -> {}:{} proto {} pdn {} public port {} ts {}{}",
                    rule.handle,
                    r.private_ip,
                    r.private_port,
                    r.target_ip,
                    r.target_port,
                    r.protocol,
                    r.pdn_index,
                    r.public_port,
                    rule.timestamp,
                    if r.redirect { " redirect" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nat::sim::{Errno, HwCommand, HwOp, SimulatedHardware};
    use nat::{DeviceMapper, EngineConfig, HeapMapper};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const MANIFEST: &str = r"
engine:
  max-tables: 2
pdns:
  - index: 1
    public-ip: 10.0.0.2
    src-metadata: 3
tables:
  - public-ip: 10.0.0.1
    entries: 100
    rules:
      - private-ip: 192.168.0.1
        private-port: 1234
        target-ip: 8.8.8.8
        target-port: 80
        public-port: 40000
        protocol: tcp
        timestamp: 42
      - private-ip: 192.168.0.1
        private-port: 1235
        target-ip: 8.8.8.8
        target-port: 80
        public-port: 40000
        protocol: tcp
        timestamp: 43
  - public-ip: 10.0.1.1
    entries: 10
    rules:
      - private-ip: 192.168.1.1
        private-port: 53
        target-ip: 8.8.4.4
        target-port: 53
        public-port: 40001
        protocol: udp
        pdn-index: 1
        timestamp: 16777217
";

    #[test]
    #[traced_test]
    fn provision_and_teardown() {
        let manifest = NatManifest::from_yaml_str(MANIFEST).unwrap();
        let engine = NatEngine::new(
            manifest.engine.clone(),
            SimulatedHardware::default(),
            HeapMapper,
        );
        let mut report = Report::default();
        provision(&engine, &manifest, &mut report).unwrap();

        assert_eq!(report.tables.len(), 2);
        let timestamps: Vec<_> = report
            .tables
            .iter()
            .flat_map(|t| t.rules.iter().map(|r| r.timestamp))
            .collect();
        assert_eq!(timestamps, vec![42, 43, 1]);
        // both rules of the first table share a bucket
        let stats = report.tables[0].stats.unwrap();
        assert_eq!((stats.base_in_use, stats.expansion_in_use), (1, 1));
        assert_eq!(engine.pdn(1).unwrap().src_metadata, 3);
        // the last table created owns PDN 0
        assert_eq!(engine.pdn(0).unwrap().public_ip, Ipv4Addr::new(10, 0, 1, 1));

        let text = report.to_string();
        assert!(text.contains("table 1 public 10.0.0.1 base 1/128 expansion 1/20\n"));
        assert!(text.contains("pdn 1 public port 40001 ts 1\n"), "{text}");

        teardown(&engine, &report).unwrap();
        assert_eq!(engine.table_count().unwrap(), 0);
        let deletes = engine
            .hardware()
            .commands()
            .iter()
            .filter(|cmd| matches!(cmd, HwCommand::Delete(_)))
            .count();
        assert_eq!(deletes, 2);
    }

    #[test]
    fn partial_provisioning_can_be_undone() {
        let manifest = NatManifest::from_yaml_str(MANIFEST).unwrap();
        let engine = NatEngine::new(
            manifest.engine.clone(),
            SimulatedHardware::default(),
            HeapMapper,
        );
        // the first table, then the first rule once the tables exist
        engine.hardware().fail_next(HwOp::Version, Errno::ENODEV);
        engine.hardware().fail_next(HwOp::Commit, Errno::EIO);
        let mut report = Report::default();
        assert!(provision(&engine, &manifest, &mut report).is_err());
        assert!(report.tables.is_empty());

        let mut report = Report::default();
        assert!(provision(&engine, &manifest, &mut report).is_err());
        assert_eq!(report.tables.len(), 2);
        assert!(report.tables[0].rules.is_empty());
        teardown(&engine, &report).unwrap();
        assert_eq!(engine.table_count().unwrap(), 0);
    }

    #[test]
    fn device_backed_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = NatManifest::from_yaml_str(MANIFEST).unwrap();
        let engine = NatEngine::new(
            EngineConfig {
                max_tables: 2,
                ..Default::default()
            },
            SimulatedHardware::default().with_region_dir(dir.path()),
            DeviceMapper,
        );
        let mut report = Report::default();
        provision(&engine, &manifest, &mut report).unwrap();
        teardown(&engine, &report).unwrap();
        assert!(dir.path().join("ipaNatTable").exists());
    }
}
