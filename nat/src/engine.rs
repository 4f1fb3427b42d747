// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The NAT engine: table slots, PDNs and the operations on them

use crate::arena::TableArena;
use crate::errors::NatError;
use crate::handle::{RuleHandle, TableHandle};
use crate::hw::{DeleteCommand, HwVersion, NatHardware, PdnCommand, RegionMapper, Reservation};
use crate::layout::TableLayout;
use crate::pdn::{PdnEntry, PdnTable};
use crate::rule::NatRule;
use crate::sizing::TableSizing;
use crate::table::{TableCache, TableStats};
use concurrency::sync::{Arc, Mutex, MutexGuard, RwLock};
use config::EngineConfig;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

type SharedTable = Arc<Mutex<TableCache>>;

#[derive(Debug)]
struct Tables {
    slots: Vec<Option<SharedTable>>,
    count: usize,
}

impl Tables {
    fn get(&self, handle: TableHandle) -> Result<SharedTable, NatError> {
        self.slots
            .get(handle.slot())
            .cloned()
            .flatten()
            .ok_or(NatError::InvalidTable(handle.as_u16()))
    }
}

/// Owns the NAT tables of one coprocessor.
///
/// The slot array is guarded by a single lock, taken for the whole of table creation, table
/// deletion and timestamp queries. Each table has its own lock, held across the
/// hash, placement, write and commit sequence of rule insertion and removal, so that a table
/// has at most one writer at a time.
#[derive(Debug)]
pub struct NatEngine<H: NatHardware, M: RegionMapper> {
    config: EngineConfig,
    hw: H,
    mapper: M,
    tables: Mutex<Tables>,
    pdns: RwLock<PdnTable>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &'static str) -> Result<MutexGuard<'a, T>, NatError> {
    mutex.lock().map_err(|_| {
        error!("Lock on {what} is poisoned");
        NatError::Lock(what)
    })
}

impl<H: NatHardware, M: RegionMapper> NatEngine<H, M> {
    #[must_use]
    pub fn new(config: EngineConfig, hw: H, mapper: M) -> Self {
        let slots = vec![None; config.max_tables];
        Self {
            config,
            hw,
            mapper,
            tables: Mutex::new(Tables { slots, count: 0 }),
            pdns: RwLock::new(PdnTable::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The hardware control channel the engine drives.
    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Create a table sized for `entries` rules, translating to `public_ip`.
    ///
    /// PDN 0 takes `public_ip` as its public address.
    ///
    /// # Errors
    ///
    /// Fails if every slot is taken, if `entries` cannot be sized, or if the coprocessor cannot
    /// reserve, map or initialize the table. Nothing is left behind on failure.
    pub fn create_table(&self, public_ip: Ipv4Addr, entries: u16) -> Result<TableHandle, NatError> {
        let mut tables = lock(&self.tables, "tables")?;
        let slot = tables
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(NatError::NoTableSlot)?;
        let handle = TableHandle::from_slot(slot).ok_or(NatError::NoTableSlot)?;
        let table_index = u8::try_from(slot).map_err(|_| NatError::NoTableSlot)?;

        let sizing = TableSizing::for_entries(entries)?;
        debug!(
            "Table for {entries} entries: {} base, {} expansion, {} bytes",
            sizing.base_entries,
            sizing.expansion_entries,
            sizing.region_size()
        );
        let version = self.hw.hw_version()?;
        let reservation = self
            .hw
            .reserve(&self.config.nat_device, sizing.region_size())
            .inspect_err(|e| error!("Failed to reserve table memory: {e}"))?;
        let layout = TableLayout::new(sizing, reservation.offset);
        let release = DeleteCommand {
            table_index,
            public_ip,
        };
        let cache = self
            .setup_table(handle, public_ip, version, reservation, layout)
            .inspect_err(|_| {
                if let Err(e) = self.hw.delete_table(&release) {
                    warn!("Failed to release the memory of table {table_index}: {e}");
                }
            })?;

        self.pdns
            .write()
            .map_err(|_| NatError::Lock("pdns"))?
            .set_public_ip(0, public_ip)?;
        tables.slots[slot] = Some(Arc::new(Mutex::new(cache)));
        tables.count += 1;
        info!(
            "Created table {handle} for {public_ip} ({} tables)",
            tables.count
        );
        Ok(handle)
    }

    /// Map a reserved region and have the coprocessor initialize it. Unmaps on failure.
    fn setup_table(
        &self,
        handle: TableHandle,
        public_ip: Ipv4Addr,
        version: HwVersion,
        reservation: Reservation,
        layout: TableLayout,
    ) -> Result<TableCache, NatError> {
        let table_index = handle.slot();
        let region = self
            .mapper
            .map(&reservation)
            .inspect_err(|e| error!("Failed to map table memory: {e}"))?;
        let arena = TableArena::new(region, layout)
            .inspect_err(|e| error!("Bad region for table {table_index}: {e}"))?;
        let mut cache = TableCache::new(handle, public_ip, version, reservation, arena);

        let cmd = layout.init_command(cache.table_index(), public_ip);
        debug!("Initializing table {table_index}: {cmd:?}");
        if let Err(e) = self.hw.init_table(&cmd) {
            error!("Failed to initialize table {table_index}: {e}");
            let unmapped = cache
                .retire()
                .map(|arena| self.mapper.unmap(arena.into_region()));
            if let Some(Err(unmap)) = unmapped {
                warn!("Failed to unmap table {table_index}: {unmap}");
            }
            return Err(e.into());
        }
        Ok(cache)
    }

    /// Delete a table. The slot is freed even if unmapping or the coprocessor fails, the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Fails if `handle` does not name a table, or with the first unmap or hardware error.
    pub fn delete_table(&self, handle: TableHandle) -> Result<(), NatError> {
        let mut tables = lock(&self.tables, "tables")?;
        let table = tables.get(handle)?;
        let mut cache = lock(&table, "table")?;

        tables.slots[handle.slot()] = None;
        tables.count -= 1;

        let unmapped = match cache.retire() {
            Some(arena) => self
                .mapper
                .unmap(arena.into_region())
                .inspect_err(|e| error!("Failed to unmap table {handle}: {e}")),
            None => Ok(()),
        };
        let deleted = self
            .hw
            .delete_table(&cache.delete_command())
            .inspect_err(|e| error!("Failed to delete table {handle}: {e}"));
        info!(
            "Deleted table {handle} ({} bytes at {}, {} tables left)",
            cache.reservation().size,
            cache.reservation().offset,
            tables.count
        );
        unmapped.and(deleted)?;
        Ok(())
    }

    fn table(&self, handle: TableHandle) -> Result<SharedTable, NatError> {
        lock(&self.tables, "tables")?.get(handle)
    }

    /// Insert a translation rule in a table.
    ///
    /// # Errors
    ///
    /// Fails if the rule's PDN is out of range or not provisioned, if `table` is not a table, if
    /// the table has no room left, or if the coprocessor rejects the commit.
    pub fn add_rule(&self, table: TableHandle, rule: &NatRule) -> Result<RuleHandle, NatError> {
        let pdn = self
            .pdns
            .read()
            .map_err(|_| NatError::Lock("pdns"))?
            .provisioned(rule.pdn_index)?;
        let shared = self.table(table)?;
        let mut cache = lock(&shared, "table")?;
        let handle = cache.add_rule(&self.hw, rule, &pdn)?;
        debug!(
            "Added rule {handle} to table {table}: {}:{} -> {}:{} proto {} via {}:{}",
            rule.private_ip,
            rule.private_port,
            rule.target_ip,
            rule.target_port,
            rule.protocol,
            pdn.public_ip,
            rule.public_port
        );
        Ok(handle)
    }

    /// Disable a rule and free its rows. The handle is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Fails if either handle is invalid or if the coprocessor rejects the commit, in which case
    /// the rule is left in place.
    pub fn delete_rule(&self, table: TableHandle, rule: RuleHandle) -> Result<(), NatError> {
        let shared = self.table(table)?;
        let mut cache = lock(&shared, "table")?;
        cache.delete_rule(&self.hw, rule)?;
        debug!("Deleted rule {rule} of table {table}");
        Ok(())
    }

    /// The 24-bit timestamp of a rule.
    ///
    /// # Errors
    ///
    /// Fails if either handle is invalid.
    pub fn query_timestamp(&self, table: TableHandle, rule: RuleHandle) -> Result<u32, NatError> {
        let tables = lock(&self.tables, "tables")?;
        let shared = tables.get(table)?;
        let cache = lock(&shared, "table")?;
        cache.timestamp(rule)
    }

    /// Read a rule back from its translation row.
    ///
    /// # Errors
    ///
    /// Fails if either handle is invalid.
    pub fn get_rule(&self, table: TableHandle, rule: RuleHandle) -> Result<NatRule, NatError> {
        let shared = self.table(table)?;
        let cache = lock(&shared, "table")?;
        cache.rule(rule)
    }

    /// # Errors
    ///
    /// Fails if `table` is not a table.
    pub fn table_stats(&self, table: TableHandle) -> Result<TableStats, NatError> {
        let shared = self.table(table)?;
        let cache = lock(&shared, "table")?;
        cache.stats()
    }

    /// Update a PDN. The engine's copy only changes once the coprocessor accepted the update.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range or if the coprocessor rejects the command.
    pub fn modify_pdn(&self, index: u8, entry: PdnEntry) -> Result<(), NatError> {
        PdnTable::check_index(index)?;
        if !entry.is_provisioned() {
            debug!("PDN {index} is given no public address");
        }
        let mut pdns = self.pdns.write().map_err(|_| NatError::Lock("pdns"))?;
        let cmd = PdnCommand {
            pdn_index: index,
            public_ip: entry.public_ip,
            src_metadata: entry.src_metadata,
            dst_metadata: entry.dst_metadata,
        };
        self.hw
            .modify_pdn(&cmd)
            .inspect_err(|e| error!("Failed to modify PDN {index}: {e}"))?;
        pdns.set(index, entry)?;
        info!(
            "PDN {index}: {} (metadata {:#x}/{:#x})",
            entry.public_ip, entry.src_metadata, entry.dst_metadata
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if `index` is out of range.
    pub fn pdn(&self, index: u8) -> Result<PdnEntry, NatError> {
        let pdns = self.pdns.read().map_err(|_| NatError::Lock("pdns"))?;
        pdns.get(index).copied()
    }

    /// Number of live tables.
    ///
    /// # Errors
    ///
    /// Fails if the table lock is poisoned.
    pub fn table_count(&self) -> Result<usize, NatError> {
        Ok(lock(&self.tables, "tables")?.count)
    }
}

#[cfg(test)]
impl<H: NatHardware, M: RegionMapper> NatEngine<H, M> {
    /// Run `f` on the cache of a live table.
    pub(crate) fn with_table<R>(&self, handle: TableHandle, f: impl FnOnce(&mut TableCache) -> R) -> R {
        let shared = self.table(handle).unwrap();
        let mut cache = shared.lock().unwrap();
        f(&mut cache)
    }
}
