// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-process model of the coprocessor control channel
//!
//! [`SimulatedHardware`] accepts every command, records it, and hands out regions either as
//! plain reservations (to be mapped with [`HeapMapper`](crate::HeapMapper)) or as files in a
//! directory (to be mapped with [`DeviceMapper`](crate::DeviceMapper)). A failure can be
//! injected for the next call of a given operation.

use crate::hw::{
    DeleteCommand, DmaCommand, HwError, HwVersion, InitCommand, NatHardware, PdnCommand,
    Reservation,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub use nix::errno::Errno;

/// Operations of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwOp {
    Version,
    Reserve,
    Init,
    Commit,
    Delete,
    ModifyPdn,
}

impl HwOp {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HwOp::Version => "get version",
            HwOp::Reserve => "reserve",
            HwOp::Init => "init table",
            HwOp::Commit => "dma commit",
            HwOp::Delete => "delete table",
            HwOp::ModifyPdn => "modify pdn",
        }
    }
}

/// A command accepted by the simulated hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCommand {
    Reserve(Reservation),
    Init(InitCommand),
    Commit(DmaCommand),
    Delete(DeleteCommand),
    ModifyPdn(PdnCommand),
}

#[derive(Debug, Default)]
struct SimState {
    commands: Vec<HwCommand>,
    faults: Vec<(HwOp, Errno)>,
    next_offset: u32,
}

#[derive(Debug)]
pub struct SimulatedHardware {
    version: HwVersion,
    region_dir: Option<PathBuf>,
    state: Mutex<SimState>,
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new(HwVersion::V4_0)
    }
}

impl SimulatedHardware {
    #[must_use]
    pub fn new(version: HwVersion) -> Self {
        Self {
            version,
            region_dir: None,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Back reservations with files created in `dir`.
    #[must_use]
    pub fn with_region_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.region_dir = Some(dir.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` fail with `errno`.
    pub fn fail_next(&self, op: HwOp, errno: Errno) {
        self.state().faults.push((op, errno));
    }

    /// Commands accepted so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<HwCommand> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    fn run(&self, op: HwOp, command: Option<HwCommand>) -> Result<(), HwError> {
        let mut state = self.state();
        if let Some(pos) = state.faults.iter().position(|(fault, _)| *fault == op) {
            let (_, errno) = state.faults.remove(pos);
            debug!("Injected failure of {}: {errno}", op.name());
            return Err(HwError::command(op.name(), errno));
        }
        if let Some(command) = command {
            debug!("Accepted {command:?}");
            state.commands.push(command);
        }
        Ok(())
    }
}

impl NatHardware for SimulatedHardware {
    fn hw_version(&self) -> Result<HwVersion, HwError> {
        self.run(HwOp::Version, None)?;
        Ok(self.version)
    }

    fn reserve(&self, device: &str, size: usize) -> Result<Reservation, HwError> {
        // a failure must not consume an offset
        self.run(HwOp::Reserve, None)?;
        let mut state = self.state();
        let size_u32 =
            u32::try_from(size).map_err(|_| HwError::command(HwOp::Reserve.name(), Errno::ENOMEM))?;
        let offset = state.next_offset;
        let end = offset
            .checked_add(size_u32)
            .ok_or_else(|| HwError::command(HwOp::Reserve.name(), Errno::ENOMEM))?;

        let device = match &self.region_dir {
            // one file stands for the whole address space, grown to cover every reservation
            Some(dir) => {
                let path = dir.join(device);
                let map_err = |source| HwError::Map {
                    path: path.clone(),
                    source,
                };
                let file = OpenOptions::new()
                    .create(true)
                    .truncate(false)
                    .write(true)
                    .open(&path)
                    .map_err(map_err)?;
                if file.metadata().map_err(map_err)?.len() < u64::from(end) {
                    file.set_len(u64::from(end)).map_err(map_err)?;
                }
                path
            }
            None => PathBuf::from(device),
        };

        state.next_offset = end;
        let reservation = Reservation {
            device,
            offset,
            size,
        };
        state.commands.push(HwCommand::Reserve(reservation.clone()));
        Ok(reservation)
    }

    fn init_table(&self, cmd: &InitCommand) -> Result<(), HwError> {
        self.run(HwOp::Init, Some(HwCommand::Init(*cmd)))
    }

    fn commit(&self, cmd: &DmaCommand) -> Result<(), HwError> {
        self.run(HwOp::Commit, Some(HwCommand::Commit(*cmd)))
    }

    fn delete_table(&self, cmd: &DeleteCommand) -> Result<(), HwError> {
        self.run(HwOp::Delete, Some(HwCommand::Delete(*cmd)))
    }

    fn modify_pdn(&self, cmd: &PdnCommand) -> Result<(), HwError> {
        self.run(HwOp::ModifyPdn, Some(HwCommand::ModifyPdn(*cmd)))
    }
}
