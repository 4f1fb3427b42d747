// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Region mappers

use crate::hw::{HwError, RegionMapper, Reservation, SharedRegion};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use tracing::debug;

/// Backs every reservation with a zeroed heap buffer. The coprocessor never sees these regions;
/// this is what the simulated hardware and the tests run on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapMapper;

struct HeapRegion(Vec<u8>);

impl SharedRegion for HeapRegion {
    fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl RegionMapper for HeapMapper {
    fn map(&self, reservation: &Reservation) -> Result<Box<dyn SharedRegion>, HwError> {
        Ok(Box::new(HeapRegion(vec![0; reservation.size])))
    }
}

/// Maps the reserved device (or file) read-write and shared. The region starts at the
/// reservation's offset within the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceMapper;

struct DeviceRegion(MmapMut);

impl SharedRegion for DeviceRegion {
    fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    fn flush(&mut self) -> Result<(), HwError> {
        self.0.flush().map_err(HwError::Flush)
    }
}

impl RegionMapper for DeviceMapper {
    fn map(&self, reservation: &Reservation) -> Result<Box<dyn SharedRegion>, HwError> {
        let map_err = |source| HwError::Map {
            path: reservation.device.clone(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&reservation.device)
            .map_err(map_err)?;
        let offset = usize::try_from(reservation.offset).unwrap_or(usize::MAX);
        let len = usize::try_from(file.metadata().map_err(map_err)?.len()).unwrap_or(usize::MAX);
        let actual = len.saturating_sub(offset);
        if actual < reservation.size {
            return Err(HwError::RegionSize {
                expected: reservation.size,
                actual,
            });
        }

        #[allow(unsafe_code)] // SAFETY: the region is only ever accessed through this mapping.
        let mmap = unsafe {
            memmap2::MmapOptions::new()
                .offset(u64::from(reservation.offset))
                .len(reservation.size)
                .map_mut(&file)
        }
        .map_err(map_err)?;
        debug!(
            "Mapped {} bytes at {} of {}",
            reservation.size,
            reservation.offset,
            reservation.device.display()
        );
        Ok(Box::new(DeviceRegion(mmap)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn heap_regions_are_zeroed() {
        let reservation = Reservation {
            device: "heap".into(),
            offset: 0,
            size: 64,
        };
        let mut region = HeapMapper.map(&reservation).unwrap();
        assert_eq!(region.bytes().len(), 64);
        assert!(region.bytes().iter().all(|b| *b == 0));
        region.bytes_mut()[3] = 7;
        HeapMapper.unmap(region).unwrap();
    }

    #[test]
    fn device_writes_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipaNatTable");
        std::fs::File::create(&path).unwrap().set_len(128).unwrap();

        let reservation = Reservation {
            device: path.clone(),
            offset: 0,
            size: 128,
        };
        let mut region = DeviceMapper.map(&reservation).unwrap();
        region.bytes_mut()[10] = 0xab;
        DeviceMapper.unmap(region).unwrap();

        let mut content = Vec::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content.len(), 128);
        assert_eq!(content[10], 0xab);
    }

    #[test]
    fn device_regions_start_at_their_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipaNatTable");
        std::fs::File::create(&path).unwrap().set_len(500).unwrap();

        let reservation = Reservation {
            device: path.clone(),
            offset: 360,
            size: 140,
        };
        let mut region = DeviceMapper.map(&reservation).unwrap();
        assert_eq!(region.bytes().len(), 140);
        region.bytes_mut()[0] = 0x5a;
        DeviceMapper.unmap(region).unwrap();
        assert_eq!(std::fs::read(&path).unwrap()[360], 0x5a);

        let past_end = Reservation {
            offset: 400,
            ..reservation
        };
        assert!(matches!(
            DeviceMapper.map(&past_end),
            Err(HwError::RegionSize {
                expected: 140,
                actual: 100
            })
        ));
    }

    #[test]
    fn device_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Reservation {
            device: dir.path().join("missing"),
            offset: 0,
            size: 128,
        };
        assert!(matches!(
            DeviceMapper.map(&missing),
            Err(HwError::Map { .. })
        ));

        let path = dir.path().join("short");
        std::fs::File::create(&path).unwrap().set_len(16).unwrap();
        let short = Reservation {
            device: path,
            offset: 0,
            size: 128,
        };
        assert!(matches!(
            DeviceMapper.map(&short),
            Err(HwError::RegionSize {
                expected: 128,
                actual: 16
            })
        ));
    }
}
