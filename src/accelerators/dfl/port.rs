// This file is part of afudma, a host-side harness for DMA accelerator functional units on FPGAs.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// afudma is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// afudma is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! An open DFL port: exclusive ownership of one AFU.

use crate::accelerators::accelerator::{Accelerator, check_mmio64_offset};
use crate::accelerators::dfl::discovery::{PortInfo, find_ports};
use crate::accelerators::dfl::ioctl::{
    DFL_PORT_REGION_INDEX_AFU, DFL_PORT_REGION_MMAP, DFL_PORT_REGION_READ, DFL_PORT_REGION_WRITE,
    DflPortRegionInfo, dma_map, dma_unmap, port_reset, region_info,
};
use crate::buffer::HostMemory;
use crate::config::SystemConfig;
use crate::error::AfuError;
use crate::system_io::{fs_read_u64, open_device};
use log::{debug, info, trace, warn};
use rustix::mm::{MapFlags, ProtFlags, mmap, munmap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// The AFU MMIO region of a port, mapped into this process.
struct MmioRegion {
    ptr: NonNull<u8>,
    size: u64,
}

impl MmioRegion {
    fn map(port: &File, device: &Path, info: &DflPortRegionInfo) -> Result<MmioRegion, AfuError> {
        let needed = DFL_PORT_REGION_READ | DFL_PORT_REGION_WRITE | DFL_PORT_REGION_MMAP;
        if info.flags & needed != needed {
            return Err(AfuError::Mmio {
                offset: info.offset,
                reason: format!(
                    "AFU region of {device:?} is not mappable read/write (flags {:#x})",
                    info.flags
                ),
            });
        }
        let len = usize::try_from(info.size).map_err(|_| AfuError::Mmio {
            offset: info.offset,
            reason: format!("AFU region size {:#x} does not fit in memory", info.size),
        })?;

        // SAFETY: a shared mapping of the port fd at the offset the kernel reported for the AFU
        // region. The kernel validates the range; on success the pointer is valid for `len`
        // bytes until munmap.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                port,
                info.offset,
            )
        }
        .map_err(|e| AfuError::Mmio {
            offset: info.offset,
            reason: format!("mmap of {device:?} failed: {e}"),
        })?;
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| AfuError::Mmio {
            offset: info.offset,
            reason: "mmap returned null".into(),
        })?;
        debug!("Mapped AFU MMIO of {device:?} at {ptr:p}, size={:#x}", info.size);
        Ok(MmioRegion {
            ptr,
            size: info.size,
        })
    }

    fn read64(&self, offset: u64) -> Result<u64, AfuError> {
        check_mmio64_offset(offset, self.size)?;
        // SAFETY: offset is 8-byte aligned and offset + 8 <= size, checked above. The region
        // is device memory, so the access must be volatile.
        Ok(unsafe {
            self.ptr
                .as_ptr()
                .add(offset as usize)
                .cast::<u64>()
                .read_volatile()
        })
    }

    fn write64(&self, offset: u64, value: u64) -> Result<(), AfuError> {
        check_mmio64_offset(offset, self.size)?;
        // SAFETY: as in read64.
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset as usize)
                .cast::<u64>()
                .write_volatile(value);
        }
        Ok(())
    }
}

impl Drop for MmioRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/size describe the mapping made in map(); Drop runs once.
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.size as usize) } {
            warn!("Failed to unmap AFU MMIO region: {e}");
        }
    }
}

/// Hardware backend: an AFU reached through the Linux DFL port driver.
pub struct DflPort {
    name: String,
    sysfs_path: PathBuf,
    dev_path: PathBuf,
    // Field order matters: the mapping must go before the fd that backs it.
    mmio: MmioRegion,
    file: File,
}

impl std::fmt::Debug for DflPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DflPort")
            .field("name", &self.name)
            .field("dev_path", &self.dev_path)
            .field("mmio_size", &format_args!("{:#x}", self.mmio.size))
            .finish()
    }
}

fn is_busy(e: &AfuError) -> bool {
    matches!(e, AfuError::IOOpen { e: source, .. } if source.raw_os_error() == Some(libc::EBUSY))
}

/// The AFU user clock of a port, from `userclk/frequency` (kHz) in its sysfs directory.
fn user_clock_hz(sysfs_path: &Path) -> Result<u64, AfuError> {
    let file = sysfs_path.join("userclk").join("frequency");
    let khz = fs_read_u64(&file)?;
    khz.checked_mul(1000).ok_or_else(|| AfuError::Parse {
        file,
        value: khz.to_string(),
    })
}

impl DflPort {
    /// Open the first free port carrying the configured AFU.
    ///
    /// # Returns: `Result<DflPort, AfuError>`
    /// * `Ok(DflPort)` - An exclusively owned port with its MMIO region mapped
    /// * `Err(AfuError::NoDriver)` - No DFL ports in sysfs
    /// * `Err(AfuError::NotFound)` - No port carries `config.afu.accel_uuid`
    /// * `Err(AfuError::Busy)` - Every matching port is held by another process
    /// * `Err(AfuError::IOOpen | Ioctl | Mmio)` - A matching port could not be set up
    pub fn open(config: &SystemConfig) -> Result<DflPort, AfuError> {
        let candidates = find_ports(
            &config.fpga_region_dir,
            &config.dev_dir,
            &config.afu.accel_uuid,
        )?;
        for candidate in candidates {
            match open_device(&candidate.dev_path, true) {
                Ok(file) => return DflPort::from_open_file(candidate, file),
                Err(e) if is_busy(&e) => {
                    debug!("{} is busy, trying the next port", candidate.name);
                }
                Err(e) => return Err(e),
            }
        }
        Err(AfuError::Busy)
    }

    fn from_open_file(port: PortInfo, file: File) -> Result<DflPort, AfuError> {
        let info = region_info(&file, &port.dev_path, DFL_PORT_REGION_INDEX_AFU)?;
        let mmio = MmioRegion::map(&file, &port.dev_path, &info)?;
        info!("Opened {} ({})", port.name, port.afu_id);
        Ok(DflPort {
            name: port.name,
            sysfs_path: port.sysfs_path,
            dev_path: port.dev_path,
            mmio,
            file,
        })
    }
}

impl Accelerator for DflPort {
    fn device_handle(&self) -> &str {
        &self.name
    }

    fn read_mmio64(&self, offset: u64) -> Result<u64, AfuError> {
        let value = self.mmio.read64(offset)?;
        trace!("{}: read  {offset:#06x} -> {value:#x}", self.name);
        Ok(value)
    }

    fn write_mmio64(&self, offset: u64, value: u64) -> Result<(), AfuError> {
        trace!("{}: write {offset:#06x} <- {value:#x}", self.name);
        self.mmio.write64(offset, value)
    }

    unsafe fn map_dma(&self, memory: &HostMemory) -> Result<u64, AfuError> {
        dma_map(
            &self.file,
            &self.dev_path,
            memory.addr(),
            memory.mapped_bytes() as u64,
        )
    }

    unsafe fn unmap_dma(&self, iova: u64) -> Result<(), AfuError> {
        dma_unmap(&self.file, &self.dev_path, iova)
    }

    fn clock_frequency(&self) -> Result<u64, AfuError> {
        user_clock_hz(&self.sysfs_path)
    }

    fn reset(&self) -> Result<(), AfuError> {
        port_reset(&self.file, &self.dev_path)
    }
}

impl Drop for DflPort {
    fn drop(&mut self) {
        info!("Closing {}", self.name);
    }
}
