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

//! DFL port ioctls, as declared in the kernel's `include/uapi/linux/fpga-dfl.h`.
//!
//! All DFL ioctls are `_IO` requests (no size encoded) whose argument structs start with an
//! `argsz` field the kernel checks against its own definition.

// ioctl arguments are fixed-width kernel types
#![allow(clippy::cast_possible_truncation)]

use crate::error::AfuError;
use log::trace;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

const DFL_FPGA_MAGIC: libc::c_ulong = 0xB6;
const DFL_PORT_BASE: libc::c_ulong = 0x40;

/// `_IO(type, nr)`
const fn io(nr: libc::c_ulong) -> libc::c_ulong {
    (DFL_FPGA_MAGIC << 8) | nr
}

pub const DFL_FPGA_PORT_RESET: libc::c_ulong = io(DFL_PORT_BASE);
pub const DFL_FPGA_PORT_GET_REGION_INFO: libc::c_ulong = io(DFL_PORT_BASE + 2);
pub const DFL_FPGA_PORT_DMA_MAP: libc::c_ulong = io(DFL_PORT_BASE + 3);
pub const DFL_FPGA_PORT_DMA_UNMAP: libc::c_ulong = io(DFL_PORT_BASE + 4);

/// Index of the AFU MMIO region of a port.
pub const DFL_PORT_REGION_INDEX_AFU: u32 = 0;

pub const DFL_PORT_REGION_READ: u32 = 1 << 0;
pub const DFL_PORT_REGION_WRITE: u32 = 1 << 1;
pub const DFL_PORT_REGION_MMAP: u32 = 1 << 2;

/// `struct dfl_fpga_port_region_info`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DflPortRegionInfo {
    pub argsz: u32,
    pub flags: u32,
    pub index: u32,
    pub padding: u32,
    pub size: u64,
    pub offset: u64,
}

/// `struct dfl_fpga_port_dma_map`
#[repr(C)]
#[derive(Debug, Default)]
struct DflPortDmaMap {
    argsz: u32,
    flags: u32,
    user_addr: u64,
    length: u64,
    iova: u64,
}

/// `struct dfl_fpga_port_dma_unmap`
#[repr(C)]
#[derive(Debug, Default)]
struct DflPortDmaUnmap {
    argsz: u32,
    flags: u32,
    iova: u64,
}

fn last_error(request: &'static str, device: &Path) -> AfuError {
    AfuError::Ioctl {
        request,
        device: device.into(),
        e: std::io::Error::last_os_error(),
    }
}

/// Reset the AFU behind the port.
pub fn port_reset(port: &File, device: &Path) -> Result<(), AfuError> {
    trace!("{device:?}: DFL_FPGA_PORT_RESET");
    // SAFETY: DFL_FPGA_PORT_RESET takes no argument; the fd is an open DFL port.
    let ret = unsafe { libc::ioctl(port.as_raw_fd(), DFL_FPGA_PORT_RESET as _) };
    if ret < 0 {
        return Err(last_error("DFL_FPGA_PORT_RESET", device));
    }
    Ok(())
}

/// Query the size, mmap offset and permissions of one port region.
pub fn region_info(port: &File, device: &Path, index: u32) -> Result<DflPortRegionInfo, AfuError> {
    let mut info = DflPortRegionInfo {
        argsz: size_of::<DflPortRegionInfo>() as u32,
        index,
        ..Default::default()
    };
    // SAFETY: the kernel reads argsz/index and fills flags/size/offset of a struct whose layout
    // matches `struct dfl_fpga_port_region_info`. `info` outlives the call.
    let ret = unsafe {
        libc::ioctl(
            port.as_raw_fd(),
            DFL_FPGA_PORT_GET_REGION_INFO as _,
            &raw mut info,
        )
    };
    if ret < 0 {
        return Err(last_error("DFL_FPGA_PORT_GET_REGION_INFO", device));
    }
    trace!(
        "{device:?}: region {index}: size={:#x}, offset={:#x}, flags={:#x}",
        info.size, info.offset, info.flags
    );
    Ok(info)
}

/// Pin `length` bytes at `user_addr` and map them into the port's IOMMU domain.
///
/// Both `user_addr` and `length` must be page aligned.
pub fn dma_map(port: &File, device: &Path, user_addr: u64, length: u64) -> Result<u64, AfuError> {
    let mut map = DflPortDmaMap {
        argsz: size_of::<DflPortDmaMap>() as u32,
        user_addr,
        length,
        ..Default::default()
    };
    // SAFETY: layout matches `struct dfl_fpga_port_dma_map`; the kernel reads the address range
    // and writes back the iova. The caller keeps the range mapped until dma_unmap.
    let ret = unsafe { libc::ioctl(port.as_raw_fd(), DFL_FPGA_PORT_DMA_MAP as _, &raw mut map) };
    if ret < 0 {
        return Err(last_error("DFL_FPGA_PORT_DMA_MAP", device));
    }
    trace!(
        "{device:?}: mapped {length:#x} bytes at {user_addr:#x} to iova {:#x}",
        map.iova
    );
    Ok(map.iova)
}

/// Unpin and unmap a range previously mapped by [`dma_map`].
pub fn dma_unmap(port: &File, device: &Path, iova: u64) -> Result<(), AfuError> {
    let mut unmap = DflPortDmaUnmap {
        argsz: size_of::<DflPortDmaUnmap>() as u32,
        iova,
        ..Default::default()
    };
    // SAFETY: layout matches `struct dfl_fpga_port_dma_unmap`; the kernel only reads it.
    let ret = unsafe {
        libc::ioctl(
            port.as_raw_fd(),
            DFL_FPGA_PORT_DMA_UNMAP as _,
            &raw mut unmap,
        )
    };
    if ret < 0 {
        return Err(last_error("DFL_FPGA_PORT_DMA_UNMAP", device));
    }
    Ok(())
}
