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

use crate::buffer::HostMemory;
use crate::error::AfuError;
use std::any::Any;

/// Trait for an open connection to one accelerator functional unit.
///
/// Implementations own the device for as long as they live; dropping the value closes it.
/// All methods take `&self` so that [`SharedBuffer`](crate::buffer::SharedBuffer)s can hold a
/// shared borrow of the accelerator while registers are being programmed.
///
/// The trait extends `Any` so tests can downcast to the concrete backend.
pub trait Accelerator: Any {
    /// Short name of the device, e.g. `dfl-port.0` or `sim0`, used in log messages.
    fn device_handle(&self) -> &str;

    /// Read the 64-bit register at `offset` bytes into the AFU MMIO region.
    ///
    /// # Returns: `Result<u64, AfuError>`
    /// * `Ok(u64)` - The register value
    /// * `Err(AfuError::Mmio)` - The offset is misaligned, out of range, or not readable
    fn read_mmio64(&self, offset: u64) -> Result<u64, AfuError>;

    /// Write the 64-bit register at `offset` bytes into the AFU MMIO region.
    ///
    /// # Returns: `Result<(), AfuError>`
    /// * `Ok(())` - The write was posted
    /// * `Err(AfuError::Mmio)` - The offset is misaligned, out of range, or not writable
    /// * `Err(AfuError::Dma)` - The write started a transfer that referenced unmapped memory
    fn write_mmio64(&self, offset: u64, value: u64) -> Result<(), AfuError>;

    /// Make `memory` reachable by the accelerator.
    ///
    /// Use [`SharedBuffer`](crate::buffer::SharedBuffer), which pairs the mapping with the memory
    /// and releases both in the right order.
    ///
    /// # Safety
    ///
    /// The device keeps access to `memory` after this returns. `memory` must stay alive until
    /// the returned IOVA has been passed to [`unmap_dma`](Accelerator::unmap_dma).
    ///
    /// ```compile_fail
    /// # use afudma::accelerators::accelerator::Accelerator;
    /// # use afudma::accelerators::simulated::SimulatedAccelerator;
    /// # use afudma::afu::AfuProfile;
    /// # use afudma::buffer::HostMemory;
    /// let sim = SimulatedAccelerator::new(AfuProfile::default());
    /// let memory = HostMemory::new(128).unwrap();
    /// let iova = sim.map_dma(&memory); // error[E0133]: call to unsafe function
    /// ```
    ///
    /// # Returns: `Result<u64, AfuError>`
    /// * `Ok(u64)` - The I/O virtual address the accelerator must use for the first word
    /// * `Err(AfuError::Ioctl)` / `Err(AfuError::Dma)` - The mapping was refused
    unsafe fn map_dma(&self, memory: &HostMemory) -> Result<u64, AfuError>;

    /// Undo a mapping made by [`map_dma`](Accelerator::map_dma).
    ///
    /// # Safety
    ///
    /// After this returns the device must not be started on a transfer that names `iova`.
    /// Backends that keep translating stale IOVAs rely on the caller for this.
    unsafe fn unmap_dma(&self, iova: u64) -> Result<(), AfuError>;

    /// Frequency of the clock driving the AFU, in Hz.
    ///
    /// # Returns: `Result<u64, AfuError>`
    /// * `Ok(u64)` - The frequency
    /// * `Err(AfuError)` - The backend has no way to report it
    fn clock_frequency(&self) -> Result<u64, AfuError>;

    /// Put the AFU back into its post-configuration state.
    fn reset(&self) -> Result<(), AfuError>;
}

/// Check that `offset` addresses a whole, aligned 64-bit register inside a region of
/// `region_size` bytes.
pub(crate) fn check_mmio64_offset(offset: u64, region_size: u64) -> Result<(), AfuError> {
    if offset % 8 != 0 {
        return Err(AfuError::Mmio {
            offset,
            reason: "offset is not 64-bit aligned".into(),
        });
    }
    match offset.checked_add(8) {
        Some(end) if end <= region_size => Ok(()),
        _ => Err(AfuError::Mmio {
            offset,
            reason: format!("offset is outside the {region_size:#x} byte MMIO region"),
        }),
    }
}
