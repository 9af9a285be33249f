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

//! A scoped session with one accelerator.
//!
//! [`AfuSession`] owns the opened backend for the duration of a run. Opening it resets the AFU;
//! dropping it closes the device. Buffers handed out by [`AfuSession::malloc`] borrow the session,
//! so they are always released before it closes.

use crate::accelerators::Backend;
use crate::accelerators::accelerator::Accelerator;
use crate::afu::{AfuProfile, Register};
use crate::buffer::SharedBuffer;
use crate::config::SystemConfig;
use crate::error::AfuError;
use log::{debug, info, trace};

pub struct AfuSession {
    accelerator: Box<dyn Accelerator>,
    profile: AfuProfile,
}

impl std::fmt::Debug for AfuSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfuSession")
            .field("device", &self.accelerator.device_handle())
            .field("profile", &self.profile)
            .finish()
    }
}

impl AfuSession {
    /// Find, open and reset the accelerator described by `config`.
    ///
    /// # Returns: `Result<AfuSession, AfuError>`
    /// * `Ok(AfuSession)` - A session on a freshly reset AFU
    /// * `Err(AfuError::NoDriver)` - The backend found no FPGA driver
    /// * `Err(AfuError::NotFound)` - No FPGA carries the configured accelerator
    /// * `Err(AfuError::Busy)` - Every matching FPGA is in use
    /// * `Err(AfuError)` - Opening or resetting the device failed
    pub fn open(backend: Backend, config: &SystemConfig) -> Result<AfuSession, AfuError> {
        let accelerator = backend.open(config)?;
        AfuSession::from_accelerator(accelerator, config.afu.clone())
    }

    /// Start a session on an already opened accelerator.
    pub fn from_accelerator(
        accelerator: Box<dyn Accelerator>,
        profile: AfuProfile,
    ) -> Result<AfuSession, AfuError> {
        accelerator.reset()?;
        info!(
            "Session opened on {} for accelerator {}",
            accelerator.device_handle(),
            profile.accel_uuid
        );
        Ok(AfuSession {
            accelerator,
            profile,
        })
    }

    pub fn profile(&self) -> &AfuProfile {
        &self.profile
    }

    pub fn device_handle(&self) -> &str {
        self.accelerator.device_handle()
    }

    /// The backend, e.g. to downcast it in tests.
    pub fn accelerator(&self) -> &dyn Accelerator {
        self.accelerator.as_ref()
    }

    /// Write a 64-bit value to an AFU register.
    pub fn write(&self, register: Register, value: u64) -> Result<(), AfuError> {
        debug!("{}: {register} <- {value:#x}", self.device_handle());
        self.accelerator.write_mmio64(register.byte_offset(), value)
    }

    /// Read a 64-bit AFU register.
    pub fn read(&self, register: Register) -> Result<u64, AfuError> {
        let value = self.accelerator.read_mmio64(register.byte_offset())?;
        trace!("{}: {register} -> {value:#x}", self.device_handle());
        Ok(value)
    }

    /// Allocate `words` zeroed 64-bit words the AFU can reach by DMA.
    ///
    /// # Returns: `Result<SharedBuffer, AfuError>`
    /// * `Ok(SharedBuffer)` - The buffer, released when dropped
    /// * `Err(AfuError::Alloc)` - Host memory could not be mapped
    /// * `Err(AfuError::Ioctl | Dma)` - The backend refused the DMA mapping
    pub fn malloc(&self, words: usize) -> Result<SharedBuffer<'_>, AfuError> {
        SharedBuffer::new(self.accelerator.as_ref(), words)
    }

    /// Frequency of the AFU clock in Hz.
    pub fn measure_clock(&self) -> Result<f64, AfuError> {
        self.accelerator.clock_frequency().map(|hz| hz as f64)
    }
}

impl Drop for AfuSession {
    fn drop(&mut self) {
        info!("Session on {} closed", self.device_handle());
    }
}
