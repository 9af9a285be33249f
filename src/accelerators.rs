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

//! Backends that reach an accelerator functional unit.
//!
//! Every backend implements [`Accelerator`](accelerator::Accelerator), the small set of
//! primitives the transfer driver needs: 64-bit MMIO reads and writes, DMA mapping of host
//! memory, a clock query and a reset.
//!
//! - [`dfl`] drives real hardware through the Linux DFL port driver (`/dev/dfl-port.N`).
//! - [`simulated`] is a software model of the pipeline AFU used for testing without a card.
//!
//! The backend is chosen at build time by the executable, through [`Backend`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use afudma::accelerators::Backend;
//! # use afudma::config::SystemConfig;
//! # fn example() -> Result<(), afudma::error::AfuError> {
//! let accelerator = Backend::Dfl.open(&SystemConfig::default())?;
//! println!("Using {}", accelerator.device_handle());
//! # Ok(())
//! # }
//! ```

pub mod accelerator;
pub mod dfl;
pub mod simulated;

use crate::accelerators::accelerator::Accelerator;
use crate::accelerators::dfl::DflPort;
use crate::accelerators::simulated::SimulatedAccelerator;
use crate::config::SystemConfig;
use crate::error::AfuError;
use log::trace;
use std::fmt;

/// Which implementation of [`Accelerator`] to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// An AFU behind a Linux DFL port.
    Dfl,
    /// The software model in [`simulated`].
    Simulated,
}

impl Backend {
    /// Open the accelerator named by `config.afu.accel_uuid` on this backend.
    ///
    /// # Returns: `Result<Box<dyn Accelerator>, AfuError>`
    /// * `Ok(Box<dyn Accelerator>)` - The opened accelerator, not yet reset
    /// * `Err(AfuError::NoDriver | NotFound | Busy)` - No usable device
    /// * `Err(AfuError)` - The device was found but could not be set up
    pub fn open(&self, config: &SystemConfig) -> Result<Box<dyn Accelerator>, AfuError> {
        trace!("Opening {self} backend for {}", config.afu.accel_uuid);
        Ok(match self {
            Backend::Dfl => Box::new(DflPort::open(config)?),
            Backend::Simulated => Box::new(SimulatedAccelerator::open(config)?),
        })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Dfl => write!(f, "dfl"),
            Backend::Simulated => write!(f, "simulated"),
        }
    }
}
