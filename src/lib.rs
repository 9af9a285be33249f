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

//! Host-side harness for a DMA accelerator functional unit (AFU) on an FPGA.
//!
//! The harness opens an accelerator, allocates input and output buffers the AFU can reach by
//! DMA, programs the AFU's address, size and go registers, busy-polls its done register and
//! collects the results.
//!
//! - [`accelerators`] holds the [`Accelerator`](accelerators::accelerator::Accelerator) trait and
//!   its two backends, Linux DFL hardware and a software model.
//! - [`session`] scopes one opened accelerator, [`buffer`] the memory shared with it.
//! - [`transfer`] validates the requested size and runs the round trip.
//! - [`config`] resolves paths and AFU geometry from layered TOML files.

pub mod accelerators;
pub mod afu;
pub mod buffer;
pub mod config;
pub mod error;
pub mod session;
pub mod system_io;
pub mod transfer;
