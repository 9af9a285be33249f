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

//! Hardware backend for AFUs exposed by the Linux DFL (Device Feature List) framework.
//!
//! The DFL port driver hands each AFU to user space as a character device, `/dev/dfl-port.N`.
//! Opening it with `O_EXCL` claims the AFU, `mmap` exposes its MMIO registers, and two ioctls
//! pin host buffers and map them into the card's IOMMU domain. That is the whole interface this
//! harness needs.

pub mod discovery;
pub mod ioctl;
pub mod port;

pub use port::DflPort;
