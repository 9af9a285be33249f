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

//! Fixed facts about the DMA pipeline AFU.
//!
//! The register map, cache line size and datapath geometry below are dictated by the RTL of the
//! accelerator, which lives outside this repository. The geometry and UUID are collected into an
//! [`AfuProfile`] so that a rebuilt bitstream with a different datapath width can be driven by
//! changing the `[afu]` section of the config file instead of the code.
//!
//! # Register map
//!
//! MMIO offsets are expressed the way the RTL decodes them, as 32-bit word indices. The byte
//! offset seen by the host is `index * 4`.
//!
//! | Register | Index | Direction | Meaning |
//! |---|---|---|---|
//! | `GO` | `0x0050` | write | start the transfer |
//! | `RD_ADDR` | `0x0052` | write | IOVA of the input buffer |
//! | `WR_ADDR` | `0x0054` | write | IOVA of the output buffer |
//! | `SIZE` | `0x0056` | write | input size in cache lines |
//! | `DONE` | `0x0058` | read | non-zero once the output is written |

use std::fmt;

/// Bytes moved by one DMA beat. The AFU only transfers whole cache lines.
pub const CL_BYTES: u64 = 64;

/// Bytes per MMIO index step.
pub const MMIO_BYTES_PER_INDEX: u64 = 4;

pub const MMIO_GO: u64 = 0x0050;
pub const MMIO_RD_ADDR: u64 = 0x0052;
pub const MMIO_WR_ADDR: u64 = 0x0054;
pub const MMIO_SIZE: u64 = 0x0056;
pub const MMIO_DONE: u64 = 0x0058;

/// Accelerator UUID baked into the pipeline bitstream.
pub const AFU_ACCEL_UUID: &str = "5ad8b7c0-3a1e-4d6c-9b0f-6e2f41c8a713";

/// Number of inputs that must arrive together for the output buffer to fill whole cache lines.
pub const INPUT_GRANULARITY: u64 = 128;

/// The pipeline reduces this many inputs into one output.
pub const INPUTS_PER_OUTPUT: u64 = 16;

/// Size of one input and one output element.
pub const ELEMENT_BYTES: u64 = size_of::<u64>() as u64;

/// The MMIO registers of the pipeline AFU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Go,
    RdAddr,
    WrAddr,
    Size,
    Done,
}

impl Register {
    /// The word index decoded by the RTL.
    pub const fn index(self) -> u64 {
        match self {
            Register::Go => MMIO_GO,
            Register::RdAddr => MMIO_RD_ADDR,
            Register::WrAddr => MMIO_WR_ADDR,
            Register::Size => MMIO_SIZE,
            Register::Done => MMIO_DONE,
        }
    }

    /// Offset in bytes from the start of the AFU MMIO region.
    pub const fn byte_offset(self) -> u64 {
        self.index() * MMIO_BYTES_PER_INDEX
    }

    /// Look a register up by its byte offset.
    pub fn from_byte_offset(offset: u64) -> Option<Register> {
        [
            Register::Go,
            Register::RdAddr,
            Register::WrAddr,
            Register::Size,
            Register::Done,
        ]
        .into_iter()
        .find(|r| r.byte_offset() == offset)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Go => "MMIO_GO",
            Register::RdAddr => "MMIO_RD_ADDR",
            Register::WrAddr => "MMIO_WR_ADDR",
            Register::Size => "MMIO_SIZE",
            Register::Done => "MMIO_DONE",
        };
        write!(f, "{name}")
    }
}

/// Identity and datapath geometry of the accelerator being driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfuProfile {
    pub accel_uuid: String,
    pub input_granularity: u64,
    pub inputs_per_output: u64,
}

impl Default for AfuProfile {
    fn default() -> Self {
        AfuProfile {
            accel_uuid: AFU_ACCEL_UUID.to_string(),
            input_granularity: INPUT_GRANULARITY,
            inputs_per_output: INPUTS_PER_OUTPUT,
        }
    }
}

/// Canonical form of an accelerator id: lowercase hex digits without dashes.
///
/// The kernel reports `afu_id` as 32 bare hex digits while UUIDs are conventionally written in
/// the dashed 8-4-4-4-12 form; both normalise to the same string.
pub fn normalize_uuid(uuid: &str) -> String {
    uuid.trim()
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether a kernel `afu_id` value names the accelerator `uuid`.
pub fn afu_id_matches(afu_id: &str, uuid: &str) -> bool {
    let wanted = normalize_uuid(uuid);
    !wanted.is_empty() && normalize_uuid(afu_id) == wanted
}
