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

//! Software model of the pipeline AFU.
//!
//! The model implements the AFU's register handshake on top of host memory so that the harness
//! can run end to end on a machine without an FPGA. It is not a model of the RTL timing: a write
//! to `GO` performs the whole transfer at once and `DONE` is raised after a fixed number of polls.
//!
//! The datapath reduces every `inputs_per_output` consecutive inputs to one output by summing
//! the products of adjacent pairs, `in[0]*in[1] + in[2]*in[3] + ...`, with wrapping 64-bit
//! arithmetic. An odd trailing input is added as is.
//!
//! Buffers are handed out IOVAs from a private address space that never coincides with their
//! host addresses, so programming a host pointer into `RD_ADDR` or `WR_ADDR` fails loudly.

use crate::accelerators::accelerator::{Accelerator, check_mmio64_offset};
use crate::afu::{AFU_ACCEL_UUID, AfuProfile, CL_BYTES, ELEMENT_BYTES, Register, afu_id_matches};
use crate::buffer::HostMemory;
use crate::config::SystemConfig;
use crate::error::AfuError;
use log::{debug, info, trace};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

/// Clock the model reports, matching the 200 MHz user clock of the course boards.
pub const SIM_CLOCK_HZ: u64 = 200_000_000;

/// Size of the modelled MMIO region.
pub const SIM_MMIO_BYTES: u64 = 0x1000;

/// Polls of `DONE` that read zero before the model reports completion.
pub const DEFAULT_DONE_LATENCY: u32 = 4;

const IOVA_BASE: u64 = 0x10_0000_0000;
const IOVA_ALIGN: u64 = 0x10_0000;

#[derive(Debug, Clone, Copy)]
struct DmaWindow {
    host_addr: u64,
    words: usize,
}

#[derive(Debug, Default)]
struct SimState {
    registers: HashMap<Register, u64>,
    windows: BTreeMap<u64, DmaWindow>,
    next_iova: u64,
    /// Set once a transfer finished; cleared by the next `GO`.
    done: bool,
    polls_until_done: u32,
    transfers: u64,
}

/// The simulation backend.
#[derive(Debug)]
pub struct SimulatedAccelerator {
    handle: String,
    afu_id: String,
    profile: AfuProfile,
    done_latency: u32,
    state: RefCell<SimState>,
}

impl SimulatedAccelerator {
    /// A model of the pipeline bitstream, which carries [`AFU_ACCEL_UUID`].
    pub fn new(profile: AfuProfile) -> SimulatedAccelerator {
        SimulatedAccelerator {
            handle: "sim0".to_string(),
            afu_id: AFU_ACCEL_UUID.to_string(),
            profile,
            done_latency: DEFAULT_DONE_LATENCY,
            state: RefCell::new(SimState {
                next_iova: IOVA_BASE,
                ..Default::default()
            }),
        }
    }

    /// Number of zero reads of `DONE` after a transfer before it reads one.
    pub fn with_done_latency(mut self, polls: u32) -> SimulatedAccelerator {
        self.done_latency = polls;
        self
    }

    /// Open the model as if it were a discovered device.
    ///
    /// # Returns: `Result<SimulatedAccelerator, AfuError>`
    /// * `Ok(SimulatedAccelerator)` - The configured UUID names the modelled AFU
    /// * `Err(AfuError::NotFound)` - The config asks for a different accelerator
    pub fn open(config: &SystemConfig) -> Result<SimulatedAccelerator, AfuError> {
        let sim = SimulatedAccelerator::new(config.afu.clone());
        if !afu_id_matches(&sim.afu_id, &config.afu.accel_uuid) {
            return Err(AfuError::NotFound {
                uuid: config.afu.accel_uuid.clone(),
            });
        }
        info!("Opened simulated AFU {}", sim.afu_id);
        Ok(sim)
    }

    /// How many transfers the model has completed.
    pub fn transfers(&self) -> u64 {
        self.state.borrow().transfers
    }

    /// Number of live DMA mappings.
    pub fn mapped_buffers(&self) -> usize {
        self.state.borrow().windows.len()
    }

    /// Resolve `words` words starting at `iova` to the host address backing them.
    fn translate(state: &SimState, iova: u64, words: usize) -> Result<u64, AfuError> {
        let (base, window) = state
            .windows
            .range(..=iova)
            .next_back()
            .ok_or_else(|| AfuError::Dma(format!("iova {iova:#x} is not mapped")))?;
        let first = (iova - base) / ELEMENT_BYTES;
        let fits = (iova - base) % ELEMENT_BYTES == 0
            && usize::try_from(first)
                .ok()
                .and_then(|f| f.checked_add(words))
                .is_some_and(|end| end <= window.words);
        if !fits {
            return Err(AfuError::Dma(format!(
                "{words} words at iova {iova:#x} overrun the {} word buffer mapped at {base:#x}",
                window.words
            )));
        }
        Ok(window.host_addr + (iova - base))
    }

    /// Run one transfer as programmed in the registers.
    fn run_pipeline(&self, state: &mut SimState) -> Result<(), AfuError> {
        let reg = |r: Register| state.registers.get(&r).copied().unwrap_or(0);
        let rd_addr = reg(Register::RdAddr);
        let wr_addr = reg(Register::WrAddr);
        let cache_lines = reg(Register::Size);

        let in_words = cache_lines * CL_BYTES / ELEMENT_BYTES;
        let out_words = in_words
            .checked_div(self.profile.inputs_per_output)
            .ok_or_else(|| AfuError::Dma("datapath reduces zero inputs per output".into()))?;
        let as_usize = |n: u64| {
            usize::try_from(n).map_err(|_| AfuError::Dma(format!("transfer of {n} words")))
        };
        let (in_words, out_words) = (as_usize(in_words)?, as_usize(out_words)?);
        debug!(
            "{}: transfer of {cache_lines} cache lines, {in_words} inputs -> {out_words} outputs",
            self.handle
        );

        let src = Self::translate(state, rd_addr, in_words)? as *const u64;
        let dst = Self::translate(state, wr_addr, out_words)? as *mut u64;
        let per_output = self.profile.inputs_per_output as usize;

        for out in 0..out_words {
            let mut acc: u64 = 0;
            let mut i = out * per_output;
            let end = i + per_output;
            while i < end {
                // SAFETY: translate() checked that [src, src + in_words) and
                // [dst, dst + out_words) lie inside live DMA windows, whose HostMemory is kept
                // mapped until unmap_dma removes the window.
                let a = unsafe { src.add(i).read_volatile() };
                let term = if i + 1 < end {
                    a.wrapping_mul(unsafe { src.add(i + 1).read_volatile() })
                } else {
                    a
                };
                acc = acc.wrapping_add(term);
                i += 2;
            }
            // SAFETY: see above.
            unsafe { dst.add(out).write_volatile(acc) };
        }

        state.done = true;
        state.polls_until_done = self.done_latency;
        state.transfers += 1;
        Ok(())
    }
}

impl Accelerator for SimulatedAccelerator {
    fn device_handle(&self) -> &str {
        &self.handle
    }

    fn read_mmio64(&self, offset: u64) -> Result<u64, AfuError> {
        check_mmio64_offset(offset, SIM_MMIO_BYTES)?;
        let mut state = self.state.borrow_mut();
        let value = match Register::from_byte_offset(offset) {
            Some(Register::Done) => {
                if !state.done {
                    0
                } else if state.polls_until_done > 0 {
                    state.polls_until_done -= 1;
                    0
                } else {
                    1
                }
            }
            Some(r) => state.registers.get(&r).copied().unwrap_or(0),
            None => 0,
        };
        trace!("{}: read  {offset:#06x} -> {value:#x}", self.handle);
        Ok(value)
    }

    fn write_mmio64(&self, offset: u64, value: u64) -> Result<(), AfuError> {
        check_mmio64_offset(offset, SIM_MMIO_BYTES)?;
        trace!("{}: write {offset:#06x} <- {value:#x}", self.handle);
        let mut state = self.state.borrow_mut();
        match Register::from_byte_offset(offset) {
            Some(Register::Done) => Err(AfuError::Mmio {
                offset,
                reason: "MMIO_DONE is read-only".into(),
            }),
            Some(Register::Go) => {
                state.done = false;
                if value & 1 == 1 {
                    self.run_pipeline(&mut state)?;
                }
                Ok(())
            }
            Some(r) => {
                state.registers.insert(r, value);
                Ok(())
            }
            None => Err(AfuError::Mmio {
                offset,
                reason: "no register at this offset".into(),
            }),
        }
    }

    unsafe fn map_dma(&self, memory: &HostMemory) -> Result<u64, AfuError> {
        let mut state = self.state.borrow_mut();
        let iova = state.next_iova;
        let span = (memory.mapped_bytes() as u64).next_multiple_of(IOVA_ALIGN);
        state.next_iova = iova
            .checked_add(span)
            .ok_or_else(|| AfuError::Dma("simulated iova space exhausted".into()))?;
        state.windows.insert(
            iova,
            DmaWindow {
                host_addr: memory.addr(),
                words: memory.words(),
            },
        );
        Ok(iova)
    }

    unsafe fn unmap_dma(&self, iova: u64) -> Result<(), AfuError> {
        self.state
            .borrow_mut()
            .windows
            .remove(&iova)
            .map(|_| ())
            .ok_or_else(|| AfuError::Dma(format!("iova {iova:#x} is not mapped")))
    }

    fn clock_frequency(&self) -> Result<u64, AfuError> {
        Ok(SIM_CLOCK_HZ)
    }

    fn reset(&self) -> Result<(), AfuError> {
        let mut state = self.state.borrow_mut();
        state.registers.clear();
        state.done = false;
        state.polls_until_done = 0;
        Ok(())
    }
}
