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

//! Memory shared between the host and the accelerator.
//!
//! [`HostMemory`] is a page-aligned, zero-filled anonymous mapping of 64-bit words. Page alignment
//! is what the kernel needs to pin the pages for DMA. [`SharedBuffer`] pairs that memory with the
//! I/O virtual address the accelerator uses to reach it, and undoes the DMA mapping when it is
//! dropped, so a buffer is released on every exit path of the transfer.
//!
//! Every access goes through volatile reads and writes: the accelerator changes the memory behind
//! the compiler's back.

use crate::accelerators::accelerator::Accelerator;
use crate::error::AfuError;
use log::{trace, warn};
use rustix::mm::{MapFlags, ProtFlags, mmap_anonymous, munmap};
use std::ptr::NonNull;

const WORD_BYTES: usize = size_of::<u64>();

/// Page-aligned anonymous memory holding `words` 64-bit words.
pub struct HostMemory {
    ptr: NonNull<u64>,
    words: usize,
    /// Length of the mapping, rounded up to whole pages.
    mapped_bytes: usize,
}

impl std::fmt::Debug for HostMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMemory")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("words", &self.words)
            .field("mapped_bytes", &self.mapped_bytes)
            .finish()
    }
}

impl HostMemory {
    /// Map enough zeroed pages for `words` words.
    ///
    /// # Returns: `Result<HostMemory, AfuError>`
    /// * `Ok(HostMemory)` - The mapping
    /// * `Err(AfuError::Alloc)` - `words` is zero, overflows, or the kernel refused the mapping
    pub fn new(words: usize) -> Result<HostMemory, AfuError> {
        let page = rustix::param::page_size();
        let bytes = words
            .checked_mul(WORD_BYTES)
            .and_then(|b| b.checked_next_multiple_of(page))
            .filter(|b| *b > 0)
            .ok_or_else(|| AfuError::Alloc {
                bytes: words.saturating_mul(WORD_BYTES),
                e: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            })?;

        // SAFETY: a fresh private anonymous mapping aliases nothing. The kernel returns
        // page-aligned, zero-filled memory valid for `bytes` bytes, or an error.
        let ptr = unsafe {
            mmap_anonymous(
                std::ptr::null_mut(),
                bytes,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
        }
        .map_err(|e| AfuError::Alloc {
            bytes,
            e: e.into(),
        })?;

        let ptr = NonNull::new(ptr.cast::<u64>()).ok_or_else(|| AfuError::Alloc {
            bytes,
            e: std::io::Error::from(std::io::ErrorKind::OutOfMemory),
        })?;
        trace!("Mapped {bytes} bytes of host memory at {ptr:p} for {words} words");
        Ok(HostMemory {
            ptr,
            words,
            mapped_bytes: bytes,
        })
    }

    /// Host virtual address of the first word.
    pub fn addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn mapped_bytes(&self) -> usize {
        self.mapped_bytes
    }

    /// Read word `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn read(&self, index: usize) -> u64 {
        assert!(index < self.words, "word {index} out of bounds");
        // SAFETY: index < words and the mapping holds at least `words` aligned u64s.
        unsafe { self.ptr.as_ptr().add(index).read_volatile() }
    }

    /// Write word `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn write(&self, index: usize, value: u64) {
        assert!(index < self.words, "word {index} out of bounds");
        // SAFETY: index < words and the mapping holds at least `words` aligned u64s. The
        // memory is only ever accessed through volatile operations.
        unsafe { self.ptr.as_ptr().add(index).write_volatile(value) }
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        // SAFETY: ptr and mapped_bytes describe exactly the mapping created in new(), and Drop
        // runs once.
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr().cast(), self.mapped_bytes) } {
            warn!("Failed to unmap host memory at {:p}: {e}", self.ptr);
        }
    }
}

/// A host buffer mapped for DMA by an accelerator.
///
/// Created by [`AfuSession::malloc`](crate::session::AfuSession::malloc). Borrowing the
/// accelerator ties the buffer's lifetime to the session, so the session cannot be closed while
/// the device can still reach the memory.
pub struct SharedBuffer<'a> {
    memory: HostMemory,
    iova: u64,
    accelerator: &'a dyn Accelerator,
}

impl std::fmt::Debug for SharedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("memory", &self.memory)
            .field("iova", &format_args!("{:#x}", self.iova))
            .field("device", &self.accelerator.device_handle())
            .finish()
    }
}

impl<'a> SharedBuffer<'a> {
    /// Allocate `words` words and map them for DMA on `accelerator`.
    pub fn new(accelerator: &'a dyn Accelerator, words: usize) -> Result<Self, AfuError> {
        let memory = HostMemory::new(words)?;
        // SAFETY: `memory` moves into the returned buffer, whose Drop unmaps the IOVA before
        // the memory itself is dropped.
        let iova = unsafe { accelerator.map_dma(&memory) }?;
        trace!(
            "{}: mapped {} words at {:#x} to iova {iova:#x}",
            accelerator.device_handle(),
            words,
            memory.addr()
        );
        Ok(SharedBuffer {
            memory,
            iova,
            accelerator,
        })
    }

    /// The address the accelerator uses for the first word.
    pub fn iova(&self) -> u64 {
        self.iova
    }

    pub fn len(&self) -> usize {
        self.memory.words()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read word `index`. See [`HostMemory::read`].
    pub fn get(&self, index: usize) -> u64 {
        self.memory.read(index)
    }

    /// Write word `index`. See [`HostMemory::write`].
    pub fn set(&self, index: usize, value: u64) {
        self.memory.write(index, value)
    }

    /// Write `value` into every word.
    pub fn fill(&self, value: u64) {
        (0..self.len()).for_each(|i| self.memory.write(i, value));
    }

    /// Snapshot the buffer contents.
    pub fn to_vec(&self) -> Vec<u64> {
        (0..self.len()).map(|i| self.memory.read(i)).collect()
    }
}

impl Drop for SharedBuffer<'_> {
    fn drop(&mut self) {
        // The DMA mapping goes first; the pages are unmapped afterwards when `memory` drops.
        // SAFETY: the IOVA was mapped in new() and is unmapped exactly once, here.
        if let Err(e) = unsafe { self.accelerator.unmap_dma(self.iova) } {
            warn!(
                "{}: failed to release DMA mapping at iova {:#x}: {e}",
                self.accelerator.device_handle(),
                self.iova
            );
        } else {
            trace!(
                "{}: released iova {:#x}",
                self.accelerator.device_handle(),
                self.iova
            );
        }
    }
}
