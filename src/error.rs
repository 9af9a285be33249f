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

//! The crate-wide error type.
//!
//! Every fallible operation in afudma returns [`AfuError`]. The variants fall into the three
//! categories reported by [`AfuError::category`], which the command line front end uses to decide
//! between printing usage text and printing a diagnostic.

use std::path::PathBuf;

/// How an [`AfuError`] is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad command line input. Reported by printing the usage text.
    Usage,
    /// The accelerator session could not be opened (busy, not found, no driver).
    Session,
    /// Anything that went wrong after the session was open, or inside the backend.
    Runtime,
}

#[derive(Debug, thiserror::Error)]
pub enum AfuError {
    #[error("AfuError::Usage: {0}")]
    Usage(String),
    #[error("AfuError::Busy: All FPGAs busy.")]
    Busy,
    #[error("AfuError::NotFound: FPGA with accelerator {uuid} not found.")]
    NotFound { uuid: String },
    #[error("AfuError::NoDriver: No FPGA driver found.")]
    NoDriver,
    #[error("AfuError::Mmio: MMIO access at byte offset {offset:#x} failed: {reason}")]
    Mmio { offset: u64, reason: String },
    #[error("AfuError::Dma: {0}")]
    Dma(String),
    #[error("AfuError::Alloc: Failed to allocate {bytes} bytes of shared memory: {e}")]
    Alloc { bytes: usize, e: std::io::Error },
    #[error("AfuError::Ioctl: ioctl {request} on {device:?} failed: {e}")]
    Ioctl {
        request: &'static str,
        device: PathBuf,
        e: std::io::Error,
    },
    #[error("AfuError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("AfuError::IOReadDir: An IO error occurred when reading directory {dir:?}: {e}")]
    IOReadDir { dir: PathBuf, e: std::io::Error },
    #[error("AfuError::IOOpen: An IO error occurred when opening {file:?}: {e}")]
    IOOpen { file: PathBuf, e: std::io::Error },
    #[error("AfuError::Parse: Failed to parse {value:?} read from {file:?}")]
    Parse { file: PathBuf, value: String },
    #[error("AfuError::TomlDe: Failed to parse toml: {e}")]
    TomlDe {
        toml_string: String,
        e: toml::de::Error,
    },
    #[error("AfuError::Config: {0}")]
    Config(String),
    #[error("AfuError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl AfuError {
    /// The reporting category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AfuError::Usage(..) => ErrorCategory::Usage,
            AfuError::Busy | AfuError::NotFound { .. } | AfuError::NoDriver => {
                ErrorCategory::Session
            }
            _ => ErrorCategory::Runtime,
        }
    }

    /// The message printed after `ERROR: ` on the command line.
    ///
    /// Session errors get a short fixed sentence per failure kind; everything else falls back to
    /// the full display string so the variant and its context stay visible.
    pub fn diagnostic(&self) -> String {
        match self {
            AfuError::Busy => "All FPGAs busy.".to_string(),
            AfuError::NotFound { uuid } => format!("FPGA with accelerator {uuid} not found."),
            AfuError::NoDriver => "No FPGA driver found.".to_string(),
            other => other.to_string(),
        }
    }
}
