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

//! Layered configuration.
//!
//! Values are resolved in this order, first hit wins:
//! 1. a file passed with `--config`
//! 2. the user config, `/etc/afudma/config.toml`
//! 3. the vendor config, `/usr/lib/afudma/config.toml`
//! 4. the hardcoded defaults in [`system_config`] and [`crate::afu`]
//!
//! ```toml
//! [system_paths]
//! fpga_region_dir = "/sys/class/fpga_region/"
//! dev_dir = "/dev/"
//!
//! [afu]
//! accel_uuid = "5ad8b7c0-3a1e-4d6c-9b0f-6e2f41c8a713"
//! input_granularity = 128
//! inputs_per_output = 16
//!
//! [transfer]
//! poll_sleep_ms = 0
//! ```

pub mod config_files;
pub mod system_config;

pub use system_config::{SystemConfig, load_config, load_config_from};
