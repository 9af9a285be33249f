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

use crate::afu::{AFU_ACCEL_UUID, AfuProfile, INPUT_GRANULARITY, INPUTS_PER_OUTPUT};
use crate::config::config_files::{ConfigLayer, config_layer_from_file};
use crate::error::AfuError;
use log::{debug, trace, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Hardcoded fallbacks used when no config file sets a value.
pub static FPGA_REGION_DIR: &str = "/sys/class/fpga_region/";
pub static DEV_DIR: &str = "/dev/";

pub static VENDOR_CONFIG_PATH: &str = "/usr/lib/afudma/config.toml";
pub static USER_CONFIG_PATH: &str = "/etc/afudma/config.toml";

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    /// Where the kernel lists FPGA regions and their DFL ports.
    pub fpga_region_dir: PathBuf,
    /// Where the `dfl-port.N` character devices live.
    pub dev_dir: PathBuf,
    pub afu: AfuProfile,
    /// Sleep between polls of the DONE register. `None` spins.
    pub poll_sleep: Option<Duration>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        ConfigLayer::default().into()
    }
}

impl From<ConfigLayer> for SystemConfig {
    fn from(value: ConfigLayer) -> Self {
        trace!("Resolving config from {value:?}");
        SystemConfig {
            fpga_region_dir: PathBuf::from(value.system_paths.fpga_region_dir.unwrap_or_else(
                || {
                    trace!("No fpga_region_dir provided. Using hardcoded value.");
                    FPGA_REGION_DIR.to_string()
                },
            )),
            dev_dir: PathBuf::from(value.system_paths.dev_dir.unwrap_or_else(|| {
                trace!("No dev_dir provided. Using hardcoded value.");
                DEV_DIR.to_string()
            })),
            afu: AfuProfile {
                accel_uuid: value
                    .afu
                    .accel_uuid
                    .unwrap_or_else(|| AFU_ACCEL_UUID.to_string()),
                input_granularity: value.afu.input_granularity.unwrap_or(INPUT_GRANULARITY),
                inputs_per_output: value.afu.inputs_per_output.unwrap_or(INPUTS_PER_OUTPUT),
            },
            poll_sleep: value
                .transfer
                .poll_sleep_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }
}

impl SystemConfig {
    /// Reject geometry the transfer arithmetic cannot work with.
    ///
    /// # Returns: `Result<(), AfuError>`
    /// * `Ok(())` - The config is usable
    /// * `Err(AfuError::Config)` - Empty UUID, zero geometry, or a granularity that does not
    ///   divide evenly into outputs
    pub fn validate(&self) -> Result<(), AfuError> {
        if self.afu.accel_uuid.trim().is_empty() {
            return Err(AfuError::Config("accel_uuid must not be empty".into()));
        }
        if self.afu.input_granularity == 0 || self.afu.inputs_per_output == 0 {
            return Err(AfuError::Config(format!(
                "input_granularity ({}) and inputs_per_output ({}) must be non-zero",
                self.afu.input_granularity, self.afu.inputs_per_output
            )));
        }
        if self.afu.input_granularity % self.afu.inputs_per_output != 0 {
            return Err(AfuError::Config(format!(
                "input_granularity ({}) must be a multiple of inputs_per_output ({})",
                self.afu.input_granularity, self.afu.inputs_per_output
            )));
        }
        Ok(())
    }
}

/// Load a system config file, treating a missing or broken file as empty.
fn optional_layer(path: &Path) -> ConfigLayer {
    config_layer_from_file(path).unwrap_or_else(|e| {
        match e {
            AfuError::Config(..) => debug!("{e}"),
            _ => warn!("Ignoring config {path:?} because loading it failed: {e}"),
        }
        ConfigLayer::default()
    })
}

/// Resolve the configuration from explicit layers.
///
/// `extra` overrides `user`, which overrides `vendor`, which overrides the hardcoded defaults.
/// The vendor and user files are optional. An `extra` file was asked for explicitly, so failing
/// to load it is an error.
pub fn load_config_from(
    vendor: &Path,
    user: &Path,
    extra: Option<&Path>,
) -> Result<SystemConfig, AfuError> {
    let vendor_layer = optional_layer(vendor);
    let user_layer = optional_layer(user);
    let mut merged = user_layer.merge(vendor_layer);
    if let Some(extra) = extra {
        merged = config_layer_from_file(extra)?.merge(merged);
    }
    let config: SystemConfig = merged.into();
    config.validate()?;
    trace!("Resulting config: {config:?}");
    Ok(config)
}

/// Resolve the configuration from the standard vendor and user locations.
pub fn load_config(extra: Option<&Path>) -> Result<SystemConfig, AfuError> {
    load_config_from(
        Path::new(VENDOR_CONFIG_PATH),
        Path::new(USER_CONFIG_PATH),
        extra,
    )
}
