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

use crate::error::AfuError;
use crate::system_io::fs_read;
use log::trace;
use serde::Deserialize;
use std::path::Path;

/// One config file. Every key is optional so that files can be layered.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub system_paths: SystemPathsToml,
    #[serde(default)]
    pub afu: AfuToml,
    #[serde(default)]
    pub transfer: TransferToml,
}

/// The `[system_paths]` section
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemPathsToml {
    pub fpga_region_dir: Option<String>,
    pub dev_dir: Option<String>,
}

/// The `[afu]` section
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AfuToml {
    pub accel_uuid: Option<String>,
    pub input_granularity: Option<u64>,
    pub inputs_per_output: Option<u64>,
}

/// The `[transfer]` section
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TransferToml {
    pub poll_sleep_ms: Option<u64>,
}

impl ConfigLayer {
    /// Keys set in `self` win; anything unset is taken from `fallback`.
    pub(crate) fn merge(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            system_paths: SystemPathsToml {
                fpga_region_dir: self
                    .system_paths
                    .fpga_region_dir
                    .or(fallback.system_paths.fpga_region_dir),
                dev_dir: self.system_paths.dev_dir.or(fallback.system_paths.dev_dir),
            },
            afu: AfuToml {
                accel_uuid: self.afu.accel_uuid.or(fallback.afu.accel_uuid),
                input_granularity: self
                    .afu
                    .input_granularity
                    .or(fallback.afu.input_granularity),
                inputs_per_output: self
                    .afu
                    .inputs_per_output
                    .or(fallback.afu.inputs_per_output),
            },
            transfer: TransferToml {
                poll_sleep_ms: self.transfer.poll_sleep_ms.or(fallback.transfer.poll_sleep_ms),
            },
        }
    }
}

pub(crate) fn toml_str_to_config(toml_string: &str) -> Result<ConfigLayer, AfuError> {
    toml::from_str(toml_string).map_err(|e| AfuError::TomlDe {
        toml_string: toml_string.into(),
        e,
    })
}

pub(crate) fn config_layer_from_file(file_path: &Path) -> Result<ConfigLayer, AfuError> {
    if !file_path.is_file() {
        return Err(AfuError::Config(format!(
            "Config file not found in {file_path:?}"
        )));
    }
    let layer = toml_str_to_config(&fs_read(file_path)?)?;
    trace!("Loaded config layer from {file_path:?}: {layer:?}");
    Ok(layer)
}
