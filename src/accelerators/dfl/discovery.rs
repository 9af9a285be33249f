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

//! Finding DFL ports in sysfs.
//!
//! # A sysfs map of a DFL card
//!
//! ```text
//! /sys/class/fpga_region
//! ├── region0 -> ../../devices/pci0000:00/0000:00:02.0/0000:3b:00.0/fpga_region/region0
//! │   ├── dfl-fme.0
//! │   └── dfl-port.0
//! │       ├── afu_id
//! │       ├── userclk
//! │       │   └── frequency
//! │       └── ...
//! └── region1 -> ...
//! ```
//!
//! Only `afu_id` (32 hex digits, the UUID of the loaded AFU) is needed to pick a port. Its
//! device node is `/dev/dfl-port.N`, named after the sysfs directory.

use crate::afu::afu_id_matches;
use crate::error::AfuError;
use crate::system_io::{fs_read_attr, fs_read_dir};
use log::{debug, trace, warn};
use std::path::{Path, PathBuf};

/// A DFL port found in sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// e.g. `dfl-port.0`
    pub name: String,
    pub sysfs_path: PathBuf,
    pub dev_path: PathBuf,
    /// UUID of the AFU currently loaded behind the port, as reported by the kernel.
    pub afu_id: String,
}

/// List every DFL port under `fpga_region_dir`.
///
/// # Returns: `Result<Vec<PortInfo>, AfuError>`
/// * `Ok(Vec<PortInfo>)` - At least one port, in region then port order
/// * `Err(AfuError::NoDriver)` - The region directory is missing or holds no DFL ports
pub fn list_ports(fpga_region_dir: &Path, dev_dir: &Path) -> Result<Vec<PortInfo>, AfuError> {
    let regions = fs_read_dir(fpga_region_dir).map_err(|e| {
        debug!("Cannot enumerate FPGA regions: {e}");
        AfuError::NoDriver
    })?;

    let mut ports = Vec::new();
    for region in regions.iter().filter(|r| r.starts_with("region")) {
        let region_path = fpga_region_dir.join(region);
        let entries = match fs_read_dir(&region_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping {region}: {e}");
                continue;
            }
        };
        for name in entries.into_iter().filter(|e| e.starts_with("dfl-port.")) {
            let sysfs_path = region_path.join(&name);
            match fs_read_attr(&sysfs_path.join("afu_id")) {
                Ok(afu_id) => {
                    trace!("{name} in {region} carries AFU {afu_id}");
                    ports.push(PortInfo {
                        dev_path: dev_dir.join(&name),
                        name,
                        sysfs_path,
                        afu_id,
                    });
                }
                Err(e) => warn!("Skipping {name}: {e}"),
            }
        }
    }

    if ports.is_empty() {
        debug!("No DFL ports under {fpga_region_dir:?}");
        return Err(AfuError::NoDriver);
    }
    Ok(ports)
}

/// The ports whose AFU matches `accel_uuid`.
///
/// # Returns: `Result<Vec<PortInfo>, AfuError>`
/// * `Ok(Vec<PortInfo>)` - One or more candidate ports, to be tried in order
/// * `Err(AfuError::NoDriver)` - See [`list_ports`]
/// * `Err(AfuError::NotFound)` - Ports exist but none carries the requested AFU
pub fn find_ports(
    fpga_region_dir: &Path,
    dev_dir: &Path,
    accel_uuid: &str,
) -> Result<Vec<PortInfo>, AfuError> {
    let matching: Vec<PortInfo> = list_ports(fpga_region_dir, dev_dir)?
        .into_iter()
        .filter(|p| afu_id_matches(&p.afu_id, accel_uuid))
        .collect();
    if matching.is_empty() {
        return Err(AfuError::NotFound {
            uuid: accel_uuid.to_string(),
        });
    }
    debug!(
        "Ports carrying {accel_uuid}: {:?}",
        matching.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
    );
    Ok(matching)
}
