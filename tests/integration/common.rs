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

//! Builders for fake sysfs and devfs trees.

use afudma::afu::normalize_uuid;
use afudma::config::SystemConfig;
use rstest::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway `/sys/class/fpga_region` and `/dev` pair.
pub struct FakeSysfs {
    root: TempDir,
}

impl FakeSysfs {
    pub fn new() -> FakeSysfs {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir_all(root.path().join("fpga_region")).unwrap();
        fs::create_dir_all(root.path().join("dev")).unwrap();
        FakeSysfs { root }
    }

    pub fn region_dir(&self) -> PathBuf {
        self.root.path().join("fpga_region")
    }

    pub fn dev_dir(&self) -> PathBuf {
        self.root.path().join("dev")
    }

    /// Add `region/dfl-port.<port>` carrying `uuid`, the way the kernel writes `afu_id`.
    pub fn add_port(&self, region: &str, port: u32, uuid: &str) -> PathBuf {
        let dir = self.region_dir().join(region).join(format!("dfl-port.{port}"));
        fs::create_dir_all(&dir).unwrap();
        write(&dir.join("afu_id"), &format!("{}\n", normalize_uuid(uuid)));
        dir
    }

    /// Create a plain file where the port's character device would be.
    pub fn add_dev_node(&self, port: u32) -> PathBuf {
        let path = self.dev_dir().join(format!("dfl-port.{port}"));
        write(&path, "");
        path
    }

    pub fn config(&self) -> SystemConfig {
        SystemConfig {
            fpga_region_dir: self.region_dir(),
            dev_dir: self.dev_dir(),
            ..Default::default()
        }
    }
}

pub fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap_or_else(|e| panic!("failed to write {path:?}: {e}"));
}

#[fixture]
pub fn sysfs() -> FakeSysfs {
    FakeSysfs::new()
}
