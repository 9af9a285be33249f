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

use crate::integration::common::{FakeSysfs, sysfs};
use afudma::accelerators::Backend;
use afudma::accelerators::dfl::discovery::{find_ports, list_ports};
use afudma::afu::AFU_ACCEL_UUID;
use afudma::error::AfuError;
use googletest::prelude::*;
use rstest::*;

const OTHER_UUID: &str = "331db30c-9885-41ea-9081-f88b8f655caa";

#[gtest]
#[rstest]
fn lists_ports_in_region_order(sysfs: FakeSysfs) {
    sysfs.add_port("region1", 1, OTHER_UUID);
    sysfs.add_port("region0", 0, AFU_ACCEL_UUID);
    // the FME sits next to the port and must be ignored
    std::fs::create_dir_all(sysfs.region_dir().join("region0/dfl-fme.0")).unwrap();

    let ports = list_ports(&sysfs.region_dir(), &sysfs.dev_dir()).unwrap();
    let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
    expect_that!(names, eq(&vec!["dfl-port.0", "dfl-port.1"]));
    expect_that!(ports[0].dev_path, eq(&sysfs.dev_dir().join("dfl-port.0")));
    expect_that!(ports[0].afu_id, eq("5ad8b7c03a1e4d6c9b0f6e2f41c8a713"));
}

#[gtest]
#[rstest]
fn finds_port_carrying_accelerator(sysfs: FakeSysfs) {
    sysfs.add_port("region0", 0, OTHER_UUID);
    sysfs.add_port("region1", 1, AFU_ACCEL_UUID);

    let ports = find_ports(&sysfs.region_dir(), &sysfs.dev_dir(), AFU_ACCEL_UUID).unwrap();
    expect_that!(ports.len(), eq(1));
    expect_that!(ports[0].name, eq("dfl-port.1"));
}

#[gtest]
#[rstest]
fn wrong_uuid_is_not_found(sysfs: FakeSysfs) {
    sysfs.add_port("region0", 0, OTHER_UUID);

    let result = find_ports(&sysfs.region_dir(), &sysfs.dev_dir(), AFU_ACCEL_UUID);
    assert_that!(
        result,
        err(displays_as(contains_substring(format!(
            "FPGA with accelerator {AFU_ACCEL_UUID} not found."
        ))))
    );
}

#[gtest]
#[rstest]
#[case::missing_region_dir(true)]
#[case::no_ports(false)]
fn no_driver(sysfs: FakeSysfs, #[case] remove_dir: bool) {
    let region_dir = if remove_dir {
        sysfs.region_dir().join("does-not-exist")
    } else {
        std::fs::create_dir_all(sysfs.region_dir().join("region0")).unwrap();
        sysfs.region_dir()
    };
    let result = list_ports(&region_dir, &sysfs.dev_dir());
    expect_that!(matches!(result, Err(AfuError::NoDriver)), eq(true));
}

#[gtest]
#[rstest]
fn port_without_afu_id_is_skipped(sysfs: FakeSysfs) {
    std::fs::create_dir_all(sysfs.region_dir().join("region0/dfl-port.0")).unwrap();
    sysfs.add_port("region1", 1, AFU_ACCEL_UUID);

    let ports = list_ports(&sysfs.region_dir(), &sysfs.dev_dir()).unwrap();
    expect_that!(ports.len(), eq(1));
    expect_that!(ports[0].name, eq("dfl-port.1"));
}

#[gtest]
#[rstest]
fn missing_device_node_fails_to_open(sysfs: FakeSysfs) {
    sysfs.add_port("region0", 0, AFU_ACCEL_UUID);

    let result = Backend::Dfl.open(&sysfs.config());
    expect_that!(matches!(result, Err(AfuError::IOOpen { .. })), eq(true));
}

#[gtest]
#[rstest]
fn non_dfl_device_node_fails_region_query(sysfs: FakeSysfs) {
    sysfs.add_port("region0", 0, AFU_ACCEL_UUID);
    sysfs.add_dev_node(0);

    let result = Backend::Dfl.open(&sysfs.config());
    let is_region_query = matches!(
        result,
        Err(AfuError::Ioctl {
            request: "DFL_FPGA_PORT_GET_REGION_INFO",
            ..
        })
    );
    expect_that!(is_region_query, eq(true));
}
