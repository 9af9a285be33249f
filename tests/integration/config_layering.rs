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

use crate::integration::common::write;
use afudma::afu::{AFU_ACCEL_UUID, INPUT_GRANULARITY, INPUTS_PER_OUTPUT};
use afudma::config::SystemConfig;
use afudma::config::load_config_from;
use afudma::error::AfuError;
use googletest::prelude::*;
use rstest::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct ConfigFiles {
    dir: TempDir,
}

impl ConfigFiles {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn with(self, name: &str, contents: &str) -> ConfigFiles {
        write(&self.path(name), contents);
        self
    }

    fn load(&self, extra: Option<&str>) -> std::result::Result<SystemConfig, AfuError> {
        let extra = extra.map(|name| self.path(name));
        load_config_from(
            &self.path("vendor.toml"),
            &self.path("user.toml"),
            extra.as_deref(),
        )
    }
}

#[fixture]
fn files() -> ConfigFiles {
    ConfigFiles {
        dir: tempfile::tempdir().unwrap(),
    }
}

#[gtest]
#[rstest]
fn no_files_gives_defaults(files: ConfigFiles) {
    let config = files.load(None).unwrap();
    expect_that!(config, eq(&SystemConfig::default()));
    expect_that!(config.fpga_region_dir, eq(Path::new("/sys/class/fpga_region/")));
    expect_that!(config.dev_dir, eq(Path::new("/dev/")));
    expect_that!(config.afu.accel_uuid, eq(AFU_ACCEL_UUID));
    expect_that!(config.afu.input_granularity, eq(INPUT_GRANULARITY));
    expect_that!(config.afu.inputs_per_output, eq(INPUTS_PER_OUTPUT));
    expect_that!(config.poll_sleep, none());
}

#[gtest]
#[rstest]
fn user_overrides_vendor(files: ConfigFiles) {
    let files = files
        .with(
            "vendor.toml",
            "[system_paths]\ndev_dir = \"/vendor/dev/\"\nfpga_region_dir = \"/vendor/region/\"\n\
             [transfer]\npoll_sleep_ms = 10\n",
        )
        .with("user.toml", "[system_paths]\ndev_dir = \"/user/dev/\"\n");

    let config = files.load(None).unwrap();
    expect_that!(config.dev_dir, eq(Path::new("/user/dev/")));
    expect_that!(config.fpga_region_dir, eq(Path::new("/vendor/region/")));
    expect_that!(config.poll_sleep, some(eq(Duration::from_millis(10))));
    expect_that!(config.afu.accel_uuid, eq(AFU_ACCEL_UUID));
}

#[gtest]
#[rstest]
fn extra_file_overrides_user(files: ConfigFiles) {
    let files = files
        .with("user.toml", "[transfer]\npoll_sleep_ms = 10\n")
        .with(
            "extra.toml",
            "[transfer]\npoll_sleep_ms = 0\n\
             [afu]\ninput_granularity = 256\ninputs_per_output = 32\n",
        );

    let config = files.load(Some("extra.toml")).unwrap();
    expect_that!(config.poll_sleep, none());
    expect_that!(config.afu.input_granularity, eq(256));
    expect_that!(config.afu.inputs_per_output, eq(32));
}

#[gtest]
#[rstest]
fn broken_system_file_is_ignored(files: ConfigFiles) {
    let files = files
        .with("vendor.toml", "this is [not toml")
        .with("user.toml", "[afu]\nno_such_key = 1\n");
    let config = files.load(None).unwrap();
    expect_that!(config, eq(&SystemConfig::default()));
}

#[gtest]
#[rstest]
#[case::malformed("extra.toml", "[transfer\n", "AfuError::TomlDe:")]
#[case::unknown_key("extra.toml", "[transfer]\nsleep = 1\n", "AfuError::TomlDe:")]
#[case::zero_ratio("extra.toml", "[afu]\ninputs_per_output = 0\n", "AfuError::Config:")]
#[case::uneven_granularity(
    "extra.toml",
    "[afu]\ninput_granularity = 100\n",
    "must be a multiple of inputs_per_output"
)]
#[case::empty_uuid("extra.toml", "[afu]\naccel_uuid = \" \"\n", "accel_uuid must not be empty")]
fn bad_extra_file_is_an_error(
    files: ConfigFiles,
    #[case] name: &str,
    #[case] contents: &str,
    #[case] message: &str,
) {
    let files = files.with(name, contents);
    assert_that!(
        files.load(Some(name)),
        err(displays_as(contains_substring(message)))
    );
}

#[gtest]
#[rstest]
fn missing_extra_file_is_an_error(files: ConfigFiles) {
    assert_that!(
        files.load(Some("absent.toml")),
        err(displays_as(contains_substring("Config file not found")))
    );
}
