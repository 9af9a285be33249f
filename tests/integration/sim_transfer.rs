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

use afudma::accelerators::Backend;
use afudma::accelerators::simulated::SimulatedAccelerator;
use afudma::afu::{AfuProfile, Register};
use afudma::config::SystemConfig;
use afudma::error::AfuError;
use afudma::session::AfuSession;
use afudma::transfer::{PollPolicy, TransferPlan, run_transfer};
use googletest::prelude::*;
use rstest::*;
use std::time::Duration;

#[fixture]
fn session() -> AfuSession {
    AfuSession::open(Backend::Simulated, &SystemConfig::default()).unwrap()
}

#[gtest]
#[rstest]
#[case::one_granule(128)]
#[case::two_granules(256)]
#[case::many_granules(4096)]
fn all_ones_input_gives_eights(session: AfuSession, #[case] num_inputs: u64) {
    let plan = TransferPlan::new(num_inputs, session.profile()).unwrap();
    let outcome = run_transfer(&session, &plan, PollPolicy::default()).unwrap();
    let expected = vec![8u64; (num_inputs / 16) as usize];
    expect_that!(outcome.outputs, eq(&expected));
}

#[gtest]
#[rstest]
fn sleeping_poll_completes(session: AfuSession) {
    let plan = TransferPlan::new(128, session.profile()).unwrap();
    let poll = PollPolicy {
        sleep: Some(Duration::from_millis(1)),
    };
    let outcome = run_transfer(&session, &plan, poll).unwrap();
    expect_that!(outcome.outputs, eq(&vec![8; 8]));
}

#[gtest]
fn done_latency_sets_poll_count() {
    let profile = AfuProfile::default();
    let sim = SimulatedAccelerator::new(profile.clone()).with_done_latency(10);
    let session = AfuSession::from_accelerator(Box::new(sim), profile).unwrap();
    let plan = TransferPlan::new(128, session.profile()).unwrap();
    let outcome = run_transfer(&session, &plan, PollPolicy::default()).unwrap();
    expect_that!(outcome.polls, eq(11));
}

#[gtest]
fn wider_datapath_from_config() {
    let mut config = SystemConfig::default();
    config.afu.input_granularity = 256;
    config.afu.inputs_per_output = 32;
    let session = AfuSession::open(Backend::Simulated, &config).unwrap();

    let plan = TransferPlan::new(256, session.profile()).unwrap();
    expect_that!(plan.num_outputs, eq(8));
    let outcome = run_transfer(&session, &plan, PollPolicy::default()).unwrap();
    expect_that!(outcome.outputs, eq(&vec![16; 8]));
}

#[gtest]
#[rstest]
fn go_with_unmapped_address_is_a_dma_error(session: AfuSession) {
    let output = session.malloc(8).unwrap();

    session.write(Register::RdAddr, 0x1000).unwrap();
    session.write(Register::WrAddr, output.iova()).unwrap();
    session.write(Register::Size, 16).unwrap();

    let result = session.write(Register::Go, 1);
    expect_that!(matches!(result, Err(AfuError::Dma(..))), eq(true));
    expect_that!(session.read(Register::Done).unwrap(), eq(0));
}

#[gtest]
#[rstest]
fn output_buffer_too_small_is_a_dma_error(session: AfuSession) {
    let input = session.malloc(256).unwrap();
    let output = session.malloc(8).unwrap();

    session.write(Register::RdAddr, input.iova()).unwrap();
    session.write(Register::WrAddr, output.iova()).unwrap();
    session.write(Register::Size, 32).unwrap();

    assert_that!(
        session.write(Register::Go, 1),
        err(displays_as(contains_substring("overrun")))
    );
}

#[gtest]
#[rstest]
fn done_register_is_read_only(session: AfuSession) {
    assert_that!(
        session.write(Register::Done, 1),
        err(displays_as(contains_substring("MMIO_DONE is read-only")))
    );
}
