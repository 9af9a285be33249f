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

//! Size validation and the counts derived from it, checked over every size up to a bound.

use afudma::afu::{AfuProfile, CL_BYTES};
use afudma::error::AfuError;
use afudma::transfer::{TransferPlan, cache_lines_for, plan_from_arg};
use googletest::prelude::*;
use rstest::*;

const MAX_INPUTS: u64 = 8192;

#[gtest]
fn only_positive_multiples_of_granularity_are_accepted() {
    let profile = AfuProfile::default();
    for n in 0..=MAX_INPUTS {
        let accepted = TransferPlan::new(n, &profile).is_ok();
        expect_that!((n, accepted), eq((n, n > 0 && n % 128 == 0)));
    }
}

#[gtest]
fn outputs_are_one_sixteenth_of_inputs() {
    let profile = AfuProfile::default();
    for n in (128..=MAX_INPUTS).step_by(128) {
        let plan = TransferPlan::new(n, &profile).unwrap();
        expect_that!(plan.num_outputs * 16, eq(n));
    }
}

#[gtest]
fn cache_lines_cover_input_bytes() {
    let profile = AfuProfile::default();
    for n in (128..=MAX_INPUTS).step_by(128) {
        let plan = TransferPlan::new(n, &profile).unwrap();
        let bytes = n * 8;
        expect_that!(plan.num_cache_lines, eq(bytes.div_ceil(CL_BYTES)));
        expect_that!(plan.num_cache_lines * CL_BYTES, ge(bytes));
        expect_that!((plan.num_cache_lines - 1) * CL_BYTES, lt(bytes));
    }
    for bytes in 1..=1024u64 {
        expect_that!(cache_lines_for(bytes), eq(bytes.div_ceil(64)));
    }
}

#[gtest]
#[rstest]
#[case::number("128", 128)]
#[case::leading_space(" 256", 256)]
#[case::plus_sign("+384", 384)]
fn accepted_arguments(#[case] arg: &str, #[case] num_inputs: u64) {
    let plan = plan_from_arg(arg, &AfuProfile::default()).unwrap();
    expect_that!(plan.num_inputs, eq(num_inputs));
}

#[gtest]
#[rstest]
#[case::empty("")]
#[case::word("size")]
#[case::zero("0")]
#[case::negative("-128")]
#[case::fraction("128.0")]
#[case::hex("0x80")]
#[case::trailing_space("128 ")]
#[case::not_a_multiple("129")]
fn rejected_arguments(#[case] arg: &str) {
    let result = plan_from_arg(arg, &AfuProfile::default());
    expect_that!(matches!(result, Err(AfuError::Usage(..))), eq(true));
}
