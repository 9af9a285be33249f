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

//! One DMA round trip through the pipeline AFU.
//!
//! The host fills an input buffer, hands the AFU both buffer addresses and the input size in cache
//! lines, sets `GO`, and waits for `DONE`:
//!
//! ```text
//! host                                   AFU
//!  | RD_ADDR <- iova(input)               |
//!  | WR_ADDR <- iova(output)              |
//!  | SIZE    <- input cache lines         |
//!  | GO      <- 1  ---------------------> | reads input, writes output
//!  | DONE?  0, 0, ..., 1  <-------------- |
//! ```

use crate::afu::{AfuProfile, CL_BYTES, ELEMENT_BYTES, Register};
use crate::error::AfuError;
use crate::session::AfuSession;
use log::{debug, info};
use std::time::Duration;

/// Value written into every input element.
pub const INPUT_SENTINEL: u64 = 1;

/// Sizes of one transfer, derived from the requested number of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub num_inputs: u64,
    pub num_outputs: u64,
    /// Input size in cache lines, the unit the AFU's `SIZE` register counts in.
    pub num_cache_lines: u64,
}

impl TransferPlan {
    /// Plan a transfer of `num_inputs` elements.
    ///
    /// # Returns: `Result<TransferPlan, AfuError>`
    /// * `Ok(TransferPlan)` - `num_inputs` is a positive multiple of the input granularity
    /// * `Err(AfuError::Usage)` - It is not
    /// * `Err(AfuError::Config)` - The profile has a zero granularity or ratio
    pub fn new(num_inputs: u64, profile: &AfuProfile) -> Result<TransferPlan, AfuError> {
        if profile.input_granularity == 0 || profile.inputs_per_output == 0 {
            return Err(AfuError::Config(format!("unusable AFU geometry {profile:?}")));
        }
        if num_inputs == 0 || num_inputs % profile.input_granularity != 0 {
            return Err(AfuError::Usage(format!(
                "size {num_inputs} is not a positive multiple of {}",
                profile.input_granularity
            )));
        }
        let total_bytes = num_inputs
            .checked_mul(ELEMENT_BYTES)
            .ok_or_else(|| AfuError::Usage(format!("size {num_inputs} is too large")))?;
        Ok(TransferPlan {
            num_inputs,
            num_outputs: num_inputs / profile.inputs_per_output,
            num_cache_lines: cache_lines_for(total_bytes),
        })
    }
}

/// Number of cache lines needed to hold `bytes` bytes.
pub fn cache_lines_for(bytes: u64) -> u64 {
    bytes.div_ceil(CL_BYTES)
}

/// Parse a strictly positive decimal integer.
///
/// Leading whitespace and a `+` sign are accepted, anything after the digits is not. Returns
/// `None` for zero, negative numbers, and values that do not fit in an `i64`.
pub fn parse_positive_int(s: &str) -> Option<u64> {
    let n: i64 = s.trim_start().parse().ok()?;
    u64::try_from(n).ok().filter(|n| *n > 0)
}

/// Validate the command line size argument and plan the transfer for it.
///
/// # Returns: `Result<TransferPlan, AfuError>`
/// * `Ok(TransferPlan)` - The argument is a positive multiple of the input granularity
/// * `Err(AfuError::Usage)` - It is not a positive integer, or not a multiple
pub fn plan_from_arg(arg: &str, profile: &AfuProfile) -> Result<TransferPlan, AfuError> {
    let num_inputs = parse_positive_int(arg)
        .ok_or_else(|| AfuError::Usage(format!("{arg:?} is not a positive integer")))?;
    TransferPlan::new(num_inputs, profile)
}

/// How to wait between reads of `DONE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollPolicy {
    /// `None` spins.
    pub sleep: Option<Duration>,
}

/// Poll `DONE` until it reads non-zero.
///
/// There is no timeout: an AFU that never finishes hangs the caller.
///
/// # Returns: `Result<u64, AfuError>`
/// * `Ok(u64)` - The number of reads it took
/// * `Err(AfuError)` - A read failed
pub fn wait_for_done(session: &AfuSession, poll: PollPolicy) -> Result<u64, AfuError> {
    let mut polls = 0;
    loop {
        polls += 1;
        if session.read(Register::Done)? != 0 {
            return Ok(polls);
        }
        match poll.sleep {
            Some(interval) => std::thread::sleep(interval),
            None => std::hint::spin_loop(),
        }
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub outputs: Vec<u64>,
    /// Reads of `DONE` until it was set.
    pub polls: u64,
}

/// Run one transfer of `plan.num_inputs` sentinel inputs and collect the outputs.
///
/// Both buffers are released before this returns, on success and on error.
pub fn run_transfer(
    session: &AfuSession,
    plan: &TransferPlan,
    poll: PollPolicy,
) -> Result<TransferOutcome, AfuError> {
    let to_words = |n: u64| {
        usize::try_from(n).map_err(|_| AfuError::Usage(format!("size {n} is too large")))
    };
    let input = session.malloc(to_words(plan.num_inputs)?)?;
    let output = session.malloc(to_words(plan.num_outputs)?)?;

    input.fill(INPUT_SENTINEL);
    output.fill(0);

    debug!("Starting transfer: {plan:?}");
    session.write(Register::RdAddr, input.iova())?;
    session.write(Register::WrAddr, output.iova())?;
    session.write(Register::Size, plan.num_cache_lines)?;
    session.write(Register::Go, 1)?;

    let polls = wait_for_done(session, poll)?;
    info!(
        "{}: transfer of {} inputs done after {polls} polls",
        session.device_handle(),
        plan.num_inputs
    );

    Ok(TransferOutcome {
        outputs: output.to_vec(),
        polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerators::Backend;
    use crate::config::SystemConfig;

    #[test]
    fn test_parse_positive_int() {
        assert_eq!(parse_positive_int("128"), Some(128));
        assert_eq!(parse_positive_int("  +256"), Some(256));
        assert_eq!(parse_positive_int("0"), None);
        assert_eq!(parse_positive_int("-128"), None);
        assert_eq!(parse_positive_int("128 "), None);
        assert_eq!(parse_positive_int("12a"), None);
        assert_eq!(parse_positive_int(""), None);
        assert_eq!(parse_positive_int("99999999999999999999"), None);
    }

    #[test]
    fn test_plan_for_one_granule() {
        let plan = TransferPlan::new(128, &AfuProfile::default()).unwrap();
        assert_eq!(plan.num_outputs, 8);
        assert_eq!(plan.num_cache_lines, 16);
    }

    #[test]
    fn test_plan_rejects_partial_granule() {
        assert!(matches!(
            TransferPlan::new(130, &AfuProfile::default()),
            Err(AfuError::Usage(..))
        ));
        assert!(matches!(
            plan_from_arg("abc", &AfuProfile::default()),
            Err(AfuError::Usage(..))
        ));
    }

    #[test]
    fn test_cache_lines_round_up() {
        assert_eq!(cache_lines_for(0), 0);
        assert_eq!(cache_lines_for(1), 1);
        assert_eq!(cache_lines_for(64), 1);
        assert_eq!(cache_lines_for(65), 2);
    }

    #[test]
    fn test_run_transfer_on_simulator() {
        let session = AfuSession::open(Backend::Simulated, &SystemConfig::default()).unwrap();
        let plan = TransferPlan::new(256, session.profile()).unwrap();
        let outcome = run_transfer(&session, &plan, PollPolicy::default()).unwrap();
        assert_eq!(outcome.outputs, vec![8; 16]);
        assert!(outcome.polls > 1);
    }
}
