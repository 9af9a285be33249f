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

//! Command line front end shared by the `simple_pipeline` executables.
//!
//! Each executable picks a [`Backend`] and hands control to [`main_with`]. The run itself is
//! [`run`], which takes the argument list and output streams explicitly so it can be driven from
//! tests.

use afudma::accelerators::Backend;
use afudma::config::{SystemConfig, load_config};
use afudma::error::{AfuError, ErrorCategory};
use afudma::session::AfuSession;
use afudma::transfer::{PollPolicy, plan_from_arg, run_transfer};
use clap::Parser;
use clap::error::ErrorKind;
use env_logger::Env;
use log::{debug, error, warn};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Run one DMA transfer through the pipeline AFU")]
pub struct Cli {
    /// Number of inputs to test (positive integer, must be a multiple of the input granularity)
    #[arg(allow_negative_numbers = true)]
    pub size: String,

    /// Sleep this many milliseconds between polls of the done register instead of spinning
    #[arg(long = "sleep-ms", value_name = "MS")]
    pub sleep_ms: Option<u64>,

    /// Extra config file layered above the vendor and user config files
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Outcome of a run, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

impl From<RunStatus> for ExitCode {
    fn from(value: RunStatus) -> Self {
        match value {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Failure => ExitCode::FAILURE,
        }
    }
}

/// The usage text printed for bad command line input.
pub fn usage(name: &str, granularity: u64) -> String {
    format!(
        "Usage: {name} size\n\
         size (positive integer for number of inputs to test, must be multiple of {granularity})\n"
    )
}

fn write_failed(e: std::io::Error) -> AfuError {
    AfuError::Internal(format!("failed to write to stdout: {e}"))
}

/// Entry point of the executables: set up logging, run, and turn the result into an exit code.
pub fn main_with(backend: Backend) -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = std::env::args().collect();
    let status = run(
        &args,
        backend,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    );
    status.into()
}

/// Parse `args` (including the program name) and run one transfer on `backend`.
///
/// Results and usage text go to `out`, diagnostics to `err`.
pub fn run(
    args: &[String],
    backend: Backend,
    out: &mut impl Write,
    err: &mut impl Write,
) -> RunStatus {
    let name = args
        .first()
        .cloned()
        .unwrap_or_else(|| "simple_pipeline".to_string());

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(out, "{e}");
            return RunStatus::Success;
        }
        Err(e) => {
            debug!("Rejected command line: {e}");
            let granularity = SystemConfig::default().afu.input_granularity;
            let _ = writeln!(out, "{}", usage(&name, granularity));
            return RunStatus::Failure;
        }
    };
    debug!("parsed cli command with {cli:?}");

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(e, &name, &SystemConfig::default(), out, err),
    };

    match execute(&cli, &config, backend, out) {
        Ok(()) => RunStatus::Success,
        Err(e) => report(e, &name, &config, out, err),
    }
}

/// Print the message for a failed run.
fn report(
    e: AfuError,
    name: &str,
    config: &SystemConfig,
    out: &mut impl Write,
    err: &mut impl Write,
) -> RunStatus {
    match e.category() {
        ErrorCategory::Usage => {
            debug!("{e}");
            let _ = writeln!(out, "{}", usage(name, config.afu.input_granularity));
        }
        ErrorCategory::Session | ErrorCategory::Runtime => {
            error!("{e}");
            let _ = writeln!(err, "ERROR: {}", e.diagnostic());
        }
    }
    RunStatus::Failure
}

/// Validate the request, open the accelerator and run the transfer.
///
/// The size argument is checked before any device is touched.
pub fn execute(
    cli: &Cli,
    config: &SystemConfig,
    backend: Backend,
    out: &mut impl Write,
) -> Result<(), AfuError> {
    let plan = plan_from_arg(&cli.size, &config.afu)?;
    let poll = PollPolicy {
        sleep: match cli.sleep_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => config.poll_sleep,
        },
    };

    let session = AfuSession::open(backend, config)?;

    match session.measure_clock() {
        Ok(hz) => {
            let mhz = hz / 1e6;
            writeln!(out, "Measured AFU Clock Frequency: {mhz}MHz").map_err(write_failed)?;
        }
        Err(e) => warn!("Could not measure the AFU clock: {e}"),
    }

    let outcome = run_transfer(&session, &plan, poll)?;
    for value in &outcome.outputs {
        writeln!(out, "{value}").map_err(write_failed)?;
    }
    writeln!(out, "All DMA Tests Successful!!!").map_err(write_failed)?;
    Ok(())
}
