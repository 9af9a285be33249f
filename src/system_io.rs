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

//! Error Wrapping sysfs and devfs Helpers
//!
//! Thin wrappers around the standard library file operations used to discover and open
//! accelerator ports. Every helper logs at `trace` level and converts failures into an
//! [`AfuError`] carrying the path that was being accessed.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use afudma::system_io::{fs_read_attr, fs_read_dir};
//! # use std::path::Path;
//! # fn example() -> Result<(), afudma::error::AfuError> {
//! for region in fs_read_dir(Path::new("/sys/class/fpga_region"))? {
//!     println!("found {region}");
//! }
//! let afu_id = fs_read_attr(Path::new("/sys/class/fpga_region/region0/dfl-port.0/afu_id"))?;
//! # Ok(())
//! # }
//! ```

use crate::error::AfuError;
use log::trace;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Read the contents of a file to a String.
///
/// # Returns: `Result<String, AfuError>`
/// * `Ok(String)` - The complete, untrimmed contents of the file
/// * `Err(AfuError::IORead)` - If the file cannot be opened or read
pub fn fs_read(file_path: &Path) -> Result<String, AfuError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf = String::new();
    OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf))
        .map_err(|e| AfuError::IORead {
            file: file_path.into(),
            e,
        })?;
    trace!("Reading done");
    Ok(buf)
}

/// Read a sysfs attribute.
///
/// Kernel attributes usually end in a newline and some drivers pad them with nul bytes, so both
/// are stripped from the end of the value.
pub fn fs_read_attr(file_path: &Path) -> Result<String, AfuError> {
    fs_read(file_path).map(|s| s.trim_end_matches(['\n', '\0']).to_string())
}

/// Read a sysfs attribute holding an unsigned decimal or `0x`-prefixed hexadecimal integer.
///
/// # Returns: `Result<u64, AfuError>`
/// * `Ok(u64)` - The parsed value
/// * `Err(AfuError::IORead)` - The attribute could not be read
/// * `Err(AfuError::Parse)` - The attribute is not an integer
pub fn fs_read_u64(file_path: &Path) -> Result<u64, AfuError> {
    let value = fs_read_attr(file_path)?;
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| AfuError::Parse {
        file: file_path.into(),
        value,
    })
}

/// Split a sysfs entry name into its text and its trailing instance number, if any.
fn instance_key(name: &str) -> (&str, Option<u64>) {
    let text = name.trim_end_matches(|c: char| c.is_ascii_digit());
    (text, name[text.len()..].parse().ok())
}

/// List the entry names of a directory, sorted by name and then by instance number.
///
/// Entries that cannot be read are skipped. Trailing numbers compare as numbers, so
/// `dfl-port.2` is always tried before `dfl-port.10`.
///
/// # Returns: `Result<Vec<String>, AfuError>`
/// * `Ok(Vec<String>)` - Entry names (not full paths)
/// * `Err(AfuError::IOReadDir)` - The directory does not exist or cannot be read
pub fn fs_read_dir(dir: &Path) -> Result<Vec<String>, AfuError> {
    trace!("Attempting to read directory '{dir:?}'");
    let iter = std::fs::read_dir(dir).map_err(|e| AfuError::IOReadDir {
        dir: dir.to_owned(),
        e,
    })?;
    let mut names: Vec<String> = iter
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_by(|a, b| instance_key(a).cmp(&instance_key(b)).then_with(|| a.cmp(b)));
    trace!("Dir reading done, {} entries.", names.len());
    Ok(names)
}

/// Open a character device for reading and writing.
///
/// When `exclusive` is set the device is opened with `O_EXCL`, which device drivers such as
/// the DFL port driver treat as a request for sole ownership and refuse with `EBUSY` while
/// another process holds the port.
///
/// # Returns: `Result<File, AfuError>`
/// * `Ok(File)` - The open device
/// * `Err(AfuError::IOOpen)` - The open failed; the raw OS error is preserved in `e`
pub fn open_device(dev_path: &Path, exclusive: bool) -> Result<File, AfuError> {
    trace!("Attempting to open device {dev_path:?} (exclusive: {exclusive})");
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    if exclusive {
        options.custom_flags(libc::O_EXCL);
    }
    options.open(dev_path).map_err(|e| AfuError::IOOpen {
        file: dev_path.into(),
        e,
    })
}
