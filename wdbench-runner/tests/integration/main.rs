// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive the runner against fake tools written as shell scripts.

#![cfg(unix)]

mod basic;
mod fixtures;
mod process_group;
