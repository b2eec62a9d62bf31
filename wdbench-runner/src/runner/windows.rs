// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

// Process groups aren't a thing on Windows. The direct child is killed through its handle.

pub(super) fn set_process_group(_cmd: &mut std::process::Command) {}

pub(super) fn terminate_process_group(_pid: u32) {}
