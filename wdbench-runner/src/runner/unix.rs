// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use libc::SIGKILL;
use std::os::unix::process::CommandExt;

/// Puts the child in its own process group, so that everything it spawns can be killed together.
pub(super) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

/// Kills the process group led by `pid`.
pub(super) fn terminate_process_group(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // The group may already be gone, in which case this fails with ESRCH. That's fine.
    unsafe {
        libc::kill(-pid, SIGKILL);
    }
}
