// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for handling interrupt and termination signals during a run.
//!
//! Every tool is started in its own process group, so a Ctrl-C in the terminal only reaches
//! wdbench. The runner listens for these signals while a tool is running, kills the tool's
//! process group and ends the run.

use std::fmt;

/// The kind of signal handling to set up for a run.
///
/// A `SignalHandlerKind` is passed into
/// [`BenchRunnerBuilder::build`](crate::runner::BenchRunnerBuilder::build).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SignalHandlerKind {
    /// Capture interrupt and termination signals depending on the platform.
    Standard,

    /// A no-op signal handler. Useful for tests.
    Noop,
}

impl SignalHandlerKind {
    /// Must be called from within a Tokio runtime context.
    pub(crate) fn build(self) -> std::io::Result<SignalHandler> {
        match self {
            Self::Standard => SignalHandler::new(),
            Self::Noop => Ok(SignalHandler::noop()),
        }
    }
}

/// The signal handler implementation.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    signals: Option<imp::Signals>,
}

impl SignalHandler {
    fn new() -> std::io::Result<Self> {
        let signals = imp::Signals::new()?;
        Ok(Self {
            signals: Some(signals),
        })
    }

    pub(crate) fn noop() -> Self {
        Self { signals: None }
    }

    /// Waits for the next shutdown signal. Returns `None` once no more signals can arrive.
    pub(crate) async fn recv(&mut self) -> Option<ShutdownEvent> {
        match &mut self.signals {
            Some(signals) => signals.recv().await,
            None => None,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::ShutdownEvent;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// SIGINT, SIGHUP and SIGTERM.
    #[derive(Debug)]
    pub(super) struct Signals {
        sigint: SignalWithDone,
        sighup: SignalWithDone,
        sigterm: SignalWithDone,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            Ok(Self {
                sigint: SignalWithDone::new(SignalKind::interrupt())?,
                sighup: SignalWithDone::new(SignalKind::hangup())?,
                sigterm: SignalWithDone::new(SignalKind::terminate())?,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            loop {
                tokio::select! {
                    recv = self.sigint.signal.recv(), if !self.sigint.done => match recv {
                        Some(()) => break Some(ShutdownEvent::Interrupt),
                        None => self.sigint.done = true,
                    },
                    recv = self.sighup.signal.recv(), if !self.sighup.done => match recv {
                        Some(()) => break Some(ShutdownEvent::Hangup),
                        None => self.sighup.done = true,
                    },
                    recv = self.sigterm.signal.recv(), if !self.sigterm.done => match recv {
                        Some(()) => break Some(ShutdownEvent::Term),
                        None => self.sigterm.done = true,
                    },
                    else => break None,
                }
            }
        }
    }

    #[derive(Debug)]
    struct SignalWithDone {
        signal: Signal,
        done: bool,
    }

    impl SignalWithDone {
        fn new(kind: SignalKind) -> std::io::Result<Self> {
            Ok(Self {
                signal: signal(kind)?,
                done: false,
            })
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::ShutdownEvent;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    #[derive(Debug)]
    pub(super) struct Signals {
        ctrl_c: CtrlC,
        done: bool,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            Ok(Self {
                ctrl_c: ctrl_c()?,
                done: false,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            if self.done {
                return None;
            }
            match self.ctrl_c.recv().await {
                Some(()) => Some(ShutdownEvent::Interrupt),
                None => {
                    self.done = true;
                    None
                }
            }
        }
    }
}

/// A signal that ends the run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGINT on Unix, Ctrl-C on Windows.
    Interrupt,

    /// SIGHUP.
    #[cfg(unix)]
    Hangup,

    /// SIGTERM.
    #[cfg(unix)]
    Term,
}

impl fmt::Display for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownEvent::Interrupt => write!(f, "interrupt signal"),
            #[cfg(unix)]
            ShutdownEvent::Hangup => write!(f, "hangup signal"),
            #[cfg(unix)]
            ShutdownEvent::Term => write!(f, "termination signal"),
        }
    }
}
