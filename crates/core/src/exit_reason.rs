// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of FleetMaster.
//
// FleetMaster is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// FleetMaster is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with FleetMaster. If not, see <https://www.gnu.org/licenses/>.

//! Exit reasons for coordinator and host termination.
//!
//! ## Purpose
//! Carried in [`crate::DownEvent`] notifications and returned by terminating
//! coordinator loops, so supervisors can decide whether a restart is due.

use std::fmt;

/// Why a process (coordinator loop or actor host) terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Normal termination (not an error).
    Normal,
    /// Graceful shutdown was requested.
    Shutdown,
    /// Killed forcefully.
    Killed,
    /// Abnormal termination with a message.
    Error(String),
}

impl ExitReason {
    /// True for reasons a supervisor treats as a failure worth restarting.
    pub fn is_error(&self) -> bool {
        matches!(self, ExitReason::Killed | ExitReason::Error(_))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Shutdown => write!(f, "shutdown"),
            ExitReason::Killed => write!(f, "killed"),
            ExitReason::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}
