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

//! Coordinator runtime settings.

use std::time::Duration;

/// Timing and retry settings of one coordinator.
///
/// Defaults match production behavior; tests shrink the timers.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Interval between election checks.
    pub tick_interval: Duration,
    /// Timeout of one client call to a coordinator.
    pub call_timeout: Duration,
    /// Client retry attempts for transient leader loss.
    pub retry_attempts: u32,
    /// Backoff between client retries.
    pub retry_backoff: Duration,
    /// Supervisor: restarts tolerated within [`MasterConfig::within`].
    pub max_restarts: u32,
    /// Supervisor: restart intensity window.
    pub within: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            tick_interval: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
            retry_attempts: 10,
            retry_backoff: Duration::from_secs(1),
            max_restarts: 10,
            within: Duration::from_secs(60),
        }
    }
}
