// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Respawn policy: whether and how long to wait before relaunching a
//! crashed process.

use std::time::Duration;

use tracing::info;

/// Upper bound on automatic restarts of a single process.
const MAX_RESTARTS: u32 = 10;

/// Cap on the back-off wait, in seconds.
const MAX_WAIT_SECS: u64 = 60;

/// Decision function for relaunching a terminated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RespawnPolicy {
    /// Never respawn.
    None,
    /// Respawn up to [`MAX_RESTARTS`] times with a quadratic, capped
    /// back-off: the n-th restart waits `min(n^2, 60)` seconds.
    #[default]
    Respawn,
}

impl RespawnPolicy {
    /// Decide whether to respawn after the `restart_count`-th unplanned
    /// exit. Returns the wait to observe before relaunching, or `None`
    /// when the process should stay down.
    ///
    /// Logs the computed wait; the caller performs the actual sleep (and
    /// may abort it, in which case no respawn occurs).
    pub fn decide(&self, restart_count: u32) -> Option<Duration> {
        match self {
            RespawnPolicy::None => None,
            RespawnPolicy::Respawn => {
                if restart_count > MAX_RESTARTS {
                    return None;
                }
                let wait = u64::from(restart_count)
                    .saturating_mul(u64::from(restart_count))
                    .min(MAX_WAIT_SECS);
                info!(restart_count, wait_secs = wait, "waiting before respawn");
                Some(Duration::from_secs(wait))
            }
        }
    }
}

#[cfg(test)]
#[path = "respawn_tests.rs"]
mod tests;
