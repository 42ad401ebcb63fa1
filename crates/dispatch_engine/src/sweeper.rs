/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::domain::action::internal::dispatch::on_sweep_tick;
use crate::environment::AppState;
use crate::tools::logger::*;
use crate::tools::prometheus::SWEEP_DURATION;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, Instant, MissedTickBehavior};

async fn sweep_once(data: &AppState) {
    let start_time = Instant::now();

    match on_sweep_tick(data).await {
        Ok(summary) => {
            if summary.scanned > 0 {
                info!(tag = "[Sweep Completed]", scanned = summary.scanned, advanced = summary.advanced, skipped = summary.skipped, failed = summary.failed);
            }
        }
        Err(err) => error!(tag = "[Sweep Failed]", error = %err.message()),
    }

    SWEEP_DURATION.observe(start_time.elapsed().as_secs_f64());
}

/// Runs the staleness sweep every `sweeper_interval_seconds` until termination is requested.
/// A slow sweep delays the next tick instead of stacking up.
pub async fn run_sweeper(data: Arc<AppState>, graceful_termination_requested: Arc<AtomicBool>) {
    let mut timer = interval(Duration::from_secs(data.sweeper_interval_seconds.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Poll the flag at least once a second so shutdown does not wait a full interval.
    let mut shutdown_check = interval(Duration::from_secs(1));

    loop {
        if graceful_termination_requested.load(Ordering::Relaxed) {
            info!(tag = "[Graceful Shutting Down]", "Stopping staleness sweeper");
            break;
        }
        tokio::select! {
            _ = timer.tick() => sweep_once(&data).await,
            _ = shutdown_check.tick() => {},
        }
    }
}
