//! Periodic CPU/memory sampling spanning one chunk of crawl work.
//!
//! The sampler runs as a background task whose lifetime is controlled
//! entirely by the caller's cancellation token: started before a chunk's
//! crawl tasks, cancelled after their barrier, so the observation window
//! exactly spans the chunk.

use std::time::Duration;

use sysinfo::System;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Arithmetic means over the samples collected while the token was live
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub avg_cpu: f64,
    pub avg_memory: f64,
}

/// Record one CPU% and one memory% observation per `interval` tick until
/// `cancel` fires, then return the averages. With no samples collected both
/// averages are 0.
pub async fn sample(cancel: &CancellationToken, interval: Duration) -> ResourceUsage {
    let mut system = System::new();
    let mut cpu_samples: Vec<f64> = Vec::new();
    let mut memory_samples: Vec<f64> = Vec::new();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately; consume it
    // so sampling starts one full interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                system.refresh_cpu_usage();
                cpu_samples.push(f64::from(system.global_cpu_info().cpu_usage()));

                system.refresh_memory();
                let total = system.total_memory();
                if total == 0 {
                    warn!("memory totals unavailable, skipping sample");
                    continue;
                }
                memory_samples.push(system.used_memory() as f64 / total as f64 * 100.0);
            }
        }
    }

    ResourceUsage {
        avg_cpu: mean(&cpu_samples),
        avg_memory: mean(&memory_samples),
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}
