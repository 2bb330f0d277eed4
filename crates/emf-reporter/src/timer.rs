// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tokio::time::Instant;

/// Wall-clock stopwatch started on construction.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the timer started. May be called repeatedly.
    pub fn stop(&self) -> f64 {
        self.started.elapsed().as_nanos() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_stop_reports_elapsed_millis() {
        let timer = Timer::start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(timer.stop(), 250.0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(timer.stop(), 300.0);
    }

    #[test]
    fn test_default_starts_now() {
        let timer = Timer::default();
        let elapsed = timer.stop();
        assert!((0.0..1000.0).contains(&elapsed));
    }
}
