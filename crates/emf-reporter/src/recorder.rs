// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::metric::{Context, Observation};
use crate::timer::Timer;

/// Convenience producers shared by every reporter.
///
/// Implementors only provide [`MetricsRecorder::record`], which encodes one
/// document from the observations and context. All `add_*` methods return
/// the recorder so calls can be chained.
pub trait MetricsRecorder {
    fn record(&self, observations: Vec<Observation>, context: &Context);

    fn add_count(&self, name: &str, count: f64, context: &Context) -> &Self {
        self.add_metric(Observation::count(name, count), context)
    }

    fn add_duration(&self, name: &str, millis: f64, context: &Context) -> &Self {
        self.add_metric(Observation::duration(name, millis), context)
    }

    /// Stops `timer` and records the elapsed time as a duration
    fn add_time(&self, name: &str, timer: &Timer, context: &Context) -> &Self {
        self.add_duration(name, timer.stop(), context)
    }

    fn add_metric(&self, observation: Observation, context: &Context) -> &Self {
        self.add_metrics(vec![observation], context)
    }

    fn add_metrics(&self, observations: Vec<Observation>, context: &Context) -> &Self {
        self.record(observations, context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Unit;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(Vec<Observation>, Context)>>);

    impl MetricsRecorder for Recorded {
        fn record(&self, observations: Vec<Observation>, context: &Context) {
            self.0
                .lock()
                .expect("lock poisoned")
                .push((observations, context.clone()));
        }
    }

    #[test]
    fn test_each_call_records_one_document() {
        let recorder = Recorded::default();
        let mut context = Context::new();
        context.insert("user".to_string(), serde_json::json!("u-1"));

        recorder
            .add_count("CurrentStreams", 1.0, &Context::new())
            .add_duration("SessionLength", 200.0, &context)
            .add_metrics(
                vec![Observation::new("A"), Observation::new("B")],
                &Context::new(),
            );

        let recorded = recorder.0.into_inner().expect("lock poisoned");
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].0, vec![Observation::count("CurrentStreams", 1.0)]);
        assert_eq!(recorded[1].0[0].unit, Unit::Milliseconds);
        assert_eq!(recorded[1].1, context);
        assert_eq!(recorded[2].0.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_time_uses_timer() {
        let recorder = Recorded::default();
        let timer = Timer::start();
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;

        recorder.add_time("BufferLatency", &timer, &Context::new());

        let recorded = recorder.0.into_inner().expect("lock poisoned");
        assert_eq!(recorded[0].0[0], Observation::duration("BufferLatency", 40.0));
    }
}
