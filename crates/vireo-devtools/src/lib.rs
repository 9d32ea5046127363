use std::collections::VecDeque;

use web_time::{Duration, Instant};

use vireo_core::BuildResults;

/// Numbers collected for one build + render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassMetrics {
    pub pass: u64,
    pub build_ms: f32,
    pub render_ms: f32,
    pub components: usize,
    pub created: usize,
    pub evicted: usize,
    pub patches: usize,
}

impl PassMetrics {
    pub fn from_results(pass: u64, results: &BuildResults) -> Self {
        Self {
            pass,
            components: results.components().len(),
            created: results.created(),
            evicted: results.evicted(),
            ..Default::default()
        }
    }
}

/// Stopwatch for the phases of a pass.
pub struct PassTimer {
    start: Instant,
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl PassTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the last lap (or start), restarting the clock.
    pub fn lap_ms(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now - self.start;
        self.start = now;
        dt.as_secs_f32() * 1000.0
    }
}

pub struct Hud {
    pass_count: u64,
    last_pass: Option<Instant>,
    rate_smooth: f32,
    pub metrics: Option<PassMetrics>,
}

impl Default for Hud {
    fn default() -> Self {
        Self::new()
    }
}

impl Hud {
    pub fn new() -> Self {
        Self {
            pass_count: 0,
            last_pass: None,
            rate_smooth: 0.0,
            metrics: None,
        }
    }

    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// Smoothed passes per second.
    pub fn rate(&self) -> f32 {
        self.rate_smooth
    }

    fn tick(&mut self, now: Instant) {
        self.pass_count += 1;
        if let Some(prev) = self.last_pass.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let rate = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.rate_smooth = if self.rate_smooth == 0.0 {
                    rate
                } else {
                    (1.0 - a) * self.rate_smooth + a * rate
                };
            }
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("pass: {}", self.pass_count),
            format!("rate: {:.1}/s", self.rate_smooth),
        ];
        if let Some(m) = &self.metrics {
            lines.push(format!("build: {:.2} ms", m.build_ms));
            lines.push(format!("render: {:.2} ms", m.render_ms));
            lines.push(format!("components: {}", m.components));
            lines.push(format!("created/evicted: {}/{}", m.created, m.evicted));
            lines.push(format!("patches: {}", m.patches));
        }
        lines
    }
}

/// Collects per-pass metrics and logs a one-line summary for each pass.
pub struct Inspector {
    pub enabled: bool,
    pub hud: Hud,
    history: VecDeque<PassMetrics>,
    capacity: usize,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Keeps the last `capacity` passes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            enabled: true,
            hud: Hud::new(),
            history: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn record(&mut self, metrics: PassMetrics) {
        if !self.enabled {
            return;
        }
        self.hud.tick(Instant::now());
        log::debug!("{}", Self::summary_of(&metrics));
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(metrics.clone());
        self.hud.metrics = Some(metrics);
    }

    pub fn last(&self) -> Option<&PassMetrics> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &PassMetrics> {
        self.history.iter()
    }

    /// Mean build + render time over the retained history.
    pub fn mean_pass_time(&self) -> Duration {
        if self.history.is_empty() {
            return Duration::ZERO;
        }
        let total: f32 = self.history.iter().map(|m| m.build_ms + m.render_ms).sum();
        Duration::from_secs_f32(total / self.history.len() as f32 / 1000.0)
    }

    pub fn summary(&self) -> String {
        self.hud.lines().join("  |  ")
    }

    fn summary_of(m: &PassMetrics) -> String {
        format!(
            "pass {}: build {:.2} ms, render {:.2} ms, {} components ({} new, {} evicted), {} patches",
            m.pass, m.build_ms, m.render_ms, m.components, m.created, m.evicted, m.patches
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pass: u64) -> PassMetrics {
        PassMetrics {
            pass,
            build_ms: 1.0,
            render_ms: 3.0,
            components: 4,
            created: 1,
            evicted: 0,
            patches: 2,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut insp = Inspector::with_capacity(2);
        for p in 1..=3 {
            insp.record(metrics(p));
        }
        let passes: Vec<u64> = insp.history().map(|m| m.pass).collect();
        assert_eq!(passes, vec![2, 3]);
        assert_eq!(insp.hud.pass_count(), 3);
        let mean_ms = insp.mean_pass_time().as_secs_f32() * 1000.0;
        assert!((mean_ms - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut insp = Inspector::new();
        insp.toggle();
        insp.record(metrics(1));
        assert!(insp.last().is_none());
        assert_eq!(insp.summary(), "pass: 0  |  rate: 0.0/s");
    }

    #[test]
    fn test_summary_includes_last_pass() {
        let mut insp = Inspector::new();
        insp.record(metrics(7));
        let s = insp.summary();
        assert!(s.contains("components: 4"));
        assert!(s.contains("created/evicted: 1/0"));
        assert!(s.contains("patches: 2"));
    }
}
