use std::collections::VecDeque;

use super::physics::SimulationQuality;

const WINDOW_SECS: f32 = 1.0;
/// Longer gaps after an idle frame mean nothing asked for a repaint, not that
/// rendering was slow.
const MAX_FRAME_GAP_SECS: f32 = 0.5;
const LOW_WINDOWS_TO_DOWNGRADE: u32 = 2;
const HIGH_WINDOWS_TO_UPGRADE: u32 = 3;
const FALLBACK_THRESHOLD_GAP: f32 = 15.0;
const FPS_SAMPLE_WINDOW: usize = 180;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fidelity {
    #[default]
    Full,
    /// Rectangles, no labels and reduced simulation quality.
    Simplified,
}

impl Fidelity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Simplified => "simplified",
        }
    }

    pub fn simulation_quality(self) -> SimulationQuality {
        match self {
            Self::Full => SimulationQuality::Full,
            Self::Simplified => SimulationQuality::Reduced,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FpsReadout {
    pub current: f32,
    pub average: f32,
    pub low: f32,
    pub high: f32,
}

/// Rolling one-second FPS windows with hysteresis between two fidelity levels.
#[derive(Debug)]
pub struct PerformanceGovernor {
    low_fps: f32,
    high_fps: f32,
    window_elapsed: f32,
    window_frames: u32,
    windows: u64,
    low_streak: u32,
    high_streak: u32,
    fidelity: Fidelity,
    last_window_fps: Option<f32>,
    current_fps: f32,
    samples: VecDeque<f32>,
}

impl PerformanceGovernor {
    pub fn new(low_fps: f32, high_fps: f32) -> Self {
        let mut governor = Self {
            low_fps: 0.0,
            high_fps: 0.0,
            window_elapsed: 0.0,
            window_frames: 0,
            windows: 0,
            low_streak: 0,
            high_streak: 0,
            fidelity: Fidelity::Full,
            last_window_fps: None,
            current_fps: 0.0,
            samples: VecDeque::with_capacity(FPS_SAMPLE_WINDOW),
        };
        governor.set_thresholds(low_fps, high_fps);
        governor
    }

    pub fn set_thresholds(&mut self, low_fps: f32, high_fps: f32) {
        let low_fps = if low_fps.is_finite() { low_fps.max(1.0) } else { 30.0 };
        let high_fps = if high_fps.is_finite() && high_fps > low_fps {
            high_fps
        } else {
            let raised = low_fps + FALLBACK_THRESHOLD_GAP;
            log::warn!(
                "high fps threshold {high_fps} is not above low threshold {low_fps}, using {raised}"
            );
            raised
        };

        self.low_fps = low_fps;
        self.high_fps = high_fps;
    }

    /// Feeds one frame interval in seconds. `idle` marks a frame that follows
    /// one which did not ask for a repaint, so a long interval before it is
    /// waiting time rather than render time. Returns the new fidelity when
    /// this frame closed a window that changed it.
    pub fn record_frame(&mut self, dt: f32, idle: bool) -> Option<Fidelity> {
        if !dt.is_finite() || dt <= f32::EPSILON {
            return None;
        }

        self.current_fps = (1.0 / dt).clamp(0.0, 1000.0);
        self.samples.push_back(self.current_fps);
        while self.samples.len() > FPS_SAMPLE_WINDOW {
            self.samples.pop_front();
        }

        if idle && dt > MAX_FRAME_GAP_SECS {
            self.window_elapsed = 0.0;
            self.window_frames = 0;
            return None;
        }

        self.window_elapsed += dt;
        self.window_frames += 1;
        if self.window_elapsed < WINDOW_SECS {
            return None;
        }

        let fps = self.window_frames as f32 / self.window_elapsed;
        self.window_elapsed = 0.0;
        self.window_frames = 0;
        self.windows += 1;
        self.last_window_fps = Some(fps);
        self.close_window(fps)
    }

    fn close_window(&mut self, fps: f32) -> Option<Fidelity> {
        if fps < self.low_fps {
            self.low_streak += 1;
            self.high_streak = 0;
        } else if fps > self.high_fps {
            self.high_streak += 1;
            self.low_streak = 0;
        } else {
            self.low_streak = 0;
            self.high_streak = 0;
            return None;
        }

        let next = match self.fidelity {
            Fidelity::Full if self.low_streak >= LOW_WINDOWS_TO_DOWNGRADE => Fidelity::Simplified,
            Fidelity::Simplified if self.high_streak >= HIGH_WINDOWS_TO_UPGRADE => Fidelity::Full,
            _ => return None,
        };

        log::info!(
            "{:.1} fps over {} window(s), switching to {} fidelity",
            fps,
            self.low_streak.max(self.high_streak),
            next.label()
        );
        self.fidelity = next;
        self.low_streak = 0;
        self.high_streak = 0;
        Some(next)
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    #[cfg(test)]
    pub fn thresholds(&self) -> (f32, f32) {
        (self.low_fps, self.high_fps)
    }

    #[cfg(test)]
    pub fn windows(&self) -> u64 {
        self.windows
    }

    #[cfg(test)]
    pub fn last_window_fps(&self) -> Option<f32> {
        self.last_window_fps
    }

    pub fn readout(&self) -> FpsReadout {
        let average = if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f32>() / self.samples.len() as f32
        };

        FpsReadout {
            current: self.current_fps,
            average,
            low: self.samples.iter().copied().reduce(f32::min).unwrap_or(0.0),
            high: self.samples.iter().copied().reduce(f32::max).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_window(governor: &mut PerformanceGovernor, fps: f32) -> Option<Fidelity> {
        let before = governor.windows();
        let mut change = None;
        while governor.windows() == before {
            change = governor.record_frame(1.0 / fps, false);
        }
        change
    }

    #[test]
    fn oscillating_around_the_thresholds_never_switches() {
        let mut governor = PerformanceGovernor::new(30.0, 45.0);
        for _ in 0..20 {
            assert_eq!(feed_window(&mut governor, 28.0), None);
            assert_eq!(feed_window(&mut governor, 46.0), None);
        }
        assert_eq!(governor.fidelity(), Fidelity::Full);
    }

    #[test]
    fn downgrades_after_two_slow_windows_and_recovers_after_three_fast() {
        let mut governor = PerformanceGovernor::new(30.0, 45.0);
        assert_eq!(feed_window(&mut governor, 20.0), None);
        assert_eq!(feed_window(&mut governor, 20.0), Some(Fidelity::Simplified));

        assert_eq!(feed_window(&mut governor, 60.0), None);
        assert_eq!(feed_window(&mut governor, 60.0), None);
        assert_eq!(feed_window(&mut governor, 38.0), None);
        assert_eq!(feed_window(&mut governor, 60.0), None);
        assert_eq!(feed_window(&mut governor, 60.0), None);
        assert_eq!(governor.fidelity(), Fidelity::Simplified);
        assert_eq!(feed_window(&mut governor, 60.0), Some(Fidelity::Full));
        assert_eq!(
            Fidelity::Simplified.simulation_quality(),
            SimulationQuality::Reduced
        );
    }

    #[test]
    fn idle_gaps_restart_the_window() {
        let mut governor = PerformanceGovernor::new(30.0, 45.0);
        for _ in 0..10 {
            governor.record_frame(1.0 / 60.0, false);
        }
        governor.record_frame(2.0, true);
        assert_eq!(governor.windows(), 0);

        feed_window(&mut governor, 60.0);
        let fps = governor.last_window_fps().unwrap();
        assert!((fps - 60.0).abs() < 1.0, "{fps}");
    }

    #[test]
    fn very_slow_busy_frames_still_downgrade() {
        let mut governor = PerformanceGovernor::new(30.0, 45.0);
        let mut changed = None;
        for _ in 0..45 {
            changed = changed.or(governor.record_frame(1.0 / 1.5, false));
        }

        assert_eq!(changed, Some(Fidelity::Simplified));
        assert_eq!(governor.fidelity(), Fidelity::Simplified);
        assert!(governor.windows() >= 2);
    }

    #[test]
    fn inverted_thresholds_are_repaired() {
        let governor = PerformanceGovernor::new(40.0, 20.0);
        assert_eq!(governor.thresholds(), (40.0, 55.0));
    }

    #[test]
    fn readout_tracks_recent_frames() {
        let mut governor = PerformanceGovernor::new(30.0, 45.0);
        governor.record_frame(1.0 / 50.0, false);
        governor.record_frame(1.0 / 100.0, false);

        let readout = governor.readout();
        assert!((readout.current - 100.0).abs() < 0.01);
        assert!((readout.low - 50.0).abs() < 0.01);
        assert!((readout.high - 100.0).abs() < 0.01);
        assert!((readout.average - 75.0).abs() < 0.01);
    }
}
