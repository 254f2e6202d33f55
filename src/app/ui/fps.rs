use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if !self.show_fps_bar {
            return None;
        }

        let readout = self.engine.fps();
        let mut parts = Vec::new();

        if self.fps_show_current {
            parts.push(format!("FPS {:.0}", readout.current));
        }

        if self.fps_show_average && readout.average > 0.0 {
            parts.push(format!("avg {:.1}", readout.average));
        }

        if self.fps_show_low && readout.low > 0.0 {
            parts.push(format!("low {:.0}", readout.low));
        }

        if self.fps_show_high && readout.high > 0.0 {
            parts.push(format!("high {:.0}", readout.high));
        }

        if self.fps_show_frame_time
            && let Some(report) = &self.last_report
            && !report.stats.skipped
        {
            parts.push(format!("render {:.1} ms", report.stats.frame_time_ms));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }

    pub(in crate::app) fn simulation_status_text(&self) -> String {
        let simulator = self.engine.simulator();
        let mut text = format!(
            "{} (alpha {:.3}, tick {}) | {} fidelity",
            simulator.state().label(),
            simulator.alpha(),
            simulator.ticks(),
            self.engine.fidelity().label()
        );
        if let Some(tick) = self.details.borrow().settled_at {
            text.push_str(&format!(" | at rest since tick {tick}"));
        }
        if let Some(report) = &self.last_report {
            text.push_str(&format!(
                " | {} draw calls, {} labels",
                report.stats.draw_call_count, report.stats.label_count
            ));
        }
        text
    }
}
