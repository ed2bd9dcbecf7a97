//! Music ducking envelope.
//!
//! Speech windows become a piecewise-linear gain curve for the music track:
//! full configured volume while the voice is silent, `duck_factor` of it
//! while the voice speaks, with linear ramps of `taper_secs` around each
//! window so the level never jumps.
//!
//! The ffmpeg expression is a sum of per-window trapezoids subtracted from
//! the base volume. Merged windows never share a ramp, so the sum matches the
//! piecewise curve and the expression nests to a fixed depth however many
//! windows there are.

use reelcut_common::config::DuckingConfig;

use crate::voice_activity::TimeRange;

/// Piecewise-linear music volume over the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DuckingEnvelope {
    base_volume: f64,
    ducked_volume: f64,
    taper_secs: f64,
    /// Merged speech windows, sorted and separated by more than two tapers.
    windows: Vec<TimeRange>,
    /// `(time, absolute volume)` control points, strictly increasing in time.
    points: Vec<(f64, f64)>,
}

impl DuckingEnvelope {
    /// Constant volume, no ducking.
    pub fn flat(base_volume: f64) -> Self {
        Self {
            base_volume,
            ducked_volume: base_volume,
            taper_secs: 0.0,
            windows: Vec::new(),
            points: Vec::new(),
        }
    }

    /// Build the envelope for `windows` of speech.
    ///
    /// Windows whose release and attack ramps would meet are merged so the
    /// music stays ducked through short pauses.
    pub fn from_windows(windows: &[TimeRange], base_volume: f64, config: &DuckingConfig) -> Self {
        let taper = config.taper_secs.max(0.0);
        let ducked = base_volume * config.duck_factor.clamp(0.0, 1.0);

        let mut sorted: Vec<TimeRange> = windows
            .iter()
            .copied()
            .filter(|w| w.end_secs > w.start_secs)
            .collect();
        sorted.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
        for window in sorted {
            match merged.last_mut() {
                Some(last) if window.start_secs - last.end_secs <= 2.0 * taper => {
                    last.end_secs = last.end_secs.max(window.end_secs);
                }
                _ => merged.push(window),
            }
        }

        if merged.is_empty() {
            return Self::flat(base_volume);
        }

        let mut points = Vec::with_capacity(merged.len() * 4 + 1);
        for window in &merged {
            points.push((window.start_secs - taper, base_volume));
            points.push((window.start_secs, ducked));
            points.push((window.end_secs, ducked));
            points.push((window.end_secs + taper, base_volume));
        }
        // Pin t=0 so the curve starts at full volume before the first ramp.
        if points[0].0 > 0.0 {
            points.insert(0, (0.0, base_volume));
        }
        points.dedup_by(|next, prev| (next.0 - prev.0).abs() < 1e-9);

        tracing::debug!(
            windows = merged.len(),
            base_volume,
            ducked_volume = ducked,
            "Built ducking envelope"
        );

        Self {
            base_volume,
            ducked_volume: ducked,
            taper_secs: taper,
            windows: merged,
            points,
        }
    }

    pub fn base_volume(&self) -> f64 {
        self.base_volume
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// No ducking happens anywhere.
    pub fn is_flat(&self) -> bool {
        self.points.is_empty()
    }

    /// Volume at time `t`.
    pub fn gain_at(&self, t: f64) -> f64 {
        let Some(&(first_t, first_v)) = self.points.first() else {
            return self.base_volume;
        };
        if t <= first_t {
            return first_v;
        }
        for pair in self.points.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if t < t1 {
                return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
            }
        }
        self.points.last().map_or(self.base_volume, |&(_, v)| v)
    }

    /// Merged speech windows the music is ducked under.
    pub fn windows(&self) -> &[TimeRange] {
        &self.windows
    }

    /// Expression for ffmpeg's `volume` filter (requires `eval=frame`).
    ///
    /// `base - depth*(w1+w2+..)` where each `w` is 0 outside its window's
    /// ramps, 1 inside the window and linear along the ramps.
    pub fn to_volume_expr(&self) -> String {
        let depth = self.base_volume - self.ducked_volume;
        if self.windows.is_empty() || depth.abs() < 1e-9 {
            return format!("{:.6}", self.base_volume);
        }

        let terms: Vec<String> = self
            .windows
            .iter()
            .map(|w| window_term(w, self.taper_secs))
            .collect();
        format!(
            "{base:.6}-{depth:.6}*({sum})",
            base = self.base_volume,
            sum = terms.join("+")
        )
    }
}

/// Trapezoid that is 1 inside `window` and falls to 0 over `taper` on each side.
fn window_term(window: &TimeRange, taper: f64) -> String {
    if taper <= 0.0 {
        return format!(
            "between(t,{:.6},{:.6})",
            window.start_secs, window.end_secs
        );
    }
    format!(
        "clip((t-{rise:.6})/{taper:.6},0,1)*clip(({fall:.6}-t)/{taper:.6},0,1)",
        rise = window.start_secs - taper,
        fall = window.end_secs + taper,
    )
}
