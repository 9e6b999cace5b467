//! Episode detection: a state machine over one ordered price series that
//! flags contiguous stretches of above-threshold movement.

use crate::config::AnalysisConfig;
use crate::model::{EpisodeTrigger, ProductSeries, VolatilityPeriod};

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Normal,
    Rising,
    Falling,
    InEpisode,
}

/// An episode that has opened but not yet closed.
struct OpenEpisode {
    start: i32,
    peak: f64,
    trough: f64,
    trigger: EpisodeTrigger,
    stable: usize,
}

pub struct EventDetector {
    threshold_pct: f64,
    drawdown_pct: f64,
    stabilization_periods: usize,
}

impl EventDetector {
    pub fn new(threshold_pct: f64, drawdown_pct: f64, stabilization_periods: usize) -> Self {
        Self {
            threshold_pct,
            drawdown_pct,
            stabilization_periods,
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(
            cfg.volatility_threshold_pct,
            cfg.drawdown_threshold_pct,
            cfg.stabilization_periods,
        )
    }

    /// Scans the series and returns closed episodes ordered by start
    /// period. An episode still open at the end of the series is emitted
    /// with the final period as its end. Overlaps cannot occur: a
    /// re-trigger while stabilizing extends the current episode.
    pub fn detect(&self, series: &ProductSeries) -> Vec<VolatilityPeriod> {
        let points: Vec<(i32, f64)> = series.observed().collect();
        if points.len() < 2 {
            return Vec::new();
        }
        let long_run_mean =
            points.iter().map(|(_, v)| *v).sum::<f64>() / points.len() as f64;

        let mut episodes = Vec::new();
        let mut state = State::Normal;
        let mut open: Option<OpenEpisode> = None;
        // Running extrema since the last episode close, anchors for the
        // cumulative drawdown/run-up triggers.
        let mut peak_since_close = points[0];
        let mut trough_since_close = points[0];

        for window in points.windows(2) {
            let (_, prev) = window[0];
            let (period, value) = window[1];
            let pct = if prev != 0.0 {
                (value - prev) / prev * 100.0
            } else {
                0.0
            };

            match open.as_mut() {
                None => {
                    let drawdown = if peak_since_close.1 != 0.0 {
                        (peak_since_close.1 - value) / peak_since_close.1 * 100.0
                    } else {
                        0.0
                    };
                    let run_up = if trough_since_close.1 != 0.0 {
                        (value - trough_since_close.1) / trough_since_close.1 * 100.0
                    } else {
                        0.0
                    };

                    // Cumulative triggers only fire along an established
                    // direction; a single jump needs no trend context.
                    let trigger = if pct.abs() > self.threshold_pct {
                        Some(EpisodeTrigger::PeriodChange(pct))
                    } else if state == State::Falling && drawdown > self.drawdown_pct {
                        Some(EpisodeTrigger::Drawdown(drawdown))
                    } else if state == State::Rising && run_up > self.drawdown_pct {
                        Some(EpisodeTrigger::RunUp(run_up))
                    } else {
                        None
                    };

                    match trigger {
                        Some(trigger) => {
                            // A single-jump trigger opens at the period of the
                            // move with the pre-move value folded into the
                            // extrema; a cumulative trigger spans back to the
                            // extremum it ran from.
                            let (start, seed) = match trigger {
                                EpisodeTrigger::PeriodChange(_) => (period, prev),
                                EpisodeTrigger::Drawdown(_) => peak_since_close,
                                EpisodeTrigger::RunUp(_) => trough_since_close,
                            };
                            open = Some(OpenEpisode {
                                start,
                                peak: seed.max(value),
                                trough: seed.min(value),
                                trigger,
                                stable: 0,
                            });
                            state = State::InEpisode;
                        }
                        None => {
                            state = if pct > 0.0 {
                                State::Rising
                            } else if pct < 0.0 {
                                State::Falling
                            } else {
                                State::Normal
                            };
                            if value >= peak_since_close.1 {
                                peak_since_close = (period, value);
                            }
                            if value <= trough_since_close.1 {
                                trough_since_close = (period, value);
                            }
                        }
                    }
                }
                Some(episode) => {
                    debug_assert_eq!(state, State::InEpisode);
                    episode.peak = episode.peak.max(value);
                    episode.trough = episode.trough.min(value);
                    if pct.abs() > self.threshold_pct {
                        episode.stable = 0;
                    } else {
                        episode.stable += 1;
                    }
                }
            }

            let stabilized = open
                .as_ref()
                .is_some_and(|ep| ep.stable >= self.stabilization_periods);
            if stabilized {
                if let Some(episode) = open.take() {
                    episodes.push(self.close(episode, period, long_run_mean));
                }
                state = State::Normal;
                peak_since_close = (period, value);
                trough_since_close = (period, value);
            }
        }

        if let Some(episode) = open {
            let (last_period, _) = points[points.len() - 1];
            episodes.push(self.close(episode, last_period, long_run_mean));
        }
        episodes
    }

    fn close(&self, episode: OpenEpisode, end: i32, long_run_mean: f64) -> VolatilityPeriod {
        let severity = if long_run_mean > 0.0 {
            (episode.peak - episode.trough) / long_run_mean
        } else {
            0.0
        };
        VolatilityPeriod {
            start_period: episode.start,
            end_period: end,
            peak_price: episode.peak,
            trough_price: episode.trough,
            trigger: episode.trigger,
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(start: i32, prices: &[f64]) -> ProductSeries {
        ProductSeries {
            product_code: "EPM0".to_string(),
            region_code: "NUS".to_string(),
            start_period: start,
            prices: prices.iter().map(|&p| Some(p)).collect(),
        }
    }

    fn detector() -> EventDetector {
        // 15% period change, 25% cumulative, 2 stable periods to close
        EventDetector::new(15.0, 25.0, 2)
    }

    #[test]
    fn flat_series_has_no_episodes() {
        let s = series(2015, &[3.0, 3.0, 3.0, 3.0, 3.0]);
        assert!(detector().detect(&s).is_empty());
    }

    #[test]
    fn gentle_drift_has_no_episodes() {
        let s = series(2015, &[3.00, 3.05, 3.10, 3.08, 3.12]);
        assert!(detector().detect(&s).is_empty());
    }

    #[test]
    fn single_spike_yields_one_episode_with_spike_peak() {
        let s = series(2015, &[3.00, 3.00, 5.00, 3.05, 3.04, 3.03]);
        let episodes = detector().detect(&s);
        assert_eq!(episodes.len(), 1);
        let ep = &episodes[0];
        assert_eq!(ep.peak_price, 5.00);
        assert_eq!(ep.start_period, 2017);
        assert!(matches!(ep.trigger, EpisodeTrigger::PeriodChange(_)));
    }

    #[test]
    fn crisis_scenario_opens_at_jump_and_tracks_extremes() {
        // 2020-2024, threshold 15%: +40.9% opens at 2021, peak and
        // trough carry across the whole move.
        let s = series(2020, &[2.20, 3.10, 4.50, 3.00, 2.95]);
        let episodes = detector().detect(&s);
        assert_eq!(episodes.len(), 1);
        let ep = &episodes[0];
        assert_eq!(ep.start_period, 2021);
        assert_eq!(ep.end_period, 2024);
        assert_eq!(ep.peak_price, 4.50);
        assert_eq!(ep.trough_price, 2.20);
        match ep.trigger {
            EpisodeTrigger::PeriodChange(pct) => {
                assert!((pct - 40.909).abs() < 0.01, "got {pct}");
            }
            other => panic!("unexpected trigger {other:?}"),
        }
        let mean = (2.20 + 3.10 + 4.50 + 3.00 + 2.95) / 5.0;
        assert!((ep.severity - (4.50 - 2.20) / mean).abs() < 1e-12);
    }

    #[test]
    fn retrigger_while_stabilizing_merges_into_one_episode() {
        // Second jump lands before two quiet periods have passed, so the
        // candidate episodes merge into one span.
        let s = series(2015, &[3.00, 4.00, 3.95, 5.20, 5.15, 5.10, 5.12]);
        let episodes = detector().detect(&s);
        assert_eq!(episodes.len(), 1);
        let ep = &episodes[0];
        assert_eq!(ep.start_period, 2016);
        assert_eq!(ep.peak_price, 5.20);
        assert_eq!(ep.trough_price, 3.00);
    }

    #[test]
    fn slow_slide_triggers_on_cumulative_drawdown() {
        // Every step is under the 15% jump threshold; the cumulative
        // decline from the 2015 peak crosses 25% at the last point.
        let s = series(2015, &[4.00, 3.70, 3.42, 3.16, 2.92]);
        let episodes = detector().detect(&s);
        assert_eq!(episodes.len(), 1);
        let ep = &episodes[0];
        assert_eq!(ep.start_period, 2015);
        assert!(matches!(ep.trigger, EpisodeTrigger::Drawdown(_)));
        assert_eq!(ep.peak_price, 4.00);
        assert_eq!(ep.trough_price, 2.92);
    }

    #[test]
    fn episode_closes_after_stabilization_and_detection_resumes() {
        let s = series(
            2010,
            &[3.00, 5.00, 5.02, 5.01, 5.03, 5.02, 7.50, 7.48, 7.46],
        );
        let episodes = detector().detect(&s);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].start_period, 2011);
        assert_eq!(episodes[0].end_period, 2013);
        assert_eq!(episodes[1].start_period, 2016);
        assert!(episodes[0].end_period < episodes[1].start_period);
    }

    #[test]
    fn short_series_has_no_episodes() {
        let s = series(2020, &[3.0]);
        assert!(detector().detect(&s).is_empty());
    }
}
