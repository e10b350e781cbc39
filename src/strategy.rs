//! The strategy ladder.
//!
//! Extraction is attempted with progressively more permissive profiles:
//!
//! ```text
//! Pending -> LegacyAttempt -> EnhancedConservative -> EnhancedRelaxed
//!         -> EnhancedVeryRelaxed -> AutoColorClustering -> Done | Failed
//! ```
//!
//! The ladder advances only when an attempt produced no curves or scored
//! below the acceptance threshold. The requested [`StrategyMode`] bounds how
//! far it may climb. Every attempt is recorded as an [`AttemptReport`] so a
//! rejected result can still be diagnosed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::PixelBounds;
use crate::cancel::CancellationToken;
use crate::curve::Curve;
use crate::error::{Error, Result};
use crate::profile::ExtractionProfile;

/// How far up the ladder a request may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Legacy attempt only.
    Legacy,
    /// Legacy, then the three enhanced levels.
    Optimized,
    /// Everything including auto-color clustering.
    #[default]
    Auto,
    /// Same ladder as `Auto`.
    Enhanced,
}

impl StrategyMode {
    /// Lowercase name as used in requests.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Optimized => "optimized",
            Self::Auto => "auto",
            Self::Enhanced => "enhanced",
        }
    }

    fn allows_auto_color(self) -> bool {
        matches!(self, Self::Auto | Self::Enhanced)
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "optimized" => Ok(Self::Optimized),
            "auto" => Ok(Self::Auto),
            "enhanced" => Ok(Self::Enhanced),
            _ => Err(Error::InvalidProfile(s.to_string())),
        }
    }
}

/// States of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderState {
    /// Nothing attempted yet.
    Pending,
    /// Caller parameters as given.
    LegacyAttempt,
    /// Slightly widened tolerance.
    EnhancedConservative,
    /// Moderately widened tolerance.
    EnhancedRelaxed,
    /// Widest palette-based attempt.
    EnhancedVeryRelaxed,
    /// K-means colour discovery.
    AutoColorClustering,
    /// An acceptable (or best available) result was produced.
    Done,
    /// No attempt produced a usable curve.
    Failed,
}

impl LadderState {
    /// State to try after an unacceptable attempt in this state, or `None`
    /// when `mode` allows no further attempts.
    #[must_use]
    pub fn next(self, mode: StrategyMode) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::LegacyAttempt),
            Self::LegacyAttempt if mode == StrategyMode::Legacy => None,
            Self::LegacyAttempt => Some(Self::EnhancedConservative),
            Self::EnhancedConservative => Some(Self::EnhancedRelaxed),
            Self::EnhancedRelaxed => Some(Self::EnhancedVeryRelaxed),
            Self::EnhancedVeryRelaxed if mode.allows_auto_color() => Some(Self::AutoColorClustering),
            Self::EnhancedVeryRelaxed | Self::AutoColorClustering | Self::Done | Self::Failed => None,
        }
    }

    /// Whether the state ends the ladder.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Profile run in this state, `None` for non-attempt states.
    #[must_use]
    pub fn profile(self, color_tolerance: u8, min_size: u32) -> Option<ExtractionProfile> {
        match self {
            Self::LegacyAttempt => Some(ExtractionProfile::legacy(color_tolerance, min_size)),
            Self::EnhancedConservative => Some(ExtractionProfile::enhanced_conservative(color_tolerance, min_size)),
            Self::EnhancedRelaxed => Some(ExtractionProfile::enhanced_relaxed(color_tolerance, min_size)),
            Self::EnhancedVeryRelaxed => Some(ExtractionProfile::enhanced_very_relaxed(color_tolerance, min_size)),
            Self::AutoColorClustering => Some(ExtractionProfile::auto_color(color_tolerance, min_size)),
            Self::Pending | Self::Done | Self::Failed => None,
        }
    }
}

/// What one pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// Extracted curves, possibly empty ones.
    pub curves: Vec<Curve>,
    /// Result-level quality score.
    pub quality: f64,
    /// Plot area the attempt worked in.
    pub plot_area: PixelBounds,
}

impl AttemptOutcome {
    /// Whether at least one curve has points.
    #[must_use]
    pub fn has_usable_curves(&self) -> bool {
        self.curves.iter().any(|c| !c.is_empty())
    }

    /// Total number of points over all curves.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.curves.iter().map(Curve::len).sum()
    }
}

/// Diagnostics for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Ladder state of the attempt.
    pub state: LadderState,
    /// Profile name.
    pub profile: String,
    /// Number of non-empty curves.
    pub curve_count: usize,
    /// Points across all curves.
    pub total_points: usize,
    /// Quality score, 0 when the attempt errored.
    pub quality: f64,
    /// Recoverable error that ended the attempt.
    pub error: Option<String>,
}

/// Final state of a ladder run.
#[derive(Debug, Clone)]
pub struct LadderOutcome {
    /// `Done` or `Failed`.
    pub state: LadderState,
    /// Whether the returned attempt met the acceptance threshold.
    pub accepted: bool,
    /// Best attempt and its profile, if any attempt completed.
    pub best: Option<(ExtractionProfile, AttemptOutcome)>,
    /// Every attempt in order.
    pub attempts: Vec<AttemptReport>,
}

/// Walks the ladder for one request.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    mode: StrategyMode,
    acceptance_threshold: f64,
    color_tolerance: u8,
    min_size: u32,
}

impl Orchestrator {
    /// Create an orchestrator for the caller's mode and base parameters.
    #[must_use]
    pub fn new(mode: StrategyMode, acceptance_threshold: f64, color_tolerance: u8, min_size: u32) -> Self {
        Self {
            mode,
            acceptance_threshold,
            color_tolerance,
            min_size,
        }
    }

    /// Requested mode.
    #[must_use]
    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    /// Whether an attempt ends the ladder.
    #[must_use]
    pub fn accepts(&self, outcome: &AttemptOutcome) -> bool {
        outcome.has_usable_curves() && outcome.quality >= self.acceptance_threshold
    }

    /// Run attempts until one is accepted or the mode's ladder is exhausted.
    ///
    /// `attempt` runs the pipeline with a profile. Recoverable errors are
    /// recorded and the ladder advances; any other error aborts the run.
    /// The token is checked before each attempt.
    pub fn run<F>(&self, cancel: &CancellationToken, mut attempt: F) -> Result<LadderOutcome>
    where
        F: FnMut(LadderState, &ExtractionProfile) -> Result<AttemptOutcome>,
    {
        let mut attempts = Vec::new();
        let mut best: Option<(ExtractionProfile, AttemptOutcome)> = None;
        let mut state = LadderState::Pending.next(self.mode);

        while let Some(current) = state {
            cancel.check()?;
            let Some(profile) = current.profile(self.color_tolerance, self.min_size) else {
                break;
            };
            profile.validate()?;

            match attempt(current, &profile) {
                Ok(outcome) => {
                    let accepted = self.accepts(&outcome);
                    tracing::debug!(
                        state = ?current,
                        profile = %profile.name,
                        curves = outcome.curves.len(),
                        points = outcome.total_points(),
                        quality = outcome.quality,
                        accepted,
                        "strategy attempt"
                    );
                    attempts.push(AttemptReport {
                        state: current,
                        profile: profile.name.clone(),
                        curve_count: outcome.curves.iter().filter(|c| !c.is_empty()).count(),
                        total_points: outcome.total_points(),
                        quality: outcome.quality,
                        error: None,
                    });
                    if accepted {
                        tracing::info!(profile = %profile.name, quality = outcome.quality, "accepted");
                        return Ok(LadderOutcome {
                            state: LadderState::Done,
                            accepted: true,
                            best: Some((profile, outcome)),
                            attempts,
                        });
                    }
                    let better = best.as_ref().is_none_or(|(_, b)| outcome.quality > b.quality);
                    if better {
                        best = Some((profile, outcome));
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(state = ?current, profile = %profile.name, error = %e, "attempt failed");
                    attempts.push(AttemptReport {
                        state: current,
                        profile: profile.name.clone(),
                        curve_count: 0,
                        total_points: 0,
                        quality: 0.0,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
            state = current.next(self.mode);
        }

        let usable = best.as_ref().is_some_and(|(_, b)| b.has_usable_curves());
        let final_state = if usable { LadderState::Done } else { LadderState::Failed };
        tracing::info!(
            state = ?final_state,
            attempts = attempts.len(),
            "strategy ladder exhausted"
        );
        Ok(LadderOutcome {
            state: final_state,
            accepted: false,
            best,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurvePoint;

    fn outcome(points: usize, quality: f64) -> AttemptOutcome {
        let mut curve = Curve::empty("red", "#ff0000");
        curve.points = (0..points)
            .map(|i| CurvePoint {
                x: i as f64,
                y: 0.0,
                confidence: 1.0,
            })
            .collect();
        AttemptOutcome {
            curves: vec![curve],
            quality,
            plot_area: PixelBounds::new(0, 0, 9, 9),
        }
    }

    fn visited(mode: StrategyMode) -> Vec<LadderState> {
        let mut states = Vec::new();
        let mut s = LadderState::Pending.next(mode);
        while let Some(current) = s {
            states.push(current);
            s = current.next(mode);
        }
        states
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Optimized".parse::<StrategyMode>().unwrap(), StrategyMode::Optimized);
        assert!(matches!("turbo".parse::<StrategyMode>(), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_ladder_bounds_per_mode() {
        assert_eq!(visited(StrategyMode::Legacy), vec![LadderState::LegacyAttempt]);
        assert_eq!(visited(StrategyMode::Optimized).len(), 4);
        assert_eq!(visited(StrategyMode::Optimized).last(), Some(&LadderState::EnhancedVeryRelaxed));
        assert_eq!(visited(StrategyMode::Auto).last(), Some(&LadderState::AutoColorClustering));
        assert_eq!(visited(StrategyMode::Enhanced), visited(StrategyMode::Auto));
        assert_eq!(LadderState::Done.next(StrategyMode::Auto), None);
    }

    #[test]
    fn test_stops_at_first_accepted_attempt() {
        let orch = Orchestrator::new(StrategyMode::Auto, 0.6, 0, 1000);
        let out = orch
            .run(&CancellationToken::new(), |state, _| {
                Ok(match state {
                    LadderState::LegacyAttempt => outcome(10, 0.3),
                    _ => outcome(10, 0.8),
                })
            })
            .unwrap();
        assert_eq!(out.state, LadderState::Done);
        assert!(out.accepted);
        assert_eq!(out.attempts.len(), 2);
        assert_eq!(out.best.unwrap().0.name, "enhanced_conservative");
    }

    #[test]
    fn test_zero_curves_never_accepted() {
        let orch = Orchestrator::new(StrategyMode::Optimized, 0.6, 0, 1000);
        let out = orch
            .run(&CancellationToken::new(), |_, _| Ok(outcome(0, 1.0)))
            .unwrap();
        assert_eq!(out.state, LadderState::Failed);
        assert!(!out.accepted);
        assert_eq!(out.attempts.len(), 4);
    }

    #[test]
    fn test_exhausted_ladder_returns_best_attempt() {
        let orch = Orchestrator::new(StrategyMode::Optimized, 0.9, 0, 1000);
        let scores = [0.2, 0.5, 0.5, 0.4];
        let mut i = 0;
        let out = orch
            .run(&CancellationToken::new(), |_, _| {
                let o = outcome(5, scores[i]);
                i += 1;
                Ok(o)
            })
            .unwrap();
        assert_eq!(out.state, LadderState::Done);
        assert!(!out.accepted);
        let (profile, best) = out.best.unwrap();
        assert_eq!(best.quality, 0.5);
        // Earliest attempt wins ties.
        assert_eq!(profile.name, "enhanced_conservative");
    }

    #[test]
    fn test_recoverable_errors_advance() {
        let orch = Orchestrator::new(StrategyMode::Auto, 0.6, 0, 1000);
        let out = orch
            .run(&CancellationToken::new(), |state, _| match state {
                LadderState::AutoColorClustering => Ok(outcome(20, 0.9)),
                _ => Err(Error::InsufficientColorSignal { threshold: 20 }),
            })
            .unwrap();
        assert_eq!(out.state, LadderState::Done);
        assert_eq!(out.attempts.len(), 5);
        assert!(out.attempts[..4].iter().all(|a| a.error.is_some()));
    }

    #[test]
    fn test_all_errors_fail() {
        let orch = Orchestrator::new(StrategyMode::Legacy, 0.6, 0, 1000);
        let out = orch
            .run(&CancellationToken::new(), |_, _| {
                Err(Error::InsufficientColorSignal { threshold: 20 })
            })
            .unwrap();
        assert_eq!(out.state, LadderState::Failed);
        assert!(out.best.is_none());
        assert_eq!(out.attempts.len(), 1);
    }

    #[test]
    fn test_fatal_error_aborts() {
        let orch = Orchestrator::new(StrategyMode::Auto, 0.6, 0, 1000);
        let mut calls = 0;
        let result = orch.run(&CancellationToken::new(), |_, _| {
            calls += 1;
            Err(Error::Cancelled)
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let orch = Orchestrator::new(StrategyMode::Auto, 0.6, 0, 1000);
        let token = CancellationToken::new();
        token.cancel();
        let result = orch.run(&token, |_, _| Ok(outcome(10, 1.0)));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_invalid_base_tolerance_rejected() {
        let orch = Orchestrator::new(StrategyMode::Legacy, 0.6, 75, 1000);
        let result = orch.run(&CancellationToken::new(), |_, _| Ok(outcome(10, 1.0)));
        assert!(matches!(result, Err(Error::InvalidTolerance(75))));
    }
}
