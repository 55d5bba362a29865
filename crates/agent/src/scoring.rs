//! Score accumulation and the final decision

use std::collections::HashMap;

use interview_core::{Decision, FinalDecision, SignalBreakdown};
use interview_config::constants::decision::{ADVANCE_THRESHOLD, HOLD_THRESHOLD};

/// Running totals for one signal
#[derive(Debug, Clone)]
struct SignalScore {
    sum: f32,
    count: u32,
    /// Fixed at first observation; never changes within a session
    weight: f32,
}

/// Accumulates per-signal scores across turns and computes the weighted total
#[derive(Debug, Default)]
pub struct ScoreAggregator {
    signals: HashMap<String, SignalScore>,
}

impl ScoreAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw score for a signal
    ///
    /// The rubric weight is fixed the first time a signal is seen; later
    /// calls accumulate under the original weight.
    pub fn add_score(&mut self, signal: &str, raw: f32, weight: f32) {
        let raw = raw.clamp(0.0, 1.0);
        let entry = self
            .signals
            .entry(signal.to_string())
            .or_insert(SignalScore {
                sum: 0.0,
                count: 0,
                weight: weight.clamp(0.0, 1.0),
            });
        entry.sum += raw;
        entry.count += 1;
    }

    /// Weighted total score in [0, 1]
    ///
    /// total = sum(weight * average) / sum(weight); zero total weight is
    /// defined as a total score of 0.
    pub fn final_score(&self) -> f32 {
        let mut weighted = 0.0f32;
        let mut total_weight = 0.0f32;

        for score in self.signals.values() {
            if score.count == 0 {
                continue;
            }
            let average = score.sum / score.count as f32;
            weighted += average * score.weight;
            total_weight += score.weight;
        }

        if total_weight <= 0.0 {
            return 0.0;
        }
        (weighted / total_weight).clamp(0.0, 1.0)
    }

    /// Per-signal breakdown, sorted by signal name
    pub fn breakdown(&self) -> Vec<SignalBreakdown> {
        let mut out: Vec<SignalBreakdown> = self
            .signals
            .iter()
            .filter(|(_, s)| s.count > 0)
            .map(|(name, s)| SignalBreakdown {
                signal: name.clone(),
                average: s.sum / s.count as f32,
                weight: s.weight,
                count: s.count,
            })
            .collect();
        out.sort_by(|a, b| a.signal.cmp(&b.signal));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Build the decision record for a session
    pub fn build_decision(&self, session_id: uuid::Uuid) -> FinalDecision {
        let total = self.final_score();
        let signals = self.breakdown();

        let strengths = signals
            .iter()
            .filter(|s| s.average >= ADVANCE_THRESHOLD)
            .map(|s| format!("{} ({:.2})", s.signal, s.average))
            .collect();
        let concerns = signals
            .iter()
            .filter(|s| s.average < HOLD_THRESHOLD)
            .map(|s| format!("{} ({:.2})", s.signal, s.average))
            .collect();

        FinalDecision {
            session_id,
            total_score: total,
            decision: auto_decide(total),
            signals,
            strengths,
            concerns,
            neutral_fallback: false,
            decided_at: chrono::Utc::now(),
        }
    }
}

/// Map a total score to the outcome bucket
///
/// Band lower bounds are inclusive: 0.70 advances, 0.40 holds.
pub fn auto_decide(total: f32) -> Decision {
    if total >= ADVANCE_THRESHOLD {
        Decision::Advance
    } else if total >= HOLD_THRESHOLD {
        Decision::Hold
    } else {
        Decision::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_signal_simple_average() {
        let mut scores = ScoreAggregator::new();
        scores.add_score("communication", 0.2, 1.0);
        scores.add_score("communication", 0.8, 1.0);
        assert!((scores.final_score() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_two_signal_formula() {
        let mut scores = ScoreAggregator::new();
        scores.add_score("communication", 0.2, 1.0);
        scores.add_score("communication", 0.8, 1.0);
        scores.add_score("leadership", 1.0, 0.5);

        // (0.5 * 1.0 + 1.0 * 0.5) / 1.5
        let expected = (0.5 + 0.5) / 1.5;
        assert!((scores.final_score() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_weight_fixed_at_first_observation() {
        let mut scores = ScoreAggregator::new();
        scores.add_score("depth", 1.0, 0.5);
        // A different weight later is ignored
        scores.add_score("depth", 1.0, 0.9);

        let breakdown = scores.breakdown();
        assert_eq!(breakdown.len(), 1);
        assert!((breakdown[0].weight - 0.5).abs() < 1e-6);
        assert_eq!(breakdown[0].count, 2);
    }

    #[test]
    fn test_empty_aggregator_scores_zero() {
        let scores = ScoreAggregator::new();
        assert_eq!(scores.final_score(), 0.0);
        assert!(scores.breakdown().is_empty());
    }

    #[test]
    fn test_zero_weight_scores_zero() {
        let mut scores = ScoreAggregator::new();
        scores.add_score("ignored", 0.9, 0.0);
        assert_eq!(scores.final_score(), 0.0);
    }

    #[test]
    fn test_decision_thresholds() {
        assert_eq!(auto_decide(0.69), Decision::Hold);
        assert_eq!(auto_decide(0.70), Decision::Advance);
        assert_eq!(auto_decide(0.39), Decision::Reject);
        assert_eq!(auto_decide(0.40), Decision::Hold);
        assert_eq!(auto_decide(1.0), Decision::Advance);
        assert_eq!(auto_decide(0.0), Decision::Reject);
    }

    #[test]
    fn test_decision_report_strengths_and_concerns() {
        let mut scores = ScoreAggregator::new();
        scores.add_score("communication", 0.9, 1.0);
        scores.add_score("system_design", 0.2, 1.0);
        scores.add_score("ownership", 0.5, 0.5);

        let decision = scores.build_decision(uuid::Uuid::new_v4());
        assert_eq!(decision.strengths.len(), 1);
        assert!(decision.strengths[0].starts_with("communication"));
        assert_eq!(decision.concerns.len(), 1);
        assert!(decision.concerns[0].starts_with("system_design"));
        assert!(!decision.neutral_fallback);
    }
}
