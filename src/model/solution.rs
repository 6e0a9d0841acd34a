//! An allocation together with its cached evaluation, and the
//! identifier-keyed [`BestSolution`] handed back to callers.

use std::collections::BTreeMap;

use super::allocation::Allocation;
use super::entity::{AdId, CampaignId};
use super::fitness::FitnessEvaluator;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-campaign breakdown produced by the fitness evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CampaignMetrics {
    /// Media cost: baseline media spend plus ad spend.
    pub cost: f64,
    /// Expected revenue of the assigned ads.
    pub revenue: f64,
    /// `(revenue - cost) / cost`, or 0 when `cost <= 0`.
    pub roi: f64,
    /// Predicted deviation from the approved budget.
    pub overcost: f64,
    /// Cost counted against the global budget: approved budget, overcost
    /// and ad spend.
    pub budget_cost: f64,
    /// Baseline media spend of the campaign.
    pub media_cost: f64,
    /// Spend of the assigned ads.
    pub ads_cost: f64,
    /// Planned spend.
    pub approved_budget: f64,
    /// Mean predicted conversion rate of the assigned ads.
    pub average_conversion_rate: f64,
    /// Number of assigned ads.
    pub ad_count: usize,
}

/// Scores and metrics of one allocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Evaluation {
    /// Scalar objective (higher is better).
    pub fitness: f64,
    /// Portfolio ROI over media cost.
    pub total_roi: f64,
    /// Total media cost.
    pub total_cost: f64,
    /// Total expected revenue.
    pub total_revenue: f64,
    /// Total cost counted against the budget ceiling.
    pub total_budget_cost: f64,
    /// Mean of per-campaign ROI.
    pub avg_campaign_roi: f64,
    /// Non-positive penalty for uneven campaign sizes.
    pub balance_penalty: f64,
    /// Non-positive penalty for exceeding the budget.
    pub budget_penalty: f64,
    /// Metrics by dense campaign index.
    pub campaign_metrics: Vec<CampaignMetrics>,
}

/// A candidate solution: an allocation plus its cached evaluation.
///
/// Any mutable access to the allocation drops the cached evaluation, so a
/// stale score can never be read.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    allocation: Allocation,
    evaluation: Option<Evaluation>,
}

impl Solution {
    /// Wraps an unevaluated allocation.
    pub fn new(allocation: Allocation) -> Self {
        Self {
            allocation,
            evaluation: None,
        }
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Mutable access; invalidates the cached evaluation.
    pub fn allocation_mut(&mut self) -> &mut Allocation {
        self.evaluation = None;
        &mut self.allocation
    }

    pub fn into_allocation(self) -> Allocation {
        self.allocation
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    /// Cached fitness, or negative infinity if not evaluated.
    pub fn fitness(&self) -> f64 {
        self.evaluation
            .as_ref()
            .map_or(f64::NEG_INFINITY, |e| e.fitness)
    }

    /// Cached total ROI, or 0 if not evaluated.
    pub fn total_roi(&self) -> f64 {
        self.evaluation.as_ref().map_or(0.0, |e| e.total_roi)
    }

    /// Cached total media cost, or 0 if not evaluated.
    pub fn total_cost(&self) -> f64 {
        self.evaluation.as_ref().map_or(0.0, |e| e.total_cost)
    }

    pub(crate) fn set_evaluation(&mut self, evaluation: Evaluation) {
        self.evaluation = Some(evaluation);
    }
}

/// Result of a search, keyed by entity identifiers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BestSolution {
    /// Ad identifiers per campaign identifier, each list sorted.
    pub allocation: BTreeMap<CampaignId, Vec<AdId>>,
    pub fitness: f64,
    pub total_roi: f64,
    /// Total media cost.
    pub total_cost: f64,
    pub total_revenue: f64,
    /// Cost counted against the budget ceiling.
    pub total_budget_cost: f64,
    pub campaign_metrics: BTreeMap<CampaignId, CampaignMetrics>,
}

impl BestSolution {
    /// Builds the caller-facing view of `solution`.
    ///
    /// Uses the cached evaluation when present and evaluates otherwise.
    pub fn from_solution(solution: &Solution, evaluator: &FitnessEvaluator<'_>) -> Self {
        let store = evaluator.store();
        let evaluation = match solution.evaluation() {
            Some(e) => e.clone(),
            None => evaluator.evaluate(solution.allocation()),
        };
        let campaign_metrics = evaluation
            .campaign_metrics
            .iter()
            .enumerate()
            .map(|(c, m)| (store.campaign_at(c).id, *m))
            .collect();
        Self {
            allocation: solution.allocation().to_ids(store),
            fitness: evaluation.fitness,
            total_roi: evaluation.total_roi,
            total_cost: evaluation.total_cost,
            total_revenue: evaluation.total_revenue,
            total_budget_cost: evaluation.total_budget_cost,
            campaign_metrics,
        }
    }

    /// Revenue minus media cost.
    pub fn profit(&self) -> f64 {
        self.total_revenue - self.total_cost
    }
}
