//! ROI-weighted fitness with balance and budget penalties.
//!
//! # Model
//!
//! For a campaign with `n` assigned ads every ad receives an equal share of
//! the campaign's clicks, floored at one click:
//!
//! ```text
//! clicks_i      = max(campaign.clicks / n, 1)
//! conversions_i = clicks_i * ad.conversion_rate
//! cost_i        = clicks_i * ad.cost_per_click
//! revenue_i     = conversions_i * ad.cost_per_click * ad.roi
//! ```
//!
//! Campaign media cost is `media_cost_usd + Σ cost_i`, campaign budget cost
//! is `approved_budget + overcost + Σ cost_i`. The objective is
//!
//! ```text
//! fitness = 0.7 * total_roi + 0.3 * avg_campaign_roi
//!         - risk_factor * cv(campaign sizes)
//!         - 10 * max(0, total_budget_cost - total_budget) / total_budget
//! ```
//!
//! where `cv` is the population coefficient of variation. Evaluation is
//! deterministic and total over valid allocations.

use super::allocation::Allocation;
use super::entity::EntityStore;
use super::solution::{CampaignMetrics, Evaluation, Solution};
use crate::error::{Result, SearchError};

const TOTAL_ROI_WEIGHT: f64 = 0.7;
const CAMPAIGN_ROI_WEIGHT: f64 = 0.3;
const BUDGET_PENALTY_WEIGHT: f64 = 10.0;

/// Scores allocations against one entity store and budget.
#[derive(Debug, Clone, Copy)]
pub struct FitnessEvaluator<'a> {
    store: &'a EntityStore,
    total_budget: f64,
    risk_factor: f64,
}

impl<'a> FitnessEvaluator<'a> {
    /// Creates an evaluator.
    ///
    /// # Errors
    /// [`SearchError::InvalidConfig`] unless `total_budget` is finite and
    /// positive and `risk_factor` is finite and non-negative.
    pub fn new(store: &'a EntityStore, total_budget: f64, risk_factor: f64) -> Result<Self> {
        if !total_budget.is_finite() || total_budget <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "total_budget must be positive and finite, got {total_budget}"
            )));
        }
        if !risk_factor.is_finite() || risk_factor < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "risk_factor must be non-negative and finite, got {risk_factor}"
            )));
        }
        Ok(Self {
            store,
            total_budget,
            risk_factor,
        })
    }

    pub fn store(&self) -> &'a EntityStore {
        self.store
    }

    pub fn total_budget(&self) -> f64 {
        self.total_budget
    }

    pub fn risk_factor(&self) -> f64 {
        self.risk_factor
    }

    /// Evaluates `solution` and caches the result on it.
    ///
    /// Returns the fitness.
    pub fn evaluate_solution(&self, solution: &mut Solution) -> f64 {
        let evaluation = self.evaluate(solution.allocation());
        let fitness = evaluation.fitness;
        solution.set_evaluation(evaluation);
        fitness
    }

    /// Wraps and evaluates an allocation.
    pub fn evaluated(&self, allocation: Allocation) -> Solution {
        let mut solution = Solution::new(allocation);
        self.evaluate_solution(&mut solution);
        solution
    }

    /// Computes fitness and metrics of an allocation.
    ///
    /// Campaigns with no ads contribute their budget cost but are left out
    /// of the ROI mean; valid allocations have none.
    pub fn evaluate(&self, allocation: &Allocation) -> Evaluation {
        let mut total_media_cost = 0.0;
        let mut total_revenue = 0.0;
        let mut total_budget_cost = 0.0;
        let mut roi_sum = 0.0;
        let mut roi_count = 0usize;
        let mut campaign_metrics = Vec::with_capacity(allocation.num_campaigns());

        for (c, ads) in allocation.slots().iter().enumerate() {
            let campaign = self.store.campaign_at(c);
            let n = ads.len();

            let mut ads_cost = 0.0;
            let mut revenue = 0.0;
            let mut conversion_sum = 0.0;
            if n > 0 {
                let clicks = (campaign.clicks / n as f64).max(1.0);
                for &a in ads {
                    let ad = self.store.ad_at(a);
                    let conversions = clicks * ad.conversion_rate;
                    ads_cost += clicks * ad.cost_per_click;
                    revenue += conversions * (ad.cost_per_click * ad.roi);
                    conversion_sum += ad.conversion_rate;
                }
            }

            let media_cost = campaign.media_cost_usd + ads_cost;
            let budget_cost = campaign.approved_budget + campaign.overcost + ads_cost;
            let roi = if media_cost > 0.0 {
                (revenue - media_cost) / media_cost
            } else {
                0.0
            };

            total_media_cost += media_cost;
            total_revenue += revenue;
            total_budget_cost += budget_cost;
            if n > 0 {
                roi_sum += roi;
                roi_count += 1;
            }

            campaign_metrics.push(CampaignMetrics {
                cost: media_cost,
                revenue,
                roi,
                overcost: campaign.overcost,
                budget_cost,
                media_cost: campaign.media_cost_usd,
                ads_cost,
                approved_budget: campaign.approved_budget,
                average_conversion_rate: if n > 0 {
                    conversion_sum / n as f64
                } else {
                    0.0
                },
                ad_count: n,
            });
        }

        let total_roi = if total_media_cost > 0.0 {
            (total_revenue - total_media_cost) / total_media_cost
        } else {
            0.0
        };
        let avg_campaign_roi = if roi_count > 0 {
            roi_sum / roi_count as f64
        } else {
            0.0
        };

        let balance_penalty = -self.risk_factor * size_variation(&allocation.sizes());

        let budget_penalty = if total_budget_cost > self.total_budget {
            -BUDGET_PENALTY_WEIGHT * (total_budget_cost - self.total_budget) / self.total_budget
        } else {
            0.0
        };

        let fitness = TOTAL_ROI_WEIGHT * total_roi
            + CAMPAIGN_ROI_WEIGHT * avg_campaign_roi
            + balance_penalty
            + budget_penalty;

        Evaluation {
            fitness,
            total_roi,
            total_cost: total_media_cost,
            total_revenue,
            total_budget_cost,
            avg_campaign_roi,
            balance_penalty,
            budget_penalty,
            campaign_metrics,
        }
    }
}

/// Population standard deviation over mean; 0 for fewer than two campaigns.
fn size_variation(sizes: &[usize]) -> f64 {
    if sizes.len() < 2 {
        return 0.0;
    }
    let n = sizes.len() as f64;
    let mean = sizes.iter().sum::<usize>() as f64 / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = sizes
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{Ad, Campaign};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_by_four(roi: f64) -> EntityStore {
        EntityStore::new(
            vec![
                Campaign::new(1, 1000.0, 0.0, 0.0, 100.0),
                Campaign::new(2, 1000.0, 0.0, 0.0, 100.0),
            ],
            (1..=4).map(|id| Ad::new(id, 1.0, roi, 0.2)).collect(),
        )
        .unwrap()
    }

    fn balanced() -> Allocation {
        Allocation::from_slots(vec![vec![0, 1], vec![2, 3]])
    }

    #[test]
    fn test_balanced_two_campaign_scenario() {
        // 50 clicks per ad: revenue 2*50*0.2*(1*2) = 40, cost 2*50*1 = 100.
        let store = two_by_four(2.0);
        let eval = FitnessEvaluator::new(&store, 3000.0, 0.0)
            .unwrap()
            .evaluate(&balanced());

        for m in &eval.campaign_metrics {
            assert!((m.revenue - 40.0).abs() < 1e-12);
            assert!((m.cost - 100.0).abs() < 1e-12);
            assert!((m.roi + 0.6).abs() < 1e-12);
            assert!((m.budget_cost - 1100.0).abs() < 1e-12);
            assert!((m.average_conversion_rate - 0.2).abs() < 1e-12);
            assert_eq!(m.ad_count, 2);
        }
        assert!((eval.total_roi + 0.6).abs() < 1e-12);
        assert!((eval.avg_campaign_roi + 0.6).abs() < 1e-12);
        assert_eq!(eval.budget_penalty, 0.0);
        assert_eq!(eval.balance_penalty, 0.0);
        assert!((eval.fitness + 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_unit_roi_scenario() {
        // roi multiplier 10 doubles revenue over cost: ROI exactly 1.0.
        let store = two_by_four(10.0);
        let eval = FitnessEvaluator::new(&store, 3000.0, 0.0)
            .unwrap()
            .evaluate(&balanced());
        assert!((eval.total_roi - 1.0).abs() < 1e-12);
        assert!((eval.avg_campaign_roi - 1.0).abs() < 1e-12);
        assert!((eval.fitness - 1.0).abs() < 1e-12);
        assert!((eval.total_revenue - 400.0).abs() < 1e-12);
        assert!((eval.total_cost - 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_budget_penalty() {
        // Budget cost is 2200; a 2000 ceiling is exceeded by 10%.
        let store = two_by_four(10.0);
        let eval = FitnessEvaluator::new(&store, 2000.0, 0.0)
            .unwrap()
            .evaluate(&balanced());
        assert!((eval.budget_penalty + 1.0).abs() < 1e-12);
        assert!((eval.fitness - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_balance_penalty() {
        let store = two_by_four(10.0);
        let evaluator = FitnessEvaluator::new(&store, 1e9, 2.0).unwrap();
        let uneven = Allocation::from_slots(vec![vec![0, 1, 2], vec![3]]);
        let eval = evaluator.evaluate(&uneven);
        // sizes [3, 1]: std 1, mean 2.
        assert!((eval.balance_penalty + 1.0).abs() < 1e-12);
        assert_eq!(evaluator.evaluate(&balanced()).balance_penalty, 0.0);
    }

    #[test]
    fn test_click_floor() {
        let store = EntityStore::new(
            vec![Campaign::new(1, 0.0, 0.0, 0.0, 1.0)],
            vec![Ad::new(1, 2.0, 1.0, 0.5), Ad::new(2, 2.0, 1.0, 0.5)],
        )
        .unwrap();
        let eval = FitnessEvaluator::new(&store, 100.0, 0.0)
            .unwrap()
            .evaluate(&Allocation::from_slots(vec![vec![0, 1]]));
        // Half a click each is floored to one.
        assert!((eval.campaign_metrics[0].ads_cost - 4.0).abs() < 1e-12);
        assert_eq!(eval.balance_penalty, 0.0);
    }

    #[test]
    fn test_zero_media_cost_roi_is_zero() {
        let store = EntityStore::new(
            vec![Campaign::new(1, 0.0, 0.0, 0.0, 10.0)],
            vec![Ad::new(1, 0.0, 3.0, 0.5)],
        )
        .unwrap();
        let eval = FitnessEvaluator::new(&store, 100.0, 0.0)
            .unwrap()
            .evaluate(&Allocation::from_slots(vec![vec![0]]));
        assert_eq!(eval.total_roi, 0.0);
        assert_eq!(eval.campaign_metrics[0].roi, 0.0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let store = two_by_four(1.0);
        assert!(FitnessEvaluator::new(&store, 0.0, 0.0).is_err());
        assert!(FitnessEvaluator::new(&store, f64::NAN, 0.0).is_err());
        assert!(FitnessEvaluator::new(&store, 10.0, -1.0).is_err());
    }

    #[test]
    fn test_evaluate_solution_caches() {
        let store = two_by_four(10.0);
        let evaluator = FitnessEvaluator::new(&store, 3000.0, 0.0).unwrap();
        let mut sol = Solution::new(balanced());
        let f = evaluator.evaluate_solution(&mut sol);
        assert_eq!(sol.fitness(), f);
        assert!(sol.is_evaluated());
    }

    fn random_store(seed: u64, k: usize, n: usize) -> EntityStore {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(seed);
        EntityStore::new(
            (0..k as u64)
                .map(|id| {
                    Campaign::new(
                        id,
                        rng.random_range(0.0..5000.0),
                        rng.random_range(-700.0..700.0),
                        rng.random_range(0.0..2000.0),
                        rng.random_range(1.0..500.0),
                    )
                })
                .collect(),
            (0..n as u64)
                .map(|id| {
                    Ad::new(
                        id,
                        rng.random_range(0.1..3.0),
                        rng.random_range(0.5..5.0),
                        rng.random_range(0.1..0.4),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_deterministic(seed in any::<u64>(), k in 1usize..5, extra in 0usize..10) {
            let n = k + extra;
            let store = random_store(seed, k, n);
            let evaluator = FitnessEvaluator::new(&store, 10_000.0, 0.5).unwrap();
            let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
            let alloc = Allocation::random(k, n, &mut rng).unwrap();
            prop_assert_eq!(evaluator.evaluate(&alloc), evaluator.evaluate(&alloc));
        }

        #[test]
        fn prop_more_budget_never_lowers_fitness(
            seed in any::<u64>(),
            k in 1usize..5,
            extra in 0usize..10,
            budget in 1.0f64..20_000.0,
            slack in 0.0f64..20_000.0,
        ) {
            let n = k + extra;
            let store = random_store(seed, k, n);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
            let alloc = Allocation::random(k, n, &mut rng).unwrap();
            let tight = FitnessEvaluator::new(&store, budget, 1.0).unwrap().evaluate(&alloc);
            let loose = FitnessEvaluator::new(&store, budget + slack, 1.0).unwrap().evaluate(&alloc);
            prop_assert!(loose.fitness >= tight.fitness - 1e-9);
        }
    }
}
