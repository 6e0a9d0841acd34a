//! Human-readable breakdown of a [`BestSolution`].

use std::fmt;

use super::entity::EntityStore;
use super::solution::BestSolution;

/// Number of ad identifiers listed per campaign before eliding.
const LISTED_ADS: usize = 5;

/// Renders a solution against the store it was computed from.
///
/// ```ignore
/// println!("{}", SolutionReport::new(&best, &store));
/// ```
pub struct SolutionReport<'a> {
    solution: &'a BestSolution,
    store: &'a EntityStore,
}

impl<'a> SolutionReport<'a> {
    pub fn new(solution: &'a BestSolution, store: &'a EntityStore) -> Self {
        Self { solution, store }
    }
}

impl fmt::Display for SolutionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.solution;
        writeln!(f, "Best allocation")?;
        writeln!(f, "  ROI:      {:.2}%", s.total_roi * 100.0)?;
        writeln!(f, "  Fitness:  {:.3}", s.fitness)?;
        writeln!(f, "  Cost:     ${:.2}", s.total_cost)?;
        writeln!(f, "  Revenue:  ${:.2}", s.total_revenue)?;
        writeln!(f, "  Profit:   ${:.2}", s.profit())?;
        writeln!(f, "  Budget:   ${:.2}", s.total_budget_cost)?;

        // Store order, so the report follows the caller's input order.
        for campaign in self.store.campaigns() {
            let Some(m) = s.campaign_metrics.get(&campaign.id) else {
                continue;
            };
            let ads = s
                .allocation
                .get(&campaign.id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            writeln!(
                f,
                "\n  Campaign #{} {} ({} - {})",
                campaign.id, campaign.name, campaign.channel, campaign.ext_service
            )?;
            writeln!(
                f,
                "    ROI: {:.2}% | Cost: ${:.0} | Revenue: ${:.0}",
                m.roi * 100.0,
                m.cost,
                m.revenue
            )?;
            writeln!(
                f,
                "    Budget cost: ${:.0} (approved ${:.0}, overcost ${:.0})",
                m.budget_cost, m.approved_budget, m.overcost
            )?;
            writeln!(
                f,
                "    Ads cost: ${:.0} | Avg conversion: {:.2}%",
                m.ads_cost,
                m.average_conversion_rate * 100.0
            )?;
            write!(f, "    {} ads: ", m.ad_count)?;
            let shown: Vec<String> = ads.iter().take(LISTED_ADS).map(|id| id.to_string()).collect();
            write!(f, "[{}]", shown.join(", "))?;
            if ads.len() > LISTED_ADS {
                write!(f, " ...")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
