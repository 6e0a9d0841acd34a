//! Shared allocation model.
//!
//! Everything both search engines agree on:
//!
//! - [`EntityStore`]: read-only campaigns and ads of one run
//! - [`Allocation`]: campaign → ads assignment with structural validation,
//!   random construction and repair
//! - [`FitnessEvaluator`]: deterministic ROI-weighted scoring
//! - [`Solution`]: an allocation with its cached [`Evaluation`]
//! - [`BestSolution`] / [`SolutionReport`]: the caller-facing result

mod allocation;
mod entity;
mod fitness;
mod report;
mod solution;

pub(crate) use allocation::other_campaign;
pub use allocation::{Allocation, Relocation, Signature};
pub use entity::{
    Ad, AdId, AdTargeting, AdTopic, AgeGroup, Campaign, CampaignId, Channel, ContentType,
    DeviceType, EngagementLevel, EntityStore, ExtService, Gender, Location, SearchTag,
    TargetAudience,
};
pub use fitness::FitnessEvaluator;
pub use report::SolutionReport;
pub use solution::{BestSolution, CampaignMetrics, Evaluation, Solution};
