//! Error types.
//!
//! [`SearchError`] is returned by every fallible entry point of the crate.
//! [`AllocationError`] describes which structural invariant an
//! [`Allocation`](crate::model::Allocation) violates; it is recovered locally
//! by both engines and only surfaces to callers through validation helpers.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors surfaced to callers of the search entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    /// Not enough ads to give every campaign at least one.
    ///
    /// Raised before any individual is created.
    #[error("infeasible problem: {ads} ads cannot cover {campaigns} campaigns with at least one ad each")]
    InfeasibleProblem {
        /// Number of campaigns supplied.
        campaigns: usize,
        /// Number of ads supplied.
        ads: usize,
    },

    /// The campaign set or the ad set is empty.
    #[error("infeasible problem: campaign and ad sets must both be non-empty (campaigns: {campaigns}, ads: {ads})")]
    EmptyInput {
        /// Number of campaigns supplied.
        campaigns: usize,
        /// Number of ads supplied.
        ads: usize,
    },

    /// The same identifier occurs twice in one entity collection.
    #[error("duplicate {kind} id {id}")]
    DuplicateId {
        /// `"campaign"` or `"ad"`.
        kind: &'static str,
        /// The repeated identifier.
        id: u64,
    },

    /// An identifier outside the entity store was looked up.
    #[error("{kind} id {id} not found")]
    NotFound {
        /// `"campaign"` or `"ad"`.
        kind: &'static str,
        /// The unknown identifier.
        id: u64,
    },

    /// A configuration parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An allocation failed structural validation.
    #[error("invalid allocation: {0}")]
    InvalidAllocation(#[from] AllocationError),
}

impl SearchError {
    /// Whether this error means the problem itself cannot be solved
    /// (as opposed to a bad parameter or a recoverable allocation defect).
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            SearchError::InfeasibleProblem { .. } | SearchError::EmptyInput { .. }
        )
    }
}

/// A violated allocation invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The allocation does not have exactly one slot per campaign.
    #[error("expected {expected} campaigns, found {found}")]
    CampaignCount {
        /// Campaigns in the entity store.
        expected: usize,
        /// Slots in the allocation.
        found: usize,
    },

    /// A campaign holds no ads.
    #[error("campaign at index {campaign} has no ads")]
    EmptyCampaign {
        /// Dense campaign index.
        campaign: usize,
    },

    /// An ad index is outside the entity store.
    #[error("ad index {ad} is out of range")]
    UnknownAd {
        /// Dense ad index.
        ad: usize,
    },

    /// An ad is assigned to more than one campaign (or twice to one).
    #[error("ad index {ad} is assigned more than once")]
    DuplicateAd {
        /// Dense ad index.
        ad: usize,
    },

    /// An ad is not assigned to any campaign.
    #[error("ad index {ad} is not assigned")]
    MissingAd {
        /// Dense ad index.
        ad: usize,
    },
}
