//! Campaign and ad records, and the read-only [`EntityStore`] built from them.
//!
//! Every numeric attribute used by the fitness function is a plain `f64`.
//! The categorical attributes are closed enums; they are carried through a
//! run for reporting and never influence the score.
//!
//! `overcost` and `conversion_rate` are filled in by upstream predictors
//! before a search starts. The store treats them as ordinary inputs.

use std::collections::HashMap;

use crate::error::{Result, SearchError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Campaign identifier.
pub type CampaignId = u64;

/// Ad identifier.
pub type AdId = u64;

/// Declares a closed categorical attribute with a display label per variant.
/// The first variant is the default.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $first:ident => $first_label:literal
            $(, $variant:ident => $label:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum $name {
            #[default]
            $first,
            $($variant),*
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$name::$first $(, $name::$variant)*];

            /// Human-readable label.
            pub fn as_str(self) -> &'static str {
                match self {
                    $name::$first => $first_label,
                    $($name::$variant => $label),*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    /// Ad network serving the campaign.
    ExtService {
        FacebookAds => "Facebook Ads",
        Dv360 => "DV360",
        GoogleAds => "Google Ads",
    }
}

labelled_enum! {
    /// Delivery channel of a campaign.
    Channel {
        Mobile => "Mobile",
        Social => "Social",
        Video => "Video",
        Display => "Display",
        Search => "Search",
    }
}

labelled_enum! {
    /// Search-tag category of a campaign.
    SearchTag {
        Youtube => "Youtube",
        Inmarket => "Inmarket",
        Retargeting => "Retargeting",
    }
}

labelled_enum! {
    /// Audience age bracket.
    AgeGroup {
        Age18To24 => "18-24",
        Age25To34 => "25-34",
        Age35To44 => "35-44",
        Age45To54 => "45-54",
        Age55Plus => "55+",
    }
}

labelled_enum! {
    /// Observed engagement with an ad.
    EngagementLevel {
        Ignored => "Ignored",
        Liked => "Liked",
        Commented => "Commented",
        Shared => "Shared",
    }
}

labelled_enum! {
    /// Device the ad is shown on.
    DeviceType {
        Tablet => "Tablet",
        Desktop => "Desktop",
        Mobile => "Mobile",
    }
}

labelled_enum! {
    /// Market the ad targets.
    Location {
        Uk => "UK",
        Germany => "Germany",
        India => "India",
        Usa => "USA",
        Canada => "Canada",
    }
}

labelled_enum! {
    /// Targeted gender.
    Gender {
        Male => "Male",
        Female => "Female",
    }
}

labelled_enum! {
    /// Creative format.
    ContentType {
        Image => "Image",
        Text => "Text",
        Video => "Video",
    }
}

labelled_enum! {
    /// Subject of the ad.
    AdTopic {
        Health => "Health",
        Electronics => "Electronics",
        Fashion => "Fashion",
        Travel => "Travel",
        Automotive => "Automotive",
    }
}

labelled_enum! {
    /// Audience segment the ad is written for.
    TargetAudience {
        YoungAdults => "Young Adults",
        FamilyOriented => "Family Oriented",
        TravelLovers => "Travel Lovers",
        FitnessLovers => "Fitness Lovers",
        TechEnthusiasts => "Tech Enthusiasts",
        HealthConscious => "Health Conscious",
        WellnessSeekers => "Wellness Seekers",
        BusyProfessionals => "Busy Professionals",
    }
}

/// A marketing campaign.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Campaign {
    /// Unique identifier.
    pub id: CampaignId,
    /// Display name.
    pub name: String,
    /// Planned spend.
    pub approved_budget: f64,
    /// Predicted signed deviation from `approved_budget`.
    pub overcost: f64,
    /// Baseline media spend.
    pub media_cost_usd: f64,
    /// Expected click volume.
    pub clicks: f64,
    /// Expected impressions.
    pub impressions: u64,
    /// Campaign duration in days.
    pub no_of_days: u32,
    /// Serving network.
    pub ext_service: ExtService,
    /// Delivery channel.
    pub channel: Channel,
    /// Search-tag category.
    pub search_tag: SearchTag,
}

impl Campaign {
    /// Creates a campaign with the attributes the fitness function reads.
    ///
    /// Descriptive attributes start at their defaults.
    pub fn new(
        id: CampaignId,
        approved_budget: f64,
        overcost: f64,
        media_cost_usd: f64,
        clicks: f64,
    ) -> Self {
        Self {
            id,
            name: format!("campaign-{id}"),
            approved_budget,
            overcost,
            media_cost_usd,
            clicks,
            impressions: 0,
            no_of_days: 0,
            ext_service: ExtService::default(),
            channel: Channel::default(),
            search_tag: SearchTag::default(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the serving network.
    pub fn with_ext_service(mut self, service: ExtService) -> Self {
        self.ext_service = service;
        self
    }

    /// Sets the delivery channel.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the search-tag category.
    pub fn with_search_tag(mut self, tag: SearchTag) -> Self {
        self.search_tag = tag;
        self
    }

    /// Sets impressions and duration.
    pub fn with_reach(mut self, impressions: u64, no_of_days: u32) -> Self {
        self.impressions = impressions;
        self.no_of_days = no_of_days;
        self
    }
}

/// Audience and creative attributes of an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdTargeting {
    pub age_group: AgeGroup,
    pub engagement_level: EngagementLevel,
    pub device_type: DeviceType,
    pub location: Location,
    pub gender: Gender,
    pub content_type: ContentType,
    pub ad_topic: AdTopic,
    pub target_audience: TargetAudience,
}

/// An advertisement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ad {
    /// Unique identifier.
    pub id: AdId,
    /// Display name.
    pub name: String,
    /// Price paid per click.
    pub cost_per_click: f64,
    /// Value multiplier; `cost_per_click * roi` is the revenue of one conversion.
    pub roi: f64,
    /// Predicted conversions per click.
    pub conversion_rate: f64,
    /// Historical click-through rate.
    pub click_through_rate: f64,
    /// Average view time in seconds.
    pub view_time: u32,
    /// Audience and creative attributes.
    pub targeting: AdTargeting,
}

impl Ad {
    /// Creates an ad with the attributes the fitness function reads.
    pub fn new(id: AdId, cost_per_click: f64, roi: f64, conversion_rate: f64) -> Self {
        Self {
            id,
            name: format!("ad-{id}"),
            cost_per_click,
            roi,
            conversion_rate,
            click_through_rate: 0.0,
            view_time: 0,
            targeting: AdTargeting::default(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the audience and creative attributes.
    pub fn with_targeting(mut self, targeting: AdTargeting) -> Self {
        self.targeting = targeting;
        self
    }

    /// Sets the historical engagement figures.
    pub fn with_engagement(mut self, click_through_rate: f64, view_time: u32) -> Self {
        self.click_through_rate = click_through_rate;
        self.view_time = view_time;
        self
    }
}

/// Read-only lookup over the campaigns and ads of one run.
///
/// Campaigns and ads are addressed internally by their dense index (input
/// order). Identifiers are only used at the boundary.
#[derive(Debug, Clone)]
pub struct EntityStore {
    campaigns: Vec<Campaign>,
    ads: Vec<Ad>,
    campaign_index: HashMap<CampaignId, usize>,
    ad_index: HashMap<AdId, usize>,
}

impl EntityStore {
    /// Builds the store, preserving input order.
    ///
    /// # Errors
    /// [`SearchError::DuplicateId`] if an identifier repeats within either
    /// collection. Empty collections are accepted here; feasibility is
    /// checked by [`ensure_feasible`](Self::ensure_feasible).
    pub fn new(campaigns: Vec<Campaign>, ads: Vec<Ad>) -> Result<Self> {
        let mut campaign_index = HashMap::with_capacity(campaigns.len());
        for (idx, c) in campaigns.iter().enumerate() {
            if campaign_index.insert(c.id, idx).is_some() {
                return Err(SearchError::DuplicateId {
                    kind: "campaign",
                    id: c.id,
                });
            }
        }
        let mut ad_index = HashMap::with_capacity(ads.len());
        for (idx, a) in ads.iter().enumerate() {
            if ad_index.insert(a.id, idx).is_some() {
                return Err(SearchError::DuplicateId { kind: "ad", id: a.id });
            }
        }
        Ok(Self {
            campaigns,
            ads,
            campaign_index,
            ad_index,
        })
    }

    /// Fails unless every campaign can receive at least one distinct ad.
    pub fn ensure_feasible(&self) -> Result<()> {
        let (campaigns, ads) = (self.campaigns.len(), self.ads.len());
        if campaigns == 0 || ads == 0 {
            return Err(SearchError::EmptyInput { campaigns, ads });
        }
        if ads < campaigns {
            return Err(SearchError::InfeasibleProblem { campaigns, ads });
        }
        Ok(())
    }

    pub fn num_campaigns(&self) -> usize {
        self.campaigns.len()
    }

    pub fn num_ads(&self) -> usize {
        self.ads.len()
    }

    /// Campaign identifiers in input order.
    pub fn campaign_ids(&self) -> impl Iterator<Item = CampaignId> + '_ {
        self.campaigns.iter().map(|c| c.id)
    }

    /// Ad identifiers in input order.
    pub fn ad_ids(&self) -> impl Iterator<Item = AdId> + '_ {
        self.ads.iter().map(|a| a.id)
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn ads(&self) -> &[Ad] {
        &self.ads
    }

    /// Looks up a campaign by identifier.
    pub fn campaign(&self, id: CampaignId) -> Result<&Campaign> {
        self.campaign_index
            .get(&id)
            .map(|&idx| &self.campaigns[idx])
            .ok_or(SearchError::NotFound {
                kind: "campaign",
                id,
            })
    }

    /// Looks up an ad by identifier.
    pub fn ad(&self, id: AdId) -> Result<&Ad> {
        self.ad_index
            .get(&id)
            .map(|&idx| &self.ads[idx])
            .ok_or(SearchError::NotFound { kind: "ad", id })
    }

    /// Dense index of a campaign identifier.
    pub fn campaign_position(&self, id: CampaignId) -> Result<usize> {
        self.campaign_index
            .get(&id)
            .copied()
            .ok_or(SearchError::NotFound {
                kind: "campaign",
                id,
            })
    }

    /// Dense index of an ad identifier.
    pub fn ad_position(&self, id: AdId) -> Result<usize> {
        self.ad_index
            .get(&id)
            .copied()
            .ok_or(SearchError::NotFound { kind: "ad", id })
    }

    /// Campaign at a dense index.
    ///
    /// # Panics
    /// Panics if `idx >= num_campaigns()`. Indices handed out by the store
    /// and by [`Allocation`](super::Allocation) are always in range.
    #[inline]
    pub fn campaign_at(&self, idx: usize) -> &Campaign {
        &self.campaigns[idx]
    }

    /// Ad at a dense index.
    ///
    /// # Panics
    /// Panics if `idx >= num_ads()`.
    #[inline]
    pub fn ad_at(&self, idx: usize) -> &Ad {
        &self.ads[idx]
    }

    /// Sum of all approved budgets.
    ///
    /// Request layers commonly reject a total budget below this figure.
    pub fn total_approved_budget(&self) -> f64 {
        self.campaigns.iter().map(|c| c.approved_budget).sum()
    }
}
