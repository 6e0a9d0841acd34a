//! The solution representation: every ad assigned to exactly one campaign.
//!
//! An [`Allocation`] is an owned array of ad lists indexed by dense campaign
//! index. Branch points (crossover, neighbor generation) clone it
//! explicitly, so a child never aliases its parent.
//!
//! # Invariant
//!
//! A valid allocation
//! 1. has exactly one slot per campaign,
//! 2. has no empty slot,
//! 3. contains every ad index exactly once.
//!
//! Transient allocations produced inside operators may break the invariant;
//! [`Allocation::validate`] must pass before one is scored or accepted.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::entity::{AdId, CampaignId, EntityStore};
use crate::error::{AllocationError, Result, SearchError};

/// Canonical, order-insensitive form of an allocation.
///
/// Slot `i` holds the sorted ad indices of campaign `i`. Two allocations with
/// the same membership have equal signatures regardless of list order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(Vec<Vec<usize>>);

/// One ad moved from one campaign to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relocation {
    /// Dense ad index.
    pub ad: usize,
    /// Source campaign index.
    pub from: usize,
    /// Destination campaign index.
    pub to: usize,
}

/// Assignment of ads to campaigns, by dense index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    slots: Vec<Vec<usize>>,
}

impl Allocation {
    /// An allocation with `num_campaigns` empty slots.
    pub fn empty(num_campaigns: usize) -> Self {
        Self {
            slots: vec![Vec::new(); num_campaigns],
        }
    }

    /// Wraps raw slots without validating them.
    pub fn from_slots(slots: Vec<Vec<usize>>) -> Self {
        Self { slots }
    }

    /// Builds an allocation from identifier lists.
    ///
    /// Campaigns missing from `map` get an empty slot; the result is not
    /// validated.
    ///
    /// # Errors
    /// [`SearchError::NotFound`] for an identifier outside the store.
    pub fn from_ids(store: &EntityStore, map: &BTreeMap<CampaignId, Vec<AdId>>) -> Result<Self> {
        let mut alloc = Self::empty(store.num_campaigns());
        for (&cid, ads) in map {
            let c = store.campaign_position(cid)?;
            for &aid in ads {
                alloc.slots[c].push(store.ad_position(aid)?);
            }
        }
        Ok(alloc)
    }

    /// Creates a random valid allocation.
    ///
    /// Ads are shuffled; the first `num_campaigns` go one per campaign and
    /// the rest to uniformly random campaigns.
    ///
    /// # Errors
    /// [`SearchError::EmptyInput`] or [`SearchError::InfeasibleProblem`] when
    /// fewer ads than campaigns (or none at all) are available.
    pub fn random<R: Rng>(num_campaigns: usize, num_ads: usize, rng: &mut R) -> Result<Self> {
        if num_campaigns == 0 || num_ads == 0 {
            return Err(SearchError::EmptyInput {
                campaigns: num_campaigns,
                ads: num_ads,
            });
        }
        if num_ads < num_campaigns {
            return Err(SearchError::InfeasibleProblem {
                campaigns: num_campaigns,
                ads: num_ads,
            });
        }

        let mut ads: Vec<usize> = (0..num_ads).collect();
        ads.shuffle(rng);

        let mut alloc = Self::empty(num_campaigns);
        for (c, &ad) in ads[..num_campaigns].iter().enumerate() {
            alloc.slots[c].push(ad);
        }
        for &ad in &ads[num_campaigns..] {
            let c = rng.random_range(0..num_campaigns);
            alloc.slots[c].push(ad);
        }
        Ok(alloc)
    }

    /// Restores the invariant on an arbitrary allocation.
    ///
    /// 1. Scans campaigns in index order keeping the first occurrence of each
    ///    ad; later duplicates and out-of-range indices are dropped.
    /// 2. Ads never seen are appended to uniformly random campaigns.
    /// 3. Each empty campaign takes the last ad of a random campaign holding
    ///    more than one.
    ///
    /// Applied to a valid allocation it returns the same membership.
    ///
    /// # Errors
    /// [`AllocationError::EmptyCampaign`] if an empty campaign finds no donor.
    /// This cannot happen when `num_ads >= num_campaigns`: with `e` empty
    /// campaigns the other `num_campaigns - e` hold all `num_ads` ads, so one
    /// of them holds at least two.
    pub fn repair<R: Rng>(
        &self,
        num_campaigns: usize,
        num_ads: usize,
        rng: &mut R,
    ) -> std::result::Result<Self, AllocationError> {
        if num_campaigns == 0 {
            return Err(AllocationError::CampaignCount {
                expected: 0,
                found: self.slots.len(),
            });
        }

        let mut repaired = Self::empty(num_campaigns);
        let mut seen = vec![false; num_ads];
        for (c, ads) in self.slots.iter().take(num_campaigns).enumerate() {
            for &ad in ads {
                if ad < num_ads && !seen[ad] {
                    seen[ad] = true;
                    repaired.slots[c].push(ad);
                }
            }
        }

        for ad in (0..num_ads).filter(|&ad| !seen[ad]) {
            let c = rng.random_range(0..num_campaigns);
            repaired.slots[c].push(ad);
        }

        for c in 0..num_campaigns {
            while repaired.slots[c].is_empty() {
                let donors = repaired.donor_campaigns();
                if donors.is_empty() {
                    return Err(AllocationError::EmptyCampaign { campaign: c });
                }
                let donor = donors[rng.random_range(0..donors.len())];
                if let Some(ad) = repaired.slots[donor].pop() {
                    repaired.slots[c].push(ad);
                }
            }
        }

        Ok(repaired)
    }

    /// Checks the structural invariant.
    pub fn validate(
        &self,
        num_campaigns: usize,
        num_ads: usize,
    ) -> std::result::Result<(), AllocationError> {
        if self.slots.len() != num_campaigns {
            return Err(AllocationError::CampaignCount {
                expected: num_campaigns,
                found: self.slots.len(),
            });
        }
        let mut seen = vec![false; num_ads];
        for (c, ads) in self.slots.iter().enumerate() {
            if ads.is_empty() {
                return Err(AllocationError::EmptyCampaign { campaign: c });
            }
            for &ad in ads {
                if ad >= num_ads {
                    return Err(AllocationError::UnknownAd { ad });
                }
                if seen[ad] {
                    return Err(AllocationError::DuplicateAd { ad });
                }
                seen[ad] = true;
            }
        }
        if let Some(ad) = seen.iter().position(|&s| !s) {
            return Err(AllocationError::MissingAd { ad });
        }
        Ok(())
    }

    /// Shorthand for `validate(..).is_ok()`.
    pub fn is_valid(&self, num_campaigns: usize, num_ads: usize) -> bool {
        self.validate(num_campaigns, num_ads).is_ok()
    }

    pub fn num_campaigns(&self) -> usize {
        self.slots.len()
    }

    /// Total number of assigned ads, duplicates included.
    pub fn num_assigned(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Ads of campaign `c`.
    pub fn ads_of(&self, c: usize) -> &[usize] {
        &self.slots[c]
    }

    pub fn slots(&self) -> &[Vec<usize>] {
        &self.slots
    }

    /// Ad count per campaign.
    pub fn sizes(&self) -> Vec<usize> {
        self.slots.iter().map(Vec::len).collect()
    }

    /// Campaigns that can give up an ad without becoming empty.
    pub fn donor_campaigns(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, ads)| ads.len() > 1)
            .map(|(c, _)| c)
            .collect()
    }

    /// Owning campaign of every ad (`None` for unassigned ads).
    ///
    /// Duplicated ads report their last occurrence.
    pub fn owners(&self, num_ads: usize) -> Vec<Option<usize>> {
        let mut owners = vec![None; num_ads];
        for (c, ads) in self.slots.iter().enumerate() {
            for &ad in ads {
                if ad < num_ads {
                    owners[ad] = Some(c);
                }
            }
        }
        owners
    }

    /// Canonical signature for duplicate detection.
    pub fn signature(&self) -> Signature {
        Signature(
            self.slots
                .iter()
                .map(|ads| {
                    let mut sorted = ads.clone();
                    sorted.sort_unstable();
                    sorted
                })
                .collect(),
        )
    }

    /// Appends `ad` to campaign `c`.
    pub fn push(&mut self, c: usize, ad: usize) {
        self.slots[c].push(ad);
    }

    /// Removes and returns the ad at `pos` of campaign `c`.
    ///
    /// List order carries no meaning, so the last ad takes its place.
    pub fn take(&mut self, c: usize, pos: usize) -> usize {
        self.slots[c].swap_remove(pos)
    }

    /// Moves `ad` from campaign `from` to campaign `to`.
    ///
    /// Returns `false` (and changes nothing) if `ad` is not in `from`.
    pub fn relocate(&mut self, ad: usize, from: usize, to: usize) -> bool {
        match self.slots[from].iter().position(|&a| a == ad) {
            Some(pos) => {
                self.slots[from].swap_remove(pos);
                self.slots[to].push(ad);
                true
            }
            None => false,
        }
    }

    /// Moves a random ad out of a random donor campaign into a different
    /// random campaign.
    ///
    /// Never empties a campaign. Returns `None` when no campaign holds more
    /// than one ad or there is only one campaign.
    pub fn relocate_random<R: Rng>(&mut self, rng: &mut R) -> Option<Relocation> {
        let k = self.slots.len();
        if k < 2 {
            return None;
        }
        let donors = self.donor_campaigns();
        if donors.is_empty() {
            return None;
        }
        let from = donors[rng.random_range(0..donors.len())];
        let to = other_campaign(k, from, rng);
        let pos = rng.random_range(0..self.slots[from].len());
        let ad = self.take(from, pos);
        self.slots[to].push(ad);
        Some(Relocation { ad, from, to })
    }

    /// Exchanges `ad_a` (in `campaign_a`) with `ad_b` (in `campaign_b`).
    ///
    /// Returns `false` if either ad is not where it is claimed to be.
    pub fn swap(&mut self, ad_a: usize, campaign_a: usize, ad_b: usize, campaign_b: usize) -> bool {
        let pos_a = self.slots[campaign_a].iter().position(|&a| a == ad_a);
        let pos_b = self.slots[campaign_b].iter().position(|&a| a == ad_b);
        match (pos_a, pos_b) {
            (Some(pa), Some(pb)) => {
                self.slots[campaign_a][pa] = ad_b;
                self.slots[campaign_b][pb] = ad_a;
                true
            }
            _ => false,
        }
    }

    /// Converts to identifier lists, each sorted ascending.
    pub fn to_ids(&self, store: &EntityStore) -> BTreeMap<CampaignId, Vec<AdId>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(c, ads)| {
                let mut ids: Vec<AdId> = ads.iter().map(|&a| store.ad_at(a).id).collect();
                ids.sort_unstable();
                (store.campaign_at(c).id, ids)
            })
            .collect()
    }
}

/// A uniformly random campaign index in `0..k` other than `exclude`.
///
/// Requires `k >= 2`.
pub(crate) fn other_campaign<R: Rng>(k: usize, exclude: usize, rng: &mut R) -> usize {
    let c = rng.random_range(0..k - 1);
    if c >= exclude {
        c + 1
    } else {
        c
    }
}
