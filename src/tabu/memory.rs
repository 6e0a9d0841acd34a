//! Short-term tabu memory.
//!
//! Two bounded structures:
//!
//! - a FIFO of the last `tenure` executed [`Move`]s, with a multiplicity map
//!   for O(1) membership tests
//! - a set of visited allocation [`Signature`]s, capped at `10 × tenure`;
//!   exceeding the cap evicts the oldest `5 × tenure` entries

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::Move;
use crate::model::Signature;

const VISITED_CAP_FACTOR: usize = 10;
const VISITED_EVICT_FACTOR: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct TabuMemory {
    tenure: usize,
    moves: VecDeque<Move>,
    counts: HashMap<Move, usize>,
    visited: HashSet<Signature>,
    visit_order: VecDeque<Signature>,
}

impl TabuMemory {
    pub fn new(tenure: usize) -> Self {
        Self {
            tenure,
            ..Self::default()
        }
    }

    pub fn tenure(&self) -> usize {
        self.tenure
    }

    /// Changes the tenure. Shrinking drops the oldest moves right away.
    pub fn set_tenure(&mut self, tenure: usize) {
        self.tenure = tenure;
        self.trim_moves();
    }

    /// Records an executed move; the oldest falls out beyond `tenure`.
    pub fn push_move(&mut self, mv: Move) {
        *self.counts.entry(mv.clone()).or_insert(0) += 1;
        self.moves.push_back(mv);
        self.trim_moves();
    }

    fn trim_moves(&mut self) {
        while self.moves.len() > self.tenure {
            let Some(old) = self.moves.pop_front() else {
                break;
            };
            if let Some(count) = self.counts.get_mut(&old) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&old);
                }
            }
        }
    }

    pub fn is_tabu(&self, mv: &Move) -> bool {
        self.counts.contains_key(mv)
    }

    /// Records a visited allocation. Returns `true` if it was already known.
    pub fn record_visit(&mut self, signature: Signature) -> bool {
        if self.visited.contains(&signature) {
            return true;
        }
        self.visited.insert(signature.clone());
        self.visit_order.push_back(signature);

        if self.visited.len() > self.tenure * VISITED_CAP_FACTOR {
            for _ in 0..self.tenure * VISITED_EVICT_FACTOR {
                match self.visit_order.pop_front() {
                    Some(old) => {
                        self.visited.remove(&old);
                    }
                    None => break,
                }
            }
        }
        false
    }

    pub fn is_visited(&self, signature: &Signature) -> bool {
        self.visited.contains(signature)
    }

    /// Forgets every move and visited allocation. The tenure is kept.
    pub fn clear(&mut self) {
        self.moves.clear();
        self.counts.clear();
        self.visited.clear();
        self.visit_order.clear();
    }

    pub fn num_moves(&self) -> usize {
        self.moves.len()
    }

    pub fn num_visited(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.visited.is_empty()
    }
}
