//! Pairwise identity scoring
//!
//! Combines name, address and phone evidence into one score in [0, 1].
//! Components missing on either side are left out and the remaining
//! weights re-normalized, so a record without an address is judged on its
//! name alone rather than punished with a zero address score.

use crate::config::MatchConfig;
use crate::distance::{name_similarity, trigram_similarity};
use crate::normalize::MIN_PHONE_DIGITS;
use dishx_core::NormalizedRecord;
use serde::Serialize;

/// Score of one pair, with the evidence behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairScore {
    pub score: f32,
    /// Name similarity, `None` when either name is empty
    pub name: Option<f32>,
    /// Address similarity, `None` when neither side has a street
    pub address: Option<f32>,
    pub phone_match: bool,
    /// Street numbers differ and no phone vouches for the pair
    pub vetoed: bool,
}

impl PairScore {
    /// Weighted contribution of each component to the final score.
    pub fn contributions(&self, config: &MatchConfig) -> Vec<(&'static str, f32)> {
        let active = self.active_weight(config);
        let mut out = Vec::new();
        if let Some(name) = self.name {
            out.push(("name", name * config.name_weight / active));
        }
        if let Some(address) = self.address {
            out.push(("address", address * config.address_weight / active));
        }
        out
    }

    fn active_weight(&self, config: &MatchConfig) -> f32 {
        let mut w = 0.0;
        if self.name.is_some() {
            w += config.name_weight;
        }
        if self.address.is_some() {
            w += config.address_weight;
        }
        if w > 0.0 {
            w
        } else {
            1.0
        }
    }
}

enum AddressEvidence {
    Absent,
    NumberMismatch,
    Similar(f32),
}

/// Scores record pairs with a fixed config.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: MatchConfig,
}

impl Scorer {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Symmetric similarity of two records.
    pub fn score(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> PairScore {
        let config = &self.config;

        let name = if a.normalized_name.is_empty() || b.normalized_name.is_empty() {
            None
        } else {
            Some(name_similarity(
                &a.normalized_name,
                &a.name_tokens,
                &b.normalized_name,
                &b.name_tokens,
                config.name_jaccard_weight,
            ))
        };

        let phone_match = match (&a.normalized_phone, &b.normalized_phone) {
            (Some(pa), Some(pb)) => pa.len() >= MIN_PHONE_DIGITS && pa == pb,
            _ => false,
        };

        let (address, mismatch) = match address_evidence(a, b) {
            AddressEvidence::Absent => (None, false),
            AddressEvidence::NumberMismatch => (Some(0.0), true),
            AddressEvidence::Similar(s) => (Some(s), false),
        };

        let mut result = PairScore {
            score: 0.0,
            name,
            address,
            phone_match,
            vetoed: mismatch && !phone_match,
        };

        if result.vetoed {
            return result;
        }

        // no components at all leaves the sum empty, i.e. 0.0
        let mut score: f32 = result.contributions(config).iter().map(|(_, c)| c).sum();
        if phone_match {
            score = score.max(config.phone_match_score);
        }
        result.score = score.clamp(0.0, 1.0);
        result
    }

    /// Human-readable breakdown of a pair score, one line per component.
    pub fn explain(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> String {
        let score = self.score(a, b);
        let mut lines = vec![format!("{} <-> {}: {:.3}", a.key(), b.key(), score.score)];
        for (component, contribution) in score.contributions(&self.config) {
            lines.push(format!("  {component}: {contribution:.3}"));
        }
        if score.phone_match {
            lines.push(format!("  phone match (floor {:.2})", self.config.phone_match_score));
        }
        if score.vetoed {
            lines.push("  vetoed: street numbers differ".to_string());
        }
        lines.join("\n")
    }
}

/// Street-number agreement is required for a strong address match; the
/// street name only refines it.
fn address_evidence(a: &NormalizedRecord, b: &NormalizedRecord) -> AddressEvidence {
    let street = match (&a.address.street_name, &b.address.street_name) {
        (Some(sa), Some(sb)) => Some(trigram_similarity(sa, sb)),
        _ => None,
    };

    match (&a.address.street_number, &b.address.street_number) {
        (Some(na), Some(nb)) if na != nb => AddressEvidence::NumberMismatch,
        (Some(_), Some(_)) => AddressEvidence::Similar(0.5 + 0.5 * street.unwrap_or(0.5)),
        _ => match street {
            Some(s) => AddressEvidence::Similar(0.5 * s),
            None => AddressEvidence::Absent,
        },
    }
}
