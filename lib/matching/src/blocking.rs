//! Candidate-pair generation
//!
//! Scoring every pair of records is quadratic, so records are first
//! grouped into blocks and only pairs sharing a block are scored:
//!
//! - records with coordinates fall into a geo grid cell and are compared
//!   with every record of the 3x3 neighbourhood of cells;
//! - records without coordinates are blocked by a locality prefix. Records
//!   that do have coordinates *and* a locality also join that block, but
//!   there they only pair with coordinate-less records (their mutual pairs
//!   come from the grid);
//! - records with neither fall back to a name prefix.

use crate::config::MatchConfig;
use ahash::AHashMap;
use dishx_core::NormalizedRecord;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKey {
    Cell(i64, i64),
    Locality(String),
    Name(String),
}

pub struct Blocker<'a> {
    config: &'a MatchConfig,
}

impl<'a> Blocker<'a> {
    pub fn new(config: &'a MatchConfig) -> Self {
        Self { config }
    }

    fn cell_of(&self, record: &NormalizedRecord) -> Option<(i64, i64)> {
        let coords = record.coordinates()?;
        let size = self.config.cell_size_deg;
        Some(((coords.lat / size).floor() as i64, (coords.lon / size).floor() as i64))
    }

    fn prefix(&self, text: &str) -> String {
        text.chars().take(self.config.block_prefix_len).collect()
    }

    /// The block keys a record is filed under.
    pub fn keys(&self, record: &NormalizedRecord) -> Vec<BlockKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some((x, y)) = self.cell_of(record) {
            keys.push(BlockKey::Cell(x, y));
        }
        if let Some(locality) = record.locality() {
            keys.push(BlockKey::Locality(self.prefix(locality)));
        }
        if keys.is_empty() {
            keys.push(BlockKey::Name(self.prefix(&record.normalized_name)));
        }
        keys
    }

    /// Index pairs `(i, j)` with `i < j` worth scoring, sorted and unique.
    pub fn candidate_pairs(&self, records: &[NormalizedRecord]) -> Vec<(usize, usize)> {
        let mut cells: AHashMap<(i64, i64), Vec<usize>> = AHashMap::new();
        let mut localities: AHashMap<String, Vec<usize>> = AHashMap::new();
        let mut names: AHashMap<String, Vec<usize>> = AHashMap::new();

        for (idx, record) in records.iter().enumerate() {
            for key in self.keys(record) {
                match key {
                    BlockKey::Cell(x, y) => cells.entry((x, y)).or_default().push(idx),
                    BlockKey::Locality(l) => localities.entry(l).or_default().push(idx),
                    BlockKey::Name(n) => names.entry(n).or_default().push(idx),
                }
            }
        }

        let mut pairs = BTreeSet::new();

        for (&(x, y), members) in &cells {
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(neighbours) = cells.get(&(x + dx, y + dy)) else {
                        continue;
                    };
                    for &i in members {
                        for &j in neighbours {
                            if i < j {
                                pairs.insert((i, j));
                            }
                        }
                    }
                }
            }
        }

        let has_cell: Vec<bool> = records.iter().map(|r| r.coordinates().is_some()).collect();
        for members in localities.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    if has_cell[i] && has_cell[j] {
                        continue;
                    }
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }

        for members in names.values() {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }

        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::Utc;
    use dishx_core::{RawRecord, SourceId};

    fn rec(id: &str, name: &str, address: &str) -> RawRecord {
        RawRecord::new(SourceId::Google, id, name, address, Utc::now())
    }

    #[test]
    fn test_nearby_cells_pair_up() {
        let config = MatchConfig::default();
        let records = vec![
            normalize(rec("a", "A", "").with_coordinates(40.7306, -74.0021)),
            // just across a cell boundary
            normalize(rec("b", "B", "").with_coordinates(40.7351, -74.0021)),
            // far away
            normalize(rec("c", "C", "").with_coordinates(40.6000, -73.9000)),
        ];
        let pairs = Blocker::new(&config).candidate_pairs(&records);
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn test_locality_bridges_coordinate_less_records() {
        let config = MatchConfig::default();
        let records = vec![
            normalize(rec("a", "A", "1 Main St, Brooklyn").with_coordinates(40.70, -73.95)),
            normalize(rec("b", "B", "1 Main St, Brooklyn")),
            normalize(rec("c", "C", "9 Main St, Brooklyn").with_coordinates(40.60, -73.80)),
        ];
        let pairs = Blocker::new(&config).candidate_pairs(&records);
        // a and c share a locality but both have coordinates far apart
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_name_fallback() {
        let config = MatchConfig::default();
        let records = vec![
            normalize(rec("a", "Joe's Pizza", "")),
            normalize(rec("b", "Joes Pizzeria", "")),
            normalize(rec("c", "Lilia", "")),
        ];
        let pairs = Blocker::new(&config).candidate_pairs(&records);
        assert_eq!(pairs, vec![(0, 1)]);
    }
}
