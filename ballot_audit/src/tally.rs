use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::config::{Outcome, ReconcileError};

/// Vote counts of one precinct.
///
/// The keys are outcomes for audited ballots and candidate names for the
/// official results. A key that was never counted reads as zero.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Tally<K: Ord> {
    pub precinct: String,
    counts: BTreeMap<K, u64>,
}

/// The audited counts of a precinct.
pub type PrecinctTally = Tally<Outcome>;

/// The official counts of a precinct, by candidate.
pub type OfficialTally = Tally<String>;

impl<K: Ord + Clone> Tally<K> {
    pub fn new(precinct: &str) -> Tally<K> {
        Tally {
            precinct: precinct.to_string(),
            counts: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, key: K, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).cloned().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Adds the counts of another tally, whatever its precinct.
    pub fn merge(&mut self, other: &Tally<K>) {
        for (k, c) in other.counts.iter() {
            self.add(k.clone(), *c);
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, u64> {
        self.counts.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.counts.keys()
    }
}

impl PrecinctTally {
    /// Value counts of the outcomes. The order of the outcomes does not matter.
    pub fn from_outcomes<I: IntoIterator<Item = Outcome>>(precinct: &str, outcomes: I) -> PrecinctTally {
        let mut t = Tally::new(precinct);
        for o in outcomes {
            t.add(o, 1);
        }
        t
    }
}

/// Tallies indexed by precinct.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PrecinctTable<K: Ord> {
    rows: BTreeMap<String, Tally<K>>,
}

impl<K: Ord + Clone> PrecinctTable<K> {
    pub fn new() -> PrecinctTable<K> {
        PrecinctTable {
            rows: BTreeMap::new(),
        }
    }

    /// Precinct names must be unique in a table.
    pub fn insert(&mut self, tally: Tally<K>) -> Result<(), ReconcileError> {
        if self.rows.contains_key(&tally.precinct) {
            return Err(ReconcileError::DuplicatePrecinct {
                name: tally.precinct,
            });
        }
        self.rows.insert(tally.precinct.clone(), tally);
        Ok(())
    }

    pub fn from_tallies<I: IntoIterator<Item = Tally<K>>>(
        tallies: I,
    ) -> Result<PrecinctTable<K>, ReconcileError> {
        let mut table = PrecinctTable::new();
        for t in tallies {
            table.insert(t)?;
        }
        Ok(table)
    }

    pub fn get(&self, precinct: &str) -> Option<&Tally<K>> {
        self.rows.get(precinct)
    }

    /// The count in a cell of the table, zero for a category a precinct never had.
    pub fn count(&self, precinct: &str, key: &K) -> Option<u64> {
        self.rows.get(precinct).map(|t| t.get(key))
    }

    pub fn precincts(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn tallies(&self) -> impl Iterator<Item = &Tally<K>> {
        self.rows.values()
    }

    /// All the keys seen in at least one precinct.
    pub fn columns(&self) -> Vec<K> {
        let cols: BTreeSet<&K> = self.rows.values().flat_map(|t| t.keys()).collect();
        cols.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K: Ord + Clone> Default for PrecinctTable<K> {
    fn default() -> Self {
        PrecinctTable::new()
    }
}

/// Where the locality is written in a precinct name.
///
/// The audit names its precincts after the batch files ("Madison City Wards
/// 1-3") while the official results use "C Madison Wd 1": each source has its
/// own convention.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum LocalityKey {
    /// Everything before the first space.
    FirstToken,
    /// Between the first and the second space.
    SecondToken,
}

impl LocalityKey {
    pub fn extract<'a>(&self, precinct: &'a str) -> Option<&'a str> {
        match self {
            LocalityKey::FirstToken => precinct.split(' ').next(),
            LocalityKey::SecondToken => precinct.split(' ').nth(1),
        }
    }
}

/// Groups the tallies of the precincts by locality.
pub fn group_by_locality<K, I>(
    tallies: I,
    key: LocalityKey,
) -> Result<BTreeMap<String, PrecinctTable<K>>, ReconcileError>
where
    K: Ord + Clone,
    I: IntoIterator<Item = Tally<K>>,
{
    let mut groups: BTreeMap<String, PrecinctTable<K>> = BTreeMap::new();
    for t in tallies {
        let locality = key
            .extract(&t.precinct)
            .ok_or_else(|| ReconcileError::MissingLocality {
                name: t.precinct.clone(),
            })?
            .to_string();
        debug!("group_by_locality: {:?} -> {:?}", t.precinct, locality);
        groups.entry(locality).or_default().insert(t)?;
    }
    Ok(groups)
}
