use std::collections::BTreeSet;

use log::{debug, info};

use crate::config::{ReconcileError, WardRules};
use crate::tally::{OfficialTally, PrecinctTable};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Township {
    City,
    Town,
}

/// The wards covered by a compound precinct name such as
/// "Madison City Wards 1-3, 5".
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct WardRange {
    pub township: Township,
    /// In the order written in the name.
    pub wards: Vec<u32>,
}

/// The largest ward number a precinct name can hold.
pub const MAX_WARD: u32 = 10_000;

/// Parses a compound precinct name.
///
/// The ward list is made of numbers or inclusive ranges `start-end`, separated
/// by commas or ampersands. Ward numbers above `MAX_WARD` are malformed.
pub fn parse_ward_range(name: &str, municipality: &str) -> Result<WardRange, ReconcileError> {
    let city_prefix = format!("{} City Wards", municipality);
    let town_prefix = format!("{} Town Wards", municipality);
    let (township, rest) = if let Some(rest) = name.strip_prefix(city_prefix.as_str()) {
        (Township::City, rest)
    } else if let Some(rest) = name.strip_prefix(town_prefix.as_str()) {
        (Township::Town, rest)
    } else {
        return Err(ReconcileError::UnknownPrecinctName {
            name: name.to_string(),
        });
    };

    let malformed = |item: &str| ReconcileError::MalformedWardSpec {
        name: name.to_string(),
        item: item.to_string(),
    };
    let parse_num = |s: &str| match s.trim().parse::<u32>() {
        Ok(n) if n <= MAX_WARD => Ok(n),
        _ => Err(malformed(s)),
    };

    let mut wards: Vec<u32> = Vec::new();
    for item in rest.split(|c: char| c == ',' || c == '&') {
        let bounds: Vec<&str> = item.split('-').collect();
        match *bounds.as_slice() {
            [single] => wards.push(parse_num(single)?),
            [start, end] => {
                let (start, end) = (parse_num(start)?, parse_num(end)?);
                if start > end {
                    return Err(malformed(item));
                }
                wards.extend(start..=end);
            }
            _ => return Err(malformed(item)),
        }
    }
    debug!("parse_ward_range: {:?} -> {:?} {:?}", name, township, wards);
    Ok(WardRange { township, wards })
}

/// The name of a ward in the official results.
pub fn official_ward_name(municipality: &str, ward: u32) -> String {
    format!("C {} Wd {}", municipality, ward)
}

/// The wards that have not been matched yet.
///
/// A ward can be taken only once: taking it again is an integrity error.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct WardPool {
    unused: BTreeSet<u32>,
    used: BTreeSet<u32>,
}

impl WardPool {
    pub fn new(rules: &WardRules) -> WardPool {
        WardPool {
            unused: rules.universe().collect(),
            used: BTreeSet::new(),
        }
    }

    pub fn take(&mut self, ward: u32, precinct: &str) -> Result<(), ReconcileError> {
        if self.unused.remove(&ward) {
            self.used.insert(ward);
            Ok(())
        } else if self.used.contains(&ward) {
            Err(ReconcileError::WardAlreadyUsed {
                ward,
                precinct: precinct.to_string(),
            })
        } else {
            Err(ReconcileError::WardOutsideUniverse {
                ward,
                precinct: precinct.to_string(),
            })
        }
    }

    pub fn into_unused(self) -> BTreeSet<u32> {
        self.unused
    }
}

/// The official counts summed over the wards of one audited precinct.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReconciledGroup {
    pub precinct: String,
    pub wards: Vec<u32>,
    pub official: OfficialTally,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Reconciliation {
    /// One group per city precinct of the audit, in the order given.
    pub groups: Vec<ReconciledGroup>,
    /// The wards that no audited precinct claimed. Not an error in itself:
    /// town wards or missing batches end up here.
    pub unused_wards: BTreeSet<u32>,
}

/// Sums the official results of the city wards of each audited precinct.
///
/// Town precincts are skipped. Fails on the first precinct name that cannot be
/// parsed, on a ward used twice and on a ward missing from the official
/// results.
pub fn reconcile_city_wards<'a, I>(
    official: &PrecinctTable<String>,
    audited_precincts: I,
    rules: &WardRules,
) -> Result<Reconciliation, ReconcileError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pool = WardPool::new(rules);
    let mut groups: Vec<ReconciledGroup> = Vec::new();
    for precinct in audited_precincts {
        let range = parse_ward_range(precinct, &rules.municipality)?;
        if range.township == Township::Town {
            debug!("reconcile_city_wards: skipping town precinct {:?}", precinct);
            continue;
        }
        let mut sum = OfficialTally::new(precinct);
        for ward in range.wards.iter() {
            pool.take(*ward, precinct)?;
            let name = official_ward_name(&rules.municipality, *ward);
            let row = official
                .get(&name)
                .ok_or_else(|| ReconcileError::MissingOfficialPrecinct {
                    name: name.clone(),
                    precinct: precinct.to_string(),
                })?;
            sum.merge(row);
        }
        groups.push(ReconciledGroup {
            precinct: precinct.to_string(),
            wards: range.wards,
            official: sum,
        });
    }
    let unused_wards = pool.into_unused();
    info!(
        "reconcile_city_wards: {} city precincts, {} wards not claimed",
        groups.len(),
        unused_wards.len()
    );
    Ok(Reconciliation {
        groups,
        unused_wards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn official() -> PrecinctTable<String> {
        let mut table = PrecinctTable::new();
        for ward in 1..=10u32 {
            let mut t = OfficialTally::new(&official_ward_name("Madison", ward));
            t.add("clinton".to_string(), 100 + ward as u64);
            t.add("trump".to_string(), ward as u64);
            table.insert(t).unwrap();
        }
        table
    }

    fn rules() -> WardRules {
        WardRules::new("Madison", 1, 10).unwrap()
    }

    #[test]
    fn parses_city_ranges() {
        assert_eq!(
            parse_ward_range("Madison City Wards 1-3, 5", "Madison"),
            Ok(WardRange {
                township: Township::City,
                wards: vec![1, 2, 3, 5]
            })
        );
        assert_eq!(
            parse_ward_range("Madison City Wards 12 - 14 & 20", "Madison"),
            Ok(WardRange {
                township: Township::City,
                wards: vec![12, 13, 14, 20]
            })
        );
    }

    #[test]
    fn parses_town() {
        assert_eq!(
            parse_ward_range("Madison Town Wards 10", "Madison"),
            Ok(WardRange {
                township: Township::Town,
                wards: vec![10]
            })
        );
    }

    #[test]
    fn unknown_names() {
        assert_eq!(
            parse_ward_range("Verona City Wards 1", "Madison"),
            Err(ReconcileError::UnknownPrecinctName {
                name: "Verona City Wards 1".to_string()
            })
        );
        assert!(parse_ward_range("Verona City Wards 1", "Verona").is_ok());
    }

    #[test]
    fn malformed_specs() {
        for name in [
            "Madison City Wards",
            "Madison City Wards 1,,2",
            "Madison City Wards 1-2-3",
            "Madison City Wards a",
            "Madison City Wards 5-3",
            "Madison City Wards 3-",
            "Madison City Wards 1-4000000000",
            "Madison City Wards 10001",
        ] {
            assert!(
                matches!(
                    parse_ward_range(name, "Madison"),
                    Err(ReconcileError::MalformedWardSpec { .. })
                ),
                "{}",
                name
            );
        }
        let last = parse_ward_range("Madison City Wards 9999-10000", "Madison").unwrap();
        assert_eq!(last.wards, vec![9999, MAX_WARD]);
    }

    #[test]
    fn sums_official_wards() {
        let res = reconcile_city_wards(
            &official(),
            vec!["Madison City Wards 1-3", "Madison Town Wards 4", "Madison City Wards 7"],
            &rules(),
        )
        .unwrap();
        assert_eq!(res.groups.len(), 2);
        let g = &res.groups[0];
        assert_eq!(g.precinct, "Madison City Wards 1-3");
        assert_eq!(g.wards, vec![1, 2, 3]);
        assert_eq!(g.official.get(&"clinton".to_string()), 306);
        assert_eq!(g.official.get(&"trump".to_string()), 6);
        assert_eq!(res.groups[1].official.get(&"clinton".to_string()), 107);
        // Town wards are not consumed.
        assert_eq!(
            res.unused_wards,
            vec![4, 5, 6, 8, 9, 10].into_iter().collect::<BTreeSet<u32>>()
        );
    }

    #[test]
    fn ward_used_twice() {
        let res = reconcile_city_wards(
            &official(),
            vec!["Madison City Wards 5-7", "Madison City Wards 7, 8"],
            &rules(),
        );
        assert_eq!(
            res,
            Err(ReconcileError::WardAlreadyUsed {
                ward: 7,
                precinct: "Madison City Wards 7, 8".to_string()
            })
        );
        let res = reconcile_city_wards(&official(), vec!["Madison City Wards 2, 2"], &rules());
        assert!(matches!(res, Err(ReconcileError::WardAlreadyUsed { ward: 2, .. })));
    }

    #[test]
    fn ward_outside_universe() {
        let res = reconcile_city_wards(&official(), vec!["Madison City Wards 11"], &rules());
        assert!(matches!(
            res,
            Err(ReconcileError::WardOutsideUniverse { ward: 11, .. })
        ));
    }

    #[test]
    fn missing_official_row() {
        let wide = WardRules::new("Madison", 1, 20).unwrap();
        let res = reconcile_city_wards(&official(), vec!["Madison City Wards 12"], &wide);
        assert_eq!(
            res,
            Err(ReconcileError::MissingOfficialPrecinct {
                name: "C Madison Wd 12".to_string(),
                precinct: "Madison City Wards 12".to_string()
            })
        );
    }

    #[test]
    fn unknown_audited_precinct_stops() {
        let res = reconcile_city_wards(&official(), vec!["Fitchburg 1"], &rules());
        assert!(matches!(res, Err(ReconcileError::UnknownPrecinctName { .. })));
    }

    #[test]
    fn disjoint_groups_leave_complement() {
        let res = reconcile_city_wards(
            &official(),
            vec!["Madison City Wards 1, 3", "Madison City Wards 9-10"],
            &rules(),
        )
        .unwrap();
        assert_eq!(
            res.unused_wards,
            vec![2, 4, 5, 6, 7, 8].into_iter().collect::<BTreeSet<u32>>()
        );
    }
}
