//! CPU mask parsing.
//!
//! A mask is written either as a list of CPU ids (`[0, 1, 8]`) or as a
//! comma-separated string of ids and inclusive ranges (`"0-3,8,10-11"`).
//! Both forms resolve to a [`CpuMask`] here; nothing downstream sees the
//! original notation.

use crate::error::{AffinityError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Highest CPU id accepted in a mask: the last slot of a `cpu_set_t`, the
/// widest set `sched_setaffinity` is called with.
pub const MAX_CPU_ID: usize = nix::sched::CpuSet::count() - 1;

/// Mask notation as found in the pin file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskSpec {
    List(Vec<i64>),
    Ranges(String),
}

impl MaskSpec {
    /// Extracts a mask spec from a pin file value.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(MaskSpec::Ranges(s.clone())),
            Value::Array(items) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_i64() {
                        Some(id) => ids.push(id),
                        None => {
                            return Err(AffinityError::MalformedMask {
                                token: item.to_string(),
                                spec: value.to_string(),
                            })
                        }
                    }
                }
                Ok(MaskSpec::List(ids))
            }
            other => Err(AffinityError::InvalidMaskType(other.to_string())),
        }
    }

    /// Resolves the spec into a canonical mask.
    pub fn parse(&self) -> Result<CpuMask> {
        match self {
            MaskSpec::List(ids) => parse_list(ids),
            MaskSpec::Ranges(s) => parse_ranges(s),
        }
    }
}

/// Deduplicated, sorted, non-empty set of CPU ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CpuMask {
    cpus: BTreeSet<usize>,
}

impl CpuMask {
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.cpus.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    pub fn contains(&self, cpu: usize) -> bool {
        self.cpus.contains(&cpu)
    }

    /// Highest CPU id in the mask.
    pub fn max_cpu(&self) -> usize {
        self.cpus.iter().next_back().copied().unwrap_or(0)
    }

    /// True when the mask references a CPU id above `logical_cpu_count`.
    ///
    /// The comparison is strict: an id equal to the count is accepted.
    pub fn exceeds(&self, logical_cpu_count: usize) -> bool {
        self.max_cpu() > logical_cpu_count
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl fmt::Display for CpuMask {
    /// Compact range list, e.g. `0-3,8,10-11`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cpus = self.to_vec();
        let mut i = 0;
        let mut first = true;
        while i < cpus.len() {
            let start = cpus[i];
            let mut j = i;
            while j + 1 < cpus.len() && cpus[j + 1] == cpus[j] + 1 {
                j += 1;
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if j == i {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, cpus[j])?;
            }
            i = j + 1;
        }
        Ok(())
    }
}

/// Parses any pin file value into a mask.
pub fn parse_mask(value: &Value) -> Result<CpuMask> {
    MaskSpec::from_value(value)?.parse()
}

fn parse_list(ids: &[i64]) -> Result<CpuMask> {
    let spec = format!("{:?}", ids);
    let mut cpus = BTreeSet::new();
    for &id in ids {
        if id < 0 || id as u64 > MAX_CPU_ID as u64 {
            return Err(AffinityError::MalformedMask {
                token: id.to_string(),
                spec,
            });
        }
        cpus.insert(id as usize);
    }
    if cpus.is_empty() {
        return Err(AffinityError::EmptyMask(spec));
    }
    Ok(CpuMask { cpus })
}

fn parse_ranges(spec: &str) -> Result<CpuMask> {
    let mut cpus = BTreeSet::new();
    for region in spec.split(',') {
        let token: String = region.chars().filter(|c| !c.is_whitespace()).collect();
        let malformed = || AffinityError::MalformedMask {
            token: region.to_string(),
            spec: spec.to_string(),
        };

        let bounds: Vec<&str> = token.split('-').collect();
        let (from, to) = match bounds.as_slice() {
            [single] => {
                let cpu = parse_cpu_id(single).ok_or_else(malformed)?;
                (cpu, cpu)
            }
            [from, to] => {
                let from = parse_cpu_id(from).ok_or_else(malformed)?;
                let to = parse_cpu_id(to).ok_or_else(malformed)?;
                if from > to {
                    return Err(malformed());
                }
                (from, to)
            }
            _ => return Err(malformed()),
        };
        cpus.extend(from..=to);
    }
    if cpus.is_empty() {
        return Err(AffinityError::EmptyMask(spec.to_string()));
    }
    Ok(CpuMask { cpus })
}

fn parse_cpu_id(s: &str) -> Option<usize> {
    // usize parsing accepts a leading '+', the pin file format does not
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<usize>().ok().filter(|&id| id <= MAX_CPU_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(mask: &CpuMask) -> Vec<usize> {
        mask.to_vec()
    }

    // -------------------------------------------------------------------------
    // Range strings
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_mixed_ranges() {
        let mask = parse_mask(&json!("0,2,4-5")).unwrap();
        assert_eq!(ids(&mask), vec![0, 2, 4, 5]);
    }

    #[test]
    fn test_parse_range_is_inclusive() {
        for (a, b) in [(0usize, 0usize), (3, 7), (10, 11), (0, 63)] {
            let mask = parse_mask(&json!(format!("{}-{}", a, b))).unwrap();
            assert_eq!(ids(&mask), (a..=b).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_parse_strips_whitespace_inside_tokens() {
        let mask = parse_mask(&json!(" 0 - 2 , 8 ")).unwrap();
        assert_eq!(ids(&mask), vec![0, 1, 2, 8]);
    }

    #[test]
    fn test_parse_overlapping_ranges_are_unioned() {
        let mask = parse_mask(&json!("0-3,2-5,4")).unwrap();
        assert_eq!(ids(&mask), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_parse_non_numeric_is_malformed() {
        let err = parse_mask(&json!("abc")).unwrap_err();
        match err {
            AffinityError::MalformedMask { token, spec } => {
                assert_eq!(token, "abc");
                assert_eq!(spec, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_three_part_range_is_malformed() {
        let err = parse_mask(&json!("1-2-3")).unwrap_err();
        assert!(matches!(err, AffinityError::MalformedMask { .. }));
    }

    #[test]
    fn test_parse_negative_and_reversed_are_malformed() {
        assert!(matches!(
            parse_mask(&json!("-1")).unwrap_err(),
            AffinityError::MalformedMask { .. }
        ));
        assert!(matches!(
            parse_mask(&json!("5-3")).unwrap_err(),
            AffinityError::MalformedMask { .. }
        ));
        assert!(matches!(
            parse_mask(&json!("+3")).unwrap_err(),
            AffinityError::MalformedMask { .. }
        ));
    }

    #[test]
    fn test_parse_empty_string_is_malformed() {
        assert!(matches!(
            parse_mask(&json!("")).unwrap_err(),
            AffinityError::MalformedMask { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_ids_above_limit() {
        let err = parse_mask(&json!(format!("0-{}", MAX_CPU_ID + 1))).unwrap_err();
        assert!(matches!(err, AffinityError::MalformedMask { .. }));

        let err = parse_mask(&json!([MAX_CPU_ID + 1])).unwrap_err();
        assert!(matches!(err, AffinityError::MalformedMask { .. }));
    }

    #[test]
    fn test_limit_fits_affinity_set() {
        assert_eq!(MAX_CPU_ID + 1, nix::sched::CpuSet::count());
        // 1024 ids fit a cpu_set_t; anything beyond would fail in the syscall
        assert!(parse_mask(&json!([MAX_CPU_ID])).is_ok());
        assert!(parse_mask(&json!("1024")).is_err());
    }

    // -------------------------------------------------------------------------
    // Lists
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_list_deduplicates() {
        let mask = parse_mask(&json!([1, 1, 2])).unwrap();
        assert_eq!(ids(&mask), vec![1, 2]);
    }

    #[test]
    fn test_parse_list_is_order_independent() {
        let a = parse_mask(&json!([5, 0, 3, 0])).unwrap();
        let b = parse_mask(&json!([0, 3, 5])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_list_rejects_negative_ids() {
        let err = parse_mask(&json!([0, -1])).unwrap_err();
        assert!(matches!(err, AffinityError::MalformedMask { token, .. } if token == "-1"));
    }

    #[test]
    fn test_parse_list_rejects_non_integers() {
        let err = parse_mask(&json!([0, "1"])).unwrap_err();
        assert!(matches!(err, AffinityError::MalformedMask { .. }));
    }

    #[test]
    fn test_parse_empty_list_is_empty_mask() {
        assert!(matches!(
            parse_mask(&json!([])).unwrap_err(),
            AffinityError::EmptyMask(_)
        ));
    }

    #[test]
    fn test_parse_other_types_are_invalid() {
        for value in [json!(3), json!(true), json!(null), json!({"a": 1})] {
            assert!(matches!(
                parse_mask(&value).unwrap_err(),
                AffinityError::InvalidMaskType(_)
            ));
        }
    }

    // -------------------------------------------------------------------------
    // CpuMask helpers
    // -------------------------------------------------------------------------

    #[test]
    fn test_display_compacts_ranges() {
        let mask = parse_mask(&json!([11, 0, 1, 2, 3, 8, 10])).unwrap();
        assert_eq!(mask.to_string(), "0-3,8,10-11");
    }

    #[test]
    fn test_exceeds_is_strict() {
        let mask = parse_mask(&json!("0-2")).unwrap();
        assert_eq!(mask.max_cpu(), 2);
        assert!(!mask.exceeds(2));
        assert!(mask.exceeds(1));
    }
}
