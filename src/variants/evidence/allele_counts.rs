use std::collections::HashSet;

use crate::errors::{invalid_input, Error};
use crate::variants::{is_valid_base, Allele};

/// Read support for one allele at a position.
#[derive(new, Getters, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct AlleleSupport {
    allele: Allele,
    count: i64,
    /// Mean base quality (PHRED) of the supporting reads, if the collector reports it.
    #[serde(default)]
    #[new(default)]
    mean_quality: Option<f64>,
}

impl AlleleSupport {
    pub fn with_mean_quality(mut self, mean_quality: f64) -> Self {
        self.mean_quality = Some(mean_quality);
        self
    }
}

/// Per-position tally of observed alleles for one sample, as produced by the
/// pileup collector.
///
/// Summaries are plain data. Call `validate` before using the accessors that
/// assume well-formed counts.
#[derive(new, Getters, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct AlleleCountSummary {
    contig: String,
    /// 0-based position on the contig.
    pos: u64,
    ref_base: char,
    depth: i64,
    #[serde(default)]
    alleles: Vec<AlleleSupport>,
}

impl AlleleCountSummary {
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(invalid_input(&self.contig, self.pos, msg));

        if !self.ref_base.is_ascii() || !is_valid_base(self.ref_base as u8) {
            return invalid(&format!("invalid reference base {:?}", self.ref_base));
        }
        if self.depth < 0 {
            return invalid(&format!("negative depth {}", self.depth));
        }

        let mut seen = HashSet::new();
        let mut total: i64 = 0;
        for support in &self.alleles {
            let allele = support.allele();
            if !seen.insert(allele) {
                return invalid(&format!("duplicate allele {}", allele));
            }
            if let Err(msg) = allele.check(self.ref_base as u8) {
                return invalid(&msg);
            }
            if support.count < 0 {
                return invalid(&format!(
                    "negative count {} for allele {}",
                    support.count, allele
                ));
            }
            if support.count > self.depth {
                return invalid(&format!(
                    "count {} for allele {} exceeds depth {}",
                    support.count, allele, self.depth
                ));
            }
            if let Some(qual) = support.mean_quality {
                if !qual.is_finite() || qual < 0.0 {
                    return invalid(&format!(
                        "invalid mean base quality {} for allele {}",
                        qual, allele
                    ));
                }
            }
            total = match total.checked_add(support.count) {
                Some(total) => total,
                None => return invalid("allele counts overflow"),
            };
        }
        if total > self.depth {
            return invalid(&format!(
                "sum of allele counts {} exceeds depth {}",
                total, self.depth
            ));
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn support(&self, allele: &Allele) -> Option<&AlleleSupport> {
        self.alleles.iter().find(|support| support.allele() == allele)
    }

    /// Number of reads supporting the allele, 0 if it was not observed.
    pub fn count(&self, allele: &Allele) -> u64 {
        self.support(allele)
            .map_or(0, |support| support.count.max(0) as u64)
    }

    /// Fraction of the depth supporting the allele, 0 at empty positions.
    pub fn fraction(&self, allele: &Allele) -> f64 {
        if self.depth <= 0 {
            0.0
        } else {
            self.count(allele) as f64 / self.depth as f64
        }
    }

    pub fn mean_quality(&self, allele: &Allele) -> Option<f64> {
        self.support(allele).and_then(|support| support.mean_quality)
    }

    /// Non-reference alleles with at least one supporting read.
    pub fn non_reference_alleles(&self) -> impl Iterator<Item = &Allele> {
        self.alleles
            .iter()
            .filter(|support| !support.allele.is_reference() && support.count > 0)
            .map(|support| &support.allele)
    }

    /// Whether this summary describes the same site as `other`.
    pub fn is_same_site(&self, other: &AlleleCountSummary) -> bool {
        self.contig == other.contig
            && self.pos == other.pos
            && self.ref_base.eq_ignore_ascii_case(&other.ref_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(depth: i64, alleles: Vec<(&str, i64)>) -> AlleleCountSummary {
        AlleleCountSummary::new(
            "chr1".to_owned(),
            100,
            'A',
            depth,
            alleles
                .into_iter()
                .map(|(allele, count)| AlleleSupport::new(allele.parse().unwrap(), count))
                .collect(),
        )
    }

    #[test]
    fn test_validate_ok() {
        let summary = summary(30, vec![("=", 28), ("T", 2)]);
        assert!(summary.validate().is_ok());
        assert_eq!(summary.count(&Allele::Substitution(b'T')), 2);
        assert_eq!(summary.count(&Allele::Substitution(b'G')), 0);
        assert!((summary.fraction(&Allele::Substitution(b'T')) - 2.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_empty() {
        let summary = summary(0, vec![]);
        assert!(summary.validate().is_ok());
        assert!(summary.is_empty());
        assert_eq!(summary.fraction(&Allele::Reference), 0.0);
    }

    #[test]
    fn test_validate_invalid() {
        let cases = vec![
            summary(-1, vec![]),
            summary(10, vec![("=", -1)]),
            summary(10, vec![("T", 11)]),
            summary(10, vec![("=", 6), ("T", 6)]),
            summary(10, vec![("T", 1), ("T", 2)]),
            summary(10, vec![("A", 2)]),
        ];
        for case in cases {
            match case.validate() {
                Err(Error::InvalidInput { contig, pos, .. }) => {
                    assert_eq!(contig, "chr1");
                    assert_eq!(pos, 100);
                }
                other => panic!("unexpected result {:?} for {:?}", other, case),
            }
        }
    }

    #[test]
    fn test_validate_quality() {
        let mut case = summary(10, vec![]);
        case.alleles
            .push(AlleleSupport::new(Allele::Substitution(b'C'), 3).with_mean_quality(f64::NAN));
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_validate_lowercase_alleles() {
        let case = AlleleCountSummary::new(
            "chr1".to_owned(),
            100,
            'a',
            10,
            vec![
                AlleleSupport::new(Allele::Substitution(b'g'), 2),
                AlleleSupport::new(Allele::Substitution(b'G'), 3),
            ],
        );
        assert!(case.validate().unwrap_err().is_invalid_input());
        let case = AlleleCountSummary::new(
            "chr1".to_owned(),
            100,
            'a',
            10,
            vec![AlleleSupport::new(Allele::Substitution(b'G'), 3)],
        );
        assert!(case.validate().is_ok());
    }

    #[test]
    fn test_non_reference_alleles() {
        let summary = summary(20, vec![("=", 10), ("G", 0), ("+CT", 3), ("-2", 1)]);
        let alleles: Vec<_> = summary.non_reference_alleles().cloned().collect();
        assert_eq!(
            alleles,
            vec![Allele::Insertion(b"CT".to_vec()), Allele::Deletion(2)]
        );
    }

    #[test]
    fn test_deserialize() {
        let summary: AlleleCountSummary = serde_json::from_str(
            r#"{"contig": "chr20", "pos": 5, "ref_base": "C", "depth": 12,
                "alleles": [{"allele": "=", "count": 10}, {"allele": "-1", "count": 2, "mean_quality": 31.5}]}"#,
        )
        .unwrap();
        assert!(summary.validate().is_ok());
        assert_eq!(summary.mean_quality(&Allele::Deletion(1)), Some(31.5));
    }
}
