use crate::calling::joint::{JointCandidate, SampleRole};
use crate::variants::{Allele, VariantType};

/// Per-sample part of a variant record.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct SampleGenotype {
    #[getset(get = "pub")]
    sample: String,
    #[getset(get_copy = "pub")]
    role: SampleRole,
    /// Indices into reference (0) and alternates (1..), `None` for a no-call.
    #[getset(get_copy = "pub")]
    genotype: Option<[usize; 2]>,
    #[getset(get_copy = "pub")]
    quality: f64,
    #[getset(get = "pub")]
    allele_depths: Vec<u64>,
    #[getset(get_copy = "pub")]
    promoted: bool,
}

/// Logical variant record handed to a serializer.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct VariantRecord {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get_copy = "pub")]
    reference: char,
    #[getset(get = "pub")]
    alternates: Vec<Allele>,
    #[getset(get = "pub")]
    samples: Vec<SampleGenotype>,
}

/// Assemble the record for a joint candidate.
pub fn emit(candidate: &JointCandidate) -> VariantRecord {
    VariantRecord {
        contig: candidate.contig().clone(),
        pos: candidate.pos(),
        reference: candidate.ref_base(),
        alternates: candidate.alternates().to_vec(),
        samples: candidate
            .sample_calls()
            .iter()
            .map(|call| SampleGenotype {
                sample: call.sample().clone(),
                role: call.role(),
                genotype: call.genotype().map(|genotype| genotype.alleles()),
                quality: call.quality(),
                allele_depths: call.allele_depths().clone(),
                promoted: call.promoted(),
            })
            .collect(),
    }
}

/// Variant classes that can be selected for output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum VariantSelector {
    /// Biallelic substitutions.
    #[strum(serialize = "snps")]
    Snps,
    /// Biallelic insertions and deletions.
    #[strum(serialize = "indels")]
    Indels,
    /// Biallelic insertions.
    #[strum(serialize = "insertions")]
    Insertions,
    /// Biallelic deletions.
    #[strum(serialize = "deletions")]
    Deletions,
    /// Records with more than one alternate allele.
    #[strum(serialize = "multi-allelics")]
    MultiAllelics,
    #[strum(serialize = "all")]
    All,
}

impl VariantSelector {
    pub fn matches(self, record: &VariantRecord) -> bool {
        let alternates = record.alternates();
        let biallelic_of = |variant_type: VariantType| {
            alternates.len() == 1 && alternates[0].variant_type() == variant_type
        };
        match self {
            VariantSelector::All => true,
            VariantSelector::MultiAllelics => alternates.len() > 1,
            VariantSelector::Snps => biallelic_of(VariantType::Snv),
            VariantSelector::Indels => alternates.len() == 1 && alternates[0].is_indel(),
            VariantSelector::Insertions => biallelic_of(VariantType::Insertion),
            VariantSelector::Deletions => biallelic_of(VariantType::Deletion),
        }
    }
}

/// Whether any of the selectors matches; an empty selection keeps everything.
pub fn is_selected(selectors: &[VariantSelector], record: &VariantRecord) -> bool {
    selectors.is_empty() || selectors.iter().any(|selector| selector.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::joint::{Cohort, JointCallerBuilder};
    use crate::variants::evidence::{AlleleCountSummary, AlleleSupport};

    fn candidate(alleles: &[(&str, i64)]) -> JointCandidate {
        let caller = JointCallerBuilder::default()
            .cohort(Cohort::trio("child", "mother", "father"))
            .build()
            .unwrap();
        let depth = alleles.iter().map(|(_, count)| count).sum();
        let summary = AlleleCountSummary::new(
            "chr3".to_owned(),
            41,
            'c',
            depth,
            alleles
                .iter()
                .map(|(allele, count)| AlleleSupport::new(allele.parse().unwrap(), *count))
                .collect(),
        );
        caller
            .call_position(&[Some(summary), None, Some(AlleleCountSummary::new(
                "chr3".to_owned(),
                41,
                'C',
                10,
                vec![AlleleSupport::new(Allele::Reference, 10)],
            ))])
            .unwrap()
    }

    #[test]
    fn test_emit() {
        let record = emit(&candidate(&[("=", 10), ("T", 10)]));
        assert_eq!(record.contig(), "chr3");
        assert_eq!(record.pos(), 41);
        assert_eq!(record.reference(), 'C');
        assert_eq!(record.alternates(), &vec![Allele::Substitution(b'T')]);
        let samples = record.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].genotype(), Some([0, 1]));
        assert_eq!(samples[0].allele_depths(), &vec![10, 10]);
        assert_eq!(samples[1].genotype(), None);
        assert_eq!(samples[2].genotype(), Some([0, 0]));
    }

    #[test]
    fn test_emit_is_idempotent() {
        let candidate = candidate(&[("=", 2), ("-2", 9), ("+A", 9)]);
        let first = serde_json::to_vec(&emit(&candidate)).unwrap();
        let second = serde_json::to_vec(&emit(&candidate)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_selectors() {
        let snp = emit(&candidate(&[("=", 10), ("T", 10)]));
        let indel = emit(&candidate(&[("=", 10), ("-1", 10)]));
        let multi = emit(&candidate(&[("=", 2), ("-2", 9), ("+A", 9)]));
        assert_eq!(multi.alternates().len(), 2);

        assert!(VariantSelector::Snps.matches(&snp));
        assert!(!VariantSelector::Snps.matches(&indel));
        assert!(VariantSelector::Indels.matches(&indel));
        assert!(!VariantSelector::Indels.matches(&multi));
        assert!(VariantSelector::MultiAllelics.matches(&multi));

        let insertion = emit(&candidate(&[("=", 10), ("+GA", 10)]));
        assert!(VariantSelector::Insertions.matches(&insertion));
        assert!(!VariantSelector::Deletions.matches(&insertion));
        assert!(VariantSelector::Deletions.matches(&indel));
        assert!(!VariantSelector::Insertions.matches(&indel));
        assert!(!VariantSelector::Insertions.matches(&multi));
        assert!(!VariantSelector::Deletions.matches(&snp));
        assert_eq!(
            "insertions".parse::<VariantSelector>().unwrap(),
            VariantSelector::Insertions
        );
        assert!(is_selected(&[], &snp));
        assert!(is_selected(&[VariantSelector::Indels, VariantSelector::Snps], &snp));
        assert!(!is_selected(&[VariantSelector::MultiAllelics], &snp));
        assert_eq!(
            "multi-allelics".parse::<VariantSelector>().unwrap(),
            VariantSelector::MultiAllelics
        );
    }
}
