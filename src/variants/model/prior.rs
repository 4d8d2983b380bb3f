use bio::stats::bayesian;
use bio::stats::{LogProb, Prob};

use crate::utils::PROB_2;
use crate::variants::model::Genotype;

/// Diploid genotype prior assuming each haplotype independently carries a
/// non-reference allele with frequency `nonref_freq`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GenotypePrior {
    Flat,
    NonRefFreq { ln_ref: LogProb, ln_nonref: LogProb },
}

impl GenotypePrior {
    pub(crate) fn new(nonref_freq: Option<f64>) -> Self {
        match nonref_freq {
            Some(freq) => GenotypePrior::NonRefFreq {
                ln_ref: LogProb::from(Prob(1.0 - freq)),
                ln_nonref: LogProb::from(Prob(freq)),
            },
            None => GenotypePrior::Flat,
        }
    }
}

impl bayesian::model::Prior for GenotypePrior {
    type Event = Genotype;

    fn compute(&self, genotype: &Genotype) -> LogProb {
        match self {
            GenotypePrior::Flat => LogProb::ln_one(),
            GenotypePrior::NonRefFreq { ln_ref, ln_nonref } => {
                let haplotype = |allele: usize| if allele == 0 { *ln_ref } else { *ln_nonref };
                let prob = haplotype(genotype.first()) + haplotype(genotype.second());
                if genotype.is_het() {
                    // two orderings of the haplotypes
                    prob + *PROB_2
                } else {
                    prob
                }
            }
        }
    }
}
