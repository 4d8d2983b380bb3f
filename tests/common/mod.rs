use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_derive::Deserialize;

use triocall::{AlleleCountSummary, Config, JointCandidate};

/// Expected outcome of one position.
#[derive(Debug, Deserialize)]
pub(crate) struct Expectation {
    pub(crate) reportable: bool,
    #[serde(default)]
    pub(crate) alternates: Vec<String>,
    /// Genotypes per sample, `.` for a no-call.
    pub(crate) genotypes: Vec<String>,
    #[serde(default)]
    pub(crate) promoted: Option<Vec<bool>>,
    #[serde(default)]
    pub(crate) min_qualities: Option<Vec<f64>>,
    #[serde(default)]
    pub(crate) max_qualities: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct TestcaseDefinition {
    #[serde(default)]
    config: Config,
    positions: Vec<Vec<Option<AlleleCountSummary>>>,
    expected: Vec<Expectation>,
}

pub(crate) struct Testcase {
    config: Config,
    positions: Vec<Vec<Option<AlleleCountSummary>>>,
    expected: Vec<Expectation>,
}

pub(crate) fn load_testcase(path: impl AsRef<Path>) -> Result<Testcase> {
    let path = path.as_ref().join("testcase.yaml");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Unable to read testcase {}.", path.display()))?;
    let definition: TestcaseDefinition = serde_yaml::from_str(&content)?;
    definition.config.validate()?;

    Ok(Testcase {
        config: definition.config,
        positions: definition.positions,
        expected: definition.expected,
    })
}

impl Testcase {
    pub(crate) fn run(&self) -> Result<Vec<JointCandidate>> {
        let caller = self.config.joint_caller()?;
        let candidates = self
            .positions
            .iter()
            .map(|summaries| caller.call_position(summaries))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    pub(crate) fn check(&self, candidates: &[JointCandidate]) {
        assert_eq!(candidates.len(), self.expected.len(), "number of positions");
        for (candidate, expected) in candidates.iter().zip(&self.expected) {
            let site = format!("{}:{}", candidate.contig(), candidate.pos());
            assert_eq!(
                candidate.reportable(),
                expected.reportable,
                "reportable at {}",
                site
            );
            let alternates: Vec<String> = candidate
                .alternates()
                .iter()
                .map(|allele| allele.to_string())
                .collect();
            assert_eq!(alternates, expected.alternates, "alternates at {}", site);

            let calls = candidate.sample_calls();
            let genotypes: Vec<String> = calls
                .iter()
                .map(|call| {
                    call.genotype()
                        .map_or_else(|| ".".to_owned(), |genotype| genotype.to_string())
                })
                .collect();
            assert_eq!(genotypes, expected.genotypes, "genotypes at {}", site);

            if let Some(promoted) = &expected.promoted {
                let observed: Vec<bool> = calls.iter().map(|call| call.promoted()).collect();
                assert_eq!(&observed, promoted, "promotion at {}", site);
            }
            if let Some(min_qualities) = &expected.min_qualities {
                for (call, min_qual) in calls.iter().zip(min_qualities) {
                    assert!(
                        call.quality() >= *min_qual,
                        "quality {} of {} below {} at {}",
                        call.quality(),
                        call.sample(),
                        min_qual,
                        site
                    );
                }
            }
            if let Some(max_qualities) = &expected.max_qualities {
                for (call, max_qual) in calls.iter().zip(max_qualities) {
                    assert!(
                        call.quality() <= *max_qual,
                        "quality {} of {} above {} at {}",
                        call.quality(),
                        call.sample(),
                        max_qual,
                        site
                    );
                }
            }
        }
    }
}
