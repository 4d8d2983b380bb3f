// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::convert::TryFrom;
use std::fmt;
use std::str::{self, FromStr};

use crate::errors::Error;

pub mod evidence;
pub mod model;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
pub enum VariantType {
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
    #[strum(serialize = "SNV")]
    Snv,
    #[strum(serialize = "REF")]
    None, // reads that match the reference
}

impl VariantType {
    pub fn is_indel(self) -> bool {
        matches!(self, VariantType::Insertion | VariantType::Deletion)
    }
}

/// An allele observed at a single reference position.
///
/// Insertions are anchored at the position (the inserted sequence follows the
/// reference base), deletions remove the given number of bases after it.
///
/// The textual form is `=` for the reference, the base for substitutions,
/// `+SEQ` for insertions and `-LEN` for deletions. Bases are upper case.
///
/// Ordering is reference < substitutions < insertions < deletions, then by
/// base, sequence or length, and fixes the order of genotyping vocabularies.
/// It differs from the lexicographic order of the textual form, which is what
/// breaks ties between equally supported candidate alleles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Allele {
    Reference,
    Substitution(u8),
    Insertion(Vec<u8>),
    Deletion(u32),
}

impl Allele {
    pub fn is_reference(&self) -> bool {
        matches!(self, Allele::Reference)
    }

    pub fn variant_type(&self) -> VariantType {
        match self {
            Allele::Reference => VariantType::None,
            Allele::Substitution(_) => VariantType::Snv,
            Allele::Insertion(_) => VariantType::Insertion,
            Allele::Deletion(_) => VariantType::Deletion,
        }
    }

    pub fn is_indel(&self) -> bool {
        self.variant_type().is_indel()
    }

    /// Check that the allele is well formed with respect to the given reference base.
    pub(crate) fn check(&self, ref_base: u8) -> Result<(), String> {
        match self {
            Allele::Reference => Ok(()),
            Allele::Substitution(base) => {
                if !is_canonical_base(*base) {
                    Err(format!("substitution to invalid base {:?}", *base as char))
                } else if base.eq_ignore_ascii_case(&ref_base) {
                    Err(format!(
                        "substitution {} equals the reference base",
                        *base as char
                    ))
                } else {
                    Ok(())
                }
            }
            Allele::Insertion(seq) => {
                if seq.is_empty() {
                    Err("empty insertion".to_owned())
                } else if !seq.iter().all(|base| is_canonical_base(*base)) {
                    Err(format!("insertion with invalid bases {}", self))
                } else {
                    Ok(())
                }
            }
            Allele::Deletion(len) => {
                if *len == 0 {
                    Err("deletion of length zero".to_owned())
                } else {
                    Ok(())
                }
            }
        }
    }
}

pub(crate) fn is_valid_base(base: u8) -> bool {
    is_canonical_base(base.to_ascii_uppercase())
}

fn is_canonical_base(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T' | b'N')
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Allele::Reference => write!(f, "="),
            Allele::Substitution(base) => write!(f, "{}", *base as char),
            Allele::Insertion(seq) => write!(f, "+{}", String::from_utf8_lossy(seq)),
            Allele::Deletion(len) => write!(f, "-{}", len),
        }
    }
}

impl FromStr for Allele {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAllele {
            spec: spec.to_owned(),
        };
        let spec_bytes = spec.as_bytes();
        match spec_bytes {
            b"=" => Ok(Allele::Reference),
            [base] if is_valid_base(*base) => Ok(Allele::Substitution(base.to_ascii_uppercase())),
            [b'+', seq @ ..] if !seq.is_empty() && seq.iter().all(|b| is_valid_base(*b)) => {
                Ok(Allele::Insertion(seq.to_ascii_uppercase()))
            }
            [b'-', _, ..] => spec[1..]
                .parse::<u32>()
                .ok()
                .filter(|len| *len > 0)
                .map(Allele::Deletion)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Allele {
    type Error = Error;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        spec.parse()
    }
}

impl From<Allele> for String {
    fn from(allele: Allele) -> Self {
        allele.to_string()
    }
}
