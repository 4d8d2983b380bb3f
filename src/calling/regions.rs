use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::errors::Error;

lazy_static! {
    static ref REGION_RE: Regex =
        Regex::new(r"^(?P<contig>[^:\s]+)(:(?P<start>[0-9,]+)-(?P<end>[0-9,]+))?$").unwrap();
}

/// Genomic interval, 0-based and half-open. An unbounded end covers the rest of the contig.
#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    end: Option<u64>,
}

impl Region {
    pub fn whole_contig(contig: &str) -> Self {
        Region::new(contig.to_owned(), 0, None)
    }

    pub fn contains(&self, contig: &str, pos: u64) -> bool {
        self.contig == contig && pos >= self.start && self.end.map_or(true, |end| pos < end)
    }

    /// Number of bases, `None` if unbounded. A region ending before its start is empty.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Parts of this region not covered by `other`.
    fn subtract(&self, other: &Region) -> Vec<Region> {
        let end = self.end.unwrap_or(u64::MAX);
        let other_end = other.end.unwrap_or(u64::MAX);
        if other.contig != self.contig || other_end <= self.start || other.start >= end {
            return vec![self.clone()];
        }
        let mut parts = Vec::with_capacity(2);
        if other.start > self.start {
            parts.push(Region::new(
                self.contig.clone(),
                self.start,
                Some(other.start),
            ));
        }
        if other_end < end {
            parts.push(Region::new(self.contig.clone(), other_end, self.end));
        }
        parts
    }
}

/// Parses `CONTIG` or `CONTIG:START-END` with 1-based inclusive coordinates.
impl FromStr for Region {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidRegion {
            spec: spec.to_owned(),
        };
        let caps = REGION_RE.captures(spec.trim()).ok_or_else(invalid)?;
        let contig = caps["contig"].to_owned();
        match (caps.name("start"), caps.name("end")) {
            (Some(start), Some(end)) => {
                let parse = |value: &str| value.replace(',', "").parse::<u64>();
                let start = parse(start.as_str()).map_err(|_| invalid())?;
                let end = parse(end.as_str()).map_err(|_| invalid())?;
                if start == 0 || end < start {
                    return Err(invalid());
                }
                Ok(Region::new(contig, start - 1, Some(end)))
            }
            _ => Ok(Region::whole_contig(&contig)),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.contig, self.start + 1, end),
            None => write!(f, "{}", self.contig),
        }
    }
}

/// Split regions into consecutive pieces of at most `partition_size` bases.
///
/// Regions without an end are kept as they are.
pub fn partition(regions: &[Region], partition_size: u64) -> Vec<Region> {
    let mut pieces = Vec::new();
    for region in regions {
        match region.end {
            Some(end) if partition_size > 0 => {
                let mut start = region.start;
                while start < end {
                    let piece_end = (start + partition_size).min(end);
                    pieces.push(Region::new(region.contig.clone(), start, Some(piece_end)));
                    start = piece_end;
                }
            }
            _ => pieces.push(region.clone()),
        }
    }
    pieces
}

/// Remove the `excluded` intervals from `regions`, splitting regions where needed.
pub fn exclude(regions: Vec<Region>, excluded: &[Region]) -> Vec<Region> {
    excluded.iter().fold(regions, |regions, excluded| {
        regions
            .into_iter()
            .flat_map(|region| region.subtract(excluded))
            .filter(|region| !region.is_empty())
            .collect()
    })
}

/// Keep every `num_shards`-th region, starting at `task`.
pub fn shard(regions: Vec<Region>, task: usize, num_shards: usize) -> Result<Vec<Region>, Error> {
    if num_shards == 0 || task >= num_shards {
        return Err(Error::InvalidSharding {
            task,
            shards: num_shards,
        });
    }
    Ok(regions
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % num_shards == task)
        .map(|(_, region)| region)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        let region: Region = "chr20:10,001-10,100".parse().unwrap();
        assert_eq!(region, Region::new("chr20".to_owned(), 10000, Some(10100)));
        assert_eq!(region.len(), Some(100));
        assert_eq!(region.to_string(), "chr20:10001-10100");
        assert_eq!("chrM".parse::<Region>().unwrap(), Region::whole_contig("chrM"));
        for invalid in &["", "chr1:0-10", "chr1:10-5", "chr1:5", "chr1:a-b"] {
            assert!(invalid.parse::<Region>().is_err(), "{} parsed", invalid);
        }
    }

    #[test]
    fn test_inverted_region_is_empty() {
        let region = Region::new("chr1".to_owned(), 10, Some(5));
        assert_eq!(region.len(), Some(0));
        assert!(region.is_empty());
        assert!(!region.contains("chr1", 7));
        assert!(partition(&[region], 100).is_empty());
    }

    #[test]
    fn test_exclude() {
        let regions = vec![
            "chr20".parse::<Region>().unwrap(),
            "chr1:1-1000".parse().unwrap(),
            "chr2:1-100".parse().unwrap(),
        ];
        let excluded = vec![
            "chr20:100-100".parse::<Region>().unwrap(),
            "chr1:1-200".parse().unwrap(),
            "chr1:501-600".parse().unwrap(),
            "chr2".parse().unwrap(),
        ];
        assert_eq!(
            exclude(regions, &excluded),
            vec![
                Region::new("chr20".to_owned(), 0, Some(99)),
                Region::new("chr20".to_owned(), 100, None),
                Region::new("chr1".to_owned(), 200, Some(500)),
                Region::new("chr1".to_owned(), 600, Some(1000)),
            ]
        );
        let regions = vec![Region::new("chr3".to_owned(), 0, Some(10))];
        assert_eq!(exclude(regions.clone(), &[]), regions);
        assert_eq!(
            exclude(regions.clone(), &[Region::whole_contig("chr4")]),
            regions
        );
    }

    #[test]
    fn test_contains() {
        let region: Region = "chr1:11-20".parse().unwrap();
        assert!(region.contains("chr1", 10));
        assert!(region.contains("chr1", 19));
        assert!(!region.contains("chr1", 20));
        assert!(!region.contains("chr2", 15));
        assert!(Region::whole_contig("chr2").contains("chr2", 1_000_000));
    }

    #[test]
    fn test_partition() {
        let regions = vec![
            Region::new("chr1".to_owned(), 0, Some(2500)),
            Region::whole_contig("chrM"),
        ];
        let pieces = partition(&regions, 1000);
        assert_eq!(
            pieces,
            vec![
                Region::new("chr1".to_owned(), 0, Some(1000)),
                Region::new("chr1".to_owned(), 1000, Some(2000)),
                Region::new("chr1".to_owned(), 2000, Some(2500)),
                Region::whole_contig("chrM"),
            ]
        );
    }

    #[test]
    fn test_shard() {
        let regions = partition(&[Region::new("chr1".to_owned(), 0, Some(5000))], 1000);
        let shard1 = shard(regions.clone(), 1, 2).unwrap();
        assert_eq!(
            shard1.iter().map(|r| r.start()).collect::<Vec<_>>(),
            vec![1000, 3000]
        );
        assert_eq!(shard(regions.clone(), 0, 2).unwrap().len(), 3);
        assert_eq!(
            shard(regions, 2, 2),
            Err(Error::InvalidSharding { task: 2, shards: 2 })
        );
    }
}
