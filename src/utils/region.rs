use crate::utils::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A genomic interval addressed as `contig:start-end`, end-inclusive.
#[derive(Debug, PartialEq, Clone)]
pub struct GenomicRegion {
    pub contig: String,
    pub start: u32,
    pub end: u32,
}

impl GenomicRegion {
    pub fn new(contig: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let contig = contig.into();
        if end <= start {
            return Err(Error::Config(format!(
                "Region {}:{}-{} is empty or inverted",
                contig, start, end
            )));
        }
        Ok(Self { contig, start, end })
    }

    pub fn contains_position(&self, position: u32) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

impl FromStr for GenomicRegion {
    type Err = Error;

    fn from_str(encoding: &str) -> Result<Self> {
        let malformed = || {
            Error::Config(format!(
                "'{}' is not a region of the form contig:start-end",
                encoding
            ))
        };

        let (contig, span) = encoding.split_once(':').ok_or_else(malformed)?;
        let (start, end) = span.split_once('-').ok_or_else(malformed)?;
        if contig.is_empty() {
            return Err(malformed());
        }
        let start: u32 = start.parse().map_err(|_| malformed())?;
        let end: u32 = end.parse().map_err(|_| malformed())?;

        GenomicRegion::new(contig, start, end)
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::GenomicRegion;

    #[test]
    fn well_formed_region_parses() {
        let region: GenomicRegion = "chr1:100-200".parse().unwrap();
        assert_eq!(region.contig, "chr1");
        assert_eq!(region.start, 100);
        assert_eq!(region.end, 200);
    }

    #[test]
    fn region_without_span_separator_is_rejected() {
        assert!("chr1".parse::<GenomicRegion>().is_err());
        assert!("chr1:100".parse::<GenomicRegion>().is_err());
    }

    #[test]
    fn region_with_extra_colon_is_rejected() {
        let err = "chr:1:100-200".parse::<GenomicRegion>().unwrap_err();
        assert!(err.to_string().contains("chr:1:100-200"));
    }

    #[test]
    fn region_with_nonnumeric_bound_is_rejected() {
        assert!("chr1:a-200".parse::<GenomicRegion>().is_err());
    }

    #[test]
    fn inverted_region_is_rejected() {
        let err = "chr1:200-100".parse::<GenomicRegion>().unwrap_err();
        assert!(err.to_string().contains("empty or inverted"));
        assert!(GenomicRegion::new("chr1", 200, 100).is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let region: GenomicRegion = "chrX:5-10".parse().unwrap();
        assert_eq!(region.to_string().parse::<GenomicRegion>().unwrap(), region);
    }

    #[test]
    fn position_containment_is_end_inclusive() {
        let region = GenomicRegion::new("chr2", 10, 20).unwrap();
        assert!(region.contains_position(10));
        assert!(region.contains_position(20));
        assert!(!region.contains_position(21));
    }
}
