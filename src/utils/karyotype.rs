//! Expected per-chromosome ploidy of the sample being genotyped.

use crate::utils::{Error, Result};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
};

/// Number of haplotypes expected on a chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ploidy {
    Zero,
    One,
    Two,
}

impl Ploidy {
    pub fn from_symbol(symbol: &str) -> Option<Ploidy> {
        match symbol {
            "0" => Some(Ploidy::Zero),
            "1" => Some(Ploidy::One),
            "2" => Some(Ploidy::Two),
            _ => None,
        }
    }

    pub fn num_alleles(&self) -> usize {
        match self {
            Ploidy::Zero => 0,
            Ploidy::One => 1,
            Ploidy::Two => 2,
        }
    }
}

/// Sample karyotype deciding haploid versus diploid calling per
/// chromosome: the XX and XY presets, or a per-chromosome table loaded
/// from a two-column file.
#[derive(Debug, Clone, PartialEq)]
pub enum Karyotype {
    Xx,
    Xy,
    PerChrom(HashMap<String, Ploidy>),
}

impl Karyotype {
    pub fn new(encoding: &str) -> Result<Self> {
        match encoding {
            "XX" => Ok(Karyotype::Xx),
            "XY" => Ok(Karyotype::Xy),
            path => {
                let file = File::open(path).map_err(|e| {
                    Error::Resource(format!("Could not open karyotype file {}: {}", path, e))
                })?;
                Self::from_reader(BufReader::new(file))
            }
        }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = HashMap::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                Error::Resource(format!("Karyotype file, line {}: {}", number + 1, e))
            })?;

            let mut columns = line.split_whitespace();
            let (chrom, symbol) = match (columns.next(), columns.next()) {
                (Some(chrom), Some(symbol)) => (chrom, symbol),
                _ => {
                    return Err(Error::Config(format!(
                        "Karyotype file, line {}: expected 'chrom ploidy', got '{}'",
                        number + 1,
                        line
                    )))
                }
            };

            let ploidy = Ploidy::from_symbol(symbol).ok_or_else(|| {
                Error::Config(format!(
                    "Karyotype file, line {}: invalid ploidy '{}'",
                    number + 1,
                    symbol
                ))
            })?;

            if table.insert(chrom.to_string(), ploidy).is_some() {
                return Err(Error::Config(format!(
                    "Karyotype file, line {}: chromosome {} listed twice",
                    number + 1,
                    chrom
                )));
            }
        }

        Ok(Karyotype::PerChrom(table))
    }

    /// Ploidy this sample is expected to have on `chrom`.
    pub fn ploidy_of(&self, chrom: &str) -> Result<Ploidy> {
        let is_x = matches!(chrom, "X" | "chrX");
        let is_y = matches!(chrom, "Y" | "chrY");

        match self {
            Karyotype::Xx => Ok(if is_y { Ploidy::Zero } else { Ploidy::Two }),
            Karyotype::Xy => Ok(if is_x || is_y { Ploidy::One } else { Ploidy::Two }),
            Karyotype::PerChrom(table) => table.get(chrom).copied().ok_or_else(|| {
                Error::Config(format!("Karyotype does not cover chromosome {}", chrom))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xx_preset_is_diploid_everywhere_but_y() {
        let karyotype = Karyotype::new("XX").unwrap();
        assert_eq!(karyotype.ploidy_of("chr1").unwrap(), Ploidy::Two);
        assert_eq!(karyotype.ploidy_of("chrX").unwrap(), Ploidy::Two);
        assert_eq!(karyotype.ploidy_of("chrY").unwrap(), Ploidy::Zero);
        assert_eq!(karyotype.ploidy_of("Y").unwrap(), Ploidy::Zero);
    }

    #[test]
    fn xy_preset_is_haploid_on_sex_chromosomes() {
        let karyotype = Karyotype::new("XY").unwrap();
        assert_eq!(karyotype.ploidy_of("chr2").unwrap(), Ploidy::Two);
        assert_eq!(karyotype.ploidy_of("chrX").unwrap(), Ploidy::One);
        assert_eq!(karyotype.ploidy_of("chrY").unwrap(), Ploidy::One);
    }

    #[test]
    fn per_chrom_table_parses_and_answers() {
        let table = "chr1 2\nchr2 1\nchrX 1\nchrY 0\n";
        let karyotype = Karyotype::from_reader(std::io::Cursor::new(table)).unwrap();
        assert_eq!(karyotype.ploidy_of("chr1").unwrap(), Ploidy::Two);
        assert_eq!(karyotype.ploidy_of("chr2").unwrap(), Ploidy::One);
        assert_eq!(karyotype.ploidy_of("chrX").unwrap(), Ploidy::One);
        assert_eq!(karyotype.ploidy_of("chrY").unwrap(), Ploidy::Zero);
        assert!(karyotype.ploidy_of("chrM").is_err());
    }

    #[test]
    fn table_line_without_ploidy_column_fails() {
        let result = Karyotype::from_reader(std::io::Cursor::new("chr1 2\nchr2\n"));
        assert!(result.unwrap_err().to_string().contains("line 2"));
    }

    #[test]
    fn table_with_unknown_ploidy_symbol_fails() {
        assert!(Karyotype::from_reader(std::io::Cursor::new("chr1 3\n")).is_err());
        assert!(Ploidy::from_symbol("3").is_none());
    }

    #[test]
    fn table_with_repeated_chromosome_fails() {
        let result = Karyotype::from_reader(std::io::Cursor::new("chr1 2\nchr1 1\n"));
        assert!(result.unwrap_err().to_string().contains("listed twice"));
    }

    #[test]
    fn empty_table_covers_nothing() {
        let karyotype = Karyotype::from_reader(std::io::Cursor::new("")).unwrap();
        assert!(karyotype.ploidy_of("chr1").is_err());
    }

    #[test]
    fn ploidy_maps_to_allele_count() {
        assert_eq!(Ploidy::Zero.num_alleles(), 0);
        assert_eq!(Ploidy::One.num_alleles(), 1);
        assert_eq!(Ploidy::Two.num_alleles(), 2);
    }
}
