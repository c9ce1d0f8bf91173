mod gt;
mod haplotype;
mod likelihood;
mod select;

pub use gt::{AlleleCall, AlleleSupport, GenotypeCall, Gt};
pub use haplotype::StrHaplotype;
pub use likelihood::{Evidence, GenotypeParams, StrGenotype};
pub use select::{enumerate_candidates, find_most_likely_genotype};
