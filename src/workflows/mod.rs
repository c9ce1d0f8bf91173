mod str_locus;

pub use str_locus::{analyze_str, LocusResult, Params};
