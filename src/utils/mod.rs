mod bam_utils;
mod io_utils;
mod karyotype;
pub mod math;
mod region;
mod util;

pub use bam_utils::{header_names_contigs, read_bam_header, resolve_sample_name};
pub use io_utils::{create_writer, open_catalog_reader, open_genome_reader};
pub use karyotype::{Karyotype, Ploidy};
pub use region::GenomicRegion;
pub use util::{handle_error_and_exit, CancelToken, Error, Result};
