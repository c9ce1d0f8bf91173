use crate::utils::{Error, Result};
use rust_htslib::bam::{self, Read};
use std::path::Path;

/// Reads the header of an indexed BAM.
pub fn read_bam_header(path: &Path) -> Result<bam::Header> {
    let reader = bam::IndexedReader::from_path(path)
        .map_err(|e| Error::Resource(format!("Could not open {}: {}", path.display(), e)))?;
    Ok(bam::Header::from_template(reader.header()))
}

/// A BAM of mapped reads names its contigs in SQ records; without them the
/// index cannot serve region queries.
pub fn header_names_contigs(header: &bam::Header) -> bool {
    header.to_hashmap().contains_key("SQ")
}

/// Resolves the sample name: a single SM tag across the read groups wins;
/// otherwise the reads file stem is used and a warning is logged.
pub fn resolve_sample_name(reads_path: &Path, header: &bam::Header) -> Result<String> {
    let mut names: Vec<String> = header
        .to_hashmap()
        .get("RG")
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| group.get("SM").cloned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();

    match names.as_slice() {
        [single] => return Ok(single.clone()),
        [] => log::warn!("Read groups carry no sample name; using the file name"),
        _ => log::warn!(
            "Read groups carry {} sample names; using the file name",
            names.len()
        ),
    }

    reads_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Resource(format!("Invalid reads file name: {}", reads_path.display()))
        })
}
