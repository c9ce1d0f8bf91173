//! Defines the `VcfWriter` struct and associated functions for creating and
//! writing genotyping results to a VCF file.

use crate::locus::Locus;
use crate::utils::{Error, Result};
use crate::workflows::LocusResult;
use rust_htslib::{
    bam,
    bcf::{self, record::GenotypeAllele, Format},
};
use std::env;

/// Header lines defining the INFO and FORMAT fields for the VCF file.
const VCF_LINES: [&str; 11] = [
    r#"##INFO=<ID=TRID,Number=1,Type=String,Description="Tandem repeat ID">"#,
    r#"##INFO=<ID=END,Number=1,Type=Integer,Description="End position of the variant described in this record">"#,
    r#"##INFO=<ID=UNIT,Number=1,Type=String,Description="Repeat unit sequence">"#,
    r#"##INFO=<ID=REFCN,Number=1,Type=Integer,Description="Repeat unit count spelled by the reference">"#,
    r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
    r#"##FORMAT=<ID=AL,Number=.,Type=Integer,Description="Repeat unit count of each allele">"#,
    r#"##FORMAT=<ID=SD,Number=.,Type=Integer,Description="Number of spanning reads supporting each allele">"#,
    r#"##FORMAT=<ID=FD,Number=.,Type=Integer,Description="Number of flanking reads supporting each allele">"#,
    r#"##FORMAT=<ID=IRD,Number=.,Type=Integer,Description="Number of in-repeat reads supporting each allele">"#,
    r#"##FORMAT=<ID=LL,Number=1,Type=Float,Description="Log-likelihood of the genotype">"#,
    r#"##FORMAT=<ID=LM,Number=1,Type=Float,Description="Log-likelihood margin to the runner-up genotype">"#,
];

/// Writes one VCF record per genotyped locus.
pub struct VcfWriter {
    writer: bcf::Writer,
}

/// Assembles the VCF header: field definitions, contigs mirrored from the
/// BAM header, provenance lines, and the sample column.
fn build_vcf_header(sample_name: &str, bam_header: &bam::Header) -> bcf::header::Header {
    let mut header = bcf::header::Header::new();

    for line in VCF_LINES {
        header.push_record(line.as_bytes());
    }
    for (name, length) in contigs_of(bam_header) {
        header.push_record(format!(r#"##contig=<ID={},length={}>"#, name, length).as_bytes());
    }

    header.push_record(
        format!(
            "##{}Version={}",
            env!("CARGO_PKG_NAME"),
            *crate::cli::FULL_VERSION
        )
        .as_bytes(),
    );
    let command_line = env::args().collect::<Vec<_>>().join(" ");
    header.push_record(format!("##{}Command={}", env!("CARGO_PKG_NAME"), command_line).as_bytes());

    header.push_sample(sample_name.as_bytes());
    header
}

/// Contig names and lengths from the BAM SQ records, in header order;
/// records missing either tag are dropped.
fn contigs_of(bam_header: &bam::Header) -> Vec<(String, String)> {
    let header_map = bam_header.to_hashmap();
    let mut contigs = Vec::new();
    if let Some(records) = header_map.get("SQ") {
        for record in records {
            if let (Some(name), Some(length)) = (record.get("SN"), record.get("LN")) {
                contigs.push((name.clone(), length.clone()));
            }
        }
    }
    contigs
}

impl VcfWriter {
    pub fn new(output_path: &str, sample_name: &str, bam_header: &bam::Header) -> Result<VcfWriter> {
        let vcf_header = build_vcf_header(sample_name, bam_header);
        let writer = bcf::Writer::from_path(output_path, &vcf_header, false, Format::Vcf)
            .map_err(|e| Error::Resource(format!("Could not create VCF {}: {}", output_path, e)))?;
        Ok(VcfWriter { writer })
    }

    pub fn write(&mut self, locus: &Locus, results: &LocusResult) -> Result<()> {
        let mut record = self.writer.empty_record();

        let rid = self
            .writer
            .header()
            .name2rid(locus.region.contig.as_bytes())
            .map_err(|e| Error::Resource(format!("Unknown contig {}: {}", locus.region.contig, e)))?;
        record.set_rid(Some(rid));
        record.set_pos(locus.region.start as i64);

        let map_write_err = |e: rust_htslib::errors::Error| Error::Resource(e.to_string());

        record
            .push_info_string(b"TRID", &[locus.id.as_bytes()])
            .map_err(map_write_err)?;
        record
            .push_info_integer(b"END", &[locus.region.end as i32])
            .map_err(map_write_err)?;
        record
            .push_info_string(b"UNIT", &[locus.unit.as_bytes()])
            .map_err(map_write_err)?;
        record
            .push_info_integer(b"REFCN", &[locus.ref_unit_count])
            .map_err(map_write_err)?;

        match &results.call {
            Some(call) => {
                // The reference allele is the unit count spelled by the
                // reference region; every other count becomes a symbolic
                // <STRn> alternate, as in existing expansion pipelines.
                let mut alleles: Vec<Vec<u8>> = vec![b"N".to_vec()];
                let mut genotype = Vec::new();
                for allele in &call.gt {
                    if allele.num_units == locus.ref_unit_count {
                        genotype.push(GenotypeAllele::Unphased(0));
                        continue;
                    }
                    let symbol = format!("<STR{}>", allele.num_units).into_bytes();
                    let index = match alleles.iter().position(|a| *a == symbol) {
                        Some(index) => index,
                        None => {
                            alleles.push(symbol);
                            alleles.len() - 1
                        }
                    };
                    genotype.push(GenotypeAllele::Unphased(index as i32));
                }

                let allele_refs: Vec<&[u8]> = alleles.iter().map(|a| a.as_slice()).collect();
                record.set_alleles(&allele_refs).map_err(map_write_err)?;
                record.push_genotypes(&genotype).map_err(map_write_err)?;

                let counts: Vec<i32> = call.gt.iter().map(|a| a.num_units).collect();
                let spanning: Vec<i32> = call.gt.iter().map(|a| a.support.spanning as i32).collect();
                let flanking: Vec<i32> = call.gt.iter().map(|a| a.support.flanking as i32).collect();
                let in_repeat: Vec<i32> =
                    call.gt.iter().map(|a| a.support.in_repeat as i32).collect();

                record.push_format_integer(b"AL", &counts).map_err(map_write_err)?;
                record.push_format_integer(b"SD", &spanning).map_err(map_write_err)?;
                record.push_format_integer(b"FD", &flanking).map_err(map_write_err)?;
                record.push_format_integer(b"IRD", &in_repeat).map_err(map_write_err)?;
                record
                    .push_format_float(b"LL", &[call.loglik as f32])
                    .map_err(map_write_err)?;
                record
                    .push_format_float(b"LM", &[call.margin as f32])
                    .map_err(map_write_err)?;
            }
            None => {
                record.set_alleles(&[b"N"]).map_err(map_write_err)?;
                record
                    .push_genotypes(&[GenotypeAllele::UnphasedMissing])
                    .map_err(map_write_err)?;
            }
        }

        self.writer.write(&record).map_err(map_write_err)
    }
}
