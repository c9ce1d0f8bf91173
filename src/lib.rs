pub mod cli;
pub mod commands;
pub mod genotype;
pub mod graphs;
pub mod locus;
pub mod reads;
pub mod utils;
pub mod workflows;
pub mod writers;
