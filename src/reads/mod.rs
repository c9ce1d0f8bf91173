mod classify;
mod read;

pub use classify::{classify_read, LocusNodes, ReadClass};
pub use read::{MateInfo, ShortRead};
