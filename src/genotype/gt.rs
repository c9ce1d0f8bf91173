use arrayvec::ArrayVec;

/// Read support credited to one allele, by read category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlleleSupport {
    pub spanning: u32,
    pub flanking: u32,
    pub in_repeat: u32,
}

/// One called allele: a repeat unit count and the reads supporting it.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleCall {
    pub num_units: i32,
    pub support: AlleleSupport,
}

impl AlleleCall {
    pub fn new(num_units: i32) -> AlleleCall {
        AlleleCall {
            num_units,
            support: AlleleSupport::default(),
        }
    }
}

pub type Gt = ArrayVec<AlleleCall, 2>;

/// The selected genotype with its log-likelihood and the margin to the
/// runner-up genotype (zero when there is no runner-up).
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeCall {
    pub gt: Gt,
    pub loglik: f64,
    pub margin: f64,
}
