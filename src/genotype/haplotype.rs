//! Distribution of in-read repeat unit counts for one haplotype.

/// A haplotype with true unit count `num_units` observed through reads that
/// can contain at most `max_units_in_read` units. A molecule is sized
/// correctly with probability `prop_correct`; otherwise its observed count
/// deviates from the (read-capped) true count following a symmetric
/// geometric over nonzero deviations, truncated to `[0, max_units_in_read]`
/// and renormalised so the total mass is 1.
#[derive(Debug, Clone)]
pub struct StrHaplotype {
    num_units: i32,
    max_units_in_read: i32,
    prop_correct: f64,
    norm_factor: f64,
}

impl StrHaplotype {
    pub fn new(num_units: i32, max_units_in_read: i32, prop_correct: f64) -> Self {
        assert!(num_units >= 0);
        assert!(max_units_in_read >= 0);
        assert!(prop_correct > 0.0 && prop_correct <= 1.0);

        let center = num_units.min(max_units_in_read);
        let miss = 1.0 - prop_correct;
        let mut norm_factor = 0.0;
        for count in 0..=max_units_in_read {
            if count != center {
                norm_factor += miss.powi((count - center).abs());
            }
        }

        StrHaplotype {
            num_units,
            max_units_in_read,
            prop_correct,
            norm_factor,
        }
    }

    pub fn num_units(&self) -> i32 {
        self.num_units
    }

    /// The count a correctly-sized molecule shows in a read: the true count
    /// capped by what a read can contain.
    pub fn units_in_read(&self) -> i32 {
        self.num_units.min(self.max_units_in_read)
    }

    /// P(observed count = `count`).
    pub fn prop_molecules_at(&self, count: i32) -> f64 {
        if count < 0 || count > self.max_units_in_read {
            return 0.0;
        }
        let center = self.units_in_read();
        if count == center {
            // When no other count is possible, all mass sits here.
            if self.norm_factor == 0.0 {
                return 1.0;
            }
            return self.prop_correct;
        }
        if self.norm_factor == 0.0 {
            return 0.0;
        }
        let miss = 1.0 - self.prop_correct;
        (1.0 - self.prop_correct) * miss.powi((count - center).abs()) / self.norm_factor
    }

    /// P(observed count <= `upper_bound`).
    pub fn prop_molecules(&self, upper_bound: i32) -> f64 {
        let upper = upper_bound.min(self.max_units_in_read);
        (0..=upper).map(|count| self.prop_molecules_at(count)).sum()
    }

    /// P(observed count < `upper_bound`).
    pub fn prop_molecules_shorter_than(&self, upper_bound: i32) -> f64 {
        self.prop_molecules(upper_bound - 1)
    }

    /// P(observed count >= `lower_bound`).
    pub fn prop_molecules_at_least(&self, lower_bound: i32) -> f64 {
        1.0 - self.prop_molecules_shorter_than(lower_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_sums_to_one() {
        for (num_units, max_units, prop_correct) in
            [(10, 30, 0.97), (0, 30, 0.97), (30, 30, 0.8), (50, 30, 0.97), (5, 5, 0.5)]
        {
            let hap = StrHaplotype::new(num_units, max_units, prop_correct);
            let total: f64 = (0..=max_units).map(|k| hap.prop_molecules_at(k)).sum();
            assert!(
                (total - 1.0).abs() < 1e-9,
                "mass {} for ({}, {}, {})",
                total,
                num_units,
                max_units,
                prop_correct
            );
        }
    }

    #[test]
    fn correctly_sized_molecules_dominate() {
        let hap = StrHaplotype::new(10, 30, 0.97);
        assert!((hap.prop_molecules_at(10) - 0.97).abs() < 1e-12);
        assert!(hap.prop_molecules_at(9) < 0.03);
        assert!(hap.prop_molecules_at(11) < 0.03);
        assert!((hap.prop_molecules_at(9) - hap.prop_molecules_at(11)).abs() < 1e-12);
    }

    #[test]
    fn expanded_haplotype_saturates_at_read_capacity() {
        let hap = StrHaplotype::new(100, 30, 0.97);
        assert_eq!(hap.units_in_read(), 30);
        assert!((hap.prop_molecules_at(30) - 0.97).abs() < 1e-12);
        assert_eq!(hap.prop_molecules_at(31), 0.0);
    }

    #[test]
    fn cumulative_is_monotone_nondecreasing() {
        let hap = StrHaplotype::new(12, 30, 0.9);
        let mut prev = 0.0;
        for upper in 0..=30 {
            let current = hap.prop_molecules(upper);
            assert!(current + 1e-12 >= prev);
            prev = current;
        }
        assert!((hap.prop_molecules(30) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tail_is_monotone_nonincreasing() {
        let hap = StrHaplotype::new(12, 30, 0.9);
        let mut prev = 1.0;
        for lower in 0..=30 {
            let current = hap.prop_molecules_at_least(lower);
            assert!(current <= prev + 1e-12);
            prev = current;
        }
        assert!((hap.prop_molecules_at_least(0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_mass_is_difference_of_cumulatives() {
        let hap = StrHaplotype::new(7, 20, 0.85);
        for count in 0..=20 {
            let diff = hap.prop_molecules(count) - hap.prop_molecules_shorter_than(count);
            assert!((diff - hap.prop_molecules_at(count)).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_zero_capacity_concentrates_all_mass() {
        let hap = StrHaplotype::new(0, 0, 0.97);
        assert!((hap.prop_molecules_at(0) - 1.0).abs() < 1e-12);
        assert!((hap.prop_molecules(0) - 1.0).abs() < 1e-12);
    }
}
