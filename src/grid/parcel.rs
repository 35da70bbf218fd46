//! Per-cell sediment composition: an active layer over the grain fractions
//! plus an ordered stack of buried strata (top first).
//!
//! All masses are volumes per unit area (metres of sediment). The active
//! layer is kept within `[thickness / 4, thickness * 1.5]` by moving whole
//! layers between the active layer and the strata, so maintenance never
//! creates or destroys tracked mass. The only exception is recruitment of
//! untracked substrate when the caller reports material below the tracked
//! column.

use serde::{Deserialize, Serialize};

/// Transfers below this amount are ignored.
const MASS_EPSILON: f64 = 1e-12;

/// Composition record for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    /// Active-layer mass per fraction.
    pub active: Vec<f64>,
    /// Buried strata, top first. Each entry has one mass per fraction.
    pub strata: Vec<Vec<f64>>,
}

/// Sum of the non-negative entries of `masses`.
#[inline]
pub fn positive_total(masses: &[f64]) -> f64 {
    masses.iter().filter(|m| **m > 0.0).sum()
}

impl Parcel {
    /// Empty parcel over `fractions` grain classes.
    pub fn empty(fractions: usize) -> Self {
        Self {
            active: vec![0.0; fractions],
            strata: Vec::new(),
        }
    }

    /// Parcel filled with the reference composition: an active layer of
    /// `thickness` and `layers` strata of the same thickness.
    pub fn with_reference(thickness: f64, reference: &[f64], layers: usize) -> Self {
        let layer: Vec<f64> = reference.iter().map(|p| p * thickness).collect();
        Self {
            active: layer.clone(),
            strata: vec![layer; layers],
        }
    }

    #[inline]
    pub fn fractions(&self) -> usize {
        self.active.len()
    }

    /// Total active-layer mass (negative entries ignored).
    #[inline]
    pub fn active_total(&self) -> f64 {
        positive_total(&self.active)
    }

    /// Total tracked mass including strata.
    pub fn total(&self) -> f64 {
        self.active_total() + self.strata.iter().map(|s| positive_total(s)).sum::<f64>()
    }

    /// Per-fraction tracked mass including strata.
    pub fn column_masses(&self) -> Vec<f64> {
        let mut out: Vec<f64> = self.active.iter().map(|m| m.max(0.0)).collect();
        for layer in &self.strata {
            for (o, m) in out.iter_mut().zip(layer) {
                *o += m.max(0.0);
            }
        }
        out
    }

    /// Adds `amount` of material with `composition` proportions to the
    /// active layer.
    pub fn deposit(&mut self, amount: f64, composition: &[f64]) {
        if amount <= 0.0 {
            return;
        }
        for (a, p) in self.active.iter_mut().zip(composition) {
            *a += amount * p;
        }
    }

    /// Moves the top stratum into the active layer. Returns false when the
    /// stack is empty.
    pub fn promote_top(&mut self) -> bool {
        if self.strata.is_empty() {
            return false;
        }
        let layer = self.strata.remove(0);
        for (a, m) in self.active.iter_mut().zip(layer) {
            *a += m;
        }
        true
    }

    /// Buries `thickness` of the active layer as a new top stratum, keeping
    /// the active proportions. The deepest strata are merged when the stack
    /// would exceed `max_layers`.
    fn demote(&mut self, thickness: f64, max_layers: usize) {
        let total = self.active_total();
        if total <= 0.0 {
            return;
        }
        let coeff = (thickness / total).min(1.0);
        let mut layer = vec![0.0; self.active.len()];
        for (l, a) in layer.iter_mut().zip(self.active.iter_mut()) {
            if *a > 0.0 {
                *l = *a * coeff;
                *a -= *l;
            }
        }
        self.strata.insert(0, layer);
        while max_layers > 0 && self.strata.len() > max_layers {
            if let Some(bottom) = self.strata.pop() {
                if let Some(above) = self.strata.last_mut() {
                    for (a, b) in above.iter_mut().zip(bottom) {
                        *a += b;
                    }
                }
            }
        }
    }

    /// Restores the active layer to `[thickness / 4, thickness * 1.5]`.
    ///
    /// Excess is buried one layer at a time; a deficit is filled by promoting
    /// strata, then by recruiting up to `untracked` metres of substrate at
    /// the `reference` composition. A second call with the same arguments
    /// is a no-op.
    pub fn maintain(&mut self, thickness: f64, reference: &[f64], max_layers: usize, untracked: f64) {
        if thickness <= 0.0 {
            return;
        }
        let mut untracked = untracked.max(0.0);
        loop {
            let total = self.active_total();
            if total > thickness * 1.5 {
                self.demote(thickness, max_layers);
                continue;
            }
            if total < thickness * 0.25 {
                if self.promote_top() {
                    continue;
                }
                if untracked > MASS_EPSILON {
                    let recruit = untracked.min(thickness);
                    self.deposit(recruit, reference);
                    untracked -= recruit;
                    continue;
                }
            }
            break;
        }
    }

    /// Moves `amount` of sediment from `self` into `dest`, taking fractions
    /// in proportion to the active layer and promoting strata as the active
    /// layer empties. Returns the mass actually moved, which is less than
    /// `amount` only when the tracked column is exhausted.
    pub fn give_to(&mut self, dest: &mut Parcel, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let mut remaining = amount;
        loop {
            let avail = self.active_total();
            if avail > 0.0 {
                let take = remaining.min(avail);
                let scale = take / avail;
                for (src, dst) in self.active.iter_mut().zip(dest.active.iter_mut()) {
                    if *src > 0.0 {
                        let t = *src * scale;
                        *src -= t;
                        *dst += t;
                    }
                }
                remaining -= take;
            }
            if remaining <= MASS_EPSILON || !self.promote_top() {
                break;
            }
        }
        amount - remaining.max(0.0)
    }

    /// Median grain diameter of the active layer, interpolated in log space
    /// over the cumulative distribution. Returns 0 for an empty layer.
    pub fn d50(&self, diameters: &[f64]) -> f64 {
        let total = self.active_total();
        if total < 1e-7 || diameters.is_empty() {
            return 0.0;
        }
        let half = total * 0.5;
        let mut cum = 0.0;
        for (i, (&m, &d)) in self.active.iter().zip(diameters).enumerate() {
            let prev = cum;
            cum += m.max(0.0);
            if cum >= half {
                let hi = d.ln();
                let lo = if i == 0 { hi } else { diameters[i - 1].ln() };
                let span = cum - prev;
                if span <= 0.0 {
                    return d;
                }
                return (hi - (hi - lo) * (cum - half) / span).exp();
            }
        }
        diameters[diameters.len() - 1]
    }

    /// Proportion of the active layer finer than `sand_limit` (metres).
    pub fn sand_fraction(&self, diameters: &[f64], sand_limit: f64) -> f64 {
        let total = self.active_total();
        if total < 1e-4 {
            return 0.0;
        }
        let sand: f64 = self
            .active
            .iter()
            .zip(diameters)
            .filter(|(_, d)| **d <= sand_limit)
            .map(|(m, _)| m.max(0.0))
            .sum();
        sand / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const REFERENCE: [f64; 3] = [0.5, 0.3, 0.2];

    fn random_parcel(rng: &mut ChaCha8Rng) -> Parcel {
        let active = (0..3).map(|_| rng.random::<f64>() * 0.2).collect();
        let layers = rng.random_range(0..4);
        let strata = (0..layers)
            .map(|_| (0..3).map(|_| rng.random::<f64>() * 0.1).collect())
            .collect();
        Parcel { active, strata }
    }

    fn sum_masses(a: &Parcel, b: &Parcel) -> Vec<f64> {
        a.column_masses()
            .iter()
            .zip(b.column_masses())
            .map(|(x, y)| x + y)
            .collect()
    }

    #[test]
    fn test_give_to_conserves_per_fraction_mass() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let mut src = random_parcel(&mut rng);
            let mut dst = random_parcel(&mut rng);
            let amount = rng.random::<f64>() * src.total() * 1.2 - 0.05;
            let before = sum_masses(&src, &dst);
            let moved = src.give_to(&mut dst, amount);
            let after = sum_masses(&src, &dst);
            for (b, a) in before.iter().zip(&after) {
                assert!((b - a).abs() < 1e-10, "fraction mass drifted: {b} -> {a}");
            }
            assert!(moved <= amount.max(0.0) + 1e-12);
            assert!(src.active.iter().all(|m| *m >= 0.0));
        }
    }

    #[test]
    fn test_give_to_zero_and_negative_amounts_are_noops() {
        let mut src = Parcel::with_reference(0.2, &REFERENCE, 2);
        let mut dst = Parcel::empty(3);
        let snapshot = (src.clone(), dst.clone());
        assert_eq!(src.give_to(&mut dst, 0.0), 0.0);
        assert_eq!(src.give_to(&mut dst, -1.0), 0.0);
        assert_eq!((src, dst), snapshot);
    }

    #[test]
    fn test_give_to_from_empty_source_moves_nothing() {
        let mut src = Parcel::empty(3);
        let mut dst = Parcel::with_reference(0.2, &REFERENCE, 0);
        let before = dst.clone();
        assert_eq!(src.give_to(&mut dst, 0.5), 0.0);
        assert_eq!(dst, before);
    }

    #[test]
    fn test_give_to_ignores_negative_source_entries() {
        let mut src = Parcel {
            active: vec![-0.1, 0.2, 0.0],
            strata: Vec::new(),
        };
        let mut dst = Parcel::empty(3);
        let moved = src.give_to(&mut dst, 1.0);
        assert!((moved - 0.2).abs() < 1e-12);
        assert_eq!(src.active[0], -0.1);
        assert!((dst.active[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_give_to_promotes_strata_when_active_runs_out() {
        let mut src = Parcel::with_reference(0.2, &REFERENCE, 3);
        let mut dst = Parcel::empty(3);
        let moved = src.give_to(&mut dst, 0.5);
        assert!((moved - 0.5).abs() < 1e-10);
        assert!(src.strata.len() < 3);
        assert!((dst.active_total() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_maintain_bounds_and_idempotence() {
        let thickness = 0.2;
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..300 {
            let mut p = Parcel {
                active: (0..3).map(|_| rng.random::<f64>() * 1.5).collect(),
                strata: (0..rng.random_range(0..5))
                    .map(|_| (0..3).map(|_| rng.random::<f64>() * 0.1).collect())
                    .collect(),
            };
            let before = p.column_masses();
            p.maintain(thickness, &REFERENCE, 10, 0.0);
            let total = p.active_total();
            if p.total() >= thickness * 0.25 {
                assert!(total >= thickness * 0.25 - 1e-12, "active too thin: {total}");
            }
            assert!(total <= thickness * 1.5 + 1e-12, "active too thick: {total}");
            for (b, a) in before.iter().zip(p.column_masses()) {
                assert!((b - a).abs() < 1e-10);
            }
            let once = p.clone();
            p.maintain(thickness, &REFERENCE, 10, 0.0);
            assert_eq!(p, once);
        }
    }

    #[test]
    fn test_maintain_merges_deepest_strata() {
        let mut p = Parcel {
            active: vec![2.0, 1.0, 1.0],
            strata: Vec::new(),
        };
        let before = p.total();
        p.maintain(0.2, &REFERENCE, 3, 0.0);
        assert!(p.strata.len() <= 3);
        assert!((p.total() - before).abs() < 1e-10);
    }

    #[test]
    fn test_maintain_recruits_untracked_substrate() {
        let mut p = Parcel::empty(3);
        p.maintain(0.2, &REFERENCE, 10, 1.0);
        assert!((p.active_total() - 0.2).abs() < 1e-12);
        assert!((p.active[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_d50_uniform_single_fraction() {
        let diameters = [0.001, 0.002, 0.004];
        let p = Parcel {
            active: vec![0.0, 1.0, 0.0],
            strata: Vec::new(),
        };
        let d = p.d50(&diameters);
        assert!(d > 0.001 && d <= 0.002, "d50 was {d}");
        assert_eq!(Parcel::empty(3).d50(&diameters), 0.0);
    }

    #[test]
    fn test_sand_fraction() {
        let diameters = [0.0005, 0.001, 0.004];
        let p = Parcel {
            active: vec![0.1, 0.1, 0.2],
            strata: Vec::new(),
        };
        assert!((p.sand_fraction(&diameters, 0.002) - 0.5).abs() < 1e-12);
    }
}
