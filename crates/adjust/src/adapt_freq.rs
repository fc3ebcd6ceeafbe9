//! Frequency adaptation of values under a threshold.
//!
//! When a simulation has more values at or below `thresh` than the
//! reference (the dry-day bias of precipitation), quantile mapping cannot
//! correct it: every dry value maps to the same quantile. The excess dry
//! values are therefore replaced by uniform draws in `[thresh, pth]`, `pth`
//! being the reference value at the simulation's dry probability.

use rand::Rng;
use sdba_stats::{count_valid, ecdf, nanquantile};

/// Result of [`adapt_freq`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedFreq {
    sim_ad: Vec<f64>,
    pth: f64,
    dp0: f64,
}

impl AdaptedFreq {
    /// The frequency-adapted simulation.
    pub fn sim_ad(&self) -> &[f64] {
        &self.sim_ad
    }

    /// Consumes the result, returning the adapted simulation.
    pub fn into_sim_ad(self) -> Vec<f64> {
        self.sim_ad
    }

    /// Upper bound of the replacement draws; NaN when nothing was adapted.
    pub fn pth(&self) -> f64 {
        self.pth
    }

    /// Relative excess of values `<= thresh` in the simulation,
    /// `(P0_sim - P0_ref) / P0_sim`.
    pub fn dp0(&self) -> f64 {
        self.dp0
    }
}

/// Adapts the frequency of values `<= thresh` in `sim` to that of
/// `reference`.
///
/// Values whose percentile rank lies between `P0_ref` and `P0_sim` are
/// replaced, in order of position for ties. Nothing changes when the
/// simulation does not have an excess (`dP0 <= 0` or undefined). NaN stays
/// NaN.
pub fn adapt_freq<R: Rng + ?Sized>(
    reference: &[f64],
    sim: &[f64],
    thresh: f64,
    rng: &mut R,
) -> AdaptedFreq {
    let p0_sim = ecdf(sim, thresh);
    let p0_ref = ecdf(reference, thresh);
    let dp0 = (p0_sim - p0_ref) / p0_sim;

    if dp0.is_nan() || dp0 <= 0.0 {
        return AdaptedFreq {
            sim_ad: sim.to_vec(),
            pth: f64::NAN,
            dp0,
        };
    }

    let pth = nanquantile(reference, &[p0_sim])[0];
    let ranks = ordinal_pct(sim);
    let sim_ad = sim
        .iter()
        .zip(ranks.iter())
        .map(|(&v, &r)| {
            if r >= p0_ref && r <= p0_sim {
                thresh + (pth - thresh) * rng.random::<f64>()
            } else {
                v
            }
        })
        .collect();

    AdaptedFreq { sim_ad, pth, dp0 }
}

/// Percentile rank `r / n` with ties broken by position; NaN for NaN.
fn ordinal_pct(data: &[f64]) -> Vec<f64> {
    let n = count_valid(data) as f64;
    let mut order: Vec<usize> = (0..data.len()).filter(|&i| !data[i].is_nan()).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));
    let mut ranks = vec![f64::NAN; data.len()];
    for (k, &i) in order.iter().enumerate() {
        ranks[i] = (k + 1) as f64 / n;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dry_sim() -> (Vec<f64>, Vec<f64>) {
        let reference: Vec<f64> = (0..100)
            .map(|i| if i < 30 { 0.0 } else { (i - 29) as f64 })
            .collect();
        let sim: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 0.0 } else { (i / 2 + 1) as f64 })
            .collect();
        (reference, sim)
    }

    #[test]
    fn excess_dry_values_are_replaced() {
        let (reference, sim) = dry_sim();
        let mut rng = StdRng::seed_from_u64(42);
        let out = adapt_freq(&reference, &sim, 0.5, &mut rng);

        assert_relative_eq!(out.dp0(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(out.pth(), 20.5, epsilon = 1e-12);

        let dry = ecdf(out.sim_ad(), 0.5);
        assert!((dry - 0.3).abs() <= 0.011, "dry fraction {dry}");
        for (&before, &after) in sim.iter().zip(out.sim_ad()) {
            if before != after {
                assert_eq!(before, 0.0);
                assert!((0.5..=20.5).contains(&after));
            }
        }
    }

    #[test]
    fn no_excess_is_identity() {
        let (reference, sim) = dry_sim();
        let mut rng = StdRng::seed_from_u64(1);
        // reference is now the wetter series
        let out = adapt_freq(&sim, &reference, 0.5, &mut rng);
        assert_eq!(out.sim_ad(), reference.as_slice());
        assert!(out.pth().is_nan());
    }

    #[test]
    fn no_dry_values_is_identity() {
        let sim = vec![1.0, 2.0, 3.0];
        let mut rng = StdRng::seed_from_u64(1);
        let out = adapt_freq(&[1.0, 2.0], &sim, 0.5, &mut rng);
        assert_eq!(out.sim_ad(), sim.as_slice());
        assert!(out.dp0().is_nan());
    }

    #[test]
    fn nan_is_kept() {
        let (reference, mut sim) = dry_sim();
        sim[0] = f64::NAN;
        let mut rng = StdRng::seed_from_u64(7);
        let out = adapt_freq(&reference, &sim, 0.5, &mut rng);
        assert!(out.sim_ad()[0].is_nan());
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let (reference, sim) = dry_sim();
        let a = adapt_freq(&reference, &sim, 0.5, &mut StdRng::seed_from_u64(3));
        let b = adapt_freq(&reference, &sim, 0.5, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
