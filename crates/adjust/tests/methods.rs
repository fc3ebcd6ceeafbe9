use approx::assert_relative_eq;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Gamma};
use sdba_adjust::{
    AdjustInput, Adjustment, DqmConfig, ExtremeConfig, LociConfig, NpdfConfig, QuantileConfig,
    ScalingConfig, TrainInput,
};
use sdba_group::{GroupProp, Grouper, Kind, Series, TimeAxis};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn axis(start_year: i32, n: usize) -> TimeAxis {
    TimeAxis::daily(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), n)
}

fn single(start_year: i32, values: Vec<f64>) -> Series {
    let n = values.len();
    Series::from_vec(axis(start_year, n), values).unwrap()
}

/// `n_loc` rows of uniform noise on `[lo, hi)` plus a location offset.
fn uniform_rows(rng: &mut StdRng, n_loc: usize, n: usize, lo: f64, hi: f64) -> Vec<Vec<f64>> {
    (0..n_loc)
        .map(|l| (0..n).map(|_| l as f64 + rng.random_range(lo..hi)).collect())
        .collect()
}

/// Daily precipitation-like rows: every third day dry, Gamma otherwise.
fn wet_rows(rng: &mut StdRng, n_loc: usize, n: usize, scale: f64) -> Vec<Vec<f64>> {
    let gamma = Gamma::new(1.2, scale).unwrap();
    (0..n_loc)
        .map(|_| {
            (0..n)
                .map(|i| if i % 3 == 0 { 0.0 } else { gamma.sample(rng) })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Small worked examples
// ---------------------------------------------------------------------------
#[test]
fn eqm_identical_ref_and_hist_leaves_sim_unchanged() {
    let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let input = TrainInput::new(single(2000, values.clone()), single(2000, values)).unwrap();
    let trained = Adjustment::Eqm(QuantileConfig::new()).train(&input).unwrap();
    let out = trained
        .adjust(&AdjustInput::new(single(2050, vec![6.0, 7.0, 8.0])))
        .unwrap();
    assert_eq!(out.scen().row(0), vec![6.0, 7.0, 8.0]);
}

#[test]
fn multiplicative_scaling_doubles() {
    let input = TrainInput::new(
        single(2000, vec![2.0, 4.0, 6.0]),
        single(2000, vec![1.0, 2.0, 3.0]),
    )
    .unwrap();
    let method = Adjustment::Scaling(ScalingConfig::new().with_kind(Kind::Multiplicative));
    let out = method
        .train(&input)
        .unwrap()
        .adjust(&AdjustInput::new(single(2050, vec![1.0, 2.0, 3.0])))
        .unwrap();
    for (s, e) in out.scen().row(0).iter().zip([2.0, 4.0, 6.0]) {
        assert_relative_eq!(*s, e, epsilon = 1e-12);
    }
}

// ---------------------------------------------------------------------------
// 2. Every method end to end through the dispatching enum
// ---------------------------------------------------------------------------
#[test]
fn every_method_runs_end_to_end() {
    let n = 3 * 365;
    let mut rng = StdRng::seed_from_u64(2024);
    let reference = Series::from_rows(axis(1990, n), &wet_rows(&mut rng, 2, n, 5.0)).unwrap();
    let hist = Series::from_rows(axis(1990, n), &wet_rows(&mut rng, 2, n, 3.0)).unwrap();
    let sim = Series::from_rows(axis(2050, n), &wet_rows(&mut rng, 2, n, 3.5)).unwrap();
    let input = TrainInput::new(reference, hist).unwrap();
    let month = Grouper::plain(GroupProp::Month);

    let methods = [
        Adjustment::Scaling(ScalingConfig::new().with_group(month)),
        Adjustment::Eqm(QuantileConfig::new().with_group(month).with_seed(1)),
        Adjustment::Dqm(DqmConfig::new()),
        Adjustment::Qdm(QuantileConfig::new().with_kind(Kind::Multiplicative)),
        Adjustment::Loci(LociConfig::new(1.0).with_group(month)),
        Adjustment::NpdfT(NpdfConfig::new().with_n_iter(5).with_seed(3)),
        Adjustment::ExtremeValues(ExtremeConfig::new(1.0)),
    ];
    for method in methods {
        let trained = method.train(&input).unwrap();
        assert_eq!(trained.name(), method.name());
        assert!(!trained.to_dataset().is_empty());
        let out = trained.adjust(&AdjustInput::new(sim.clone())).unwrap();
        assert_eq!(out.scen().time(), sim.time());
        assert_eq!(out.scen().n_loc(), 2);
        let finite = out.scen().values().iter().filter(|v| v.is_finite()).count();
        assert!(finite > 0, "{method} produced no finite value");
    }
}

#[test]
fn qdm_reports_ranks_and_dqm_reports_trend() {
    let n = 2 * 365;
    let mut rng = StdRng::seed_from_u64(8);
    let reference = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 1, n, 0.0, 4.0)).unwrap();
    let hist = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 1, n, 0.0, 2.0)).unwrap();
    let sim = Series::from_rows(axis(2050, n), &uniform_rows(&mut rng, 1, n, 1.0, 3.0)).unwrap();
    let input = TrainInput::new(reference, hist).unwrap();

    let qdm = Adjustment::Qdm(QuantileConfig::new())
        .train(&input)
        .unwrap()
        .adjust(&AdjustInput::new(sim.clone()))
        .unwrap();
    let sim_q = qdm.sim_q().unwrap();
    assert!(sim_q.values().iter().all(|q| (0.0..=1.0).contains(q)));
    assert!(qdm.trend().is_none());

    let dqm = Adjustment::Dqm(DqmConfig::new())
        .train(&input)
        .unwrap()
        .adjust(&AdjustInput::new(sim))
        .unwrap();
    assert!(dqm.trend().is_some());
    assert!(dqm.sim_q().is_none());
}

// ---------------------------------------------------------------------------
// 3. Invariants
// ---------------------------------------------------------------------------
#[test]
fn loci_output_is_non_negative() {
    let n = 2 * 365;
    let mut rng = StdRng::seed_from_u64(5);
    let reference = Series::from_rows(axis(1990, n), &wet_rows(&mut rng, 3, n, 6.0)).unwrap();
    let hist = Series::from_rows(axis(1990, n), &wet_rows(&mut rng, 3, n, 2.0)).unwrap();
    let sim = Series::from_rows(axis(2050, n), &wet_rows(&mut rng, 3, n, 2.5)).unwrap();
    let out = Adjustment::Loci(LociConfig::new(0.5))
        .train(&TrainInput::new(reference, hist).unwrap())
        .unwrap()
        .adjust(&AdjustInput::new(sim))
        .unwrap();
    assert!(out.scen().values().iter().all(|&v| v >= 0.0));
}

#[test]
fn extremes_leave_values_below_threshold_untouched() {
    let n = 10 * 365;
    let mut rng = StdRng::seed_from_u64(99);
    let draw = |rng: &mut StdRng, mean: f64| -> Vec<f64> {
        let exp = Exp::new(1.0 / mean).unwrap();
        (0..n).map(|_| exp.sample(rng)).collect()
    };
    let reference = single(1990, draw(&mut rng, 6.0));
    let hist = single(1990, draw(&mut rng, 4.0));
    let sim_values = draw(&mut rng, 4.5);
    let sim = single(2050, sim_values.clone());

    let trained = Adjustment::ExtremeValues(ExtremeConfig::new(1.0))
        .train(&TrainInput::new(reference, hist).unwrap())
        .unwrap();
    let thresh = trained.to_dataset().get("thresh").unwrap().data()[[0]];
    let out = trained.adjust(&AdjustInput::new(sim)).unwrap();
    for (s, v) in out.scen().row(0).iter().zip(&sim_values) {
        if *v <= thresh {
            assert_eq!(s, v);
        }
    }
}

#[test]
fn chunked_training_matches_whole() {
    let n = 2 * 365;
    let mut rng = StdRng::seed_from_u64(17);
    let reference = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 5, n, 0.0, 3.0)).unwrap();
    let hist = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 5, n, 0.0, 2.0)).unwrap();
    let sim = Series::from_rows(axis(2050, n), &uniform_rows(&mut rng, 5, n, 0.5, 2.5)).unwrap();
    let input = TrainInput::new(reference, hist).unwrap();
    let month = Grouper::plain(GroupProp::Month);

    let pairs = [
        (
            Adjustment::Eqm(QuantileConfig::new().with_group(month)),
            Adjustment::Eqm(QuantileConfig::new().with_group(month).with_chunk_size(2)),
        ),
        (
            Adjustment::Scaling(ScalingConfig::new().with_group(month)),
            Adjustment::Scaling(ScalingConfig::new().with_group(month).with_chunk_size(1)),
        ),
    ];
    for (whole, chunked) in pairs {
        let a = whole.train(&input).unwrap();
        let b = chunked.train(&input).unwrap();
        assert_eq!(a.to_dataset().get("af").unwrap(), b.to_dataset().get("af").unwrap());
        let sa = a.adjust(&AdjustInput::new(sim.clone())).unwrap();
        let sb = b.adjust(&AdjustInput::new(sim.clone())).unwrap();
        assert_eq!(sa.scen(), sb.scen());
    }
}

#[test]
fn npdf_is_reproducible_with_seed() {
    let n = 400;
    let mut rng = StdRng::seed_from_u64(31);
    let reference = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 3, n, 0.0, 1.0)).unwrap();
    let hist = Series::from_rows(axis(1990, n), &uniform_rows(&mut rng, 3, n, 0.0, 2.0)).unwrap();
    let sim = Series::from_rows(axis(2050, n), &uniform_rows(&mut rng, 3, n, 0.0, 2.0)).unwrap();
    let input = TrainInput::new(reference, hist).unwrap();
    let method = Adjustment::NpdfT(NpdfConfig::new().with_n_iter(4).with_seed(7));

    let a = method.train(&input).unwrap();
    let b = method.train(&input).unwrap();
    assert_eq!(a, b);
    let sa = a.adjust(&AdjustInput::new(sim.clone())).unwrap();
    let sb = b.adjust(&AdjustInput::new(sim)).unwrap();
    assert_eq!(sa.scen(), sb.scen());
}
