use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdba_group::{GroupProp, Grouper, Kind, Series, TimeAxis, broadcast, group, ungroup};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Random two-location series over `n_days` starting in a leap year, with a
/// sprinkling of missing values.
fn random_series(n_days: usize, seed: u64) -> Series {
    let mut rng = StdRng::seed_from_u64(seed);
    let time = TimeAxis::daily(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), n_days);
    let rows: Vec<Vec<f64>> = (0..2)
        .map(|_| {
            (0..n_days)
                .map(|_| {
                    if rng.random_bool(0.05) {
                        f64::NAN
                    } else {
                        rng.random_range(-10.0..30.0)
                    }
                })
                .collect()
        })
        .collect();
    Series::from_rows(time, &rows).unwrap()
}

/// NaN-aware element-wise equality.
fn same(a: &Series, b: &Series) -> bool {
    a.time() == b.time()
        && a
            .values()
            .iter()
            .zip(b.values().iter())
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
}

// ---------------------------------------------------------------------------
// 1. group / ungroup round trip over every grouper
// ---------------------------------------------------------------------------
#[test]
fn round_trip_all_groupers() {
    let series = random_series(3 * 365 + 1, 7);
    let groupers = [
        Grouper::none(),
        Grouper::plain(GroupProp::Month),
        Grouper::new(GroupProp::Month, 3).unwrap(),
        Grouper::plain(GroupProp::Season),
        Grouper::plain(GroupProp::DayOfYear),
        Grouper::new(GroupProp::DayOfYear, 31).unwrap(),
    ];
    for grouper in groupers {
        let (view, grouping) = group(&series, grouper);
        let back = ungroup(&view, &grouping).unwrap();
        assert!(same(&back, &series), "round trip failed for {grouper:?}");
    }
}

// ---------------------------------------------------------------------------
// 2. ungroup ignores edits to padding slots
// ---------------------------------------------------------------------------
#[test]
fn padding_edits_are_dropped() {
    let series = random_series(400, 11);
    let grouper = Grouper::new(GroupProp::DayOfYear, 7).unwrap();
    let (mut view, grouping) = group(&series, grouper);

    let (n_loc, n_groups, width) = view.data().dim();
    for l in 0..n_loc {
        for g in 0..n_groups {
            for slot in 0..width {
                if grouping.source_index(g, slot).is_none() {
                    view.data_mut()[[l, g, slot]] = 1e9;
                }
            }
        }
    }
    assert!(same(&ungroup(&view, &grouping).unwrap(), &series));
}

// ---------------------------------------------------------------------------
// 3. windowed sample contains the neighbours of every member
// ---------------------------------------------------------------------------
#[test]
fn window_collects_neighbours() {
    let time = TimeAxis::daily(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(), 730);
    let values: Vec<f64> = (0..730).map(|i| i as f64).collect();
    let series = Series::from_vec(time, values.clone()).unwrap();
    let grouper = Grouper::new(GroupProp::DayOfYear, 5).unwrap();
    let (_, grouping) = group(&series, grouper);

    // Day 100 (label 99) of both years and their +/-2 neighbours.
    let mut sample = grouping.sample(&values, 99);
    sample.sort_by(f64::total_cmp);
    assert_eq!(
        sample,
        vec![97.0, 98.0, 99.0, 100.0, 101.0, 462.0, 463.0, 464.0, 465.0, 466.0]
    );
}

// ---------------------------------------------------------------------------
// 4. broadcast of a per-group correction then its inverse restores data
// ---------------------------------------------------------------------------
#[test]
fn broadcast_correction_inverse() {
    let series = random_series(365, 3);
    let grouper = Grouper::plain(GroupProp::Month);
    let factor = ndarray::Array2::from_shape_fn((2, 12), |(l, g)| 0.5 + l as f64 + g as f64 / 10.0);

    for kind in [Kind::Additive, Kind::Multiplicative] {
        let af = broadcast(factor.view(), series.time(), &grouper, true).unwrap();
        let mut corrected = series.values().to_owned();
        corrected.zip_mut_with(&af, |v, &f| *v = kind.apply(*v, f));
        corrected.zip_mut_with(&af, |v, &f| *v = kind.apply(*v, kind.invert(f)));
        for (a, b) in corrected.iter().zip(series.values().iter()) {
            if b.is_nan() {
                assert!(a.is_nan());
            } else {
                assert!((a - b).abs() < 1e-9, "{kind:?}: {a} vs {b}");
            }
        }
    }
}
