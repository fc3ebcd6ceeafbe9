//! Pure conversion functions: TOML config structs -> crate API config types.

use anyhow::{Context, Result, bail};

use sdba_adjust::{
    Adjustment, DqmConfig, ExtremeConfig, Extrapolation, Interp, LociConfig, NpdfConfig,
    QuantileConfig, ScalingConfig, TailDist,
};
use sdba_group::{GroupProp, Grouper, Kind};
use sdba_io::{Compression, WriterConfig};

use crate::config::*;

/// Parses an interpolation name into the corresponding enum variant.
pub fn parse_interp(s: &str) -> Result<Interp> {
    match s.to_lowercase().as_str() {
        "nearest" => Ok(Interp::Nearest),
        "linear" => Ok(Interp::Linear),
        other => bail!("unknown interpolation: {other:?} (expected nearest or linear)"),
    }
}

/// Parses an extrapolation policy name into the corresponding enum variant.
pub fn parse_extrapolation(s: &str) -> Result<Extrapolation> {
    match s.to_lowercase().as_str() {
        "constant" => Ok(Extrapolation::Constant),
        "nan" => Ok(Extrapolation::Nan),
        other => bail!("unknown extrapolation: {other:?} (expected constant or nan)"),
    }
}

/// Builds a [`Grouper`] from a group name and a window size.
pub fn parse_grouper(group: &str, window: usize) -> Result<Grouper> {
    let prop: GroupProp = group.parse()?;
    Ok(Grouper::new(prop, window)?)
}

/// Parses a correction kind (`+` or `*`).
pub fn parse_kind(s: &str) -> Result<Kind> {
    Ok(s.parse()?)
}

fn with_quantile_grid(
    config: QuantileConfig,
    nquantiles: Option<usize>,
    quantiles: Option<&[f64]>,
) -> Result<QuantileConfig> {
    match (nquantiles, quantiles) {
        (Some(_), Some(_)) => bail!("set at most one of nquantiles or quantiles"),
        (Some(n), None) => Ok(config.with_nquantiles(n)),
        (None, Some(q)) => Ok(config.with_quantiles(q.to_vec())),
        (None, None) => Ok(config),
    }
}

fn build_quantile_config(q: &QuantileToml, seed: Option<u64>) -> Result<QuantileConfig> {
    let mut cfg = QuantileConfig::new()
        .with_group(parse_grouper(&q.group, q.window)?)
        .with_kind(parse_kind(&q.correction)?)
        .with_interp(parse_interp(&q.interp)?)
        .with_extrapolation(parse_extrapolation(&q.extrapolation)?);
    cfg = with_quantile_grid(cfg, q.nquantiles, q.quantiles.as_deref())?;
    if let Some(t) = q.adapt_freq_thresh {
        cfg = cfg.with_adapt_freq_thresh(t);
    }
    if let Some(n) = q.chunk_size {
        cfg = cfg.with_chunk_size(n);
    }
    if let Some(s) = seed {
        cfg = cfg.with_seed(s);
    }
    Ok(cfg)
}

fn build_dqm_config(d: &DqmToml, seed: Option<u64>) -> Result<DqmConfig> {
    let quantile = build_quantile_config(
        &QuantileToml {
            group: d.group.clone(),
            window: d.window,
            correction: d.correction.clone(),
            nquantiles: d.nquantiles,
            quantiles: d.quantiles.clone(),
            adapt_freq_thresh: d.adapt_freq_thresh,
            interp: d.interp.clone(),
            extrapolation: d.extrapolation.clone(),
            chunk_size: d.chunk_size,
        },
        seed,
    )?;
    Ok(DqmConfig::new()
        .with_quantile(quantile)
        .with_detrend_degree(d.detrend_degree)
        .with_preserve_mean(d.preserve_mean))
}

fn build_npdf_config(n: &NpdfToml, seed: Option<u64>) -> Result<NpdfConfig> {
    let mut cfg = NpdfConfig::new()
        .with_n_iter(n.n_iter)
        .with_group(parse_grouper(&n.group, n.window)?)
        .with_interp(parse_interp(&n.interp)?)
        .with_extrapolation(parse_extrapolation(&n.extrapolation)?)
        .with_base_kind(parse_kind(&n.base_correction)?);
    cfg = match (n.nquantiles, &n.quantiles) {
        (Some(_), Some(_)) => bail!("set at most one of nquantiles or quantiles"),
        (Some(k), None) => cfg.with_nquantiles(k),
        (None, Some(q)) => cfg.with_quantiles(q.clone()),
        (None, None) => cfg,
    };
    if let Some(s) = seed {
        cfg = cfg.with_seed(s);
    }
    Ok(cfg)
}

fn build_extreme_config(e: &ExtremeToml) -> Result<ExtremeConfig> {
    let dist: TailDist = e.dist.parse()?;
    let mut cfg = ExtremeConfig::new(e.cluster_thresh)
        .with_q_thresh(e.q_thresh)
        .with_dist(dist)
        .with_frac(e.frac)
        .with_power(e.power)
        .with_interp(parse_interp(&e.interp)?)
        .with_extrapolation(parse_extrapolation(&e.extrapolation)?);
    if let Some(n) = e.chunk_size {
        cfg = cfg.with_chunk_size(n);
    }
    Ok(cfg)
}

/// Builds the [`Adjustment`] described by the `[method]` section.
///
/// The seed feeds the frequency adaptation of the quantile methods and the
/// rotations of NpdfT. The resulting configuration is validated.
pub fn build_adjustment(method: &MethodToml, seed: Option<u64>) -> Result<Adjustment> {
    let adjustment = match method {
        MethodToml::Scaling(s) => {
            let mut cfg = ScalingConfig::new()
                .with_group(parse_grouper(&s.group, s.window)?)
                .with_kind(parse_kind(&s.correction)?)
                .with_interp(parse_interp(&s.interp)?);
            if let Some(n) = s.chunk_size {
                cfg = cfg.with_chunk_size(n);
            }
            Adjustment::Scaling(cfg)
        }
        MethodToml::Eqm(q) => Adjustment::Eqm(build_quantile_config(q, seed)?),
        MethodToml::Dqm(d) => Adjustment::Dqm(build_dqm_config(d, seed)?),
        MethodToml::Qdm(q) => Adjustment::Qdm(build_quantile_config(q, seed)?),
        MethodToml::Loci(l) => {
            let mut cfg = LociConfig::new(l.thresh)
                .with_group(parse_grouper(&l.group, l.window)?)
                .with_interp(parse_interp(&l.interp)?);
            if let Some(n) = l.chunk_size {
                cfg = cfg.with_chunk_size(n);
            }
            Adjustment::Loci(cfg)
        }
        MethodToml::Npdft(n) => Adjustment::NpdfT(build_npdf_config(n, seed)?),
        MethodToml::Extremes(e) => Adjustment::ExtremeValues(build_extreme_config(e)?),
    };
    adjustment
        .validate()
        .with_context(|| format!("invalid [method] configuration for {adjustment}"))?;
    Ok(adjustment)
}

/// Builds a [`WriterConfig`] from the TOML I/O configuration.
pub fn build_writer_config(io: &IoConfig) -> Result<WriterConfig> {
    let compression: Compression = io.compression.parse()?;
    Ok(WriterConfig::default()
        .with_compression(compression)
        .with_row_group_size(io.row_group_size))
}
