use std::path::PathBuf;

use serde::Deserialize;

/// Top-level sdba configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdbaConfig {
    /// Global RNG seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// I/O settings.
    #[serde(default)]
    pub io: IoConfig,

    /// Adjustment method and its settings.
    pub method: MethodToml,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    /// Training table with `time`, `ref_<var>` and `hist_<var>` columns.
    pub train: Option<PathBuf>,
    /// Simulation table with `time` and `sim_<var>` columns.
    pub sim: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Variables to adjust; every `ref_<var>` of the training table if
    /// empty.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

fn default_compression() -> String {
    "snappy".to_string()
}
fn default_row_group_size() -> usize {
    1_000_000
}

fn default_group() -> String {
    "none".to_string()
}
fn default_window() -> usize {
    1
}
fn default_correction() -> String {
    "+".to_string()
}
fn default_nearest() -> String {
    "nearest".to_string()
}
fn default_linear() -> String {
    "linear".to_string()
}
fn default_constant() -> String {
    "constant".to_string()
}

/// Method section, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MethodToml {
    Scaling(ScalingToml),
    Eqm(QuantileToml),
    Dqm(DqmToml),
    Qdm(QuantileToml),
    Loci(LociToml),
    Npdft(NpdfToml),
    Extremes(ExtremeToml),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingToml {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_correction")]
    pub correction: String,
    #[serde(default = "default_nearest")]
    pub interp: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantileToml {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_correction")]
    pub correction: String,
    /// Number of mid-point nodes; exclusive with `quantiles`.
    #[serde(default)]
    pub nquantiles: Option<usize>,
    #[serde(default)]
    pub quantiles: Option<Vec<f64>>,
    #[serde(default)]
    pub adapt_freq_thresh: Option<f64>,
    #[serde(default = "default_nearest")]
    pub interp: String,
    #[serde(default = "default_constant")]
    pub extrapolation: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DqmToml {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_correction")]
    pub correction: String,
    #[serde(default)]
    pub nquantiles: Option<usize>,
    #[serde(default)]
    pub quantiles: Option<Vec<f64>>,
    #[serde(default)]
    pub adapt_freq_thresh: Option<f64>,
    #[serde(default = "default_nearest")]
    pub interp: String,
    #[serde(default = "default_constant")]
    pub extrapolation: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default = "default_detrend_degree")]
    pub detrend_degree: usize,
    #[serde(default)]
    pub preserve_mean: bool,
}

fn default_detrend_degree() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LociToml {
    pub thresh: f64,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_linear")]
    pub interp: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpdfToml {
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub nquantiles: Option<usize>,
    #[serde(default)]
    pub quantiles: Option<Vec<f64>>,
    #[serde(default = "default_nearest")]
    pub interp: String,
    #[serde(default = "default_constant")]
    pub extrapolation: String,
    /// Correction of the per-variable base EQM.
    #[serde(default = "default_correction")]
    pub base_correction: String,
}

fn default_n_iter() -> usize {
    20
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtremeToml {
    pub cluster_thresh: f64,
    #[serde(default = "default_q_thresh")]
    pub q_thresh: f64,
    #[serde(default = "default_dist")]
    pub dist: String,
    #[serde(default = "default_frac")]
    pub frac: f64,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default = "default_linear")]
    pub interp: String,
    #[serde(default = "default_constant")]
    pub extrapolation: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

fn default_q_thresh() -> f64 {
    0.95
}
fn default_dist() -> String {
    "genpareto".to_string()
}
fn default_frac() -> f64 {
    0.25
}
fn default_power() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: SdbaConfig = toml::from_str(
            r#"
            [method]
            kind = "eqm"
            "#,
        )
        .unwrap();
        assert!(cfg.seed.is_none());
        assert_eq!(cfg.io.compression, "snappy");
        assert!(cfg.io.variables.is_empty());
        match cfg.method {
            MethodToml::Eqm(q) => {
                assert_eq!(q.group, "none");
                assert_eq!(q.window, 1);
                assert_eq!(q.correction, "+");
                assert_eq!(q.interp, "nearest");
                assert_eq!(q.extrapolation, "constant");
                assert!(q.nquantiles.is_none());
            }
            other => panic!("expected eqm, got {other:?}"),
        }
    }

    #[test]
    fn full_config() {
        let cfg: SdbaConfig = toml::from_str(
            r#"
            seed = 7

            [io]
            train = "train.parquet"
            sim = "sim.parquet"
            output = "scen.parquet"
            variables = ["tas", "pr"]
            compression = "zstd"

            [method]
            kind = "extremes"
            cluster_thresh = 1.0
            q_thresh = 0.9
            dist = "expon"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.io.variables, vec!["tas", "pr"]);
        match cfg.method {
            MethodToml::Extremes(e) => {
                assert_eq!(e.cluster_thresh, 1.0);
                assert_eq!(e.q_thresh, 0.9);
                assert_eq!(e.dist, "expon");
                assert_eq!(e.frac, 0.25);
            }
            other => panic!("expected extremes, got {other:?}"),
        }
    }

    #[test]
    fn unknown_method_field_is_rejected() {
        let res: Result<SdbaConfig, _> = toml::from_str(
            r#"
            [method]
            kind = "loci"
            thresh = 1.0
            nquantiles = 5
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let res: Result<SdbaConfig, _> = toml::from_str(
            r#"
            [method]
            kind = "cdft"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn loci_requires_thresh() {
        let res: Result<SdbaConfig, _> = toml::from_str(
            r#"
            [method]
            kind = "loci"
            "#,
        );
        assert!(res.is_err());
    }
}
