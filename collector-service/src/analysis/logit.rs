//! Logistic regression of high-efficiency complexes on building attributes.
//!
//! A complex is labelled high efficiency when its mean correlation for one
//! energy type exceeds a threshold. The label is then modelled as
//! `high_efficiency ~ C(단지분류) + C(난방방식) + C(급수방식)` with treatment
//! coding, fitted by Newton-Raphson.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use energy_client::{
    domain::{ComplexProfile, MergedTrendRow},
    store::{analysis_queries, roster_queries},
};

use super::{mean, AnalysisError};

const CLASSIFICATION: &str = "단지분류";
const HEATING: &str = "난방방식";
const WATER_SUPPLY: &str = "급수방식";
const FACTORS: [&str; 3] = [CLASSIFICATION, HEATING, WATER_SUPPLY];

const CLASSIFICATION_RECODES: [(&str, &str); 2] = [
    ("도시형 생활주택(연립주택)", "연립주택"),
    ("도시형 생활주택(주상복합)", "주상복합"),
];
const STRUCTURE_RECODES: [(&str, &str); 2] = [
    ("기타철골철근콘크리트구조", "철골철근콘크리트구조"),
    ("기타콘크리트구조", "콘크리트구조"),
];
const EXCLUDED_HEATING: &str = "개별난방+기타";
const EXCLUDED_WATER_SUPPLY: &str = "기타";

pub const MAX_ITERATIONS: usize = 35;
pub const TOLERANCE: f64 = 1e-8;
/// Two-sided 95% quantile of the standard normal distribution.
const Z_95: f64 = 1.959_963_984_540_054;

#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyLabel {
    pub kapt_code: String,
    /// `None` when every correlation of the complex is missing.
    pub avg_correlation: Option<f64>,
    pub high_efficiency: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub high: usize,
    pub low: usize,
}

/// Mean correlation of `energy_type` per complex, labelled against `threshold`.
///
/// A complex whose correlations for that energy type are all missing has no
/// average and is labelled low efficiency.
pub fn efficiency_labels(rows: &[MergedTrendRow], energy_type: &str, threshold: f64) -> Vec<EfficiencyLabel> {
    let mut by_complex: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.energy_type == energy_type) {
        let values = by_complex.entry(row.kapt_code.as_str()).or_default();
        if let Some(c) = row.correlation {
            values.push(c);
        }
    }

    by_complex
        .into_iter()
        .map(|(code, values)| {
            let avg = mean(&values);
            EfficiencyLabel {
                kapt_code: code.to_string(),
                avg_correlation: avg,
                high_efficiency: avg.is_some_and(|a| a > threshold),
            }
        })
        .collect()
}

pub fn count_labels(labels: &[EfficiencyLabel]) -> LabelCounts {
    let high = labels.iter().filter(|l| l.high_efficiency).count();
    LabelCounts {
        high,
        low: labels.len() - high,
    }
}

/// A labelled complex with its recoded attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub kapt_code: String,
    pub high_efficiency: bool,
    pub classification: String,
    pub heating_method: String,
    pub building_structure: String,
    pub water_supply: String,
}

impl Observation {
    fn level(&self, factor: &str) -> &str {
        match factor {
            CLASSIFICATION => &self.classification,
            HEATING => &self.heating_method,
            _ => &self.water_supply,
        }
    }
}

fn recode(value: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map_or(value, |&(_, to)| to)
        .to_string()
}

/// Inner join of profiles and labels on the complex code, recoded and with
/// rare heating and water-supply categories removed.
pub fn prepare_observations(profiles: &[ComplexProfile], labels: &[EfficiencyLabel]) -> Vec<Observation> {
    let by_code: BTreeMap<&str, bool> = labels
        .iter()
        .map(|l| (l.kapt_code.as_str(), l.high_efficiency))
        .collect();

    profiles
        .iter()
        .filter_map(|p| {
            let &high_efficiency = by_code.get(p.code.as_str())?;
            Some(Observation {
                kapt_code: p.code.clone(),
                high_efficiency,
                classification: recode(&p.classification, &CLASSIFICATION_RECODES),
                heating_method: p.heating_method.clone(),
                building_structure: recode(&p.building_structure, &STRUCTURE_RECODES),
                water_supply: p.water_supply.clone(),
            })
        })
        .filter(|o| o.heating_method != EXCLUDED_HEATING && o.water_supply != EXCLUDED_WATER_SUPPLY)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub response: Vec<f64>,
}

/// Intercept plus one indicator per non-reference level of each factor.
pub fn design_matrix(observations: &[Observation]) -> DesignMatrix {
    let mut names = vec!["Intercept".to_string()];
    let mut columns: Vec<(&str, String)> = Vec::new();
    for factor in FACTORS {
        let levels: BTreeSet<&str> = observations.iter().map(|o| o.level(factor)).collect();
        for level in levels.into_iter().skip(1) {
            names.push(format!("C({factor})[T.{level}]"));
            columns.push((factor, level.to_string()));
        }
    }

    let rows = observations
        .iter()
        .map(|o| {
            let mut row = vec![1.0];
            row.extend(
                columns
                    .iter()
                    .map(|(factor, level)| if o.level(factor) == level.as_str() { 1.0 } else { 0.0 }),
            );
            row
        })
        .collect();
    let response = observations
        .iter()
        .map(|o| if o.high_efficiency { 1.0 } else { 0.0 })
        .collect();

    DesignMatrix { names, rows, response }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    /// Two-sided `P>|z|`.
    pub p_value: f64,
    /// 95% Wald interval of the estimate.
    pub conf_int: (f64, f64),
    pub odds_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogitFit {
    pub coefficients: Vec<Coefficient>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub observations: usize,
}

/// Complementary error function, fractional error below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98 + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * (-z * z + poly).exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Two-sided p-value of a standard normal statistic.
fn normal_p_value(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn predict(rows: &[Vec<f64>], beta: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|x| sigmoid(x.iter().zip(beta).map(|(a, b)| a * b).sum()))
        .collect()
}

/// Fisher information `XᵀWX` at the fitted probabilities.
fn information(rows: &[Vec<f64>], probs: &[f64]) -> Vec<Vec<f64>> {
    let k = rows.first().map_or(0, Vec::len);
    let mut h = vec![vec![0.0; k]; k];
    for (x, p) in rows.iter().zip(probs) {
        let w = p * (1.0 - p);
        for i in 0..k {
            for j in 0..k {
                h[i][j] += w * x[i] * x[j];
            }
        }
    }
    h
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial pivoting.
fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, AnalysisError> {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .ok_or(AnalysisError::Singular)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(AnalysisError::Singular);
        }
        a.swap(col, pivot);

        let p = a[col][col];
        for v in a[col].iter_mut() {
            *v /= p;
        }
        let pivot_row = a[col].clone();
        for (idx, row) in a.iter_mut().enumerate() {
            let factor = row[col];
            if idx != col && factor != 0.0 {
                for (v, p) in row.iter_mut().zip(&pivot_row) {
                    *v -= factor * p;
                }
            }
        }
    }

    Ok(a.into_iter().map(|r| r[n..].to_vec()).collect())
}

fn log_likelihood(response: &[f64], probs: &[f64]) -> f64 {
    response
        .iter()
        .zip(probs)
        .map(|(y, p)| {
            let p = p.clamp(1e-15, 1.0 - 1e-15);
            y * p.ln() + (1.0 - y) * (1.0 - p).ln()
        })
        .sum()
}

/// Maximum-likelihood fit of a binary logit model.
pub fn fit_logit(design: &DesignMatrix, max_iter: usize, tol: f64) -> Result<LogitFit, AnalysisError> {
    if design.rows.is_empty() {
        return Err(AnalysisError::NoData("no observations to fit".to_string()));
    }
    let k = design.names.len();
    let mut beta = vec![0.0; k];

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iter {
        iterations += 1;
        let probs = predict(&design.rows, &beta);

        let mut gradient = vec![0.0; k];
        for ((x, y), p) in design.rows.iter().zip(&design.response).zip(&probs) {
            for (g, xi) in gradient.iter_mut().zip(x) {
                *g += xi * (y - p);
            }
        }

        let inverse = invert(&information(&design.rows, &probs))?;
        let step: Vec<f64> = inverse
            .iter()
            .map(|row| row.iter().zip(&gradient).map(|(a, g)| a * g).sum())
            .collect();
        for (b, s) in beta.iter_mut().zip(&step) {
            *b += s;
        }

        if step.iter().all(|s| s.abs() < tol) {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(AnalysisError::NotConverged(iterations));
    }

    let probs = predict(&design.rows, &beta);
    let covariance = invert(&information(&design.rows, &probs))?;
    let coefficients = design
        .names
        .iter()
        .zip(&beta)
        .enumerate()
        .map(|(i, (name, &estimate))| {
            let std_error = covariance[i][i].sqrt();
            let z_value = estimate / std_error;
            Coefficient {
                name: name.clone(),
                estimate,
                std_error,
                z_value,
                p_value: normal_p_value(z_value),
                conf_int: (estimate - Z_95 * std_error, estimate + Z_95 * std_error),
                odds_ratio: estimate.exp(),
            }
        })
        .collect();

    Ok(LogitFit {
        coefficients,
        log_likelihood: log_likelihood(&design.response, &probs),
        iterations,
        observations: design.rows.len(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyReport {
    pub labels: LabelCounts,
    pub fit: LogitFit,
}

/// Label complexes from the merged analysis, join their profiles and fit.
pub fn run_efficiency_logit(
    profiles_path: &Path,
    merged_path: &Path,
    energy_type: &str,
    threshold: f64,
) -> Result<EfficiencyReport, AnalysisError> {
    let profiles = roster_queries::load_profiles(profiles_path)?;
    tracing::info!(profiles = profiles.len(), path = %profiles_path.display(), "complex profiles loaded");

    let merged = analysis_queries::read_merged_rows(merged_path)?;
    let labels = efficiency_labels(&merged, energy_type, threshold);
    if labels.is_empty() {
        return Err(AnalysisError::NoData(format!("no correlations for energy type {energy_type}")));
    }
    let counts = count_labels(&labels);
    tracing::info!(high = counts.high, low = counts.low, energy_type, "efficiency labels assigned");

    let observations = prepare_observations(&profiles, &labels);
    tracing::info!(observations = observations.len(), "profiles joined with labels");

    let fit = fit_logit(&design_matrix(&observations), MAX_ITERATIONS, TOLERANCE)?;
    Ok(EfficiencyReport { labels: counts, fit })
}
