//! # Model Fitting
//!
//! Ordinary least squares for the reduced cubic model, one independent fit per
//! solvent system. The model is nonlinear in the coded factors but linear in its
//! coefficients, so a single least-squares solve on the design matrix suffices.
//!
//! Degenerate inputs are rejected before the solve: fewer observations than
//! coefficients, or a design matrix whose numerical rank is below its column
//! count (constant or collinear regressors). A minimum-norm solution is never
//! returned in that situation.

use crate::coding::{CodedFactors, CodingScheme, RawFactors};
use crate::data::ExperimentData;
use crate::terms::{BoundSpec, ModelSpec, Term};
use crate::types::SolventSystem;
use ndarray::{Array1, ArrayView1};
use ndarray_linalg::{LeastSquaresSvd, SVD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The fixed term set could not be estimated from the data.
#[derive(Error, Debug)]
pub enum DegenerateModelError {
    #[error(
        "Only {found} observations are available, but the model has {required} coefficients."
    )]
    InsufficientObservations { found: usize, required: usize },

    #[error(
        "The design matrix is rank deficient (rank {rank} of {required} columns). A regressor is constant or collinear with others."
    )]
    RankDeficient { rank: usize, required: usize },

    #[error("The least-squares solve failed: {0}")]
    SolveFailed(#[from] ndarray_linalg::error::LinalgError),
}

/// Goodness-of-fit summary of one OLS fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub n_observations: usize,
    /// Number of regressors, intercept excluded.
    pub n_regressors: usize,
    pub residual_sum_of_squares: f64,
    pub total_sum_of_squares: f64,
    /// NaN when the response is constant.
    pub r_squared: f64,
    /// `1 - (1 - R²)(n - 1)/(n - p - 1)`. NaN when there are no residual degrees of freedom.
    pub adj_r_squared: f64,
    /// NaN when there are no residual degrees of freedom.
    pub residual_std_error: f64,
}

impl FitStatistics {
    pub fn residual_df(&self) -> usize {
        self.n_observations.saturating_sub(self.n_regressors + 1)
    }

    fn from_residuals(residuals: ArrayView1<f64>, y: ArrayView1<f64>, n_regressors: usize) -> Self {
        let n = y.len();
        let y_mean = y.mean().unwrap_or(0.0);
        let ssr = residuals.dot(&residuals);
        let sst = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();

        let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { f64::NAN };
        let df_resid = n as f64 - n_regressors as f64 - 1.0;
        let (adj_r_squared, residual_std_error) = if df_resid > 0.0 {
            (
                1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid,
                (ssr / df_resid).sqrt(),
            )
        } else {
            (f64::NAN, f64::NAN)
        };

        Self {
            n_observations: n,
            n_regressors,
            residual_sum_of_squares: ssr,
            total_sum_of_squares: sst,
            r_squared,
            adj_r_squared,
            residual_std_error,
        }
    }
}

/// Magnitude of one fitted coefficient, for importance views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientImpact {
    /// Formula name, e.g. `I(t_cod**2):S_cod`.
    pub term: String,
    /// Human-readable label, e.g. `Time²:Solvent`.
    pub label: String,
    pub coefficient: f64,
}

impl CoefficientImpact {
    pub fn magnitude(&self) -> f64 {
        self.coefficient.abs()
    }
}

/// An immutable OLS fit of the bound specification.
#[derive(Debug, Clone)]
pub struct FittedModel {
    bound: BoundSpec,
    coding: CodingScheme,
    coefficients: Array1<f64>,
    residuals: Array1<f64>,
    statistics: FitStatistics,
}

impl FittedModel {
    pub fn response(&self) -> SolventSystem {
        self.bound.response
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.bound.spec
    }

    pub fn formula(&self) -> String {
        self.bound.formula()
    }

    /// The coding the design matrix was built with. Predictions reuse it.
    pub fn coding(&self) -> &CodingScheme {
        &self.coding
    }

    /// Coefficients in term order.
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    pub fn coefficient(&self, term_name: &str) -> Option<f64> {
        self.bound
            .spec
            .position(term_name)
            .map(|i| self.coefficients[i])
    }

    /// `(term name, coefficient)` pairs in term order, intercept first.
    pub fn named_coefficients(&self) -> Vec<(String, f64)> {
        self.bound
            .spec
            .terms()
            .iter()
            .map(Term::name)
            .zip(self.coefficients.iter().copied())
            .collect()
    }

    /// Training residuals `y - ŷ`, in table order.
    pub fn residuals(&self) -> ArrayView1<'_, f64> {
        self.residuals.view()
    }

    pub fn statistics(&self) -> &FitStatistics {
        &self.statistics
    }

    pub fn adj_r_squared(&self) -> f64 {
        self.statistics.adj_r_squared
    }

    /// Predicts at points that are already coded.
    pub fn predict_coded(&self, points: &[CodedFactors]) -> Array1<f64> {
        self.bound.spec.design_matrix(points).dot(&self.coefficients)
    }

    /// Predicts at raw conditions, coding them with the fit-time scheme.
    pub fn predict(&self, points: &[RawFactors]) -> Array1<f64> {
        let coded: Vec<CodedFactors> = points.iter().map(|p| self.coding.code(p)).collect();
        self.predict_coded(&coded)
    }

    /// Non-intercept coefficients sorted by ascending absolute value, so a
    /// horizontal bar chart drawn bottom-up puts the largest effect on top.
    pub fn coefficient_impacts(&self) -> Vec<CoefficientImpact> {
        let mut impacts: Vec<CoefficientImpact> = self
            .bound
            .spec
            .terms()
            .iter()
            .zip(self.coefficients.iter())
            .filter(|(term, _)| !term.is_intercept())
            .map(|(term, &coefficient)| CoefficientImpact {
                term: term.name(),
                label: term.label(),
                coefficient,
            })
            .collect();
        impacts.sort_by(|a, b| a.magnitude().total_cmp(&b.magnitude()));
        impacts
    }
}

/// Fits the reduced cubic model for one solvent system with the published coding.
pub fn fit(
    data: &ExperimentData,
    response: SolventSystem,
) -> Result<FittedModel, DegenerateModelError> {
    fit_with(
        data,
        ModelSpec::reduced_cubic().bind(response),
        CodingScheme::default(),
    )
}

/// Fits an arbitrary bound specification under an explicit coding.
pub fn fit_with(
    data: &ExperimentData,
    bound: BoundSpec,
    coding: CodingScheme,
) -> Result<FittedModel, DegenerateModelError> {
    let n = data.len();
    let k = bound.spec.len();
    log::info!("Fitting '{}' on {} observations.", bound.formula(), n);

    if n < k {
        return Err(DegenerateModelError::InsufficientObservations {
            found: n,
            required: k,
        });
    }

    let coded: Vec<CodedFactors> = data
        .raw_factors()
        .iter()
        .map(|raw| coding.code(raw))
        .collect();
    let x = bound.spec.design_matrix(&coded);
    let y = data.response(bound.response);

    let rank = internal::numerical_rank(&x)?;
    if rank < k {
        return Err(DegenerateModelError::RankDeficient { rank, required: k });
    }

    let solution = x.least_squares(&y)?;
    let coefficients = solution.solution;
    let residuals = &y - &x.dot(&coefficients);
    let statistics =
        FitStatistics::from_residuals(residuals.view(), y, bound.spec.num_regressors());

    log::info!(
        "Fitted {}: R² = {:.4}, adjusted R² = {:.4}.",
        bound.response,
        statistics.r_squared,
        statistics.adj_r_squared
    );

    Ok(FittedModel {
        bound,
        coding,
        coefficients,
        residuals,
        statistics,
    })
}

/// One fit outcome per solvent system. A failure is kept next to the successes.
pub type SolventFits = BTreeMap<SolventSystem, Result<FittedModel, DegenerateModelError>>;

/// Fits every solvent system independently.
pub fn fit_all(data: &ExperimentData) -> SolventFits {
    SolventSystem::ALL
        .into_iter()
        .map(|system| {
            let result = fit(data, system);
            if let Err(e) = &result {
                log::warn!("Could not fit {} ({}): {}", system, system.display_name(), e);
            }
            (system, result)
        })
        .collect()
}

mod internal {
    use super::*;
    use ndarray::Array2;

    /// Rank with the usual `max(n, k) · ε · σ_max` cutoff.
    pub(super) fn numerical_rank(x: &Array2<f64>) -> Result<usize, DegenerateModelError> {
        let (_, singular_values, _) = x.svd(false, false)?;
        let sigma_max = singular_values.iter().fold(0.0_f64, |a, &b| a.max(b));
        let tolerance = x.nrows().max(x.ncols()) as f64 * f64::EPSILON * sigma_max;
        log::debug!("Design singular values: {:?}", singular_values);
        Ok(singular_values.iter().filter(|&&s| s > tolerance).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::Factor;
    use crate::data::ExperimentRecord;
    use crate::test_fixtures::{self, TRUE_COEFFICIENTS};
    use approx::assert_abs_diff_eq;

    #[test]
    fn recovers_a_known_reduced_cubic_surface() {
        let data = test_fixtures::ccd_data(test_fixtures::polynomial_yield);
        let model = fit(&data, SolventSystem::Ethanol).unwrap();
        for (got, want) in model.coefficients().iter().zip(TRUE_COEFFICIENTS) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-8);
        }
        assert_abs_diff_eq!(model.statistics().r_squared, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(model.coefficient("Intercept").unwrap(), 12.0, epsilon = 1e-8);
        assert_abs_diff_eq!(
            model.coefficient("I(t_cod**2):I(T_cod**2)").unwrap(),
            -0.2,
            epsilon = 1e-8
        );
    }

    #[test]
    fn each_system_fits_its_own_column() {
        let data = test_fixtures::ccd_data(test_fixtures::polynomial_yield);
        let fits = fit_all(&data);
        assert_eq!(fits.len(), 3);
        let et = fits[&SolventSystem::Ethanol].as_ref().unwrap();
        let pg = fits[&SolventSystem::PropyleneGlycol].as_ref().unwrap();
        let gly = fits[&SolventSystem::Glycerol].as_ref().unwrap();
        // pg_w = 0.5·et_w + 1 and gly_w = 2·et_w − 3 in the fixture.
        assert_abs_diff_eq!(pg.coefficients()[0], 0.5 * 12.0 + 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(gly.coefficients()[0], 2.0 * 12.0 - 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(pg.coefficients()[1], 0.5 * et.coefficients()[1], epsilon = 1e-8);
        assert_eq!(gly.response(), SolventSystem::Glycerol);
    }

    #[test]
    fn reported_r_squared_matches_residuals_on_training_rows() {
        // A response with a term outside the model leaves real residuals.
        let data = test_fixtures::ccd_data(|raw| {
            let (t, _, S) = crate::coding::code(raw.time, raw.temperature, raw.solvent);
            5.0 + 2.0 * t + 3.0 * S * S + 0.5 * (t * 7.0).sin()
        });
        let model = fit(&data, SolventSystem::Ethanol).unwrap();

        let y = data.response(SolventSystem::Ethanol);
        let predicted = model.predict(&data.raw_factors());
        let residuals = &y - &predicted;
        let ssr: f64 = residuals.iter().map(|r| r * r).sum();
        let mean = y.sum() / y.len() as f64;
        let sst: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let r2 = 1.0 - ssr / sst;

        assert!(model.statistics().r_squared < 0.999);
        assert_abs_diff_eq!(model.statistics().r_squared, r2, epsilon = 1e-9);
        for (a, b) in residuals.iter().zip(model.residuals()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }

        let n = y.len() as f64;
        let adjusted = 1.0 - (1.0 - r2) * (n - 1.0) / (n - 10.0 - 1.0);
        assert_abs_diff_eq!(model.adj_r_squared(), adjusted, epsilon = 1e-9);
    }

    #[test]
    fn affine_time_response_is_reproduced() {
        let data = test_fixtures::ccd_data(|raw| 5.0 + 0.1 * raw.time);
        let model = fit(&data, SolventSystem::Ethanol).unwrap();

        // 5 + 0.1·time = 5 + 0.1·(110 + 60·t) = 16 + 6·t
        let coefficients = model.named_coefficients();
        for (name, value) in &coefficients {
            let expected = match name.as_str() {
                "Intercept" => 16.0,
                "t_cod" => 6.0,
                _ => 0.0,
            };
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-8);
        }

        let at = |time: f64| model.predict(&[RawFactors::new(time, 60.0, 50.0)])[0];
        assert_abs_diff_eq!(at(101.0) - at(100.0), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(at(150.0), 20.0, epsilon = 1e-8);
    }

    #[test]
    fn fewer_rows_than_terms_is_degenerate() {
        let records: Vec<ExperimentRecord> = test_fixtures::ccd_records(|raw| raw.time)
            .into_iter()
            .take(10)
            .collect();
        let data = ExperimentData::from_records(&records).unwrap();
        match fit(&data, SolventSystem::Ethanol) {
            Err(DegenerateModelError::InsufficientObservations { found, required }) => {
                assert_eq!(found, 10);
                assert_eq!(required, 11);
            }
            other => panic!("Expected InsufficientObservations, got {:?}", other),
        }
    }

    #[test]
    fn constant_factors_make_the_design_rank_deficient() {
        // Temperature and solvent never vary: T_cod and S_cod are constant columns.
        let records: Vec<ExperimentRecord> = (0..20)
            .map(|i| {
                let time = 20.0 + 10.0 * i as f64;
                let y = 5.0 + 0.1 * time;
                ExperimentRecord {
                    factors: RawFactors::new(time, 70.0, 40.0),
                    et_w: y,
                    pg_w: y,
                    gly_w: y,
                }
            })
            .collect();
        let data = ExperimentData::from_records(&records).unwrap();
        match fit(&data, SolventSystem::Ethanol) {
            Err(DegenerateModelError::RankDeficient { rank, required }) => {
                assert!(rank < required);
                assert_eq!(required, 11);
            }
            other => panic!("Expected RankDeficient, got {:?}", other),
        }
    }

    #[test]
    fn duplicated_regressor_is_rank_deficient() {
        let data = test_fixtures::ccd_data(test_fixtures::polynomial_yield);
        let collinear = ModelSpec::new(vec![
            Term::intercept(),
            Term::linear(Factor::Time),
            Term::interaction(&[(Factor::Time, 1)]),
        ]);
        let failed = fit_with(
            &data,
            collinear.bind(SolventSystem::PropyleneGlycol),
            CodingScheme::default(),
        );
        assert!(matches!(
            failed,
            Err(DegenerateModelError::RankDeficient {
                rank: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn fit_all_reports_every_system_even_when_degenerate() {
        let records: Vec<ExperimentRecord> = test_fixtures::ccd_records(|raw| raw.time)
            .into_iter()
            .take(8)
            .collect();
        let data = ExperimentData::from_records(&records).unwrap();
        let fits = fit_all(&data);
        assert_eq!(fits.len(), 3);
        for system in SolventSystem::ALL {
            assert!(matches!(
                fits[&system],
                Err(DegenerateModelError::InsufficientObservations { found: 8, .. })
            ));
        }
    }

    #[test]
    fn prediction_uses_the_fit_time_coding() {
        let data = test_fixtures::ccd_data(test_fixtures::polynomial_yield);
        let model = fit(&data, SolventSystem::Ethanol).unwrap();
        assert_eq!(*model.coding(), CodingScheme::default());
        assert_eq!(
            model.coding().temperature.half_range,
            crate::coding::TEMPERATURE_DIVISOR
        );

        let raw = RawFactors::new(95.0, 72.0, 41.0);
        let by_model = model.predict(&[raw])[0];
        let by_hand = model.predict_coded(&[model.coding().code(&raw)])[0];
        assert_eq!(by_model.to_bits(), by_hand.to_bits());
        assert_abs_diff_eq!(by_model, test_fixtures::polynomial_yield(&raw), epsilon = 1e-8);
    }

    #[test]
    fn impacts_exclude_intercept_and_sort_by_magnitude() {
        let data = test_fixtures::ccd_data(test_fixtures::polynomial_yield);
        let model = fit(&data, SolventSystem::Ethanol).unwrap();
        let impacts = model.coefficient_impacts();
        assert_eq!(impacts.len(), 10);
        assert!(impacts.iter().all(|i| i.term != "Intercept"));
        for pair in impacts.windows(2) {
            assert!(pair[0].magnitude() <= pair[1].magnitude());
        }
        let largest = impacts.last().unwrap();
        assert_eq!(largest.label, "Solvent %");
        assert_abs_diff_eq!(largest.coefficient, 2.2, epsilon = 1e-8);
    }

    #[test]
    fn fourteen_runs_leave_three_residual_degrees_of_freedom() {
        let records: Vec<ExperimentRecord> =
            test_fixtures::ccd_records(test_fixtures::polynomial_yield)
                .into_iter()
                .take(14)
                .collect();
        let data = ExperimentData::from_records(&records).unwrap();
        let model = fit(&data, SolventSystem::Ethanol).unwrap();
        assert_eq!(model.statistics().residual_df(), 3);
        assert!(model.adj_r_squared().is_finite());
    }

    #[test]
    fn saturated_fit_has_no_adjusted_r_squared() {
        let y = Array1::linspace(1.0, 11.0, 11);
        let residuals = Array1::zeros(11);
        let stats = FitStatistics::from_residuals(residuals.view(), y.view(), 10);
        assert_eq!(stats.residual_df(), 0);
        assert_abs_diff_eq!(stats.r_squared, 1.0, epsilon = 1e-12);
        assert!(stats.adj_r_squared.is_nan());
        assert!(stats.residual_std_error.is_nan());
    }
}
