//! # Response Surface Generation
//!
//! A surface holds one raw factor fixed and sweeps the other two over their
//! observed range on a square grid. Every grid point is coded with the model's
//! own coding scheme, predicted, and the predictions are reshaped so that
//! `z[[i, j]]` belongs to `(x[[i, j]], y[[i, j]])`.
//!
//! Layout of the meshes follows the usual `meshgrid` convention: row `i` walks
//! the y axis, column `j` walks the x axis.
//!
//! A fixed value outside the observed range is not an error. The polynomial is
//! evaluated anyway and the surface carries an `ExtrapolationWarning`.

use crate::coding::{Factor, RawFactors};
use crate::data::ObservedRanges;
use crate::fit::FittedModel;
use crate::types::SolventSystem;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid resolution of the interactive view.
pub const DEFAULT_RESOLUTION: usize = 40;
/// Smallest grid that still forms a 2D mesh.
pub const MIN_RESOLUTION: usize = 2;
/// Label of the predicted axis.
pub const YIELD_LABEL: &str = "Yield (mg/L)";

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Grid resolution must be at least {MIN_RESOLUTION} points per axis, got {0}.")]
    InvalidResolution(usize),

    #[error("The fixed value for '{factor}' must be finite, got {value}.")]
    NonFiniteFixedValue { factor: Factor, value: f64 },

    #[error("Predictions could not be reshaped onto the grid: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Advisory signal: the surface was evaluated outside the experimental region.
#[derive(Error, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[error(
    "{factor} = {value} lies outside the observed range [{min}, {max}]; the surface is extrapolated."
)]
pub struct ExtrapolationWarning {
    pub factor: Factor,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Which factor is held, at what value, and how finely the other two are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRequest {
    pub fixed_factor: Factor,
    pub fixed_value: f64,
    pub resolution: usize,
}

impl SurfaceRequest {
    pub fn new(fixed_factor: Factor, fixed_value: f64) -> Self {
        Self {
            fixed_factor,
            fixed_value,
            resolution: DEFAULT_RESOLUTION,
        }
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }
}

/// Axes swept when `fixed` is held, as `(x, y)`.
pub fn swept_factors(fixed: Factor) -> (Factor, Factor) {
    match fixed {
        Factor::Solvent => (Factor::Temperature, Factor::Time),
        Factor::Temperature => (Factor::Solvent, Factor::Time),
        Factor::Time => (Factor::Temperature, Factor::Solvent),
    }
}

/// Returns a warning when `value` lies outside the observed range of `factor`.
pub fn check_extrapolation(
    ranges: &ObservedRanges,
    factor: Factor,
    value: f64,
) -> Option<ExtrapolationWarning> {
    let range = ranges.get(factor);
    if range.contains(value) {
        None
    } else {
        Some(ExtrapolationWarning {
            factor,
            value,
            min: range.min,
            max: range.max,
        })
    }
}

/// The raw conditions of one surface request.
#[derive(Debug, Clone)]
pub struct SamplingGrid {
    pub x_factor: Factor,
    pub y_factor: Factor,
    pub fixed_factor: Factor,
    pub fixed_value: f64,
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    points: Vec<RawFactors>,
}

impl SamplingGrid {
    pub fn new(ranges: &ObservedRanges, request: &SurfaceRequest) -> Result<Self, SurfaceError> {
        let r = request.resolution;
        if r < MIN_RESOLUTION {
            return Err(SurfaceError::InvalidResolution(r));
        }
        if !request.fixed_value.is_finite() {
            return Err(SurfaceError::NonFiniteFixedValue {
                factor: request.fixed_factor,
                value: request.fixed_value,
            });
        }

        let (x_factor, y_factor) = swept_factors(request.fixed_factor);
        let xs: Array1<f64> = ranges.get(x_factor).linspace(r);
        let ys: Array1<f64> = ranges.get(y_factor).linspace(r);

        let mut x = Array2::zeros((r, r));
        let mut y = Array2::zeros((r, r));
        let mut points = Vec::with_capacity(r * r);
        for (i, &yv) in ys.iter().enumerate() {
            for (j, &xv) in xs.iter().enumerate() {
                x[[i, j]] = xv;
                y[[i, j]] = yv;
                let mut point = RawFactors::new(0.0, 0.0, 0.0);
                point.set(x_factor, xv);
                point.set(y_factor, yv);
                point.set(request.fixed_factor, request.fixed_value);
                points.push(point);
            }
        }
        log::debug!(
            "Built {r}x{r} grid over {x_factor} and {y_factor} with {} = {}",
            request.fixed_factor,
            request.fixed_value
        );

        Ok(Self {
            x_factor,
            y_factor,
            fixed_factor: request.fixed_factor,
            fixed_value: request.fixed_value,
            x,
            y,
            points,
        })
    }

    pub fn resolution(&self) -> usize {
        self.x.nrows()
    }

    /// Grid points in row-major order.
    pub fn points(&self) -> &[RawFactors] {
        &self.points
    }
}

/// Location and value of the highest prediction on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePeak {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Predicted yield over a sampling grid.
#[derive(Debug, Clone)]
pub struct Surface {
    pub response: SolventSystem,
    pub x_factor: Factor,
    pub y_factor: Factor,
    pub fixed_factor: Factor,
    pub fixed_value: f64,
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub z: Array2<f64>,
    pub extrapolation: Option<ExtrapolationWarning>,
}

impl Surface {
    pub fn resolution(&self) -> usize {
        self.z.nrows()
    }

    pub fn x_label(&self) -> &'static str {
        self.x_factor.axis_label()
    }

    pub fn y_label(&self) -> &'static str {
        self.y_factor.axis_label()
    }

    pub fn is_extrapolated(&self) -> bool {
        self.extrapolation.is_some()
    }

    pub fn peak(&self) -> SurfacePeak {
        let mut best = SurfacePeak {
            x: self.x[[0, 0]],
            y: self.y[[0, 0]],
            z: f64::NEG_INFINITY,
        };
        for ((i, j), &z) in self.z.indexed_iter() {
            if z > best.z {
                best = SurfacePeak {
                    x: self.x[[i, j]],
                    y: self.y[[i, j]],
                    z,
                };
            }
        }
        best
    }

    /// Highest predicted yield in view.
    pub fn max_value(&self) -> f64 {
        self.peak().z
    }
}

/// Evaluates `model` over the grid described by `request`.
pub fn generate_surface(
    model: &FittedModel,
    ranges: &ObservedRanges,
    request: &SurfaceRequest,
) -> Result<Surface, SurfaceError> {
    let grid = SamplingGrid::new(ranges, request)?;
    let extrapolation = check_extrapolation(ranges, request.fixed_factor, request.fixed_value);
    if let Some(warning) = &extrapolation {
        log::warn!("{}", warning);
    }

    let r = grid.resolution();
    let z = model.predict(grid.points()).into_shape_with_order((r, r))?;

    Ok(Surface {
        response: model.response(),
        x_factor: grid.x_factor,
        y_factor: grid.y_factor,
        fixed_factor: grid.fixed_factor,
        fixed_value: grid.fixed_value,
        x: grid.x,
        y: grid.y,
        z,
        extrapolation,
    })
}
