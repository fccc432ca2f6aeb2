//! # Interactive Explorer
//!
//! The single-system view: pick a solvent system, hold one factor at a slider
//! value, and look at the predicted surface over the other two. Loaded tables
//! and their fitted model sets are memoized per source identifier, so moving a
//! slider only re-evaluates the grid.

use crate::coding::{CodingScheme, Factor, RawFactors};
use crate::data::{DataSourceError, ExperimentData, ObservedRanges};
use crate::fit::{CoefficientImpact, SolventFits, fit_all};
use crate::source::{DataFetcher, ExperimentCache, SourceFetcher};
use crate::surface::{
    DEFAULT_RESOLUTION, Surface, SurfaceError, SurfaceRequest, YIELD_LABEL, generate_surface,
};
use crate::types::SolventSystem;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error("No model is available for {system}: {reason}")]
    ModelUnavailable {
        system: SolventSystem,
        reason: String,
    },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Current control state of the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorerRequest {
    pub system: SolventSystem,
    pub fixed_factor: Factor,
    /// Slider positions. Only the entry of `fixed_factor` is used for the surface.
    pub sliders: RawFactors,
    pub resolution: usize,
}

impl ExplorerRequest {
    /// Solvent held, every slider at its design center.
    pub fn new(system: SolventSystem) -> Self {
        Self {
            system,
            fixed_factor: Factor::Solvent,
            sliders: default_sliders(),
            resolution: DEFAULT_RESOLUTION,
        }
    }

    pub fn holding(mut self, factor: Factor, value: f64) -> Self {
        self.fixed_factor = factor;
        self.sliders.set(factor, value);
        self
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn surface_request(&self) -> SurfaceRequest {
        SurfaceRequest::new(self.fixed_factor, self.sliders.get(self.fixed_factor))
            .with_resolution(self.resolution)
    }
}

impl Default for ExplorerRequest {
    fn default() -> Self {
        Self::new(SolventSystem::Ethanol)
    }
}

/// Slider start positions: the design center of every factor.
pub fn default_sliders() -> RawFactors {
    let scheme = CodingScheme::default();
    RawFactors::new(
        scheme.center(Factor::Time),
        scheme.center(Factor::Temperature),
        scheme.center(Factor::Solvent),
    )
}

/// Integer slider limits of one factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderBounds {
    pub factor: Factor,
    pub min: i64,
    pub max: i64,
}

pub fn slider_bounds(ranges: &ObservedRanges) -> [SliderBounds; 3] {
    Factor::ALL.map(|factor| {
        let (min, max) = ranges.get(factor).slider_bounds();
        SliderBounds { factor, min, max }
    })
}

/// Everything the single-system view displays.
#[derive(Debug, Clone)]
pub struct ExplorerView {
    pub title: String,
    pub z_label: &'static str,
    pub surface: Surface,
    pub adj_r_squared: f64,
    pub max_yield: f64,
    pub caption: String,
    pub impacts: Vec<CoefficientImpact>,
    pub sliders: [SliderBounds; 3],
}

/// A loaded table together with its fits.
pub struct ModelSet {
    pub data: Arc<ExperimentData>,
    pub fits: SolventFits,
}

pub struct Explorer<F: DataFetcher = SourceFetcher> {
    cache: ExperimentCache<F>,
    models: HashMap<String, Arc<ModelSet>>,
}

impl Default for Explorer<SourceFetcher> {
    fn default() -> Self {
        Self::new(ExperimentCache::default())
    }
}

impl<F: DataFetcher> Explorer<F> {
    pub fn new(cache: ExperimentCache<F>) -> Self {
        Self {
            cache,
            models: HashMap::new(),
        }
    }

    /// Loads `source` and fits every solvent system, once per source.
    pub fn models(&mut self, source: &str) -> Result<Arc<ModelSet>, DataSourceError> {
        if let Some(set) = self.models.get(source) {
            return Ok(Arc::clone(set));
        }
        let data = self.cache.load(source)?;
        let fits = fit_all(&data);
        let set = Arc::new(ModelSet { data, fits });
        self.models.insert(source.to_string(), Arc::clone(&set));
        Ok(set)
    }

    pub fn view(
        &mut self,
        source: &str,
        request: &ExplorerRequest,
    ) -> Result<ExplorerView, ExploreError> {
        let set = self.models(source)?;
        build_view(&set, request)
    }

    pub fn cache(&self) -> &ExperimentCache<F> {
        &self.cache
    }
}

/// Assembles the view for one request against an already fitted model set.
pub fn build_view(set: &ModelSet, request: &ExplorerRequest) -> Result<ExplorerView, ExploreError> {
    let system = request.system;
    let model = match set.fits.get(&system) {
        Some(Ok(model)) => model,
        Some(Err(e)) => {
            return Err(ExploreError::ModelUnavailable {
                system,
                reason: e.to_string(),
            });
        }
        None => {
            return Err(ExploreError::ModelUnavailable {
                system,
                reason: "the system was not fitted".to_string(),
            });
        }
    };

    let ranges = set.data.ranges();
    let surface = generate_surface(model, ranges, &request.surface_request())?;
    let caption = format!(
        "Currently viewing the interaction between {} and {}.",
        surface.x_label(),
        surface.y_label()
    );

    Ok(ExplorerView {
        title: format!("Predictive Surface for {}", system.column().to_uppercase()),
        z_label: YIELD_LABEL,
        adj_r_squared: model.adj_r_squared(),
        max_yield: surface.max_value(),
        caption,
        impacts: model.coefficient_impacts(),
        sliders: slider_bounds(ranges),
        surface,
    })
}
