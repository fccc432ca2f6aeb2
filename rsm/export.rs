//! # Result Export
//!
//! Surfaces are written as long-format tab-separated tables, one row per grid
//! point. Fit summaries and the dashboard index are human-readable TOML.

use crate::dashboard::{Colorscale, Dashboard, DashboardColumn, PANEL_Z_LABEL};
use crate::fit::{FitStatistics, SolventFits};
use crate::surface::{ExtrapolationWarning, Surface};
use crate::types::SolventSystem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DASHBOARD_INDEX_FILE: &str = "dashboard.toml";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize summary to TOML: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    #[error("Failed to parse TOML summary: {0}")]
    TomlDeserialization(#[from] toml::de::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `surface` to `path` as `x<TAB>y<TAB>yield`, header row first.
///
/// Columns are named after the raw factors and the response, e.g.
/// `temp  time  et_w`. Rows walk the grid row by row.
pub fn write_surface_tsv(surface: &Surface, path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    writer.write_record([
        surface.x_factor.column(),
        surface.y_factor.column(),
        surface.response.column(),
    ])?;
    for ((x, y), z) in surface.x.iter().zip(surface.y.iter()).zip(surface.z.iter()) {
        writer.write_record([x.to_string(), y.to_string(), z.to_string()])?;
    }
    writer.flush().map_err(io_error(path))?;
    log::info!(
        "Wrote {}x{} surface to '{}'.",
        surface.resolution(),
        surface.resolution(),
        path.display()
    );
    Ok(())
}

fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
    let toml_string = toml::to_string_pretty(value)?;
    let file = fs::File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(toml_string.as_bytes())
        .map_err(io_error(path))?;
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEntry {
    pub term: String,
    pub label: String,
    pub estimate: f64,
}

/// Fit outcome of one solvent system. Exactly one of `error` and the fit fields is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<FitStatistics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coefficients: Vec<CoefficientEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub source: String,
    pub systems: Vec<SystemSummary>,
}

impl FitSummary {
    pub fn from_fits(source: &str, fits: &SolventFits) -> Self {
        let systems = SolventSystem::ALL
            .into_iter()
            .filter_map(|system| fits.get(&system).map(|result| (system, result)))
            .map(|(system, result)| {
                let mut summary = SystemSummary {
                    key: system.column().to_string(),
                    name: system.system_name().to_string(),
                    error: None,
                    formula: None,
                    statistics: None,
                    coefficients: Vec::new(),
                };
                match result {
                    Ok(model) => {
                        summary.formula = Some(model.formula());
                        summary.statistics = Some(*model.statistics());
                        summary.coefficients = model
                            .spec()
                            .terms()
                            .iter()
                            .zip(model.coefficients().iter())
                            .map(|(term, &estimate)| CoefficientEntry {
                                term: term.name(),
                                label: term.label(),
                                estimate,
                            })
                            .collect();
                    }
                    Err(e) => summary.error = Some(e.to_string()),
                }
                summary
            })
            .collect();
        Self {
            source: source.to_string(),
            systems,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        save_toml(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let toml_string = fs::read_to_string(path).map_err(io_error(path))?;
        Ok(toml::from_str(&toml_string)?)
    }
}

/// Index entry of one dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelEntry {
    pub title: String,
    pub system: String,
    pub column: DashboardColumn,
    pub colorscale: Colorscale,
    pub x_label: String,
    pub y_label: String,
    pub z_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrapolation: Option<ExtrapolationWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardIndex {
    pub title: String,
    pub subtitle: String,
    pub resolution: usize,
    pub panels: Vec<PanelEntry>,
}

/// Writes one TSV per available panel plus a `dashboard.toml` index into `dir`.
pub fn write_dashboard(dashboard: &Dashboard, dir: &Path) -> Result<DashboardIndex, ExportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let mut panels = Vec::with_capacity(dashboard.panels.len());
    for panel in &dashboard.panels {
        let (x_label, y_label) = panel.column.axis_labels();
        let mut entry = PanelEntry {
            title: panel.title(),
            system: panel.system.column().to_string(),
            column: panel.column,
            colorscale: panel.colorscale(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            z_label: PANEL_Z_LABEL.to_string(),
            file: None,
            max_yield: None,
            error: None,
            extrapolation: None,
        };
        match &panel.surface {
            Ok(surface) => {
                let file_name = format!("{}_{}.tsv", panel.system.column(), panel.column.slug());
                write_surface_tsv(surface, &dir.join(&file_name))?;
                entry.file = Some(file_name);
                entry.max_yield = Some(surface.max_value());
                entry.extrapolation = surface.extrapolation;
            }
            Err(reason) => entry.error = Some(reason.clone()),
        }
        panels.push(entry);
    }

    let index = DashboardIndex {
        title: dashboard.title().to_string(),
        subtitle: dashboard.subtitle().to_string(),
        resolution: dashboard.resolution,
        panels,
    };
    save_toml(&index, &dir.join(DASHBOARD_INDEX_FILE))?;
    Ok(index)
}
