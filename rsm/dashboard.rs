//! # Comparative Dashboard
//!
//! A 3×3 matrix of surfaces. Rows are solvent systems, columns are the three
//! canonical slices, each holding one factor at its design center. Every panel
//! is evaluated independently: a system whose fit failed, or a slice that could
//! not be generated, only blanks its own panels.

use crate::coding::{CodingScheme, Factor};
use crate::data::ObservedRanges;
use crate::fit::SolventFits;
use crate::surface::{Surface, SurfaceRequest, generate_surface, swept_factors};
use crate::types::SolventSystem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid resolution of every dashboard panel.
pub const DASHBOARD_RESOLUTION: usize = 30;
pub const DASHBOARD_TITLE: &str = "Extraction Optimization Dashboard";
pub const DASHBOARD_SUBTITLE: &str =
    "Comparative Analysis of 3 Solvent Systems (Article-Validated Reduced Cubic Model)";
/// Z-axis label shared by all panels.
pub const PANEL_Z_LABEL: &str = "Yield";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colorscale {
    Viridis,
    Plasma,
    Cividis,
}

impl fmt::Display for Colorscale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Colorscale::Viridis => "Viridis",
            Colorscale::Plasma => "Plasma",
            Colorscale::Cividis => "Cividis",
        };
        write!(f, "{name}")
    }
}

/// One column of the matrix: which factor is held and how the column is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DashboardColumn {
    /// Solvent held; temperature and time swept.
    TimeVsTemp,
    /// Temperature held; solvent and time swept.
    TimeVsSolvent,
    /// Time held; temperature and solvent swept.
    TempVsSolvent,
}

impl DashboardColumn {
    pub const ALL: [DashboardColumn; 3] = [
        DashboardColumn::TimeVsTemp,
        DashboardColumn::TimeVsSolvent,
        DashboardColumn::TempVsSolvent,
    ];

    pub fn fixed_factor(self) -> Factor {
        match self {
            DashboardColumn::TimeVsTemp => Factor::Solvent,
            DashboardColumn::TimeVsSolvent => Factor::Temperature,
            DashboardColumn::TempVsSolvent => Factor::Time,
        }
    }

    /// The held value: the design center of the fixed factor.
    pub fn fixed_value(self) -> f64 {
        CodingScheme::default().center(self.fixed_factor())
    }

    pub fn title(self) -> &'static str {
        match self {
            DashboardColumn::TimeVsTemp => "Time vs Temp",
            DashboardColumn::TimeVsSolvent => "Time vs Solv",
            DashboardColumn::TempVsSolvent => "Temp vs Solv",
        }
    }

    pub fn colorscale(self) -> Colorscale {
        match self {
            DashboardColumn::TimeVsTemp => Colorscale::Viridis,
            DashboardColumn::TimeVsSolvent => Colorscale::Plasma,
            DashboardColumn::TempVsSolvent => Colorscale::Cividis,
        }
    }

    /// File-name friendly key.
    pub fn slug(self) -> &'static str {
        match self {
            DashboardColumn::TimeVsTemp => "time_vs_temp",
            DashboardColumn::TimeVsSolvent => "time_vs_solv",
            DashboardColumn::TempVsSolvent => "temp_vs_solv",
        }
    }

    /// Compact `(x, y)` axis titles for the swept factors.
    pub fn axis_labels(self) -> (&'static str, &'static str) {
        let (x, y) = swept_factors(self.fixed_factor());
        (panel_axis_label(x), panel_axis_label(y))
    }

    pub fn request(self, resolution: usize) -> SurfaceRequest {
        SurfaceRequest::new(self.fixed_factor(), self.fixed_value()).with_resolution(resolution)
    }
}

fn panel_axis_label(factor: Factor) -> &'static str {
    match factor {
        Factor::Time => "Time (min)",
        Factor::Temperature => "Temp (°C)",
        Factor::Solvent => "Solvent (%)",
    }
}

/// One cell of the matrix. `surface` carries the reason when the panel is blank.
#[derive(Debug, Clone)]
pub struct DashboardPanel {
    pub system: SolventSystem,
    pub column: DashboardColumn,
    pub surface: Result<Surface, String>,
}

impl DashboardPanel {
    /// e.g. `Et-W: Time vs Temp`.
    pub fn title(&self) -> String {
        format!("{}: {}", self.system.short_code(), self.column.title())
    }

    pub fn colorscale(&self) -> Colorscale {
        self.column.colorscale()
    }

    pub fn is_available(&self) -> bool {
        self.surface.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub resolution: usize,
    /// Row-major, rows in `SolventSystem::ALL` order.
    pub panels: Vec<DashboardPanel>,
}

impl Dashboard {
    pub fn title(&self) -> &'static str {
        DASHBOARD_TITLE
    }

    pub fn subtitle(&self) -> &'static str {
        DASHBOARD_SUBTITLE
    }

    pub fn rows(&self) -> usize {
        SolventSystem::ALL.len()
    }

    pub fn cols(&self) -> usize {
        DashboardColumn::ALL.len()
    }

    pub fn panel(&self, row: usize, col: usize) -> Option<&DashboardPanel> {
        if col >= self.cols() {
            return None;
        }
        self.panels.get(row * self.cols() + col)
    }

    pub fn available_panels(&self) -> usize {
        self.panels.iter().filter(|p| p.is_available()).count()
    }
}

/// Evaluates all nine panels from a set of per-system fits.
pub fn build_dashboard(
    fits: &SolventFits,
    ranges: &ObservedRanges,
    resolution: usize,
) -> Dashboard {
    let mut panels = Vec::with_capacity(SolventSystem::ALL.len() * DashboardColumn::ALL.len());
    for system in SolventSystem::ALL {
        for column in DashboardColumn::ALL {
            let surface = match fits.get(&system) {
                Some(Ok(model)) => generate_surface(model, ranges, &column.request(resolution))
                    .map_err(|e| e.to_string()),
                Some(Err(e)) => Err(e.to_string()),
                None => Err(format!("{system} was not fitted")),
            };
            if let Err(reason) = &surface {
                log::warn!(
                    "Panel '{}: {}' is unavailable: {}",
                    system.short_code(),
                    column.title(),
                    reason
                );
            }
            panels.push(DashboardPanel {
                system,
                column,
                surface,
            });
        }
    }
    log::info!(
        "Dashboard built: {} of {} panels available.",
        panels.iter().filter(|p| p.is_available()).count(),
        panels.len()
    );
    Dashboard { resolution, panels }
}
