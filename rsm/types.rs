use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The three solvent systems of the extraction design. Each one owns a yield
/// column in the input table and is modelled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolventSystem {
    /// Ethanol-water mixtures, yield column `et_w`.
    Ethanol,
    /// Propylene glycol-water mixtures, yield column `pg_w`.
    PropyleneGlycol,
    /// Glycerol-water mixtures, yield column `gly_w`.
    Glycerol,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown solvent system '{0}'. Expected one of: et_w, pg_w, gly_w.")]
pub struct UnknownSolventSystem(pub String);

impl SolventSystem {
    /// Canonical order: the dashboard rows follow it.
    pub const ALL: [SolventSystem; 3] = [
        SolventSystem::Ethanol,
        SolventSystem::PropyleneGlycol,
        SolventSystem::Glycerol,
    ];

    /// Name of the dependent column in the experiment table.
    pub fn column(self) -> &'static str {
        match self {
            SolventSystem::Ethanol => "et_w",
            SolventSystem::PropyleneGlycol => "pg_w",
            SolventSystem::Glycerol => "gly_w",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SolventSystem::Ethanol => "Ethanol",
            SolventSystem::PropyleneGlycol => "Propylene Glycol",
            SolventSystem::Glycerol => "Glycerol",
        }
    }

    /// Name of the binary mixture, as used in the comparative dashboard.
    pub fn system_name(self) -> &'static str {
        match self {
            SolventSystem::Ethanol => "Ethanol-Water",
            SolventSystem::PropyleneGlycol => "Propylene Glycol-Water",
            SolventSystem::Glycerol => "Glycerol-Water",
        }
    }

    pub fn short_code(self) -> &'static str {
        match self {
            SolventSystem::Ethanol => "Et-W",
            SolventSystem::PropyleneGlycol => "PG-W",
            SolventSystem::Glycerol => "Gly-W",
        }
    }
}

impl fmt::Display for SolventSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SolventSystem {
    type Err = UnknownSolventSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        SolventSystem::ALL
            .into_iter()
            .find(|system| {
                key == system.column()
                    || key == system.display_name().to_ascii_lowercase()
                    || key == system.short_code().to_ascii_lowercase()
            })
            .ok_or_else(|| UnknownSolventSystem(s.to_string()))
    }
}
