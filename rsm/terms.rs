//! # Model Specification
//!
//! The published model is a reduced cubic polynomial in the coded factors. Rather
//! than assembling a formula string per response column, the model is described
//! by a structured list of terms (`ModelSpec`) and bound to a dependent column in
//! a separate step (`ModelSpec::bind`).
//!
//! Every term is a monomial in the coded factors. The term list fixes the column
//! order of the design matrix and of the coefficient vector.

use crate::coding::{CodedFactors, Factor};
use crate::types::SolventSystem;
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural category of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermKind {
    Intercept,
    Linear,
    Quadratic,
    /// Product of two or more factors, each raised to a power of one or more.
    Interaction,
}

/// A coded factor raised to a positive integer power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorPower {
    pub factor: Factor,
    pub exponent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub kind: TermKind,
    pub factors: Vec<FactorPower>,
}

impl Term {
    pub fn intercept() -> Self {
        Self {
            kind: TermKind::Intercept,
            factors: Vec::new(),
        }
    }

    pub fn linear(factor: Factor) -> Self {
        Self {
            kind: TermKind::Linear,
            factors: vec![FactorPower {
                factor,
                exponent: 1,
            }],
        }
    }

    pub fn quadratic(factor: Factor) -> Self {
        Self {
            kind: TermKind::Quadratic,
            factors: vec![FactorPower {
                factor,
                exponent: 2,
            }],
        }
    }

    /// Product term, e.g. `interaction(&[(Factor::Time, 2), (Factor::Solvent, 1)])` for t²·S.
    pub fn interaction(parts: &[(Factor, u32)]) -> Self {
        Self {
            kind: TermKind::Interaction,
            factors: parts
                .iter()
                .map(|&(factor, exponent)| FactorPower { factor, exponent })
                .collect(),
        }
    }

    pub fn is_intercept(&self) -> bool {
        self.kind == TermKind::Intercept
    }

    /// Value of the regressor at a coded point.
    pub fn evaluate(&self, coded: &CodedFactors) -> f64 {
        self.factors
            .iter()
            .map(|p| coded.get(p.factor).powi(p.exponent as i32))
            .product()
    }

    /// Formula notation: `t_cod`, `I(t_cod**2)`, `t_cod:T_cod`, `I(t_cod**2):S_cod`.
    pub fn name(&self) -> String {
        if self.is_intercept() {
            return "Intercept".to_string();
        }
        self.factors
            .iter()
            .map(|p| match p.exponent {
                1 => p.factor.coded_name().to_string(),
                e => format!("I({}**{})", p.factor.coded_name(), e),
            })
            .join(":")
    }

    /// Human-readable label: `Time`, `Temp²`, `Time:Solvent`, `Time²:Temp²`.
    pub fn label(&self) -> String {
        match self.kind {
            TermKind::Intercept => "Intercept".to_string(),
            TermKind::Linear if self.factors.len() == 1 => {
                self.factors[0].factor.term_label().to_string()
            }
            _ => self
                .factors
                .iter()
                .map(|p| format!("{}{}", p.factor.short_label(), superscript(p.exponent)))
                .join(":"),
        }
    }
}

fn superscript(exponent: u32) -> String {
    match exponent {
        1 => String::new(),
        2 => "²".to_string(),
        3 => "³".to_string(),
        e => format!("^{e}"),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// An ordered term list shared by every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    terms: Vec<Term>,
}

impl ModelSpec {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    /// The article-validated reduced cubic model.
    ///
    /// `S_cod²` is intentionally absent: the published model drops it, and the
    /// term set is kept exactly as validated.
    pub fn reduced_cubic() -> Self {
        use Factor::{Solvent, Temperature, Time};
        Self::new(vec![
            Term::intercept(),
            Term::linear(Time),
            Term::linear(Temperature),
            Term::linear(Solvent),
            Term::quadratic(Time),
            Term::quadratic(Temperature),
            Term::interaction(&[(Time, 1), (Temperature, 1)]),
            Term::interaction(&[(Time, 1), (Solvent, 1)]),
            Term::interaction(&[(Time, 2), (Solvent, 1)]),
            Term::interaction(&[(Time, 1), (Temperature, 2)]),
            Term::interaction(&[(Time, 2), (Temperature, 2)]),
        ])
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Number of coefficients, intercept included.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of regressors excluding the intercept.
    pub fn num_regressors(&self) -> usize {
        self.terms.iter().filter(|t| !t.is_intercept()).count()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name() == name)
    }

    /// Regressor row for a single coded point.
    pub fn design_row(&self, coded: &CodedFactors) -> Vec<f64> {
        self.terms.iter().map(|t| t.evaluate(coded)).collect()
    }

    /// Design matrix of shape `[points.len(), self.len()]`.
    pub fn design_matrix(&self, points: &[CodedFactors]) -> Array2<f64> {
        let mut x = Array2::zeros((points.len(), self.terms.len()));
        for (mut row, point) in x.rows_mut().into_iter().zip(points) {
            for (cell, term) in row.iter_mut().zip(&self.terms) {
                *cell = term.evaluate(point);
            }
        }
        x
    }

    /// Attaches the dependent column.
    pub fn bind(self, response: SolventSystem) -> BoundSpec {
        BoundSpec {
            spec: self,
            response,
        }
    }
}

/// A term list bound to the yield column it explains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundSpec {
    pub spec: ModelSpec,
    pub response: SolventSystem,
}

impl BoundSpec {
    /// Formula in the conventional `y ~ a + b` notation, for logs and reports.
    pub fn formula(&self) -> String {
        let rhs = self
            .spec
            .terms()
            .iter()
            .filter(|t| !t.is_intercept())
            .map(Term::name)
            .join(" + ");
        format!("{} ~ {}", self.response.column(), rhs)
    }
}
