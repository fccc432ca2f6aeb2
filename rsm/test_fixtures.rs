//! Test fixtures for the response-surface tests.
//!
//! Builds a synthetic central composite design on the published coding (factorial
//! corners at ±1, axial points at ±1.5, six center replicates) with yields given
//! by a caller-supplied function of the raw conditions.

use crate::coding::{CodedFactors, CodingScheme, RawFactors};
use crate::data::{ExperimentData, ExperimentRecord};
use crate::terms::ModelSpec;

/// Axial distance of the synthetic design, in coded units.
pub const AXIAL: f64 = 1.5;

/// Coefficients of a known reduced cubic surface, in term order.
pub const TRUE_COEFFICIENTS: [f64; 11] = [
    12.0, 1.5, -0.8, 2.2, -1.1, -0.6, 0.4, -0.3, 0.25, 0.15, -0.2,
];

/// Raw conditions of the synthetic design.
pub fn ccd_design() -> Vec<RawFactors> {
    let scheme = CodingScheme::default();
    let mut coded = Vec::with_capacity(20);
    for &t in &[-1.0, 1.0] {
        for &T in &[-1.0, 1.0] {
            for &S in &[-1.0, 1.0] {
                coded.push(CodedFactors { t, T, S });
            }
        }
    }
    for &a in &[-AXIAL, AXIAL] {
        coded.push(CodedFactors {
            t: a,
            T: 0.0,
            S: 0.0,
        });
        coded.push(CodedFactors {
            t: 0.0,
            T: a,
            S: 0.0,
        });
        coded.push(CodedFactors {
            t: 0.0,
            T: 0.0,
            S: a,
        });
    }
    for _ in 0..6 {
        coded.push(CodedFactors {
            t: 0.0,
            T: 0.0,
            S: 0.0,
        });
    }
    coded.iter().map(|c| scheme.decode(c)).collect()
}

/// Yield of the known reduced cubic surface at a raw condition.
pub fn polynomial_yield(raw: &RawFactors) -> f64 {
    let coded = CodingScheme::default().code(raw);
    ModelSpec::reduced_cubic()
        .design_row(&coded)
        .iter()
        .zip(TRUE_COEFFICIENTS)
        .map(|(x, b)| x * b)
        .sum()
}

/// Records for the synthetic design. `et_w` follows `yield_fn`; the other two
/// systems are affine transforms of it so every system is fittable.
pub fn ccd_records(yield_fn: impl Fn(&RawFactors) -> f64) -> Vec<ExperimentRecord> {
    ccd_design()
        .into_iter()
        .map(|factors| {
            let y = yield_fn(&factors);
            ExperimentRecord {
                factors,
                et_w: y,
                pg_w: 0.5 * y + 1.0,
                gly_w: 2.0 * y - 3.0,
            }
        })
        .collect()
}

pub fn ccd_data(yield_fn: impl Fn(&RawFactors) -> f64) -> ExperimentData {
    ExperimentData::from_records(&ccd_records(yield_fn)).expect("synthetic design is valid")
}

/// The synthetic design rendered as a CSV table.
pub fn ccd_csv(yield_fn: impl Fn(&RawFactors) -> f64) -> String {
    let mut lines = vec!["time,temp,solvent,et_w,pg_w,gly_w".to_string()];
    for r in ccd_records(yield_fn) {
        lines.push(format!(
            "{},{},{},{},{},{}",
            r.factors.time, r.factors.temperature, r.factors.solvent, r.et_w, r.pg_w, r.gly_w
        ));
    }
    lines.join("\n")
}
