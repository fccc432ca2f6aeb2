#![deny(dead_code)]
#![deny(unused_imports)]
#![allow(non_snake_case)]

pub mod coding;
pub mod dashboard;
pub mod data;
pub mod explorer;
pub mod export;
pub mod fit;
pub mod source;
pub mod surface;
pub mod terms;
pub mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;
