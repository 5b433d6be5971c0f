//! Radiation fault model.
//!
//! - [`config`]: radiation settings and the perturbation convention
//! - [`injector`]: seeded drawing of radiation events and their schedule over a run
pub mod config;
pub mod injector;
