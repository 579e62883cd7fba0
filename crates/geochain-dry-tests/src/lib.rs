// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for geochain crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`engine`] - In-process geometry engine implementing the transport seam
//! - [`fixtures`] - Reference geometries and spatial references used across suites

pub mod config;
pub mod engine;
mod eval;
pub mod fixtures;

pub use config::InMemoryConfigStore;
pub use engine::FakeEngine;
pub use fixtures::{nad27_lines, point, square, NAD27_LINES_WKT};
