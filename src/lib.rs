//! Supervision of Geant4 batch runs and procedural meshes for their detector geometry.
//!
//! - [`supervisor`] launches the engine, streams its output and finalizes run records.
//! - [`mesh`] and [`scene`] turn geometry descriptions into placed triangle surfaces.
//! - [`storage`] keeps per-run artifacts and history on disk.

pub mod config;
pub mod error;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod storage;
pub mod supervisor;

pub use config::DashboardPaths;
pub use error::{DashError, DashResult};
pub use supervisor::{LogSubscription, Supervisor};
