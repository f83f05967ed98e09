//! Issue tracking core for cluster resources: duplicate detection, the
//! active/resolved lifecycle, a relationship graph between issues, and bulk
//! resolution by resource scope.

pub mod configuration;
pub mod db;
pub mod entity;
pub mod migration;
pub mod model;
pub mod service;
pub mod telemetry;

pub use model::{AppError, ErrorCode};
pub use service::{IdGenerator, IssueService, UuidGenerator};
