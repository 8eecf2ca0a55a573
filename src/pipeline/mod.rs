//! Pipeline entry points.
//!
//! - `run_import`: Import sources concurrently under the outer deadline
//! - `run_plan`: Import, normalize and merge into a weekly plan
//! - `run_validate`: Check a configuration file

pub mod import;
pub mod plan;
pub mod validate;

pub use import::run_import;
pub use plan::{plan_from_report, run_plan};
pub use validate::run_validate;
