/// Monitoring engine module - runs the periodic health checks of services
///
/// One loop per service executes its check, folds the result into the
/// service's health, and hands failures and transitions on.
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{CheckType, Checker};
pub use executor::MonitoringExecutor;
pub use scheduler::MonitoringScheduler;
pub use types::{CheckResult, MonitorStatus};
