pub mod aggregate;
pub mod backup;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod oracle;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod scanner;

pub use aggregate::{Aggregator, ClassificationSink, ProgramGroups};
pub use backup::{BackupMover, RelocationReport};
pub use config::AppConfig;
pub use engine::{ClassifyResult, Operator, RunOutcome, SweepEngine};
pub use error::Error;
pub use model::{Classification, ClassifiedRecord, FileRecord, Importance};
pub use oracle::{ChatCompletionsOracle, Oracle, OracleClient, OracleError, RetryPolicy};
pub use plan::{SelectionChoices, SelectionSet};
pub use pool::{CancelToken, WorkerPool};
pub use progress::{ProgressReporter, SilentReporter};
