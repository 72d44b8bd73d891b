pub mod backend;
pub mod errors;
pub mod factory;
pub mod local;
pub mod remote;
pub mod writer;

pub use backend::{AppBackend, HistoryQuery, ImportSummary, Visit, VisitOutcome};
pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};
pub use local::AppLocal;
