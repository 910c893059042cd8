mod round;
mod store;
mod summary;

pub use round::{EventKind, InvalidRound, Round, RoundOutcome};
pub use store::{load_rounds, ReportError, ReportStore};
pub use summary::RunSummary;
