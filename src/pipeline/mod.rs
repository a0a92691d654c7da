//! Journey collection for dead stops: identifier resolution, query
//! execution, filtering and resumable persistence.

pub mod executor;
pub mod filter;
pub mod resolver;
pub mod resume;
pub mod runner;

pub use executor::{JourneyQueryExecutor, JourneyResult};
pub use filter::{FilterRejection, TravelWindowFilter};
pub use resolver::{Resolution, StopIdentifierResolver};
pub use resume::ResultStore;
pub use runner::{JourneyPass, RunSummary};
