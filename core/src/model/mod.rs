pub mod filter;
pub mod record;
pub mod target;

pub use filter::{DateRange, Filter, Sensitivity, Source, SourceType};
pub use record::{AnomalyInterval, AnomalyKind, CountryCode, Record, Series, SeriesPoint};
pub use target::{Target, TargetId, TargetSpec, TargetState};
