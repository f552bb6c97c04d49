pub mod enriched;
pub mod raw;
pub mod record;

pub use enriched::{EnrichedRecord, EnrichedTable, Trend};
pub use raw::{RawTable, RawValue};
pub use record::{Field, Metric, WellnessRecord, WellnessTable};
