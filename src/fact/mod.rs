//! 校验事实表：宽观测 → 窄事实行

pub mod observation;
pub mod reader;
pub mod row;
pub mod writer;

pub use observation::{OccurrenceMap, ValidationObservation};
pub use reader::FactReader;
pub use row::{fact_schema, normalize, parse_rule_id, FactRow, MAX_VALUE_CHARS};
pub use writer::FactWriter;
