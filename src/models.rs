pub mod enums;
pub mod structs;

pub use enums::{RowLabel, StepKind, Value};
pub use structs::{AnnotatedTable, Group, ResultTable, Step, TableSnapshot};
