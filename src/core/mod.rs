pub mod checks;
pub mod doctor;
pub mod ent;
pub mod group;
pub mod logger;
pub mod source;
pub use checks::{Check, CheckError, ReadOnly};
pub use doctor::*;
pub use ent::*;
pub use source::{MetricSource, Query, ReplaySource, Row, SourceError};
