//! Deadline handling shared by every blocking queue operation.

mod deadline;

pub use self::deadline::*;
