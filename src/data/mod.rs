//! Data structures for differential expression tables.

mod table;

pub use table::{Column, RowView, Table, Value};
