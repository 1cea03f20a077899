//! `recongrid-core`: table model shared by the io and recon crates.

pub mod cell;
pub mod money;
pub mod table;

pub use cell::CellValue;
pub use table::{Record, RecordSet};
