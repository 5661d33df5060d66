//! Input/output helpers.
//!
//! - dataset storage trait + dispatch (`store`)
//! - JSON and Parquet dataset formats (`json_store`, `parquet_store`)
//! - CSV exports of fit results (`export`)
//! - PNG figure export (`figure`)

pub mod export;
pub mod figure;
pub mod json_store;
pub mod parquet_store;
pub mod store;

pub use export::*;
pub use figure::*;
pub use json_store::*;
pub use parquet_store::*;
pub use store::*;
