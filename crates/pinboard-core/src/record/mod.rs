//! Ingested records and their on-disk store.

mod model;
mod store;

pub use model::{RECORD_EXTENSION, Record, RecordKind};
pub use store::RecordStore;
