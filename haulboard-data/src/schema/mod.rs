//! Schema discovery for tables whose columns were renamed over time.

mod memo;
mod prober;

pub use memo::SchemaMemo;
pub use prober::{ColumnProbe, SchemaProber, SchemaVerification, SelectColumnProbe};
