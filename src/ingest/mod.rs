//! Result ingestion: table loading, schema inference, cleaning and
//! statistics.

pub mod aggregate;
pub mod crossrun;
pub mod schema;
pub mod stats;
pub mod table;

pub use aggregate::{aggregate, AgentStats, Aggregation, CleanedTable, CoercionLoss};
pub use schema::{infer_schema, InferredSchema, Schema, SchemaWarning};
pub use table::RawTable;

use crate::error::IngestError;
use std::path::Path;

/// Everything produced by ingesting one output table.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub rows: usize,
    pub columns: usize,
    pub schema: Schema,
    pub warnings: Vec<SchemaWarning>,
    pub aggregation: Aggregation,
}

/// Load `path`, infer its schema and aggregate it.
pub fn ingest_file(path: &Path) -> Result<Ingested, IngestError> {
    let table = RawTable::load(path)?;
    ingest_table(&table)
}

pub fn ingest_table(table: &RawTable) -> Result<Ingested, IngestError> {
    let InferredSchema { schema, warnings } = infer_schema(table)?;
    let aggregation = aggregate(table, &schema)?;
    Ok(Ingested {
        rows: table.row_count(),
        columns: table.column_count(),
        schema,
        warnings,
        aggregation,
    })
}
