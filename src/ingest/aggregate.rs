//! Table cleaning and per-agent aggregation.

use crate::error::IngestError;
use crate::ingest::schema::Schema;
use crate::ingest::stats::{describe, DescriptiveStats};
use crate::ingest::table::RawTable;
use serde::Serialize;
use tracing::{debug, info};

const RUN_ID_COLUMN: usize = 0;
const TIME_COLUMN: usize = 1;
const BID_COLUMN: usize = 2;
const ASK_COLUMN: usize = 3;

/// Per-agent statistics, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStats {
    entries: Vec<(String, DescriptiveStats)>,
}

impl AgentStats {
    #[allow(dead_code)] // Keyed lookup; pipeline callers go through iter()
    pub fn get(&self, agent: &str) -> Option<&DescriptiveStats> {
        self.entries
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, stats)| stats)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DescriptiveStats)> + '_ {
        self.entries.iter().map(|(name, stats)| (name.as_str(), stats))
    }
}

/// Cells replaced by zero during cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionLoss {
    pub total: usize,
    /// `(column label, replaced cells)`, only for columns that lost cells.
    pub by_column: Vec<(String, usize)>,
}

impl CoercionLoss {
    #[allow(dead_code)] // Keyed lookup; reports walk by_column directly
    pub fn for_column(&self, label: &str) -> usize {
        self.by_column
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    fn record(&mut self, label: &str, lost: usize) {
        if lost > 0 {
            self.total += lost;
            self.by_column.push((label.to_string(), lost));
        }
    }
}

/// The fixed columns and every schema-mapped column, coerced to numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanedTable {
    pub run_ids: Vec<String>,
    pub time: Vec<f64>,
    pub bid: Vec<f64>,
    pub ask: Vec<f64>,
    /// `(agent, average balance per row)`, in schema order.
    pub agents: Vec<(String, Vec<f64>)>,
}

impl CleanedTable {
    pub fn rows(&self) -> usize {
        self.time.len()
    }

    #[allow(dead_code)] // Keyed lookup; exporters walk agents in order
    pub fn agent_values(&self, agent: &str) -> Option<&[f64]> {
        self.agents
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, values)| values.as_slice())
    }
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub stats: AgentStats,
    pub table: CleanedTable,
    pub coercion_loss: CoercionLoss,
}

/// Parse a cell as a finite number.
pub fn parse_numeric(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Coerce one column, returning the values and how many cells became zero.
fn coerce_column(table: &RawTable, col: usize) -> (Vec<f64>, usize) {
    let mut lost = 0;
    let values: Vec<f64> = table
        .column(col)
        .map(|cell| {
            parse_numeric(cell).unwrap_or_else(|| {
                lost += 1;
                0.0
            })
        })
        .collect();
    (values, lost)
}

/// Clean `table` against `schema` and describe every agent column.
pub fn aggregate(table: &RawTable, schema: &Schema) -> Result<Aggregation, IngestError> {
    if schema.is_empty() {
        return Err(IngestError::EmptySchema);
    }

    let mut loss = CoercionLoss::default();

    let run_ids = table
        .column(RUN_ID_COLUMN)
        .map(|cell| cell.unwrap_or("").trim().to_string())
        .collect();

    let (time, lost) = coerce_column(table, TIME_COLUMN);
    loss.record("time", lost);
    let (bid, lost) = coerce_column(table, BID_COLUMN);
    loss.record("bid", lost);
    let (ask, lost) = coerce_column(table, ASK_COLUMN);
    loss.record("ask", lost);

    let mut agents = Vec::with_capacity(schema.len());
    let mut entries = Vec::with_capacity(schema.len());
    for (agent, col) in schema.iter() {
        let (values, lost) = coerce_column(table, col);
        loss.record(agent, lost);

        if let Some(stats) = describe(&values) {
            entries.push((agent.to_string(), stats));
        }
        agents.push((agent.to_string(), values));
    }

    if loss.total > 0 {
        info!("Replaced {} non-numeric cell(s) with zero", loss.total);
    }
    debug!("Aggregated {} agent column(s) over {} row(s)", agents.len(), time.len());

    Ok(Aggregation {
        stats: AgentStats { entries },
        table: CleanedTable {
            run_ids,
            time,
            bid,
            ask,
            agents,
        },
        coercion_loss: loss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::schema::infer_schema;

    #[test]
    fn test_coerces_bad_cells_to_zero() {
        let table = RawTable::parse(
            "r1,1,100,110,ZIC,x,y,1\n\
             r1,2,101,111,ZIC,x,y,x\n\
             r1,3,102,112,ZIC,x,y,3\n\
             r1,4,103,113,ZIC,x,y\n",
        );
        let inferred = infer_schema(&table).unwrap();
        let result = aggregate(&table, &inferred.schema).unwrap();

        assert_eq!(
            result.table.agent_values("ZIC"),
            Some(&[1.0, 0.0, 3.0, 0.0][..])
        );
        assert_eq!(result.coercion_loss.for_column("ZIC"), 2);
        assert_eq!(result.coercion_loss.total, 2);
    }

    #[test]
    fn test_end_to_end_stats() {
        let table = RawTable::parse(
            "t0,1,100,110,ZIP,a,b,10\n\
             t0,2,100,110,ZIP,a,b,20\n\
             t0,3,100,110,ZIP,a,b,30\n",
        );
        let inferred = infer_schema(&table).unwrap();
        let result = aggregate(&table, &inferred.schema).unwrap();

        let zip = result.stats.get("ZIP").unwrap();
        assert_eq!(zip.mean, 20.0);
        assert_eq!(zip.min, 10.0);
        assert_eq!(zip.max, 30.0);
        assert_eq!(zip.count, 3);
        assert_eq!(result.table.rows(), 3);
        assert_eq!(result.table.run_ids, vec!["t0", "t0", "t0"]);
    }

    #[test]
    fn test_fixed_columns_are_counted() {
        let table = RawTable::parse("r,1,NaN,110,GVWY,a,b,5\nr,two,100,,GVWY,a,b,6\n");
        let inferred = infer_schema(&table).unwrap();
        let result = aggregate(&table, &inferred.schema).unwrap();

        assert_eq!(result.table.time, vec![1.0, 0.0]);
        assert_eq!(result.table.bid, vec![0.0, 100.0]);
        assert_eq!(result.table.ask, vec![110.0, 0.0]);
        assert_eq!(result.coercion_loss.total, 3);
        assert_eq!(result.coercion_loss.for_column("GVWY"), 0);
    }

    #[test]
    fn test_empty_schema_is_error() {
        let table = RawTable::parse("r,1,100,110\n");
        let inferred = infer_schema(&table).unwrap();
        assert!(matches!(
            aggregate(&table, &inferred.schema),
            Err(IngestError::EmptySchema)
        ));
    }

    #[test]
    fn test_deterministic_output() {
        let table = RawTable::parse(
            "r,1,1,1,A,x,y,0.1\nr,2,1,1,A,x,y,0.2\nr,3,1,1,A,x,y,0.3\nr,4,1,1,A,x,y,0.7\n",
        );
        let schema = infer_schema(&table).unwrap().schema;
        let first = aggregate(&table, &schema).unwrap();
        let second = aggregate(&table, &schema).unwrap();

        let a = first.stats.get("A").unwrap().as_row();
        let b = second.stats.get("A").unwrap().as_row();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
