use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::bench::{BenchmarkResult, EvalOutcome};

/// Save benchmark outcomes into a SQLite table, curve vectors encoded as
/// bincode blobs. An existing file at `path` is replaced.
pub fn save_results_sqlite(results: &BenchmarkResult, path: &str) -> Result<()> {
    let _ = std::fs::remove_file(path);
    let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
    conn.execute(
        "CREATE TABLE bench_results (
            method TEXT, curves BLOB, mean_curve BLOB, roc REAL
        )",
        [],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO bench_results (method, curves, mean_curve, roc) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (method, outcome) in results {
        stmt.execute(params![
            method,
            bincode::serialize(&outcome.curves)?,
            bincode::serialize(&outcome.mean_curve)?,
            outcome.roc,
        ])?;
    }

    Ok(())
}

/// Load benchmark outcomes previously written by `save_results_sqlite`.
pub fn load_results_sqlite(path: &str) -> Result<BenchmarkResult> {
    let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
    let mut stmt = conn.prepare("SELECT method, curves, mean_curve, roc FROM bench_results")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Vec<u8>>(1)?,
            row.get::<_, Vec<u8>>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let mut result = BenchmarkResult::new();
    for row in rows {
        let (method, curves, mean, roc) = row?;
        result.insert(
            method,
            EvalOutcome {
                curves: bincode::deserialize(&curves)?,
                mean_curve: bincode::deserialize(&mean)?,
                roc,
            },
        );
    }
    Ok(result)
}
