//! Native and token amounts are carried as `u64` base units everywhere
//! inside the process. Fractional-unit math only happens at the edges
//! (config parsing, display, fee percentages).

use anyhow::{bail, Result};
use rusqlite::types::ValueRef;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn sol_to_lamports(sol: f64) -> u64 {
    if sol <= 0.0 {
        return 0;
    }
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Coerce an amount cell to `u64` base units regardless of how the
/// driver materialised it. Large magnitudes come back as TEXT on some
/// paths, smaller ones as INTEGER or REAL; all three must normalise to
/// the same representation before any arithmetic touches them.
pub fn amount_from_sql(value: ValueRef<'_>) -> Result<u64> {
    match value {
        ValueRef::Integer(i) => {
            if i < 0 {
                bail!("negative amount column: {i}");
            }
            Ok(i as u64)
        }
        ValueRef::Real(f) => {
            if f < 0.0 {
                bail!("negative amount column: {f}");
            }
            Ok(f.round() as u64)
        }
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)?.trim();
            if let Ok(v) = s.parse::<u64>() {
                return Ok(v);
            }
            // Decimal-string fallback ("1500000000.0")
            match s.parse::<f64>() {
                Ok(f) if f >= 0.0 => Ok(f.round() as u64),
                _ => bail!("unparseable amount column: '{s}'"),
            }
        }
        ValueRef::Null => Ok(0),
        other => bail!("unexpected amount column type: {other:?}"),
    }
}
