//! CSV and JSON export.
//!
//! Curves are written in long format, one row per point:
//!
//! ```text
//! curve,color,x,y,confidence
//! red,#ff0000,0.0,0.12,1.0
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::curve::Curve;
use crate::error::Result;
use crate::report::BatchReport;

const CURVE_HEADER: [&str; 5] = ["curve", "color", "x", "y", "confidence"];

fn write_curves<W: Write>(wtr: &mut csv::Writer<W>, curves: &[Curve]) -> Result<()> {
    wtr.write_record(CURVE_HEADER)?;
    for curve in curves {
        for p in &curve.points {
            wtr.write_record([
                curve.name.clone(),
                curve.color.clone(),
                p.x.to_string(),
                p.y.to_string(),
                format!("{:.3}", p.confidence),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write curves to a CSV file.
pub fn write_curves_csv(path: impl AsRef<Path>, curves: &[Curve]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    write_curves(&mut wtr, curves)
}

/// Render curves as CSV text.
pub fn curves_to_csv_string(curves: &[Curve]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    write_curves(&mut wtr, curves)?;
    let bytes = wtr.into_inner().map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write any report as pretty JSON.
pub fn write_report_json<T: Serialize>(path: impl AsRef<Path>, report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Write one summary row per batch item.
pub fn write_batch_csv(path: impl AsRef<Path>, batch: &BatchReport) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "image",
        "state",
        "accepted",
        "profile",
        "curves",
        "points",
        "quality",
        "elapsed_ms",
        "error",
    ])?;
    for r in &batch.reports {
        let res = &r.result;
        wtr.write_record([
            r.name.clone(),
            serde_json::to_value(res.state)?.as_str().unwrap_or_default().to_string(),
            res.accepted.to_string(),
            res.profile_used.clone(),
            res.curves.iter().filter(|c| !c.is_empty()).count().to_string(),
            res.total_points().to_string(),
            format!("{:.4}", res.quality_score),
            res.processing_time.as_millis().to_string(),
            String::new(),
        ])?;
    }
    for f in &batch.failures {
        wtr.write_record([
            f.name.clone(),
            "error".to_string(),
            "false".to_string(),
            String::new(),
            "0".to_string(),
            "0".to_string(),
            String::new(),
            String::new(),
            f.error.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
