//! Synthetic demo graph command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use curve_extract::{AxisScale, GraphCalibration, GraphCanvas};
use rgb::RGB8;

const RED: RGB8 = RGB8::new(214, 39, 40);
const BLUE: RGB8 = RGB8::new(31, 119, 180);

/// Calibration of the demo graph.
fn calibration(y_log: bool) -> GraphCalibration {
    if y_log {
        GraphCalibration::linear(0.0, 10.0, 1.0, 1000.0).with_scales(AxisScale::Linear, AxisScale::Log)
    } else {
        GraphCalibration::linear(0.0, 10.0, 0.0, 100.0)
    }
}

/// Render the demo graph: a rising and a falling curve plus legend swatches.
fn render(width: usize, height: usize, y_log: bool) -> GraphCanvas {
    let mut canvas = GraphCanvas::new(width, height, calibration(y_log));
    canvas.draw_grid(5);
    canvas.draw_axes();
    if y_log {
        canvas.draw_function(|x| 10f64.powf(0.25 * x + 0.2), 0.0, 10.0, 200, RED, 2.0);
        canvas.draw_function(|x| 10f64.powf(2.8 - 0.2 * x), 0.0, 10.0, 200, BLUE, 2.0);
    } else {
        canvas.draw_function(|x| 8.0 * x + 5.0, 0.0, 10.0, 200, RED, 2.0);
        canvas.draw_function(|x| 90.0 * (-0.3 * x).exp(), 0.0, 10.0, 200, BLUE, 2.0);
    }
    let area = canvas.plot_area();
    let row = area.y0 / 4;
    canvas.draw_swatch(area.x1.saturating_sub(60), row, 12, 6, RED);
    canvas.draw_swatch(area.x1.saturating_sub(30), row, 12, 6, BLUE);
    canvas
}

pub fn run(output: PathBuf, width: usize, height: usize, y_log: bool, verbose: bool) -> Result<()> {
    if width < 100 || height < 100 {
        bail!("Canvas must be at least 100x100, got {width}x{height}");
    }
    let canvas = render(width, height, y_log);
    let area = canvas.plot_area();
    let cal = canvas.mapper().calibration();
    let png = canvas.to_png().context("Failed to encode PNG")?;
    std::fs::write(&output, &png).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} ({} bytes)", output.display(), png.len());
    println!(
        "Calibration: x {}..{}, y {}..{}{}",
        cal.x_min,
        cal.x_max,
        cal.y_min,
        cal.y_max,
        if y_log { " (log)" } else { "" }
    );
    println!("Plot area:   {},{},{},{}", area.x0, area.y0, area.x1, area.y1);
    if verbose {
        println!("Colours:     red #d62728, blue #1f77b4");
    }
    Ok(())
}
