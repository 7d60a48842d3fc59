//! Headless rasterization of composite figures.
//!
//! The output bitmap is split evenly into the composite's grid and each
//! panel draws its marks into its cell. No font backend is loaded, so
//! rendering works in bare environments; titles, labels, and ranges
//! stay addressable on the figure structure instead of being burned
//! into pixels.

use std::io::Cursor;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{CompositeFigure, Panel, PanelSeries};
use crate::error::{Error, Result};

/// Output geometry for rasterization.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub panel_width: u32,
    pub panel_height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            panel_width: 640,
            panel_height: 400,
        }
    }
}

/// Hard cap on either output dimension, in pixels. Untrusted code can
/// request arbitrarily large grids; this bounds the allocation.
const MAX_DIMENSION: u32 = 8192;

/// Series color cycle.
const PALETTE: &[RGBColor] = &[
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

pub(super) fn render_png(figure: &CompositeFigure, options: &RenderOptions) -> Result<Vec<u8>> {
    let width = options.panel_width.saturating_mul(figure.cols as u32);
    let height = options.panel_height.saturating_mul(figure.rows as u32);
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::Render(format!(
            "output geometry {width}x{height} is outside the supported range"
        )));
    }
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;
        let cells = root.split_evenly((figure.rows, figure.cols));
        for (index, panel) in figure.panels.iter().enumerate() {
            let cell = (panel.row - 1) * figure.cols + (panel.col - 1);
            let area = cells.get(cell).ok_or_else(|| {
                Error::Render(format!(
                    "panel placed at ({}, {}) has no grid cell",
                    panel.row, panel.col
                ))
            })?;
            draw_panel(area, panel, &PALETTE[index % PALETTE.len()])?;
        }
        root.present().map_err(draw_error)?;
    }
    let image = image::RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| Error::Render("pixel buffer does not match the output geometry".to_string()))?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|error| Error::Render(error.to_string()))?;
    Ok(png)
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel,
    color: &RGBColor,
) -> Result<()> {
    match &panel.series {
        PanelSeries::Bars { values, .. } => {
            let slots = values.len().max(1) as f64;
            let (y_min, y_max) = padded(panel.y_axis.range, true);
            let mut chart = ChartBuilder::on(area)
                .margin(12)
                .build_cartesian_2d(0f64..slots, y_min..y_max)
                .map_err(draw_error)?;
            chart
                .draw_series(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(_, value)| value.is_finite())
                        .map(|(slot, value)| {
                            Rectangle::new(
                                [(slot as f64 + 0.15, 0.0), (slot as f64 + 0.85, *value)],
                                color.filled(),
                            )
                        }),
                )
                .map_err(draw_error)?;
        }
        PanelSeries::Lines { points } => {
            let (x_min, x_max) = padded(panel.x_axis.range, false);
            let (y_min, y_max) = padded(panel.y_axis.range, false);
            let mut chart = ChartBuilder::on(area)
                .margin(12)
                .build_cartesian_2d(x_min..x_max, y_min..y_max)
                .map_err(draw_error)?;
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color))
                .map_err(draw_error)?;
        }
        PanelSeries::Points { points } => {
            let (x_min, x_max) = padded(panel.x_axis.range, false);
            let (y_min, y_max) = padded(panel.y_axis.range, false);
            let mut chart = ChartBuilder::on(area)
                .margin(12)
                .build_cartesian_2d(x_min..x_max, y_min..y_max)
                .map_err(draw_error)?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|(x, y)| Circle::new((*x, *y), 4, color.filled())),
                )
                .map_err(draw_error)?;
        }
        PanelSeries::Indicator { value } => {
            let mut chart = ChartBuilder::on(area)
                .margin(12)
                .build_cartesian_2d(0f64..1f64, 0f64..1f64)
                .map_err(draw_error)?;
            let ceiling = panel.y_axis.range.1;
            let fill = if ceiling > 0.0 {
                (value.abs() / ceiling).clamp(0.0, 1.0)
            } else {
                0.0
            };
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(0.0, 0.4), (fill, 0.6)],
                    color.filled(),
                )))
                .map_err(draw_error)?;
        }
    }
    Ok(())
}

fn draw_error<E: std::fmt::Display>(error: E) -> Error {
    Error::Render(error.to_string())
}

/// Widen a resolved range so marks never sit on the cell border; bar
/// panels also keep the zero baseline in view.
fn padded((min, max): (f64, f64), include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = (min, max);
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}
