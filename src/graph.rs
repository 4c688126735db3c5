use image::{ColorType, ImageEncoder, codecs::png::PngEncoder};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::ops::Range;

use crate::error::{ReportError, ReportResult};
use crate::report::CalibrationReport;
use crate::switch_test::{HysteresisPoint, hysteresis_branches};

/// Charts available for a transmitter table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmitterChart {
    /// Ideal and measured output against percentage of range
    #[default]
    Response,

    /// Percentage error against percentage of range
    Error,
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    /// Generic labels at 800x600 pixels
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl GraphOptions {
    /// Default labels for a chart of `report`, at the given size
    pub fn for_transmitter(
        report: &CalibrationReport,
        kind: TransmitterChart,
        width: u32,
        height: u32,
    ) -> Self {
        let unit = report.configuration.signal_domain.unit();
        let (title, y_label) = match kind {
            TransmitterChart::Response => (
                "Transmitter response".to_string(),
                format!("Output ({})", unit),
            ),
            TransmitterChart::Error => (
                "Output error".to_string(),
                "Error (% of span)".to_string(),
            ),
        };

        Self {
            title,
            x_label: "% of range".to_string(),
            y_label,
            width,
            height,
        }
    }

    pub fn for_switch(report: &CalibrationReport, width: u32, height: u32) -> Self {
        let kind = report.switch_kind;
        Self {
            title: format!("{} switching points", kind.stimulus_name()),
            x_label: format!("{} at switch ({})", kind.stimulus_name(), kind.unit()),
            y_label: "Contact (1 = closed)".to_string(),
            width,
            height,
        }
    }
}

/// Ideal and measured output curves, each as `(percentage, value)` points
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseSeries {
    pub ideal: Vec<(f64, f64)>,
    pub measured: Vec<(f64, f64)>,
}

/// Response curve points sorted ascending by percentage of range
pub fn response_series(report: &CalibrationReport) -> ResponseSeries {
    let records = report.sorted_measurements();

    ResponseSeries {
        ideal: records
            .iter()
            .map(|r| (r.percentage(), r.ideal_output()))
            .collect(),
        measured: records
            .iter()
            .map(|r| (r.percentage(), r.measured_output()))
            .collect(),
    }
}

/// `(percentage, outputErrorPercent)` points sorted by percentage of range
pub fn error_series(report: &CalibrationReport) -> Vec<(f64, f64)> {
    report
        .sorted_measurements()
        .iter()
        .map(|r| (r.percentage(), r.output_error_percent()))
        .collect()
}

/// Axis range covering `values` with a small margin
///
/// A single value (or identical values) gets a unit margin on either side;
/// no values at all gives `0..1`.
pub fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if max - min < 1e-9 {
        return (min - 1.0)..(max + 1.0);
    }

    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

/// Creates a transmitter chart as PNG bytes
///
/// # Arguments
/// * `report` - Report whose measurement rows are plotted
/// * `kind` - Response curve or error curve
/// * `options` - Chart labels and size
///
/// # Returns
/// * `ReportResult<Vec<u8>>` - PNG image data
///
/// # Errors
/// * `ReportError::Empty` when the report has no measurement rows
/// * `ReportError::Chart` when drawing fails
pub fn create_transmitter_chart(
    report: &CalibrationReport,
    kind: TransmitterChart,
    options: &GraphOptions,
) -> ReportResult<Vec<u8>> {
    match kind {
        TransmitterChart::Response => create_response_chart(report, options),
        TransmitterChart::Error => create_error_chart(report, options),
    }
}

pub fn create_response_chart(
    report: &CalibrationReport,
    options: &GraphOptions,
) -> ReportResult<Vec<u8>> {
    if report.records.is_empty() {
        return Err(ReportError::Empty("no measurement rows to plot"));
    }
    let series = response_series(report);

    render(options, |root| {
        let x_range = padded_range(series.ideal.iter().map(|(x, _)| *x));
        let y_range = padded_range(
            series
                .ideal
                .iter()
                .chain(series.measured.iter())
                .map(|(_, y)| *y),
        );

        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart
            .draw_series(LineSeries::new(series.ideal.iter().copied(), &BLUE))?
            .label("Ideal")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        chart
            .draw_series(LineSeries::new(series.measured.iter().copied(), &RED))?
            .label("Measured")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

        chart.draw_series(
            series
                .measured
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, RED.filled())),
        )?;

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        Ok(())
    })
}

pub fn create_error_chart(
    report: &CalibrationReport,
    options: &GraphOptions,
) -> ReportResult<Vec<u8>> {
    if report.records.is_empty() {
        return Err(ReportError::Empty("no measurement rows to plot"));
    }
    let series = error_series(report);

    render(options, |root| {
        let x_range = padded_range(series.iter().map(|(x, _)| *x));
        // keep the zero line in view
        let y_range = padded_range(series.iter().map(|(_, y)| *y).chain(std::iter::once(0.0)));
        let (x_start, x_end) = (x_range.start, x_range.end);

        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(LineSeries::new(vec![(x_start, 0.0), (x_end, 0.0)], &BLACK))?;
        chart.draw_series(LineSeries::new(series.iter().copied(), &RED))?;
        chart.draw_series(
            series
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, RED.filled())),
        )?;

        Ok(())
    })
}

/// Creates the switching-point chart of a pressure switch or thermostat
///
/// Rising and falling tests are drawn as separate branches; tests that do not
/// meet specification are marked with a cross.
pub fn create_switch_chart(
    report: &CalibrationReport,
    options: &GraphOptions,
) -> ReportResult<Vec<u8>> {
    if report.switch_tests.is_empty() {
        return Err(ReportError::Empty("no switch tests to plot"));
    }
    let (rising, falling) = hysteresis_branches(&report.switch_tests);

    render(options, |root| {
        let x_range = padded_range(rising.iter().chain(falling.iter()).map(|p| p.stimulus));

        let mut chart = ChartBuilder::on(root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, -0.1f64..1.1f64)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        for (branch, color, label) in [(&rising, BLUE, "Rising"), (&falling, RED, "Falling")] {
            if branch.is_empty() {
                continue;
            }

            chart
                .draw_series(LineSeries::new(
                    branch.iter().map(|p| (p.stimulus, p.contact_level)),
                    &color,
                ))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));

            chart.draw_series(branch.iter().filter(|p| p.meets_specification).map(
                |p: &HysteresisPoint| Circle::new((p.stimulus, p.contact_level), 5, color.filled()),
            ))?;
            chart.draw_series(branch.iter().filter(|p| !p.meets_specification).map(
                |p: &HysteresisPoint| Cross::new((p.stimulus, p.contact_level), 6, &BLACK),
            ))?;
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        Ok(())
    })
}

/// Draw into an in-memory RGB buffer and encode it as PNG
fn render<F>(options: &GraphOptions, draw: F) -> ReportResult<Vec<u8>>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), Box<dyn Error>>,
{
    let width = options.width.max(1);
    let height = options.height.max(1);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::chart)?;
        draw(&root).map_err(ReportError::chart)?;
        root.present().map_err(ReportError::chart)?;
    }

    encode_png(&buffer, width, height)
}

/// Encode a packed RGB buffer as PNG
fn encode_png(rgb: &[u8], width: u32, height: u32) -> ReportResult<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(rgb, width, height, ColorType::Rgb8)?;
    Ok(png)
}
