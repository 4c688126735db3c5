//! Measurement error engine
//!
//! Stateless computation of the derived error columns of a calibration row.
//! Every transmitter table goes through [`recompute`]; the instrument kind only
//! changes the span looked up by [`span_for`].

use crate::measurement::{InstrumentConfiguration, MeasurementRecord, SignalDomain};

/// Span of a 4-20 mA loop
pub const CURRENT_SPAN_MA: f64 = 16.0;

/// Span used for millivolt outputs
pub const VOLTAGE_SPAN_MV: f64 = 100.0;

/// Span used for resistance outputs (same divisor as the current loop)
pub const RESISTANCE_SPAN_OHM: f64 = 16.0;

/// Percentage-error divisor for a signal domain
pub fn span_for(domain: SignalDomain) -> f64 {
    match domain {
        SignalDomain::CurrentMilliamp => CURRENT_SPAN_MA,
        SignalDomain::VoltageMillivolt => VOLTAGE_SPAN_MV,
        SignalDomain::ResistanceOhm => RESISTANCE_SPAN_OHM,
    }
}

fn divisor_for(domain: SignalDomain) -> f64 {
    let span = span_for(domain);
    if span == 0.0 { 1.0 } else { span }
}

/// Recompute the derived columns of a measurement row
///
/// Inputs are parsed leniently (empty or malformed text reads as zero) and
/// copied unchanged into the returned row. The engineering-unit error is only
/// computed when the configuration tracks a transmitter UE reading; otherwise it
/// is left unset rather than zero.
///
/// # Arguments
/// * `record` - Row with the operator inputs; derived values are ignored
/// * `config` - Signal domain and engineering-unit tracking flag
///
/// # Returns
/// * `MeasurementRecord` - A new row with full-precision derived values
///
/// # Examples
/// ```
/// use calreport::engine::recompute;
/// use calreport::measurement::{InstrumentConfiguration, MeasurementRecord, SignalDomain};
///
/// let config = InstrumentConfiguration::new(SignalDomain::CurrentMilliamp, false);
/// let row = recompute(&MeasurementRecord::with_outputs("12.0", "12.5"), &config);
///
/// assert!((row.output_error() - 0.5).abs() < 1e-9);
/// assert!((row.output_error_percent() - 3.125).abs() < 1e-9);
/// assert_eq!(row.engineering_unit_error(), None);
/// ```
pub fn recompute(
    record: &MeasurementRecord,
    config: &InstrumentConfiguration,
) -> MeasurementRecord {
    let mut updated = record.clone();

    let output_error = record.measured_output() - record.ideal_output();
    updated.output_error = output_error;
    updated.output_error_percent = output_error / divisor_for(config.signal_domain) * 100.0;

    updated.engineering_unit_error = if config.has_engineering_unit_transmitter_reading {
        Some(record.transmitter_engineering() - record.ideal_engineering())
    } else {
        None
    };

    updated
}

/// Recompute every row of a table against one configuration
pub fn recompute_all(
    records: &[MeasurementRecord],
    config: &InstrumentConfiguration,
) -> Vec<MeasurementRecord> {
    records.iter().map(|record| recompute(record, config)).collect()
}

/// Return a copy of `records` with one trailing blank row
pub fn append_blank_record(records: &[MeasurementRecord]) -> Vec<MeasurementRecord> {
    append_row(records)
}

/// Return a copy of `records` without the row at `index`
///
/// An out-of-range index is a no-op: the returned list equals the input.
pub fn remove_record(records: &[MeasurementRecord], index: usize) -> Vec<MeasurementRecord> {
    remove_row(records, index)
}

pub(crate) fn append_row<T: Clone + Default>(rows: &[T]) -> Vec<T> {
    let mut updated = Vec::with_capacity(rows.len() + 1);
    updated.extend_from_slice(rows);
    updated.push(T::default());
    updated
}

pub(crate) fn remove_row<T: Clone>(rows: &[T], index: usize) -> Vec<T> {
    if index >= rows.len() {
        log::debug!(
            "ignoring removal of row {} from a table of {} rows",
            index,
            rows.len()
        );
        return rows.to_vec();
    }

    rows.iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, row)| row.clone())
        .collect()
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    // no "-0.000" in reports
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Display form of an absolute error (3 decimal places)
pub fn format_abs_error(value: f64) -> String {
    format!("{:.3}", round_to(value, 3))
}

/// Display form of a percentage error (2 decimal places)
pub fn format_percent_error(value: f64) -> String {
    format!("{:.2}", round_to(value, 2))
}
