use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::engine::recompute;
use crate::error::ReportResult;
use crate::measurement::{InstrumentConfiguration, MeasurementRecord};

// Cells are taken as verbatim text, never type-inferred
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CsvRow {
    percentage_of_range: String,
    ideal_engineering_value: String,
    reference_standard_value: String,
    transmitter_engineering_value: Option<String>,
    ideal_output_value: String,
    measured_output_value: String,
    sensor_ideal_value: Option<String>,
    sensor_measured_value: Option<String>,
}

impl From<CsvRow> for MeasurementRecord {
    fn from(row: CsvRow) -> Self {
        MeasurementRecord {
            percentage_of_range: row.percentage_of_range,
            ideal_engineering_value: row.ideal_engineering_value,
            reference_standard_value: row.reference_standard_value,
            transmitter_engineering_value: row.transmitter_engineering_value,
            ideal_output_value: row.ideal_output_value,
            measured_output_value: row.measured_output_value,
            sensor_ideal_value: row.sensor_ideal_value,
            sensor_measured_value: row.sensor_measured_value,
            ..MeasurementRecord::blank()
        }
    }
}

/// Read measurement rows from CSV text
///
/// Headers are the camelCase field names (`percentageOfRange`,
/// `idealOutputValue`, ...). Missing columns read as empty text and unknown
/// columns are ignored. Every row is recomputed against `config`, so derived
/// columns present in the file are never trusted.
pub fn read_records<R: Read>(
    reader: R,
    config: &InstrumentConfiguration,
) -> ReportResult<Vec<MeasurementRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        records.push(recompute(&MeasurementRecord::from(row?), config));
    }

    Ok(records)
}

/// Load measurement rows from a CSV file
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
/// * `config` - Configuration the rows are recomputed against
///
/// # Examples
/// ```no_run
/// use calreport::loader::from_csv;
/// use calreport::measurement::{InstrumentConfiguration, SignalDomain};
///
/// let config = InstrumentConfiguration::new(SignalDomain::CurrentMilliamp, false);
/// match from_csv("readings.csv", &config) {
///     Ok(rows) => println!("Loaded {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(
    filepath: impl AsRef<Path>,
    config: &InstrumentConfiguration,
) -> ReportResult<Vec<MeasurementRecord>> {
    let file = File::open(filepath).map_err(csv::Error::from)?;
    read_records(file, config)
}
