use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::{Deserialize, Serialize};

use crate::engine::{format_abs_error, format_percent_error, recompute_all, round_to};
use crate::error::{ReportError, ReportResult};
use crate::measurement::{InstrumentConfiguration, MeasurementRecord, parse_reading};
use crate::session::FormSession;
use crate::switch_test::{
    ConformanceSummary, ContactState, DifferentialStats, SwitchKind, SwitchTest, TestDirection,
    conformance, differential_stats,
};

/// Kind of instrument a report covers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    #[default]
    Transmitter,
    PressureSwitch,
    Thermostat,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::Transmitter => "Transmitter",
            DeviceType::PressureSwitch => "Pressure switch",
            DeviceType::Thermostat => "Thermostat",
        }
    }
}

/// General information printed at the top of a calibration report
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportHeader {
    pub instrumentist_name: String,
    pub instrumentist_code: String,
    pub device_type: DeviceType,
    pub work_order: String,
    pub area: String,
    pub review_date: Option<NaiveDate>,
    pub device_name: String,
    pub device_brand: String,
    pub device_model: String,
    pub device_serial: String,
    pub device_range: String,
    pub device_unit: String,
    pub device_code: String,
    pub observations: String,
}

impl ReportHeader {
    /// Label/value pairs in the order they are printed
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Instrumentist", self.instrumentist_name.clone()),
            ("Instrumentist code", self.instrumentist_code.clone()),
            ("Device type", self.device_type.label().to_string()),
            ("Work order", self.work_order.clone()),
            ("Area", self.area.clone()),
            (
                "Review date",
                self.review_date
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            ("Device", self.device_name.clone()),
            ("Brand", self.device_brand.clone()),
            ("Model", self.device_model.clone()),
            ("Serial", self.device_serial.clone()),
            ("Range", self.device_range.clone()),
            ("Unit", self.device_unit.clone()),
            ("Device code", self.device_code.clone()),
            ("Observations", self.observations.clone()),
        ]
    }
}

/// Everything needed to render or export one calibration report
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationReport {
    pub header: ReportHeader,
    pub configuration: InstrumentConfiguration,
    pub records: Vec<MeasurementRecord>,
    pub switch_kind: SwitchKind,
    pub switch_tests: Vec<SwitchTest>,
}

impl CalibrationReport {
    pub fn from_session(header: ReportHeader, session: &FormSession) -> Self {
        Self {
            header,
            configuration: session.configuration(),
            records: session.records().to_vec(),
            switch_kind: session.switch_kind(),
            switch_tests: session.switch_tests().to_vec(),
        }
    }

    /// Copy with every measurement row recomputed against the configuration
    ///
    /// Reports arrive from outside the process, so derived values are never
    /// trusted as sent.
    pub fn finalized(&self) -> Self {
        Self {
            records: recompute_all(&self.records, &self.configuration),
            ..self.clone()
        }
    }

    /// Recomputed rows ordered by percentage of range
    pub fn sorted_measurements(&self) -> Vec<MeasurementRecord> {
        let mut records = recompute_all(&self.records, &self.configuration);
        records.sort_by(|a, b| a.percentage().total_cmp(&b.percentage()));
        records
    }

    /// Download name without extension, derived from the work order
    ///
    /// # Examples
    /// ```
    /// use calreport::report::CalibrationReport;
    ///
    /// let mut report = CalibrationReport::default();
    /// assert_eq!(report.file_stem(), "report-calibration");
    ///
    /// report.header.work_order = "OT 2024/17".to_string();
    /// assert_eq!(report.file_stem(), "report-OT_2024_17");
    /// ```
    pub fn file_stem(&self) -> String {
        let order = self.header.work_order.trim();
        if order.is_empty() {
            return "report-calibration".to_string();
        }

        let sanitized: String = order
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("report-{}", sanitized)
    }
}

/// Figures shown in the report footer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub measurement_count: usize,
    pub max_abs_output_error: f64,
    pub max_abs_output_error_percent: f64,
    pub max_abs_engineering_unit_error: Option<f64>,
    pub conformance: ConformanceSummary,
    pub differential: Option<DifferentialStats>,
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.map(f64::abs).fold(0.0, f64::max)
}

/// Summarize a report after recomputing its rows
pub fn summarize(report: &CalibrationReport) -> ReportSummary {
    let records = recompute_all(&report.records, &report.configuration);

    let max_abs_engineering_unit_error = report
        .configuration
        .has_engineering_unit_transmitter_reading
        .then(|| max_abs(records.iter().filter_map(|r| r.engineering_unit_error())));

    ReportSummary {
        measurement_count: records.len(),
        max_abs_output_error: max_abs(records.iter().map(|r| r.output_error())),
        max_abs_output_error_percent: max_abs(records.iter().map(|r| r.output_error_percent())),
        max_abs_engineering_unit_error,
        conformance: conformance(&report.switch_tests),
        differential: differential_stats(&report.switch_tests),
    }
}

/// Column titles of the measurement table
pub fn measurement_headers(config: &InstrumentConfiguration) -> Vec<String> {
    let unit = config.signal_domain.unit();
    let sensor_unit = config.signal_domain.sensor_unit();

    vec![
        "% Range".to_string(),
        "Ideal UE".to_string(),
        "Reference UE".to_string(),
        "Transmitter UE".to_string(),
        format!("Ideal {}", unit),
        format!("Measured {}", unit),
        format!("Sensor ideal {}", sensor_unit),
        format!("Sensor measured {}", sensor_unit),
        "Error UE".to_string(),
        format!("Error {}", unit),
        "Error %".to_string(),
    ]
}

/// One measurement row as printed: inputs verbatim, errors display-rounded
///
/// The UE error cell is blank when the row has no engineering-unit error.
pub fn measurement_row(record: &MeasurementRecord) -> Vec<String> {
    vec![
        record.percentage_of_range.clone(),
        record.ideal_engineering_value.clone(),
        record.reference_standard_value.clone(),
        record.transmitter_engineering_value.clone().unwrap_or_default(),
        record.ideal_output_value.clone(),
        record.measured_output_value.clone(),
        record.sensor_ideal_value.clone().unwrap_or_default(),
        record.sensor_measured_value.clone().unwrap_or_default(),
        record
            .engineering_unit_error()
            .map(format_abs_error)
            .unwrap_or_default(),
        format_abs_error(record.output_error()),
        format_percent_error(record.output_error_percent()),
    ]
}

/// Convert the measurement table of a report to CSV
///
/// Rows are recomputed and written in their original order beneath a single
/// header row.
///
/// # Arguments
/// * `report` - Report whose measurement rows are exported
///
/// # Returns
/// * `ReportResult<String>` - CSV content
///
/// # Examples
/// ```
/// use calreport::measurement::MeasurementRecord;
/// use calreport::report::{CalibrationReport, to_csv};
///
/// let mut report = CalibrationReport::default();
/// report.records.push(MeasurementRecord::with_outputs("12.0", "12.5"));
///
/// let csv = to_csv(&report).unwrap();
/// assert_eq!(csv.lines().count(), 2);
/// assert!(csv.lines().nth(1).unwrap().ends_with(",0.500,3.13"));
/// ```
pub fn to_csv(report: &CalibrationReport) -> ReportResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(measurement_headers(&report.configuration))?;
    for record in recompute_all(&report.records, &report.configuration) {
        writer.write_record(measurement_row(&record))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn direction_label(direction: TestDirection) -> &'static str {
    match direction {
        TestDirection::Rising => "Rising",
        TestDirection::Falling => "Falling",
    }
}

fn contact_label(state: ContactState) -> &'static str {
    match state {
        ContactState::Open => "Open",
        ContactState::Closed => "Closed",
        ContactState::NoChange => "No change",
    }
}

fn write_general_sheet(report: &CalibrationReport, bold: &Format) -> ReportResult<Worksheet> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name("General")?;
    worksheet.set_column_width(0, 22.0)?;
    worksheet.set_column_width(1, 40.0)?;

    let mut row = 0;
    for (label, value) in report.header.fields() {
        worksheet.write_string_with_format(row, 0, label, bold)?;
        worksheet.write_string(row, 1, &value)?;
        row += 1;
    }

    worksheet.write_string_with_format(row, 0, "Output signal", bold)?;
    worksheet.write_string(row, 1, report.configuration.signal_domain.unit())?;
    row += 1;
    worksheet.write_string_with_format(row, 0, "Transmitter UE reading", bold)?;
    worksheet.write_string(
        row,
        1,
        if report.configuration.has_engineering_unit_transmitter_reading {
            "Yes"
        } else {
            "No"
        },
    )?;

    Ok(worksheet)
}

fn write_measurement_sheet(report: &CalibrationReport, bold: &Format) -> ReportResult<Worksheet> {
    let abs_format = Format::new().set_num_format("0.000");
    let percent_format = Format::new().set_num_format("0.00");

    let mut worksheet = Worksheet::new();
    worksheet.set_name("Measurements")?;

    for (col, title) in measurement_headers(&report.configuration).iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, bold)?;
    }

    for (i, record) in recompute_all(&report.records, &report.configuration)
        .iter()
        .enumerate()
    {
        let row = i as u32 + 1;
        let inputs = [
            Some(record.percentage()),
            Some(record.ideal_engineering()),
            Some(record.reference_standard()),
            record
                .transmitter_engineering_value
                .as_ref()
                .map(|_| record.transmitter_engineering()),
            Some(record.ideal_output()),
            Some(record.measured_output()),
            record
                .sensor_ideal_value
                .as_deref()
                .map(parse_reading),
            record
                .sensor_measured_value
                .as_deref()
                .map(parse_reading),
        ];
        for (col, value) in inputs.iter().enumerate() {
            if let Some(value) = value {
                worksheet.write_number(row, col as u16, *value)?;
            }
        }

        if let Some(ue_error) = record.engineering_unit_error() {
            worksheet.write_number_with_format(row, 8, round_to(ue_error, 3), &abs_format)?;
        }
        worksheet.write_number_with_format(
            row,
            9,
            round_to(record.output_error(), 3),
            &abs_format,
        )?;
        worksheet.write_number_with_format(
            row,
            10,
            round_to(record.output_error_percent(), 2),
            &percent_format,
        )?;
    }

    Ok(worksheet)
}

fn write_switch_sheet(report: &CalibrationReport, bold: &Format) -> ReportResult<Worksheet> {
    let unit = report.switch_kind.unit();
    let stimulus = report.switch_kind.stimulus_name();

    let mut worksheet = Worksheet::new();
    worksheet.set_name("Switch Tests")?;

    let titles = [
        "Direction".to_string(),
        format!("Applied {} ({})", stimulus, unit),
        format!("Observed at switch ({})", unit),
        format!("Differential ({})", unit),
        "Contact".to_string(),
        "Meets specification".to_string(),
    ];
    for (col, title) in titles.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, bold)?;
    }

    for (i, test) in report.switch_tests.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_string(row, 0, direction_label(test.test_direction))?;
        worksheet.write_number(row, 1, test.applied())?;
        worksheet.write_number(row, 2, test.observed())?;
        worksheet.write_number(row, 3, round_to(test.differential(), 3))?;
        worksheet.write_string(row, 4, contact_label(test.contact_state))?;
        worksheet.write_string(row, 5, if test.meets_specification { "Yes" } else { "No" })?;
    }

    let tally = conformance(&report.switch_tests);
    let mut row = report.switch_tests.len() as u32 + 2;
    for (label, count, percent) in [
        ("Compliant", tally.compliant, tally.compliant_percent),
        ("Non-compliant", tally.non_compliant, tally.non_compliant_percent),
    ] {
        worksheet.write_string_with_format(row, 0, label, bold)?;
        worksheet.write_number(row, 1, count as f64)?;
        worksheet.write_string(row, 2, &format!("{}%", format_percent_error(percent)))?;
        row += 1;
    }

    Ok(worksheet)
}

/// Convert a report to XLSX format
///
/// The workbook has a "General" sheet with the header, a "Measurements" sheet
/// and, when the report has switch tests, a "Switch Tests" sheet ending with
/// the conformance tally.
///
/// # Returns
/// * `ReportResult<Vec<u8>>` - XLSX file content as bytes
pub fn to_xlsx(report: &CalibrationReport) -> ReportResult<Vec<u8>> {
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();

    workbook.push_worksheet(write_general_sheet(report, &bold)?);
    workbook.push_worksheet(write_measurement_sheet(report, &bold)?);
    if !report.switch_tests.is_empty() {
        workbook.push_worksheet(write_switch_sheet(report, &bold)?);
    }

    let buffer = workbook.save_to_buffer()?;
    log::info!(
        "exported {} ({} bytes)",
        report.file_stem(),
        buffer.len()
    );

    Ok(buffer)
}
