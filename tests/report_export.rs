use calreport::measurement::{
    InstrumentConfiguration, MeasurementField, MeasurementRecord, SignalDomain,
};
use calreport::report::{CalibrationReport, DeviceType, ReportHeader, summarize, to_csv, to_xlsx};
use calreport::session::FormSession;
use calreport::switch_test::{ContactState, SwitchKind, SwitchTest, TestDirection};

fn point(
    percent: &str,
    ideal_ue: &str,
    transmitter_ue: &str,
    ideal: &str,
    measured: &str,
) -> MeasurementRecord {
    let mut record = MeasurementRecord::with_outputs(ideal, measured);
    record.set(MeasurementField::PercentageOfRange, percent);
    record.set(MeasurementField::IdealEngineeringValue, ideal_ue);
    record.set(MeasurementField::TransmitterEngineeringValue, transmitter_ue);
    record
}

fn transmitter_report(tracks_ue: bool) -> CalibrationReport {
    CalibrationReport {
        header: ReportHeader {
            instrumentist_name: "Ana Rojas".to_string(),
            device_type: DeviceType::Transmitter,
            work_order: "OT-2024-117".to_string(),
            device_range: "0-100 °C".to_string(),
            ..ReportHeader::default()
        },
        configuration: InstrumentConfiguration::new(SignalDomain::CurrentMilliamp, tracks_ue),
        records: vec![
            point("0", "0", "0.2", "4.0", "4.03"),
            point("50", "50", "52", "12.0", "12.5"),
            point("100", "100", "99.6", "20.0", "19.96"),
        ],
        ..CalibrationReport::default()
    }
}

#[test]
fn csv_has_header_and_one_line_per_row() {
    let csv = to_csv(&transmitter_report(true)).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 4);
    assert!(
        lines[0].starts_with("% Range,Ideal UE,Reference UE,Transmitter UE,Ideal mA,Measured mA")
    );
    assert!(lines[0].ends_with("Error UE,Error mA,Error %"));
    assert!(lines[2].ends_with(",2.000,0.500,3.13"));
    assert!(lines[3].ends_with(",-0.400,-0.040,-0.25"));
}

#[test]
fn csv_leaves_ue_error_blank_when_not_tracked() {
    let csv = to_csv(&transmitter_report(false)).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 4);
    assert!(lines[2].ends_with(",,0.500,3.13"));
}

#[test]
fn csv_of_empty_report_is_only_the_header() {
    let csv = to_csv(&CalibrationReport::default()).unwrap();
    assert_eq!(csv.lines().count(), 1);
}

#[test]
fn derived_values_sent_by_clients_are_ignored() {
    let mut report = transmitter_report(false).finalized();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"outputError\":0.5"));
    let tampered = json.replace("\"outputError\":0.5", "\"outputError\":42.0");
    report = serde_json::from_str(&tampered).unwrap();

    let summary = summarize(&report);
    assert!((summary.max_abs_output_error - 0.5).abs() < 1e-9);
}

#[test]
fn summary_of_mixed_report() {
    let mut report = transmitter_report(true);
    report.switch_kind = SwitchKind::PressureSwitch;
    report.switch_tests = vec![
        SwitchTest::new(TestDirection::Rising, "30", "31", ContactState::Closed, true),
        SwitchTest::new(TestDirection::Falling, "25", "22", ContactState::Open, false),
    ];

    let summary = summarize(&report);
    assert_eq!(summary.measurement_count, 3);
    assert!((summary.max_abs_output_error - 0.5).abs() < 1e-9);
    assert!((summary.max_abs_output_error_percent - 3.125).abs() < 1e-9);
    assert!((summary.max_abs_engineering_unit_error.unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(summary.conformance.compliant, 1);
    assert_eq!(summary.conformance.non_compliant, 1);

    let differential = summary.differential.unwrap();
    assert_eq!(differential.max_abs, 3.0);
    assert_eq!(differential.mean_abs, 2.0);
}

#[test]
fn xlsx_is_a_zip_workbook() {
    let mut report = transmitter_report(true);
    report.switch_tests = vec![SwitchTest::new(
        TestDirection::Rising,
        "30",
        "31",
        ContactState::Closed,
        true,
    )];

    let bytes = to_xlsx(&report).unwrap();
    assert!(bytes.len() > 100);
    assert_eq!(&bytes[..2], b"PK");

    let without_switches = to_xlsx(&transmitter_report(false)).unwrap();
    assert_eq!(&without_switches[..2], b"PK");
}

#[test]
fn report_from_session_carries_state() {
    let mut session = FormSession::new(InstrumentConfiguration::new(
        SignalDomain::VoltageMillivolt,
        false,
    ));
    session.append_row();
    session.edit_measurement(0, MeasurementField::IdealOutputValue, "10");
    session.edit_measurement(0, MeasurementField::MeasuredOutputValue, "10.5");

    let report = CalibrationReport::from_session(ReportHeader::default(), &session);
    assert_eq!(report.configuration.signal_domain, SignalDomain::VoltageMillivolt);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.finalized(), report);
    assert_eq!(report.file_stem(), "report-calibration");
}
