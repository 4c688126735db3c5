use calreport::engine::{
    CURRENT_SPAN_MA, VOLTAGE_SPAN_MV, append_blank_record, recompute, recompute_all, remove_record,
    span_for,
};
use calreport::measurement::{
    InstrumentConfiguration, MeasurementField, MeasurementRecord, SignalDomain,
};

const EPS: f64 = 1e-9;

fn record(ideal_ue: &str, transmitter_ue: &str, ideal: &str, measured: &str) -> MeasurementRecord {
    let mut record = MeasurementRecord::with_outputs(ideal, measured);
    record.set(MeasurementField::IdealEngineeringValue, ideal_ue);
    record.set(MeasurementField::TransmitterEngineeringValue, transmitter_ue);
    record
}

fn config(domain: SignalDomain, ue: bool) -> InstrumentConfiguration {
    InstrumentConfiguration::new(domain, ue)
}

#[test]
fn current_loop_errors_use_sixteen_milliamp_span() {
    let cfg = config(SignalDomain::CurrentMilliamp, false);
    for (x, y) in [(4.0, 4.02), (12.0, 11.9), (20.0, 20.0), (-1.5, 3.25)] {
        let row = recompute(
            &MeasurementRecord::with_outputs(&x.to_string(), &y.to_string()),
            &cfg,
        );
        assert!((row.output_error() - (y - x)).abs() < EPS);
        assert!((row.output_error_percent() - (y - x) / 16.0 * 100.0).abs() < EPS);
    }
    assert_eq!(span_for(SignalDomain::CurrentMilliamp), CURRENT_SPAN_MA);
}

#[test]
fn millivolt_errors_use_hundred_millivolt_span() {
    let cfg = config(SignalDomain::VoltageMillivolt, false);
    let row = recompute(&MeasurementRecord::with_outputs("20", "22.5"), &cfg);
    assert!((row.output_error_percent() - 2.5).abs() < EPS);
    assert_eq!(span_for(SignalDomain::VoltageMillivolt), VOLTAGE_SPAN_MV);
}

#[test]
fn resistance_uses_sixteen_as_span() {
    let cfg = config(SignalDomain::ResistanceOhm, false);
    let row = recompute(&MeasurementRecord::with_outputs("100", "100.8"), &cfg);
    assert!((row.output_error() - 0.8).abs() < 1e-9);
    assert!((row.output_error_percent() - 5.0).abs() < 1e-9);
}

#[test]
fn ue_error_absent_when_not_tracked() {
    for domain in [
        SignalDomain::CurrentMilliamp,
        SignalDomain::VoltageMillivolt,
        SignalDomain::ResistanceOhm,
    ] {
        let row = recompute(&record("50", "52", "1", "2"), &config(domain, false));
        assert_eq!(row.engineering_unit_error(), None);
    }
}

#[test]
fn malformed_text_reads_as_zero() {
    let cfg = config(SignalDomain::CurrentMilliamp, true);
    let row = recompute(&record("", "n/a", "twelve", "  "), &cfg);
    assert_eq!(row.engineering_unit_error(), Some(0.0));
    assert_eq!(row.output_error(), 0.0);
    assert_eq!(row.output_error_percent(), 0.0);

    let blank = recompute(&MeasurementRecord::blank(), &cfg);
    assert_eq!(blank.output_error(), 0.0);
}

#[test]
fn recompute_is_idempotent() {
    let cfg = config(SignalDomain::CurrentMilliamp, true);
    let once = recompute(&record("50", "52", "12.0", "12.5"), &cfg);
    let twice = recompute(&once, &cfg);
    assert_eq!(once, twice);

    let rows = vec![once.clone(), recompute(&record("0", "0.4", "4", "3.9"), &cfg)];
    assert_eq!(recompute_all(&rows, &cfg), rows);
}

#[test]
fn recompute_keeps_inputs_verbatim() {
    let cfg = config(SignalDomain::CurrentMilliamp, true);
    let mut input = record(" 50 ", "52", "12.0", "12.50");
    input.set(MeasurementField::PercentageOfRange, "50%");
    let row = recompute(&input, &cfg);

    assert_eq!(row.ideal_engineering_value, " 50 ");
    assert_eq!(row.measured_output_value, "12.50");
    assert_eq!(row.percentage_of_range, "50%");
    assert_eq!(row.engineering_unit_error(), Some(2.0));
}

#[test]
fn append_then_remove_last_restores_list() {
    let rows = vec![
        MeasurementRecord::with_outputs("4", "4.1"),
        MeasurementRecord::with_outputs("12", "12.2"),
    ];
    let appended = append_blank_record(&rows);
    assert_eq!(appended.len(), rows.len() + 1);
    assert_eq!(remove_record(&appended, appended.len() - 1), rows);

    assert_eq!(append_blank_record(&[]), vec![MeasurementRecord::blank()]);
}

#[test]
fn removal_out_of_range_is_a_no_op() {
    let rows = vec![MeasurementRecord::with_outputs("4", "4.1")];
    assert_eq!(remove_record(&rows, 1), rows);
    assert_eq!(remove_record(&rows, usize::MAX), rows);
    assert!(remove_record(&[], 0).is_empty());
}

#[test]
fn removal_keeps_order_of_remaining_rows() {
    let rows: Vec<MeasurementRecord> = ["4", "8", "12", "16"]
        .iter()
        .map(|v| MeasurementRecord::with_outputs(v, v))
        .collect();
    let remaining = remove_record(&rows, 1);
    let ideals: Vec<&str> = remaining.iter().map(|r| r.ideal_output_value.as_str()).collect();
    assert_eq!(ideals, vec!["4", "12", "16"]);
}

#[test]
fn worked_example_with_tracking() {
    let row = recompute(
        &record("50", "52", "12.0", "12.5"),
        &config(SignalDomain::CurrentMilliamp, true),
    );
    assert_eq!(row.engineering_unit_error(), Some(2.0));
    assert!((row.output_error() - 0.5).abs() < EPS);
    assert!((row.output_error_percent() - 3.125).abs() < EPS);
}

#[test]
fn worked_example_without_tracking() {
    let row = recompute(
        &record("50", "52", "12.0", "12.5"),
        &config(SignalDomain::CurrentMilliamp, false),
    );
    assert_eq!(row.engineering_unit_error(), None);
    assert!((row.output_error() - 0.5).abs() < EPS);
    assert!((row.output_error_percent() - 3.125).abs() < EPS);
}

#[test]
fn worked_example_millivolt_exact() {
    let row = recompute(
        &MeasurementRecord::with_outputs("4.0", "4.0"),
        &config(SignalDomain::VoltageMillivolt, false),
    );
    assert_eq!(row.output_error(), 0.0);
    assert_eq!(row.output_error_percent(), 0.0);
}

#[test]
fn derived_values_are_serialized_for_clients() {
    let row = recompute(
        &record("50", "52", "12.0", "12.5"),
        &config(SignalDomain::CurrentMilliamp, false),
    );
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["outputError"], 0.5);
    assert_eq!(json["outputErrorPercent"], 3.125);
    assert!(json["engineeringUnitError"].is_null());
    assert_eq!(json["idealOutputValue"], "12.0");
}
