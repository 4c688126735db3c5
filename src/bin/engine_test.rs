use calreport::engine::{
    append_blank_record, format_abs_error, format_percent_error, recompute, remove_record,
};
use calreport::measurement::{
    InstrumentConfiguration, MeasurementField, MeasurementRecord, SignalDomain,
};
use calreport::session::FormSession;
use calreport::switch_test::{ContactState, SwitchTest, TestDirection, conformance};

// Row with UE and output readings filled in
fn row(ideal_ue: &str, transmitter_ue: &str, ideal: &str, measured: &str) -> MeasurementRecord {
    let mut record = MeasurementRecord::with_outputs(ideal, measured);
    record.set(MeasurementField::IdealEngineeringValue, ideal_ue);
    record.set(MeasurementField::TransmitterEngineeringValue, transmitter_ue);
    record
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn test_current_loop_with_ue() {
    println!("\n====== Testing mA transmitter with UE reading ======");
    let config = InstrumentConfiguration::new(SignalDomain::CurrentMilliamp, true);
    let result = recompute(&row("50", "52", "12.0", "12.5"), &config);

    assert_eq!(result.engineering_unit_error(), Some(2.0));
    assert!(approx(result.output_error(), 0.5));
    assert!(approx(result.output_error_percent(), 3.125));
    println!(
        "✓ UE error {:?}, output error {}, percent {}",
        result.engineering_unit_error(),
        format_abs_error(result.output_error()),
        format_percent_error(result.output_error_percent())
    );
}

fn test_current_loop_without_ue() {
    println!("\n====== Testing mA transmitter without UE reading ======");
    let config = InstrumentConfiguration::new(SignalDomain::CurrentMilliamp, false);
    let result = recompute(&row("50", "52", "12.0", "12.5"), &config);

    assert_eq!(result.engineering_unit_error(), None);
    assert!(approx(result.output_error_percent(), 3.125));
    println!("✓ UE error left unset when not tracked");
}

fn test_millivolt_span() {
    println!("\n====== Testing mV transmitter ======");
    let config = InstrumentConfiguration::new(SignalDomain::VoltageMillivolt, false);

    let exact = recompute(&MeasurementRecord::with_outputs("4.0", "4.0"), &config);
    assert_eq!(exact.output_error(), 0.0);
    assert_eq!(exact.output_error_percent(), 0.0);

    let off = recompute(&MeasurementRecord::with_outputs("10", "11"), &config);
    assert!(approx(off.output_error_percent(), 1.0));
    println!("✓ mV percent error uses a span of 100");
}

fn test_lenient_parsing() {
    println!("\n====== Testing lenient parsing ======");
    let config = InstrumentConfiguration::new(SignalDomain::ResistanceOhm, true);
    let result = recompute(&row("", "abc", "", "1.6"), &config);

    assert_eq!(result.engineering_unit_error(), Some(0.0));
    assert!(approx(result.output_error_percent(), 10.0));
    println!("✓ Empty and malformed readings count as zero");
}

fn test_row_management() {
    println!("\n====== Testing row management ======");
    let rows = vec![
        MeasurementRecord::with_outputs("4", "4.01"),
        MeasurementRecord::with_outputs("20", "19.98"),
    ];

    let appended = append_blank_record(&rows);
    assert_eq!(appended.len(), 3);
    assert_eq!(appended[2], MeasurementRecord::blank());
    assert_eq!(remove_record(&appended, 2), rows);
    assert_eq!(remove_record(&rows, 7), rows);
    println!("✓ Append, remove and out-of-range removal behave");
}

fn test_form_session() {
    println!("\n====== Testing form session ======");
    let mut session = FormSession::new(InstrumentConfiguration::new(
        SignalDomain::CurrentMilliamp,
        false,
    ));
    session.append_row();
    assert!(session.edit_measurement(0, MeasurementField::IdealOutputValue, "12"));
    assert!(session.edit_measurement(0, MeasurementField::MeasuredOutputValue, "12.16"));
    assert!(approx(session.records()[0].output_error_percent(), 1.0));

    session.set_configuration(InstrumentConfiguration::new(SignalDomain::VoltageMillivolt, false));
    assert!(approx(session.records()[0].output_error_percent(), 0.16));
    assert!(!session.edit_measurement(5, MeasurementField::IdealOutputValue, "1"));
    println!("✓ Edits and configuration changes recompute rows");
}

fn test_switch_conformance() {
    println!("\n====== Testing switch conformance ======");
    let tests = vec![
        SwitchTest::new(TestDirection::Rising, "60", "61.5", ContactState::Closed, true),
        SwitchTest::new(TestDirection::Falling, "55", "53", ContactState::Open, true),
        SwitchTest::new(TestDirection::Rising, "60", "66", ContactState::NoChange, false),
        SwitchTest::new(TestDirection::Falling, "55", "55", ContactState::Open, true),
    ];

    let summary = conformance(&tests);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.compliant, 3);
    assert_eq!(summary.compliant_percent, 75.0);
    println!(
        "✓ {} of {} tests compliant ({}%)",
        summary.compliant, summary.total, summary.compliant_percent
    );
}

fn main() {
    println!("=== Measurement Engine Test Suite ===");

    test_current_loop_with_ue();
    test_current_loop_without_ue();
    test_millivolt_span();
    test_lenient_parsing();
    test_row_management();
    test_form_session();
    test_switch_conformance();

    println!("\nAll engine tests passed!");
}
