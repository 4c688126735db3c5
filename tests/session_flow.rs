use calreport::error::StoreError;
use calreport::measurement::{InstrumentConfiguration, MeasurementField, SignalDomain};
use calreport::session::{FileSessionStore, FormSession, MemorySessionStore, SessionStore};
use calreport::switch_test::{ContactState, SwitchKind, SwitchTest, TestDirection};
use tempfile::tempdir;

fn filled_session() -> FormSession {
    let mut session = FormSession::new(InstrumentConfiguration::new(
        SignalDomain::CurrentMilliamp,
        true,
    ));

    session.append_row();
    session.edit_measurement(0, MeasurementField::PercentageOfRange, "50");
    session.edit_measurement(0, MeasurementField::IdealEngineeringValue, "50");
    session.edit_measurement(0, MeasurementField::TransmitterEngineeringValue, "52");
    session.edit_measurement(0, MeasurementField::IdealOutputValue, "12.0");
    session.edit_measurement(0, MeasurementField::MeasuredOutputValue, "12.5");

    session.set_switch_kind(SwitchKind::Thermostat);
    session.append_switch_test();
    session.update_switch_test(
        0,
        SwitchTest::new(TestDirection::Rising, "80", "81", ContactState::Closed, true),
    );

    session
}

#[test]
fn edits_recompute_the_row() {
    let session = filled_session();
    let row = &session.records()[0];
    assert_eq!(row.engineering_unit_error(), Some(2.0));
    assert!((row.output_error_percent() - 3.125).abs() < 1e-9);
}

#[test]
fn configuration_change_recomputes_every_row() {
    let mut session = filled_session();
    session.set_configuration(InstrumentConfiguration::new(
        SignalDomain::VoltageMillivolt,
        false,
    ));

    let row = &session.records()[0];
    assert_eq!(row.engineering_unit_error(), None);
    assert!((row.output_error_percent() - 0.5).abs() < 1e-9);
}

#[test]
fn out_of_range_edits_change_nothing() {
    let mut session = filled_session();
    let before = session.clone();

    assert!(!session.edit_measurement(3, MeasurementField::IdealOutputValue, "1"));
    assert!(!session.update_switch_test(3, SwitchTest::default()));
    session.remove_row(9);
    session.remove_switch_test(9);

    assert_eq!(session, before);
}

#[test]
fn file_store_round_trip() {
    let dir = tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("sessions"));
    let session = filled_session();

    assert_eq!(store.load("ot-17").unwrap(), None);

    store.save("ot-17", &session).unwrap();
    assert!(dir.path().join("sessions/ot-17.bin.gz").exists());

    let loaded = store.load("ot-17").unwrap().unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.switch_kind(), SwitchKind::Thermostat);
    assert_eq!(loaded.switch_tests().len(), 1);

    store.delete("ot-17").unwrap();
    assert_eq!(store.load("ot-17").unwrap(), None);
    // deleting twice is fine
    store.delete("ot-17").unwrap();
}

#[test]
fn file_store_rejects_path_like_names() {
    let dir = tempdir().unwrap();
    let store = FileSessionStore::new(dir.path());

    let err = store.save("../escape", &FormSession::default()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidName(_)));
    assert!(matches!(store.load(""), Err(StoreError::InvalidName(_))));
}

#[test]
fn corrupt_file_is_a_codec_or_io_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("broken.bin.gz"), b"not gzip at all").unwrap();

    let store = FileSessionStore::new(dir.path());
    assert!(store.load("broken").is_err());
}

#[test]
fn memory_store_behaves_like_file_store() {
    let store = MemorySessionStore::default();
    let session = filled_session();

    store.save("bench", &session).unwrap();
    assert_eq!(store.load("bench").unwrap(), Some(session));
    store.delete("bench").unwrap();
    assert_eq!(store.load("bench").unwrap(), None);
}
