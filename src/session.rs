use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

use crate::engine::{append_blank_record, recompute, recompute_all, remove_record};
use crate::error::StoreError;
use crate::measurement::{InstrumentConfiguration, MeasurementField, MeasurementRecord};
use crate::switch_test::{SwitchKind, SwitchTest, append_blank_test, remove_test};

/// Rows and settings of one report being edited
///
/// Every mutation goes through the engine, so derived columns always match
/// the inputs and the current configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSession {
    configuration: InstrumentConfiguration,
    switch_kind: SwitchKind,
    records: Vec<MeasurementRecord>,
    switch_tests: Vec<SwitchTest>,
}

impl FormSession {
    pub fn new(configuration: InstrumentConfiguration) -> Self {
        Self {
            configuration,
            ..Self::default()
        }
    }

    pub fn configuration(&self) -> InstrumentConfiguration {
        self.configuration
    }

    /// Change signal domain or UE tracking; every row is recomputed
    pub fn set_configuration(&mut self, configuration: InstrumentConfiguration) {
        self.configuration = configuration;
        self.refresh();
    }

    pub fn switch_kind(&self) -> SwitchKind {
        self.switch_kind
    }

    pub fn set_switch_kind(&mut self, kind: SwitchKind) {
        self.switch_kind = kind;
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn switch_tests(&self) -> &[SwitchTest] {
        &self.switch_tests
    }

    /// Replace all measurement rows, recomputing them
    pub fn set_records(&mut self, records: &[MeasurementRecord]) {
        self.records = recompute_all(records, &self.configuration);
    }

    /// Append a blank row, already computed against the configuration
    pub fn append_row(&mut self) {
        self.records = recompute_all(&append_blank_record(&self.records), &self.configuration);
    }

    pub fn remove_row(&mut self, index: usize) {
        self.records = remove_record(&self.records, index);
    }

    /// Apply one field edit and recompute that row
    ///
    /// Returns `false` (and changes nothing) when `index` is out of range.
    pub fn edit_measurement(&mut self, index: usize, field: MeasurementField, raw: &str) -> bool {
        let configuration = self.configuration;
        match self.records.get_mut(index) {
            Some(record) => {
                record.set(field, raw);
                *record = recompute(record, &configuration);
                true
            }
            None => {
                log::debug!("edit of missing row {} ignored", index);
                false
            }
        }
    }

    pub fn append_switch_test(&mut self) {
        self.switch_tests = append_blank_test(&self.switch_tests);
    }

    pub fn remove_switch_test(&mut self, index: usize) {
        self.switch_tests = remove_test(&self.switch_tests, index);
    }

    /// Replace one switch test; `false` when `index` is out of range
    pub fn update_switch_test(&mut self, index: usize, test: SwitchTest) -> bool {
        match self.switch_tests.get_mut(index) {
            Some(slot) => {
                *slot = test;
                true
            }
            None => false,
        }
    }

    /// Recompute every measurement row against the current configuration
    pub fn refresh(&mut self) {
        self.records = recompute_all(&self.records, &self.configuration);
    }
}

/// Persistence collaborator injected into the form layer
pub trait SessionStore: Send + Sync {
    /// Load a saved session; `Ok(None)` when nothing is stored under `name`
    fn load(&self, name: &str) -> Result<Option<FormSession>, StoreError>;

    fn save(&self, name: &str, session: &FormSession) -> Result<(), StoreError>;

    fn delete(&self, name: &str) -> Result<(), StoreError>;
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    static NAME: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let valid = NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$"))
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(name));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Sessions stored as gzip-compressed bincode files, one per name
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.bin.gz", name)))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, name: &str) -> Result<Option<FormSession>, StoreError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let decoder = GzDecoder::new(file);
        let mut reader = BufReader::new(decoder);

        let mut session: FormSession = deserialize_from(&mut reader)?;
        session.refresh();

        log::debug!("loaded session {} from {}", name, path.display());
        Ok(Some(session))
    }

    fn save(&self, name: &str, session: &FormSession) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;

        let file = File::create(&path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);

        serialize_into(&mut writer, session)?;
        let encoder = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        encoder.finish()?;

        log::debug!("saved session {} to {}", name, path.display());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Process-local store, for tests and single-run tools
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, FormSession>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self, name: &str) -> Result<Option<FormSession>, StoreError> {
        validate_name(name)?;
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(name).cloned().map(|mut session| {
            session.refresh();
            session
        }))
    }

    fn save(&self, name: &str, session: &FormSession) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(name.to_string(), session.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(name);
        Ok(())
    }
}
