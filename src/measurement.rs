use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native output signal of a transmitter
///
/// The domain fixes both the physical unit shown next to output values and the
/// span used as the divisor of the percentage error (see [`crate::engine::span_for`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalDomain {
    /// 4-20 mA current loop
    #[default]
    #[serde(rename = "CURRENT_mA", alias = "mA")]
    CurrentMilliamp,

    /// Millivolt output, thermocouple-type signals
    #[serde(rename = "VOLTAGE_mV", alias = "mV")]
    VoltageMillivolt,

    /// Resistance output, RTD-type sensors
    #[serde(rename = "RESISTANCE_OHM", alias = "ohm")]
    ResistanceOhm,
}

impl SignalDomain {
    /// Unit label of the output signal
    pub fn unit(&self) -> &'static str {
        match self {
            SignalDomain::CurrentMilliamp => "mA",
            SignalDomain::VoltageMillivolt => "mV",
            SignalDomain::ResistanceOhm => "Ω",
        }
    }

    /// Unit label of the secondary sensor columns
    ///
    /// Current loops are paired with an RTD (ohms), millivolt transmitters with
    /// a thermocouple reading (millivolts).
    pub fn sensor_unit(&self) -> &'static str {
        match self {
            SignalDomain::CurrentMilliamp | SignalDomain::ResistanceOhm => "Ω",
            SignalDomain::VoltageMillivolt => "mV",
        }
    }

    /// Parse a short label as typed on the command line
    ///
    /// # Examples
    /// ```
    /// use calreport::measurement::SignalDomain;
    ///
    /// assert_eq!(SignalDomain::from_label("mA"), Some(SignalDomain::CurrentMilliamp));
    /// assert_eq!(SignalDomain::from_label("ohm"), Some(SignalDomain::ResistanceOhm));
    /// assert_eq!(SignalDomain::from_label("psi"), None);
    /// ```
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "ma" | "current_ma" => Some(SignalDomain::CurrentMilliamp),
            "mv" | "voltage_mv" => Some(SignalDomain::VoltageMillivolt),
            "ohm" | "Ω" | "resistance_ohm" => Some(SignalDomain::ResistanceOhm),
            _ => None,
        }
    }
}

/// Session settings controlling which columns are computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentConfiguration {
    pub signal_domain: SignalDomain,
    #[serde(default)]
    pub has_engineering_unit_transmitter_reading: bool,
}

impl InstrumentConfiguration {
    pub fn new(
        signal_domain: SignalDomain,
        has_engineering_unit_transmitter_reading: bool,
    ) -> Self {
        Self {
            signal_domain,
            has_engineering_unit_transmitter_reading,
        }
    }
}

/// Editable input columns of a measurement row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementField {
    PercentageOfRange,
    IdealEngineeringValue,
    ReferenceStandardValue,
    TransmitterEngineeringValue,
    IdealOutputValue,
    MeasuredOutputValue,
    SensorIdealValue,
    SensorMeasuredValue,
}

/// One calibration test point for one instrument
///
/// Inputs are kept exactly as the operator typed them. The three derived
/// fields are only written by [`crate::engine::recompute`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementRecord {
    #[serde(deserialize_with = "loose_text")]
    pub percentage_of_range: String,
    #[serde(deserialize_with = "loose_text")]
    pub ideal_engineering_value: String,
    #[serde(deserialize_with = "loose_text")]
    pub reference_standard_value: String,
    #[serde(deserialize_with = "loose_optional_text")]
    pub transmitter_engineering_value: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub ideal_output_value: String,
    #[serde(deserialize_with = "loose_text")]
    pub measured_output_value: String,
    #[serde(deserialize_with = "loose_optional_text")]
    pub sensor_ideal_value: Option<String>,
    #[serde(deserialize_with = "loose_optional_text")]
    pub sensor_measured_value: Option<String>,

    pub(crate) engineering_unit_error: Option<f64>,
    pub(crate) output_error: f64,
    pub(crate) output_error_percent: f64,
}

impl MeasurementRecord {
    /// An all-empty row, as appended by the row-management UI
    pub fn blank() -> Self {
        Self::default()
    }

    /// Row with the two output readings filled in
    pub fn with_outputs(ideal: &str, measured: &str) -> Self {
        let mut record = Self::blank();
        record.ideal_output_value = ideal.to_string();
        record.measured_output_value = measured.to_string();
        record
    }

    /// Overwrite one input column with raw operator text
    ///
    /// Derived values are left stale; callers go through the engine afterwards.
    pub fn set(&mut self, field: MeasurementField, raw: &str) {
        let raw = raw.to_string();
        match field {
            MeasurementField::PercentageOfRange => self.percentage_of_range = raw,
            MeasurementField::IdealEngineeringValue => self.ideal_engineering_value = raw,
            MeasurementField::ReferenceStandardValue => self.reference_standard_value = raw,
            MeasurementField::TransmitterEngineeringValue => {
                self.transmitter_engineering_value = Some(raw)
            }
            MeasurementField::IdealOutputValue => self.ideal_output_value = raw,
            MeasurementField::MeasuredOutputValue => self.measured_output_value = raw,
            MeasurementField::SensorIdealValue => self.sensor_ideal_value = Some(raw),
            MeasurementField::SensorMeasuredValue => self.sensor_measured_value = Some(raw),
        }
    }

    pub fn percentage(&self) -> f64 {
        parse_reading(&self.percentage_of_range)
    }

    pub fn ideal_engineering(&self) -> f64 {
        parse_reading(&self.ideal_engineering_value)
    }

    pub fn reference_standard(&self) -> f64 {
        parse_reading(&self.reference_standard_value)
    }

    pub fn transmitter_engineering(&self) -> f64 {
        self.transmitter_engineering_value
            .as_deref()
            .map(parse_reading)
            .unwrap_or(0.0)
    }

    pub fn ideal_output(&self) -> f64 {
        parse_reading(&self.ideal_output_value)
    }

    pub fn measured_output(&self) -> f64 {
        parse_reading(&self.measured_output_value)
    }

    /// `transmitterEngineeringValue - idealEngineeringValue`, unset when not tracked
    pub fn engineering_unit_error(&self) -> Option<f64> {
        self.engineering_unit_error
    }

    /// `measuredOutputValue - idealOutputValue`
    pub fn output_error(&self) -> f64 {
        self.output_error
    }

    /// Output error as a percentage of the signal span
    pub fn output_error_percent(&self) -> f64 {
        self.output_error_percent
    }
}

struct ReadingText;

impl<'de> Visitor<'de> for ReadingText {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a reading as text, a number or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(self)
    }
}

/// Reading column from JSON: text as-is, numbers as their text, `null` as empty
///
/// Binary formats (session files) are not self-describing and keep plain strings.
pub(crate) fn loose_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    if d.is_human_readable() {
        d.deserialize_any(ReadingText).map(Option::unwrap_or_default)
    } else {
        String::deserialize(d)
    }
}

/// Like [`loose_text`] for optional columns; `null` stays unset
pub(crate) fn loose_optional_text<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    if d.is_human_readable() {
        d.deserialize_any(ReadingText)
    } else {
        Option::<String>::deserialize(d)
    }
}

/// Parse an operator-entered reading
///
/// Empty, missing or malformed text reads as zero. Non-finite values
/// (`NaN`, `inf`) are treated the same way so they never reach a report.
///
/// # Examples
/// ```
/// use calreport::measurement::parse_reading;
///
/// assert_eq!(parse_reading(" 12.5 "), 12.5);
/// assert_eq!(parse_reading(""), 0.0);
/// assert_eq!(parse_reading("abc"), 0.0);
/// ```
pub fn parse_reading(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
