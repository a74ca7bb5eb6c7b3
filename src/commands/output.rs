//! Rendering of read results.

use crate::meter::Measurement;
use serde_json::{Map, Value, json};

/// How read results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// `Voltage: 230.10 V`, one per line.
    #[default]
    Human,
    /// IEC 62056 `ID(VALUE*UNIT)` data lines.
    Iec,
    /// Values on one line, separated by spaces.
    Compact,
    /// One JSON object.
    Json,
}

impl OutputMode {
    /// Whether the `OK`/`NOK` status marker is printed.
    pub fn prints_status(self) -> bool {
        matches!(self, OutputMode::Human | OutputMode::Compact)
    }
}

/// Everything one read invocation collected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    /// Slave address the values came from.
    pub address: u8,
    pub readings: Vec<(Measurement, f32)>,
    pub scroll_time: Option<u16>,
}

impl Report {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// The text to print on success. The status marker is added by the caller;
    /// in compact mode it completes the value line.
    pub fn render(&self, mode: OutputMode) -> String {
        let mut out = String::new();

        for (measurement, value) in &self.readings {
            let value = format_value(*measurement, *value);
            match mode {
                OutputMode::Human => {
                    let unit = measurement.unit();
                    if unit.is_empty() {
                        out.push_str(&format!("{}: {}\n", measurement.label(), value));
                    } else {
                        out.push_str(&format!("{}: {} {}\n", measurement.label(), value, unit));
                    }
                }
                OutputMode::Iec => out.push_str(&format!(
                    "{}_{}({}*{})\n",
                    self.address,
                    measurement.iec_id(),
                    value,
                    measurement.iec_unit()
                )),
                OutputMode::Compact => out.push_str(&format!("{} ", value)),
                OutputMode::Json => {}
            }
        }

        if let Some(seconds) = self.scroll_time {
            match mode {
                OutputMode::Compact => out.push_str(&format!("{} ", seconds)),
                OutputMode::Json => {}
                OutputMode::Human | OutputMode::Iec => {
                    out.push_str(&format!("Automatic scroll display time: {} seconds\n", seconds))
                }
            }
        }

        if mode == OutputMode::Json {
            out.push_str(&self.to_json().to_string());
            out.push('\n');
        }

        out
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("address".to_string(), json!(self.address));
        for (measurement, value) in &self.readings {
            let value = if measurement.is_energy() {
                json!(energy(*measurement, *value))
            } else {
                json!(*value)
            };
            object.insert(measurement.key().to_string(), value);
        }
        if let Some(seconds) = self.scroll_time {
            object.insert("scroll_time".to_string(), json!(seconds));
        }
        Value::Object(object)
    }
}

/// Energies print as whole Wh/varh, everything else with two decimals.
fn format_value(measurement: Measurement, value: f32) -> String {
    if measurement.is_energy() {
        energy(measurement, value).to_string()
    } else {
        format!("{:.2}", value)
    }
}

/// Register value (kWh) scaled to Wh, truncated toward zero.
fn energy(measurement: Measurement, value: f32) -> i64 {
    (value * measurement.scale()) as i64
}
