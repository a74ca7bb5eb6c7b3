//! TAC1100 register map.

use serde::Serialize;
use std::fmt;

/// A measured quantity, read from the input registers as a 2-word float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    Voltage,
    Current,
    ActivePower,
    ApparentPower,
    ReactivePower,
    PowerFactor,
    PhaseAngle,
    Frequency,
    ImportActiveEnergy,
    ExportActiveEnergy,
    TotalActiveEnergy,
    ImportReactiveEnergy,
    ExportReactiveEnergy,
    TotalReactiveEnergy,
}

impl Measurement {
    /// Every measurement, in output order.
    pub const ALL: [Measurement; 14] = [
        Measurement::Voltage,
        Measurement::Current,
        Measurement::ActivePower,
        Measurement::ApparentPower,
        Measurement::ReactivePower,
        Measurement::PowerFactor,
        Measurement::PhaseAngle,
        Measurement::Frequency,
        Measurement::ImportActiveEnergy,
        Measurement::ExportActiveEnergy,
        Measurement::TotalActiveEnergy,
        Measurement::ImportReactiveEnergy,
        Measurement::ExportReactiveEnergy,
        Measurement::TotalReactiveEnergy,
    ];

    pub fn address(self) -> u16 {
        match self {
            Measurement::Voltage => 0x0000,
            Measurement::Current => 0x0006,
            Measurement::ActivePower => 0x000C,
            Measurement::ReactivePower => 0x0012,
            Measurement::ApparentPower => 0x0018,
            Measurement::PowerFactor => 0x001E,
            Measurement::PhaseAngle => 0x0024,
            Measurement::Frequency => 0x0030,
            Measurement::ImportActiveEnergy => 0x0500,
            Measurement::ExportActiveEnergy => 0x0502,
            Measurement::TotalActiveEnergy => 0x0504,
            Measurement::ImportReactiveEnergy => 0x0508,
            Measurement::ExportReactiveEnergy => 0x050A,
            Measurement::TotalReactiveEnergy => 0x050C,
        }
    }

    /// Energies are kept in kWh/kvarh by the meter and reported in Wh/varh.
    pub fn is_energy(self) -> bool {
        matches!(
            self,
            Measurement::ImportActiveEnergy
                | Measurement::ExportActiveEnergy
                | Measurement::TotalActiveEnergy
                | Measurement::ImportReactiveEnergy
                | Measurement::ExportReactiveEnergy
                | Measurement::TotalReactiveEnergy
        )
    }

    /// Multiplier from the register value to the reported value.
    pub fn scale(self) -> f32 {
        if self.is_energy() { 1000.0 } else { 1.0 }
    }

    pub fn label(self) -> &'static str {
        match self {
            Measurement::Voltage => "Voltage",
            Measurement::Current => "Current",
            Measurement::ActivePower => "Power",
            Measurement::ApparentPower => "Apparent Power",
            Measurement::ReactivePower => "Reactive Power",
            Measurement::PowerFactor => "Power Factor",
            Measurement::PhaseAngle => "Phase Angle",
            Measurement::Frequency => "Frequency",
            Measurement::ImportActiveEnergy => "Import Active Energy",
            Measurement::ExportActiveEnergy => "Export Active Energy",
            Measurement::TotalActiveEnergy => "Total Active Energy",
            Measurement::ImportReactiveEnergy => "Import Reactive Energy",
            Measurement::ExportReactiveEnergy => "Export Reactive Energy",
            Measurement::TotalReactiveEnergy => "Total Reactive Energy",
        }
    }

    /// Unit for human readable output (empty for power factor).
    pub fn unit(self) -> &'static str {
        match self {
            Measurement::Voltage => "V",
            Measurement::Current => "A",
            Measurement::ActivePower => "W",
            Measurement::ApparentPower => "VA",
            Measurement::ReactivePower => "VAR",
            Measurement::PowerFactor => "",
            Measurement::PhaseAngle => "Degree",
            Measurement::Frequency => "Hz",
            Measurement::ImportActiveEnergy
            | Measurement::ExportActiveEnergy
            | Measurement::TotalActiveEnergy => "Wh",
            Measurement::ImportReactiveEnergy
            | Measurement::ExportReactiveEnergy
            | Measurement::TotalReactiveEnergy => "VARh",
        }
    }

    /// IEC 62056 value identifier.
    pub fn iec_id(self) -> &'static str {
        match self {
            Measurement::Voltage => "V",
            Measurement::Current => "C",
            Measurement::ActivePower => "P",
            Measurement::ApparentPower => "VA",
            Measurement::ReactivePower => "VAR",
            Measurement::PowerFactor => "PF",
            Measurement::PhaseAngle => "PA",
            Measurement::Frequency => "F",
            Measurement::ImportActiveEnergy => "IE",
            Measurement::ExportActiveEnergy => "EE",
            Measurement::TotalActiveEnergy => "TE",
            Measurement::ImportReactiveEnergy => "IRE",
            Measurement::ExportReactiveEnergy => "ERE",
            Measurement::TotalReactiveEnergy => "TRE",
        }
    }

    /// IEC 62056 unit.
    pub fn iec_unit(self) -> &'static str {
        match self {
            Measurement::PowerFactor => "F",
            Measurement::PhaseAngle => "Dg",
            other => other.unit(),
        }
    }

    /// Key in JSON output.
    pub fn key(self) -> &'static str {
        match self {
            Measurement::Voltage => "voltage",
            Measurement::Current => "current",
            Measurement::ActivePower => "active_power",
            Measurement::ApparentPower => "apparent_power",
            Measurement::ReactivePower => "reactive_power",
            Measurement::PowerFactor => "power_factor",
            Measurement::PhaseAngle => "phase_angle",
            Measurement::Frequency => "frequency",
            Measurement::ImportActiveEnergy => "import_active_energy",
            Measurement::ExportActiveEnergy => "export_active_energy",
            Measurement::TotalActiveEnergy => "total_active_energy",
            Measurement::ImportReactiveEnergy => "import_reactive_energy",
            Measurement::ExportReactiveEnergy => "export_reactive_energy",
            Measurement::TotalReactiveEnergy => "total_reactive_energy",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A configuration (holding) register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigRegister {
    /// Key Parameter Programming Authorization: write the password here to
    /// unlock protected registers.
    Kppa,
    DemandPeriod,
    SlideTime,
    DeviceId,
    BaudRate,
    ParityStop,
    Password,
    ScrollTime,
    BacklitTime,
    ResetHistory,
}

impl ConfigRegister {
    pub fn address(self) -> u16 {
        match self {
            ConfigRegister::Kppa => 0x5000,
            ConfigRegister::DemandPeriod => 0x5002,
            ConfigRegister::SlideTime => 0x5003,
            ConfigRegister::DeviceId => 0x5005,
            ConfigRegister::BaudRate => 0x5006,
            ConfigRegister::ParityStop => 0x5007,
            ConfigRegister::Password => 0x5008,
            ConfigRegister::ScrollTime => 0x5018,
            ConfigRegister::BacklitTime => 0x5019,
            ConfigRegister::ResetHistory => 0x5600,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigRegister::Kppa => "KPPA",
            ConfigRegister::DemandPeriod => "demand period",
            ConfigRegister::SlideTime => "slide time",
            ConfigRegister::DeviceId => "meter address",
            ConfigRegister::BaudRate => "baud rate",
            ConfigRegister::ParityStop => "parity/stop bits",
            ConfigRegister::Password => "password",
            ConfigRegister::ScrollTime => "automatic scroll display time",
            ConfigRegister::BacklitTime => "backlit time",
            ConfigRegister::ResetHistory => "historical data reset",
        }
    }

    /// Writes are only accepted after a KPPA write with the current password.
    pub fn requires_authorization(self) -> bool {
        matches!(self, ConfigRegister::Password | ConfigRegister::ResetHistory)
    }

    /// The meter applies the new value only after a power cycle.
    pub fn requires_restart(self) -> bool {
        matches!(self, ConfigRegister::ParityStop)
    }
}

impl fmt::Display for ConfigRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.address())
    }
}

/// What a write to [`ConfigRegister::ResetHistory`] clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    MaxDemand,
    Monthly,
    Daily,
}

impl ResetKind {
    pub fn code(self) -> u16 {
        match self {
            ResetKind::MaxDemand => 0,
            ResetKind::Monthly => 8,
            ResetKind::Daily => 9,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(ResetKind::MaxDemand),
            8 => Some(ResetKind::Monthly),
            9 => Some(ResetKind::Daily),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ResetKind::MaxDemand => "Maximum demand reset",
            ResetKind::Monthly => "Monthly energy consumption reset",
            ResetKind::Daily => "Daily energy consumption reset",
        }
    }
}
