//! Engineering units: an SI prefix (a power of 1000) applied to a physical quantity.
//!
//! Library values (slews, loads, constraint bounds, supply voltages) are stored in
//! the library's configured units. The simulator boundary works in base SI units,
//! so every conversion goes through [`EngineeringUnit::to_si`] and
//! [`EngineeringUnit::from_si`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// An SI prefix restricted to powers of 1000, from quecto (1e-30) to quetta (1e30).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Prefix {
    /// 1e-30
    Quecto,
    /// 1e-27
    Ronto,
    /// 1e-24
    Yocto,
    /// 1e-21
    Zepto,
    /// 1e-18
    Atto,
    /// 1e-15
    Femto,
    /// 1e-12
    Pico,
    /// 1e-9
    Nano,
    /// 1e-6
    Micro,
    /// 1e-3
    Milli,
    /// 1
    Unit,
    /// 1e3
    Kilo,
    /// 1e6
    Mega,
    /// 1e9
    Giga,
    /// 1e12
    Tera,
    /// 1e15
    Peta,
    /// 1e18
    Exa,
    /// 1e21
    Zetta,
    /// 1e24
    Yotta,
    /// 1e27
    Ronna,
    /// 1e30
    Quetta,
}

const ALL_PREFIXES: [Prefix; 21] = [
    Prefix::Quecto,
    Prefix::Ronto,
    Prefix::Yocto,
    Prefix::Zepto,
    Prefix::Atto,
    Prefix::Femto,
    Prefix::Pico,
    Prefix::Nano,
    Prefix::Micro,
    Prefix::Milli,
    Prefix::Unit,
    Prefix::Kilo,
    Prefix::Mega,
    Prefix::Giga,
    Prefix::Tera,
    Prefix::Peta,
    Prefix::Exa,
    Prefix::Zetta,
    Prefix::Yotta,
    Prefix::Ronna,
    Prefix::Quetta,
];

impl Prefix {
    /// Returns the decimal exponent of this prefix (always a multiple of 3).
    pub fn exponent(self) -> i32 {
        let index = ALL_PREFIXES
            .iter()
            .position(|p| *p == self)
            .unwrap_or(10) as i32;
        (index - 10) * 3
    }

    /// Returns the multiplier this prefix applies, e.g. `1e-12` for pico.
    pub fn magnitude(self) -> f64 {
        10f64.powi(self.exponent())
    }

    /// Returns the prefix symbol (`""` for no prefix).
    pub fn symbol(self) -> &'static str {
        match self {
            Prefix::Quecto => "q",
            Prefix::Ronto => "r",
            Prefix::Yocto => "y",
            Prefix::Zepto => "z",
            Prefix::Atto => "a",
            Prefix::Femto => "f",
            Prefix::Pico => "p",
            Prefix::Nano => "n",
            Prefix::Micro => "u",
            Prefix::Milli => "m",
            Prefix::Unit => "",
            Prefix::Kilo => "k",
            Prefix::Mega => "M",
            Prefix::Giga => "G",
            Prefix::Tera => "T",
            Prefix::Peta => "P",
            Prefix::Exa => "E",
            Prefix::Zetta => "Z",
            Prefix::Yotta => "Y",
            Prefix::Ronna => "R",
            Prefix::Quetta => "Q",
        }
    }

    /// Parses a prefix symbol. Case-sensitive (`m` is milli, `M` is mega);
    /// `µ` is accepted as an alias for micro.
    pub fn from_symbol(s: &str) -> Option<Self> {
        if s == "µ" {
            return Some(Prefix::Micro);
        }
        ALL_PREFIXES.iter().copied().find(|p| p.symbol() == s)
    }

    /// Finds the prefix whose magnitude equals `magnitude` (within float tolerance).
    pub fn from_magnitude(magnitude: f64) -> Option<Self> {
        ALL_PREFIXES.iter().copied().find(|p| {
            let m = p.magnitude();
            ((m - magnitude) / m).abs() < 1e-9
        })
    }
}

/// A physical quantity the library assigns a unit to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Quantity {
    /// Volts.
    Voltage,
    /// Amperes.
    Current,
    /// Ohms.
    Resistance,
    /// Farads.
    Capacitance,
    /// Seconds.
    Time,
    /// Watts.
    Power,
    /// Joules.
    Energy,
}

impl Quantity {
    /// Returns the canonical short symbol of the base unit.
    pub fn symbol(self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "A",
            Quantity::Resistance => "Ω",
            Quantity::Capacitance => "F",
            Quantity::Time => "s",
            Quantity::Power => "W",
            Quantity::Energy => "J",
        }
    }

    /// Spellings accepted after the prefix, longest first so that e.g. `seconds`
    /// is matched before `s`. Matching is case-insensitive.
    fn spellings(self) -> &'static [&'static str] {
        match self {
            Quantity::Voltage => &["volts", "volt", "v"],
            Quantity::Current => &["amps", "amp", "a"],
            Quantity::Resistance => &["ohms", "ohm", "Ω"],
            Quantity::Capacitance => &["farads", "farad", "f"],
            Quantity::Time => &["seconds", "second", "s"],
            Quantity::Power => &["watts", "watt", "w"],
            Quantity::Energy => &["joules", "joule", "j"],
        }
    }

    /// Lowercase human-readable name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::Resistance => "resistance",
            Quantity::Capacitance => "capacitance",
            Quantity::Time => "time",
            Quantity::Power => "power",
            Quantity::Energy => "energy",
        }
    }
}

/// A unit for one quantity: prefix magnitude plus the base symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct EngineeringUnit {
    /// The physical quantity measured in this unit.
    pub quantity: Quantity,
    /// The SI prefix applied to the base unit.
    pub prefix: Prefix,
}

impl EngineeringUnit {
    /// Creates a unit from a quantity and prefix.
    pub fn new(quantity: Quantity, prefix: Prefix) -> Self {
        Self { quantity, prefix }
    }

    /// Returns the multiplier from this unit to the base SI unit.
    pub fn magnitude(&self) -> f64 {
        self.prefix.magnitude()
    }

    /// Converts a value expressed in this unit to base SI units.
    pub fn to_si(&self, value: f64) -> f64 {
        value * self.magnitude()
    }

    /// Converts a value in base SI units to this unit.
    pub fn from_si(&self, value: f64) -> f64 {
        value / self.magnitude()
    }

    /// Parses a unit string such as `"ns"`, `"pF"`, `"mV"`, `"volts"` or `"kohm"`.
    ///
    /// The quantity spelling is matched case-insensitively at the end of the
    /// string; whatever precedes it must be a valid SI prefix symbol.
    pub fn parse(quantity: Quantity, input: &str) -> Result<Self, ParseUnitError> {
        let s = input.trim();
        let err = || ParseUnitError {
            quantity,
            input: input.to_string(),
        };
        let lower = s.to_lowercase();
        for spelling in quantity.spellings() {
            if !lower.ends_with(&spelling.to_lowercase()) {
                continue;
            }
            // Lowercasing preserves the byte length of every accepted spelling
            // (`Ω` and `ω` are both two bytes), so the prefix is the head of `s`.
            let head = &s[..s.len() - spelling.len()];
            let prefix = if head.is_empty() {
                Prefix::Unit
            } else {
                Prefix::from_symbol(head).ok_or_else(err)?
            };
            return Ok(Self { quantity, prefix });
        }
        Err(err())
    }
}

impl fmt::Display for EngineeringUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix.symbol(), self.quantity.symbol())
    }
}

/// Error type for parsing unit strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseUnitError {
    /// The quantity the string was meant to describe.
    pub quantity: Quantity,
    /// The input string that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} unit: '{}' (expected an SI prefix followed by {})",
            self.quantity.name(),
            self.input,
            self.quantity.symbol()
        )
    }
}

impl std::error::Error for ParseUnitError {}

/// The set of units a library is expressed in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UnitSystem {
    /// Voltage unit (default `V`).
    pub voltage: EngineeringUnit,
    /// Current unit (default `uA`).
    pub current: EngineeringUnit,
    /// Resistance unit (default `Ω`).
    pub resistance: EngineeringUnit,
    /// Capacitance unit (default `pF`).
    pub capacitance: EngineeringUnit,
    /// Time unit (default `ns`).
    pub time: EngineeringUnit,
    /// Power unit (default `nW`).
    pub power: EngineeringUnit,
    /// Energy unit (default `pJ`).
    pub energy: EngineeringUnit,
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self {
            voltage: EngineeringUnit::new(Quantity::Voltage, Prefix::Unit),
            current: EngineeringUnit::new(Quantity::Current, Prefix::Micro),
            resistance: EngineeringUnit::new(Quantity::Resistance, Prefix::Unit),
            capacitance: EngineeringUnit::new(Quantity::Capacitance, Prefix::Pico),
            time: EngineeringUnit::new(Quantity::Time, Prefix::Nano),
            power: EngineeringUnit::new(Quantity::Power, Prefix::Nano),
            energy: EngineeringUnit::new(Quantity::Energy, Prefix::Pico),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Voltage unit:     {}", self.voltage)?;
        writeln!(f, "Current unit:     {}", self.current)?;
        writeln!(f, "Resistance unit:  {}", self.resistance)?;
        writeln!(f, "Capacitance unit: {}", self.capacitance)?;
        writeln!(f, "Time unit:        {}", self.time)?;
        writeln!(f, "Energy unit:      {}", self.energy)?;
        write!(f, "Power unit:       {}", self.power)
    }
}
