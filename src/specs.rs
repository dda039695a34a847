//! Component specifications.
//!
//! A component's specifications are an open map from attribute name to a scalar value (or a
//! list of strings for the `compatibility` fallback).  Compatibility rules read a handful of
//! well-known attributes; everything else is descriptive.
//!
//! Catalog data is not uniform.  Memory modules sometimes record their generation under
//! `type` and sometimes under `memoryType`, and cases and coolers may carry a
//! `compatibility` list in place of a single `formFactor` or `socket`.  Readers here tolerate
//! both spellings.
//!
//! Each category also has a field sheet ([`spec_fields`]) that drives input validation when
//! components are created through the API.  Attributes not on the sheet are accepted as-is.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ComponentCategory;

/// CPU and motherboard socket, e.g. `AM5`.
pub const SOCKET: &str = "socket";
/// Motherboard memory generation, e.g. `DDR5`.
pub const MEMORY_TYPE: &str = "memoryType";
/// Memory module generation on RAM components.
pub const TYPE: &str = "type";
/// Motherboard (and case) form factor.
pub const FORM_FACTOR: &str = "formFactor";
/// List of sockets or form factors a cooler or case supports.
pub const COMPATIBILITY: &str = "compatibility";

/// A single specification value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    /// A boolean attribute.
    Flag(bool),
    /// A numeric attribute.
    Number(f64),
    /// A textual attribute.
    Text(String),
    /// A list of textual values.
    List(Vec<String>),
}

impl SpecValue {
    fn kind(&self) -> &'static str {
        match self {
            SpecValue::Flag(_) => "flag",
            SpecValue::Number(_) => "number",
            SpecValue::Text(_) => "text",
            SpecValue::List(_) => "list",
        }
    }
}

impl std::fmt::Display for SpecValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecValue::Flag(b) => write!(f, "{b}"),
            SpecValue::Number(n) => write!(f, "{n}"),
            SpecValue::Text(s) => f.write_str(s),
            SpecValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for SpecValue {
    fn from(s: &str) -> Self {
        SpecValue::Text(s.to_string())
    }
}

impl From<String> for SpecValue {
    fn from(s: String) -> Self {
        SpecValue::Text(s)
    }
}

impl From<f64> for SpecValue {
    fn from(n: f64) -> Self {
        SpecValue::Number(n)
    }
}

impl From<i64> for SpecValue {
    fn from(n: i64) -> Self {
        SpecValue::Number(n as f64)
    }
}

impl From<i32> for SpecValue {
    fn from(n: i32) -> Self {
        SpecValue::Number(n.into())
    }
}

impl From<bool> for SpecValue {
    fn from(b: bool) -> Self {
        SpecValue::Flag(b)
    }
}

impl From<Vec<String>> for SpecValue {
    fn from(items: Vec<String>) -> Self {
        SpecValue::List(items)
    }
}

impl From<&[&str]> for SpecValue {
    fn from(items: &[&str]) -> Self {
        SpecValue::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// An ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specifications(BTreeMap<String, SpecValue>);

impl Specifications {
    /// Creates an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SpecValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value of an attribute.
    pub fn get(&self, key: &str) -> Option<&SpecValue> {
        self.0.get(key)
    }

    /// Returns a textual attribute, ignoring values of other kinds.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(SpecValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a numeric attribute.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(SpecValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns a list attribute.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(SpecValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// True when `key` is a text attribute equal to `expected` or a list containing it.
    pub fn matches(&self, key: &str, expected: &str) -> bool {
        match self.0.get(key) {
            Some(SpecValue::Text(s)) => s == expected,
            Some(SpecValue::List(items)) => items.iter().any(|s| s == expected),
            _ => false,
        }
    }

    /// The number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpecValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<SpecValue>> FromIterator<(K, V)> for Specifications {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

////////////////////////////////////////////// Field sheets //////////////////////////////////////////////

/// How a specification field is entered and checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, optionally constrained by a pattern.
    Text {
        /// Regular expression the whole value must match.
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<&'static str>,
    },
    /// An integer within an inclusive range.
    Integer {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// One of a fixed set of options.
    Select {
        /// Accepted values.
        options: &'static [&'static str],
    },
    /// A list of strings.
    List,
}

/// One entry of a category's field sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpecField {
    /// Attribute name.
    pub name: &'static str,
    /// Form label.
    pub label: &'static str,
    /// Input kind and constraints.
    pub kind: FieldKind,
    /// Whether the attribute must be present.
    pub required: bool,
    /// Alternate attribute names accepted in place of `name`.
    pub aliases: &'static [&'static str],
}

const fn text(name: &'static str, label: &'static str, pattern: Option<&'static str>) -> SpecField {
    SpecField {
        name,
        label,
        kind: FieldKind::Text { pattern },
        required: true,
        aliases: &[],
    }
}

const fn integer(name: &'static str, label: &'static str, min: i64, max: i64) -> SpecField {
    SpecField {
        name,
        label,
        kind: FieldKind::Integer { min, max },
        required: true,
        aliases: &[],
    }
}

const fn select(
    name: &'static str,
    label: &'static str,
    options: &'static [&'static str],
) -> SpecField {
    SpecField {
        name,
        label,
        kind: FieldKind::Select { options },
        required: true,
        aliases: &[],
    }
}

const fn list(name: &'static str, label: &'static str) -> SpecField {
    SpecField {
        name,
        label,
        kind: FieldKind::List,
        required: false,
        aliases: &[],
    }
}

impl SpecField {
    const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    const fn alias(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

const CLOCK: Option<&str> = Some(r"^\d+(\.\d+)?\s?GHz$");
const WATTS: Option<&str> = Some(r"^\d+\s?W$");
const SOCKETS: &[&str] = &["LGA1700", "LGA1200", "AM5", "AM4", "LGA2066"];
const MEMORY_GENERATIONS: &[&str] = &["DDR4", "DDR5"];

const CPU_FIELDS: &[SpecField] = &[
    integer("cores", "Cores", 1, 128),
    integer("threads", "Threads", 1, 256),
    text("baseClock", "Base Clock", CLOCK),
    text("boostClock", "Boost Clock", CLOCK),
    text("tdp", "TDP", WATTS),
    select(SOCKET, "Socket", SOCKETS),
];

const MOTHERBOARD_FIELDS: &[SpecField] = &[
    select(SOCKET, "Socket", SOCKETS),
    text("chipset", "Chipset", None),
    select(
        FORM_FACTOR,
        "Form Factor",
        &["ATX", "Micro-ATX", "Mini-ITX", "E-ATX"],
    ),
    select(MEMORY_TYPE, "Memory Type", MEMORY_GENERATIONS).optional(),
    integer("memorySlots", "Memory Slots", 1, 8),
    text("maxMemory", "Max Memory", None),
    text("pcie", "PCIe", None),
];

const RAM_FIELDS: &[SpecField] = &[
    text("capacity", "Capacity", Some(r"^\d+GB$")),
    text("speed", "Speed", Some(r"^\d+MHz$")),
    select(TYPE, "Type", MEMORY_GENERATIONS).alias(&[MEMORY_TYPE]),
    text("cas", "CAS Latency", Some(r"^CL\d+$")),
    text("voltage", "Voltage", Some(r"^\d+(\.\d+)?V$")),
];

const STORAGE_FIELDS: &[SpecField] = &[
    select(
        "capacity",
        "Capacity",
        &["256GB", "512GB", "1TB", "2TB", "4TB", "8TB"],
    ),
    select(TYPE, "Type", &["NVMe SSD", "SATA SSD", "HDD"]),
    select(
        "interface",
        "Interface",
        &["PCIe 4.0 x4", "PCIe 3.0 x4", "SATA III"],
    ),
    text("readSpeed", "Read Speed", None).optional(),
    text("writeSpeed", "Write Speed", None).optional(),
    select(
        FORM_FACTOR,
        "Form Factor",
        &["M.2 2280", "M.2 2260", "M.2 22110", "2.5 inch", "3.5 inch"],
    ),
];

const GPU_FIELDS: &[SpecField] = &[
    text("chipset", "Chipset", None),
    text("memory", "Memory", None),
    text("coreClock", "Core Clock", None),
    text("boostClock", "Boost Clock", None),
    text("tdp", "TDP", WATTS),
    list("outputs", "Outputs"),
];

const PSU_FIELDS: &[SpecField] = &[
    select(
        "wattage",
        "Wattage",
        &["450W", "550W", "650W", "750W", "850W", "1000W", "1200W"],
    ),
    select(
        "efficiency",
        "Efficiency",
        &[
            "80+ White",
            "80+ Bronze",
            "80+ Silver",
            "80+ Gold",
            "80+ Platinum",
            "80+ Titanium",
        ],
    ),
    select(
        "modular",
        "Modularity",
        &["Non-Modular", "Semi-Modular", "Fully Modular"],
    ),
    select(FORM_FACTOR, "Form Factor", &["ATX", "SFX", "SFX-L"]),
];

const CASE_FIELDS: &[SpecField] = &[
    text(FORM_FACTOR, "Form Factor", None),
    text("motherboardSupport", "Motherboard Support", None),
    text("maxGpuLength", "Max GPU Length", None),
    text("maxCpuCooler", "Max CPU Cooler Height", None),
    text("driveBays", "Drive Bays", None),
    list(COMPATIBILITY, "Compatible Form Factors"),
];

const COOLING_FIELDS: &[SpecField] = &[
    select(TYPE, "Type", &["Air Cooler", "AIO Liquid Cooler", "Custom Loop"]),
    select(SOCKET, "Socket", SOCKETS).optional(),
    select(
        "radiatorSize",
        "Radiator Size",
        &["120mm", "240mm", "280mm", "360mm", "420mm"],
    )
    .optional(),
    text("fanSize", "Fan Size", None).optional(),
    text("tdp", "TDP Rating", WATTS).optional(),
    text("height", "Height", None).optional(),
    list(COMPATIBILITY, "Compatible Sockets"),
];

/// Returns the field sheet for a category.
pub fn spec_fields(category: ComponentCategory) -> &'static [SpecField] {
    match category {
        ComponentCategory::Cpu => CPU_FIELDS,
        ComponentCategory::Motherboard => MOTHERBOARD_FIELDS,
        ComponentCategory::Ram => RAM_FIELDS,
        ComponentCategory::Storage => STORAGE_FIELDS,
        ComponentCategory::Gpu => GPU_FIELDS,
        ComponentCategory::Psu => PSU_FIELDS,
        ComponentCategory::Case => CASE_FIELDS,
        ComponentCategory::Cooling => COOLING_FIELDS,
    }
}

/// Errors produced by [`validate_specifications`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecValidationError {
    /// A required attribute is absent.
    #[error("missing required specification {field:?}")]
    MissingField {
        /// Attribute name.
        field: &'static str,
    },
    /// An attribute holds a value of the wrong kind.
    #[error("specification {field:?} must be {expected}, got {actual}")]
    WrongKind {
        /// Attribute name.
        field: String,
        /// Expected value kind.
        expected: &'static str,
        /// Kind that was supplied.
        actual: &'static str,
    },
    /// A select attribute holds a value outside its options.
    #[error("specification {field:?} must be one of {allowed:?}, got {value:?}")]
    NotAnOption {
        /// Attribute name.
        field: String,
        /// Supplied value.
        value: String,
        /// Accepted options.
        allowed: &'static [&'static str],
    },
    /// A text attribute does not match its pattern.
    #[error("specification {field:?} value {value:?} does not match {pattern}")]
    PatternMismatch {
        /// Attribute name.
        field: String,
        /// Supplied value.
        value: String,
        /// Required pattern.
        pattern: &'static str,
    },
    /// An integer attribute is fractional or out of range.
    #[error("specification {field:?} must be an integer in {min}..={max}, got {value}")]
    OutOfRange {
        /// Attribute name.
        field: String,
        /// Supplied value.
        value: f64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// A field sheet pattern failed to compile.
    #[error("invalid pattern for {field:?}: {message}")]
    InvalidPattern {
        /// Attribute name.
        field: &'static str,
        /// Regex compiler message.
        message: String,
    },
}

/// Checks `specs` against the field sheet of `category`.
///
/// Attributes that are not on the sheet are accepted unchecked.
pub fn validate_specifications(
    category: ComponentCategory,
    specs: &Specifications,
) -> Result<(), SpecValidationError> {
    for field in spec_fields(category) {
        let found = std::iter::once(field.name)
            .chain(field.aliases.iter().copied())
            .find_map(|name| specs.get(name).map(|value| (name, value)));
        match found {
            Some((name, value)) => validate_field(field, name, value)?,
            None if field.required => {
                return Err(SpecValidationError::MissingField { field: field.name });
            }
            None => {}
        }
    }
    Ok(())
}

fn validate_field(
    field: &SpecField,
    name: &str,
    value: &SpecValue,
) -> Result<(), SpecValidationError> {
    let wrong_kind = |expected| SpecValidationError::WrongKind {
        field: name.to_string(),
        expected,
        actual: value.kind(),
    };
    match (field.kind, value) {
        (FieldKind::Text { pattern: None }, SpecValue::Text(_)) => Ok(()),
        (FieldKind::Text { pattern: Some(pattern) }, SpecValue::Text(s)) => {
            let re = Regex::new(pattern).map_err(|e| SpecValidationError::InvalidPattern {
                field: field.name,
                message: e.to_string(),
            })?;
            if re.is_match(s) {
                Ok(())
            } else {
                Err(SpecValidationError::PatternMismatch {
                    field: name.to_string(),
                    value: s.clone(),
                    pattern,
                })
            }
        }
        (FieldKind::Text { .. }, _) => Err(wrong_kind("text")),
        (FieldKind::Integer { min, max }, SpecValue::Number(n)) => {
            if n.fract() == 0.0 && *n >= min as f64 && *n <= max as f64 {
                Ok(())
            } else {
                Err(SpecValidationError::OutOfRange {
                    field: name.to_string(),
                    value: *n,
                    min,
                    max,
                })
            }
        }
        (FieldKind::Integer { .. }, _) => Err(wrong_kind("number")),
        (FieldKind::Select { options }, SpecValue::Text(s)) => {
            if options.contains(&s.as_str()) {
                Ok(())
            } else {
                Err(SpecValidationError::NotAnOption {
                    field: name.to_string(),
                    value: s.clone(),
                    allowed: options,
                })
            }
        }
        (FieldKind::Select { .. }, _) => Err(wrong_kind("text")),
        (FieldKind::List, SpecValue::List(_)) => Ok(()),
        (FieldKind::List, _) => Err(wrong_kind("list")),
    }
}
