//! Component categories.
//!
//! Every catalog component belongs to exactly one category, and every build step selects
//! exactly one category of component.  The category therefore doubles as the step key.
//!
//! On the wire a category is its upper-case tag (`"CPU"`, `"MOTHERBOARD"`, ...).  Parsing
//! also accepts the lower-case step key (`"cpu"`) so that query strings and configuration
//! files can use either spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of part a component is and the build step that selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ComponentCategory {
    /// Processor.
    Cpu,
    /// Motherboard.
    Motherboard,
    /// Memory.
    Ram,
    /// Drives.
    Storage,
    /// Graphics card.
    Gpu,
    /// Power supply.
    Psu,
    /// Chassis.
    Case,
    /// CPU cooler.
    Cooling,
}

impl ComponentCategory {
    /// All categories in catalog order.
    pub const ALL: [ComponentCategory; 8] = [
        ComponentCategory::Cpu,
        ComponentCategory::Motherboard,
        ComponentCategory::Ram,
        ComponentCategory::Storage,
        ComponentCategory::Gpu,
        ComponentCategory::Psu,
        ComponentCategory::Case,
        ComponentCategory::Cooling,
    ];

    /// The upper-case wire tag, e.g. `"MOTHERBOARD"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCategory::Cpu => "CPU",
            ComponentCategory::Motherboard => "MOTHERBOARD",
            ComponentCategory::Ram => "RAM",
            ComponentCategory::Storage => "STORAGE",
            ComponentCategory::Gpu => "GPU",
            ComponentCategory::Psu => "PSU",
            ComponentCategory::Case => "CASE",
            ComponentCategory::Cooling => "COOLING",
        }
    }

    /// The lower-case step key, e.g. `"motherboard"`.
    pub fn key(&self) -> &'static str {
        match self {
            ComponentCategory::Cpu => "cpu",
            ComponentCategory::Motherboard => "motherboard",
            ComponentCategory::Ram => "ram",
            ComponentCategory::Storage => "storage",
            ComponentCategory::Gpu => "gpu",
            ComponentCategory::Psu => "psu",
            ComponentCategory::Case => "case",
            ComponentCategory::Cooling => "cooling",
        }
    }

    /// The human-readable label shown for the step that selects this category.
    pub fn label(&self) -> &'static str {
        match self {
            ComponentCategory::Cpu => "Processor (CPU)",
            ComponentCategory::Motherboard => "Motherboard",
            ComponentCategory::Ram => "Memory (RAM)",
            ComponentCategory::Storage => "Storage",
            ComponentCategory::Gpu => "Graphics Card (GPU)",
            ComponentCategory::Psu => "Power Supply (PSU)",
            ComponentCategory::Case => "Case",
            ComponentCategory::Cooling => "Cooling",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for ComponentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl TryFrom<String> for ComponentCategory {
    type Error = UnknownCategory;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ComponentCategory> for &'static str {
    fn from(category: ComponentCategory) -> Self {
        category.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_keys() {
        for category in ComponentCategory::ALL {
            assert_eq!(category.as_str().parse::<ComponentCategory>(), Ok(category));
            assert_eq!(category.key().parse::<ComponentCategory>(), Ok(category));
        }
        assert_eq!("Cpu".parse::<ComponentCategory>(), Ok(ComponentCategory::Cpu));
        assert!("fan".parse::<ComponentCategory>().is_err());
        assert!("".parse::<ComponentCategory>().is_err());
    }

    #[test]
    fn serializes_as_upper_case_tag() {
        let json = serde_json::to_string(&ComponentCategory::Motherboard).unwrap();
        assert_eq!(json, "\"MOTHERBOARD\"");
        let parsed: ComponentCategory = serde_json::from_str("\"cooling\"").unwrap();
        assert_eq!(parsed, ComponentCategory::Cooling);
        assert!(serde_json::from_str::<ComponentCategory>("\"FAN\"").is_err());
    }

    #[test]
    fn works_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ComponentCategory::Ram, 3);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"RAM":3}"#);
        let back: std::collections::BTreeMap<ComponentCategory, i32> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
