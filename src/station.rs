//! Station catalog.
//!
//! Stations are loaded from YAML. The default catalog ships with the binary.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

const DEFAULT_STATIONS: &str = include_str!("../data/stations.yaml");

/// Train line a station belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    Blue,
    Red,
    Green,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blue => write!(f, "blue"),
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
        }
    }
}

/// Average daily entries per day type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ridership {
    pub weekday: u32,
    pub saturday: u32,
    pub sunday: u32,
}

impl Default for Ridership {
    fn default() -> Self {
        Self {
            weekday: 3000,
            saturday: 2000,
            sunday: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: i32,
    pub name: String,
    pub line: Line,
    #[serde(default)]
    pub ridership: Ridership,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCatalog {
    pub stations: Vec<Station>,
}

impl StationCatalog {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let catalog: StationCatalog =
            serde_yaml::from_str(yaml).context("Failed to parse station catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read station catalog {path:?}"))?;
        Self::from_yaml(&yaml)
    }

    /// The stations bundled with the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_yaml(DEFAULT_STATIONS)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.stations.is_empty() {
            anyhow::bail!("Station catalog is empty");
        }
        let mut seen = HashSet::new();
        for station in &self.stations {
            if !seen.insert(station.station_id) {
                anyhow::bail!("Duplicate station id {}", station.station_id);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = StationCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog
            .stations
            .iter()
            .any(|s| s.station_id == 40820 && s.name == "Clark/Lake" && s.line == Line::Blue));
    }

    #[test]
    fn test_ridership_defaults_when_missing() {
        let catalog = StationCatalog::from_yaml(
            "stations:\n  - station_id: 1\n    name: StationA\n    line: red\n",
        )
        .unwrap();
        assert_eq!(catalog.stations[0].ridership, Ridership::default());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
stations:
  - station_id: 1
    name: A
    line: red
  - station_id: 1
    name: B
    line: blue
"#;
        let err = StationCatalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate station id 1"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(StationCatalog::from_yaml("stations: []").is_err());
    }

    #[test]
    fn test_unknown_line_rejected() {
        let yaml = "stations:\n  - station_id: 1\n    name: A\n    line: purple\n";
        assert!(StationCatalog::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.yaml");
        std::fs::write(
            &path,
            "stations:\n  - station_id: 7\n    name: Loop\n    line: green\n",
        )
        .unwrap();

        let catalog = StationCatalog::from_file(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.stations[0].line.to_string(), "green");
    }
}
