use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_TOP_N;

/// Presentation settings, optionally read from a YAML file.
///
/// ```yaml
/// top_n: 5
/// label_width: 15
/// map:
///   max_radius: 150000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub top_n: usize,
    pub label_width: usize,
    pub bar_width: usize,
    pub table_rows: usize,
    pub map: MapStyle,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            label_width: 15,
            bar_width: 40,
            table_rows: 50,
            map: MapStyle::default(),
        }
    }
}

/// Radius is in metres; colours are RGBA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub min_radius: f64,
    pub max_radius: f64,
    pub low_color: [u8; 4],
    pub high_color: [u8; 4],
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            min_radius: 20_000.0,
            max_radius: 200_000.0,
            low_color: [66, 135, 245, 160],
            high_color: [220, 20, 60, 220],
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: DashboardConfig =
            serde_yaml::from_reader(reader).context("Parsing dashboard config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.top_n > 0, "top_n must be at least 1");
        ensure!(self.label_width > 0, "label_width must be at least 1");
        ensure!(self.bar_width > 0, "bar_width must be at least 1");
        ensure!(
            self.map.min_radius >= 0.0 && self.map.min_radius <= self.map.max_radius,
            "map radius bounds must satisfy 0 <= min_radius <= max_radius"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("dashboard.yml");
        fs::write(&path, "top_n: 3\nmap:\n  max_radius: 90000\n").expect("write config");

        let config = DashboardConfig::load(&path).expect("load config");
        assert_eq!(config.top_n, 3);
        assert_eq!(config.label_width, 15);
        assert_eq!(config.map.max_radius, 90_000.0);
        assert_eq!(config.map.min_radius, 20_000.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("dashboard.yml");
        fs::write(&path, "top_n: 0\n").expect("write config");
        assert!(DashboardConfig::load(&path).is_err());

        fs::write(&path, "map:\n  min_radius: 5\n  max_radius: 1\n").expect("write config");
        assert!(DashboardConfig::load(&path).is_err());
    }

    #[test]
    fn missing_path_yields_defaults() {
        assert_eq!(
            DashboardConfig::load_or_default(None).unwrap(),
            DashboardConfig::default()
        );
    }
}
