use config::{Config, File as ConfigFile, FileFormat};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::codec::SourceId;
use crate::error::{Error, Result};

/// Bounds and step of the offline collection grid.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridSettings {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z: f64,
    pub resolution: f64,
}

impl GridSettings {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("x_min", self.x_min),
            ("x_max", self.x_max),
            ("y_min", self.y_min),
            ("y_max", self.y_max),
            ("z", self.z),
            ("resolution", self.resolution),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidGrid(format!("{} must be a finite number", name)));
        }
        if self.resolution <= 0.0 {
            return Err(Error::InvalidGrid(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.x_max < self.x_min {
            return Err(Error::InvalidGrid(format!(
                "x_max ({}) is below x_min ({})",
                self.x_max, self.x_min
            )));
        }
        if self.y_max < self.y_min {
            return Err(Error::InvalidGrid(format!(
                "y_max ({}) is below y_min ({})",
                self.y_max, self.y_min
            )));
        }
        Ok(())
    }
}

/// Room description shared by the collection tools.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomSettings {
    pub offline_grid: GridSettings,
    /// Room width and height, only used for trajectory plots.
    #[serde(default)]
    pub size: Option<Vec<f64>>,
}

impl RoomSettings {
    pub fn load(path: &Path) -> Result<RoomSettings> {
        let settings = Config::builder()
            .add_source(ConfigFile::from(path).format(FileFormat::Json).required(true))
            .build()?
            .try_deserialize::<RoomSettings>()?;
        settings.offline_grid.validate()?;
        debug!("Loaded room settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }
}

/// The configured radio sources, as listed in the MAC filter file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFilter {
    sources: Vec<SourceId>,
}

impl SourceFilter {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sources = Vec::new();
        for identifier in identifiers {
            match SourceId::parse(identifier.as_ref()) {
                SourceId::Aggregate => {
                    warn!("Ignoring reserved source identifier 'all' in source filter");
                }
                source => sources.push(source),
            }
        }
        Self { sources }
    }

    pub fn load(path: &Path) -> Result<SourceFilter> {
        let content = fs::read_to_string(path)?;
        let identifiers: Vec<String> = serde_json::from_str(&content)?;
        let filter = SourceFilter::new(identifiers);
        debug!(
            "Loaded {} sources from {}",
            filter.sources.len(),
            path.display()
        );
        Ok(filter)
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    /// The working source list: every configured source followed by the
    /// aggregate sentinel. The filter itself is left untouched.
    pub fn with_aggregate(&self) -> Vec<SourceId> {
        let mut working = self.sources.clone();
        working.push(SourceId::Aggregate);
        working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file() -> NamedTempFile {
        tempfile::Builder::new().suffix(".json").tempfile().unwrap()
    }

    fn settings() -> GridSettings {
        GridSettings {
            x_min: 0.5,
            x_max: 1.5,
            y_min: 0.5,
            y_max: 2.5,
            z: 1.5,
            resolution: 1.0,
        }
    }

    #[test]
    fn test_validate_accepts_sane_grid() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_resolution_and_bounds() {
        let mut s = settings();
        s.resolution = 0.0;
        assert!(matches!(s.validate(), Err(Error::InvalidGrid(_))));

        let mut s = settings();
        s.x_max = 0.0;
        assert!(matches!(s.validate(), Err(Error::InvalidGrid(_))));

        let mut s = settings();
        s.y_min = f64::NAN;
        assert!(matches!(s.validate(), Err(Error::InvalidGrid(_))));
    }

    #[test]
    fn test_with_aggregate_does_not_mutate_filter() {
        let filter = SourceFilter::new(["aa:bb", "cc-dd"]);
        let working = filter.with_aggregate();
        assert_eq!(working.len(), 3);
        assert_eq!(working.last(), Some(&SourceId::Aggregate));
        assert_eq!(filter.sources().len(), 2);
        // Calling twice must not accumulate sentinels.
        assert_eq!(filter.with_aggregate().len(), 3);
    }

    #[test]
    fn test_filter_drops_configured_sentinel() {
        let filter = SourceFilter::new(["all", "aa:bb"]);
        assert_eq!(filter.sources(), &[SourceId::parse("aa:bb")]);
    }

    #[test]
    fn test_load_room_settings_from_json() {
        let mut file = json_file();
        write!(
            file,
            r#"{{"size": [2.02, 28.7],
                "offline_grid": {{"x_min": 0.5, "x_max": 1.5, "y_min": 0.5,
                                  "y_max": 28.5, "z": 1.5, "resolution": 1}}}}"#
        )
        .unwrap();
        let room = RoomSettings::load(file.path()).unwrap();
        assert_eq!(room.offline_grid.y_max, 28.5);
        assert_eq!(room.offline_grid.resolution, 1.0);
        assert_eq!(room.size, Some(vec![2.02, 28.7]));
    }

    #[test]
    fn test_load_room_settings_rejects_missing_field() {
        let mut file = json_file();
        write!(
            file,
            r#"{{"offline_grid": {{"x_min": 0.5, "x_max": 1.5, "y_min": 0.5, "z": 1.5, "resolution": 1}}}}"#
        )
        .unwrap();
        assert!(matches!(
            RoomSettings::load(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_source_filter() {
        let mut file = json_file();
        write!(file, r#"["aa:bb:cc:dd:ee:ff", "11-22-33-44-55-66"]"#).unwrap();
        let filter = SourceFilter::load(file.path()).unwrap();
        assert_eq!(filter.sources().len(), 2);
    }
}
