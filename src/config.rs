use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::hw::FoundVehicle;
use crate::track::{Piece, PieceKind, Track, TrackError};
use crate::vehicle::VehicleSetup;

const SETTINGS_FILE_NAME: &str = "settings.json";

/// Persisted settings: the vehicle registry and the track layout.
///
/// ```
/// let settings: overdrive::Settings = serde_json::from_str(
///     r#"{ "track": { "pieces": [ { "kind": "straight", "id": 10 } ] } }"#,
/// )?;
/// assert_eq!(3, settings.track()?.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub setup: SetupSettings,
    pub track: TrackSettings,
}

/// The race setup and the vehicles registered with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupSettings {
    pub ean: String,
    pub vehicles: Vec<VehicleSettings>,
}

/// One registered vehicle, matched by peripheral id or address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSettings {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Initial lane offset in mm.
    #[serde(default)]
    pub offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    pub pieces: Vec<PieceSettings>,
}

/// A layout entry such as `{ "kind": "curve", "id": 17 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceSettings {
    pub kind: String,
    pub id: u8,
}

impl Settings {
    /// Loads settings from `path`, or from the platform config directory when
    /// no path is given.
    ///
    /// A missing file yields default settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(default_settings_path) {
            Some(path) => Self::load_from_path(&path),
            None => {
                debug!("no settings directory on this platform; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    #[instrument(level = "debug")]
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("settings file not found; using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Registered settings for `device`, if any.
    #[must_use]
    pub fn vehicle(&self, device: &FoundVehicle) -> Option<&VehicleSettings> {
        self.setup.vehicles.iter().find(|vehicle| {
            vehicle.id.eq_ignore_ascii_case(device.device_id())
                || vehicle.id.eq_ignore_ascii_case(device.address())
        })
    }

    /// Session setup for `device`; unregistered vehicles get a zero offset.
    #[must_use]
    pub fn vehicle_setup(&self, device: &FoundVehicle) -> VehicleSetup {
        let registered = self.vehicle(device);
        VehicleSetup::builder()
            .setup_id(self.setup.ean.clone())
            .maybe_name(registered.and_then(|vehicle| vehicle.name.clone()))
            .initial_offset(registered.map_or(0.0, |vehicle| vehicle.offset))
            .build()
    }

    /// Builds the configured track.
    ///
    /// # Errors
    ///
    /// Returns an error when a piece kind is unknown or the layout is empty.
    pub fn track(&self) -> Result<Track, ConfigError> {
        let pieces = self
            .track
            .pieces
            .iter()
            .map(PieceSettings::to_piece)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Track::build(pieces)?)
    }
}

impl PieceSettings {
    fn to_piece(&self) -> Result<Piece, TrackError> {
        let unknown = || TrackError::UnknownPieceKind {
            kind: self.kind.clone(),
        };
        match self.kind.parse::<PieceKind>().map_err(|_error| unknown())? {
            PieceKind::Straight => Ok(Piece::straight(self.id)),
            PieceKind::Curve => Ok(Piece::curve(self.id)),
            PieceKind::Start | PieceKind::Finish => Err(unknown()),
        }
    }
}

/// Default location of the settings file.
#[must_use]
pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("de", "msg", "overdrive")
        .map(|project_dirs| project_dirs.config_dir().join(SETTINGS_FILE_NAME))
}
