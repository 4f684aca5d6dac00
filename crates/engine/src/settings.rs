use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use media_ffmpeg::{EQ_BAND_COUNT, EqGains};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

const LEGACY_EQ_BAND_COUNT: usize = 5;

/// Named equalizer curves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqPreset {
    #[default]
    Flat,
    Rock,
    Jazz,
    Classical,
    /// Gains saved by the user.
    Custom,
}

impl EqPreset {
    pub const ALL: [Self; 5] = [
        Self::Flat,
        Self::Rock,
        Self::Jazz,
        Self::Classical,
        Self::Custom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Rock => "rock",
            Self::Jazz => "jazz",
            Self::Classical => "classical",
            Self::Custom => "custom",
        }
    }

    /// Built-in gains; `None` for [`EqPreset::Custom`].
    pub fn gains(self) -> Option<EqGains> {
        let gains = match self {
            Self::Flat => [0.0; EQ_BAND_COUNT],
            Self::Rock => [0.0, 4.0, 0.0, 2.0, 0.0, -2.0, 0.0, 2.0, 0.0, 3.0],
            Self::Jazz => [0.0, 2.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 3.0],
            Self::Classical => [0.0, 3.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, -1.0],
            Self::Custom => return None,
        };
        Some(EqGains(gains))
    }
}

impl Display for EqPreset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EqPreset {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::InvalidSettings {
                reason: format!("unknown equalizer preset: {value}"),
            })
    }
}

/// Converts stored gains to the 10-band layout.
///
/// Ten values are taken as-is. Five values come from the older
/// 60/230/910/4k/14k layout and land on the odd bands with zeros between.
/// Any other length is unusable.
pub fn migrate_legacy_eq(values: &[f64]) -> Option<EqGains> {
    match values.len() {
        EQ_BAND_COUNT => EqGains::from_slice(values),
        LEGACY_EQ_BAND_COUNT => {
            let mut gains = [0.0; EQ_BAND_COUNT];
            for (index, value) in values.iter().enumerate() {
                gains[index * 2 + 1] = *value;
            }
            Some(EqGains(gains))
        }
        _ => None,
    }
}

/// User preferences persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    pub eq: Vec<f64>,
    pub eq_preset: EqPreset,
    pub custom_eq: Option<Vec<f64>>,
    pub fade_in: f64,
    pub fade_out: f64,
    pub crossfade: f64,
    pub output_format: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            eq: vec![0.0; EQ_BAND_COUNT],
            eq_preset: EqPreset::Flat,
            custom_eq: None,
            fade_in: 0.0,
            fade_out: 0.0,
            crossfade: 0.0,
            output_format: "mp3".to_string(),
        }
    }
}

impl EditorSettings {
    /// Rewrites legacy equalizer arrays in place; returns whether anything changed.
    pub fn migrate(&mut self) -> bool {
        let mut changed = false;
        if self.eq.len() != EQ_BAND_COUNT {
            self.eq = migrate_legacy_eq(&self.eq)
                .unwrap_or(EqGains::FLAT)
                .as_slice()
                .to_vec();
            changed = true;
        }
        let legacy_custom = self
            .custom_eq
            .as_ref()
            .filter(|custom| custom.len() != EQ_BAND_COUNT)
            .map(|custom| migrate_legacy_eq(custom));
        if let Some(migrated) = legacy_custom {
            self.custom_eq = migrated.map(|gains| gains.as_slice().to_vec());
            changed = true;
        }
        changed
    }

    pub fn eq_gains(&self) -> EqGains {
        EqGains::from_slice(&self.eq).unwrap_or(EqGains::FLAT)
    }

    pub fn custom_gains(&self) -> Option<EqGains> {
        self.custom_eq
            .as_deref()
            .and_then(EqGains::from_slice)
    }
}

/// JSON file holding [`EditorSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, returning defaults when the file does not exist.
    ///
    /// Migrated settings are written back.
    pub fn load(&self) -> Result<EditorSettings> {
        if !self.path.exists() {
            return Ok(EditorSettings::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| EngineError::SettingsIo {
            context: "read settings file",
            path: self.path.clone(),
            source,
        })?;
        let mut settings: EditorSettings =
            serde_json::from_str(&text).map_err(|source| EngineError::SettingsSerialization {
                path: self.path.clone(),
                source,
            })?;

        if settings.migrate() {
            info!(path = %self.path.display(), "migrated legacy equalizer settings");
            if let Err(err) = self.save(&settings) {
                warn!(%err, "could not rewrite migrated settings");
            }
        }
        Ok(settings)
    }

    /// Like [`SettingsStore::load`], falling back to defaults on any error.
    pub fn load_or_default(&self) -> EditorSettings {
        self.load().unwrap_or_else(|err| {
            warn!(%err, "ignoring unreadable settings");
            EditorSettings::default()
        })
    }

    pub fn save(&self, settings: &EditorSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings).map_err(|source| {
            EngineError::SettingsSerialization {
                path: self.path.clone(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::SettingsIo {
                context: "create settings directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, json).map_err(|source| EngineError::SettingsIo {
            context: "write settings file",
            path: self.path.clone(),
            source,
        })
    }
}
