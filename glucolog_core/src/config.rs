//! Configuration file support for Glucolog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/glucolog/config.toml`.
//!
//! Unlike purely cosmetic settings, the safety thresholds and decay profiles
//! are required inputs to the engine: a missing or invalid config file is an
//! error, never a silent fallback. `glucolog init` writes the defaults out
//! explicitly so a deployment always has an inspectable threshold file.

use crate::types::{DecayProfile, InsulinClass};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cached default decay-profile table - built once and reused
static DEFAULT_PROFILES: Lazy<DecayProfiles> = Lazy::new(|| DecayProfiles {
    rapid: DecayProfile {
        duration_of_action_minutes: 240,
        peak_minutes: 90,
    },
    short: DecayProfile {
        duration_of_action_minutes: 360,
        peak_minutes: 180,
    },
    intermediate: DecayProfile {
        duration_of_action_minutes: 960,
        peak_minutes: 360,
    },
    long: DecayProfile {
        duration_of_action_minutes: 1440,
        peak_minutes: 600,
    },
    ultra_long: DecayProfile {
        duration_of_action_minutes: 2520,
        peak_minutes: 1080,
    },
    premixed: DecayProfile {
        duration_of_action_minutes: 1080,
        peak_minutes: 240,
    },
});

/// Get a reference to the cached default decay-profile table
pub fn default_profiles() -> &'static DecayProfiles {
    &DEFAULT_PROFILES
}

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub profiles: DecayProfiles,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Dosing safety thresholds.
///
/// All of these are tunable per deployment. The severe-hypoglycemia block and
/// the implausible-dose ceiling are deliberately NOT here; see the gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Absolute single-dose ceiling, in units; exceeding it is a hard block
    #[serde(default = "default_max_bolus_units")]
    pub max_bolus_units: f64,

    /// Maximum safe insulin on board, in units
    #[serde(default = "default_max_safe_iob")]
    pub max_safe_iob: f64,

    /// Multiplier on `max_safe_iob` past which stacking becomes a hard block
    #[serde(default = "default_iob_hard_limit_factor")]
    pub iob_hard_limit_factor: f64,

    /// A dose this many times the recent mean triggers an unusual-dose warning
    #[serde(default = "default_unusual_dose_factor")]
    pub unusual_dose_factor: f64,

    /// Minimum spacing between insulin doses, in minutes
    #[serde(default = "default_minimum_interval_minutes")]
    pub minimum_interval_minutes: u32,

    /// Carbohydrate absorption window, in minutes
    #[serde(default = "default_carb_absorption_minutes")]
    pub carb_absorption_minutes: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_bolus_units: default_max_bolus_units(),
            max_safe_iob: default_max_safe_iob(),
            iob_hard_limit_factor: default_iob_hard_limit_factor(),
            unusual_dose_factor: default_unusual_dose_factor(),
            minimum_interval_minutes: default_minimum_interval_minutes(),
            carb_absorption_minutes: default_carb_absorption_minutes(),
        }
    }
}

/// Decay profiles per insulin class.
///
/// One field per class keeps the table structurally complete: there is no way
/// to configure the system with a class missing, and the calculator never
/// falls back to a shared catch-all curve.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecayProfiles {
    #[serde(default = "default_rapid_profile")]
    pub rapid: DecayProfile,
    #[serde(default = "default_short_profile")]
    pub short: DecayProfile,
    #[serde(default = "default_intermediate_profile")]
    pub intermediate: DecayProfile,
    #[serde(default = "default_long_profile")]
    pub long: DecayProfile,
    #[serde(default = "default_ultra_long_profile")]
    pub ultra_long: DecayProfile,
    #[serde(default = "default_premixed_profile")]
    pub premixed: DecayProfile,
}

impl Default for DecayProfiles {
    fn default() -> Self {
        default_profiles().clone()
    }
}

impl DecayProfiles {
    /// Look up the profile for an insulin class
    pub fn for_class(&self, class: InsulinClass) -> &DecayProfile {
        match class {
            InsulinClass::Rapid => &self.rapid,
            InsulinClass::Short => &self.short,
            InsulinClass::Intermediate => &self.intermediate,
            InsulinClass::Long => &self.long,
            InsulinClass::UltraLong => &self.ultra_long,
            InsulinClass::Premixed => &self.premixed,
        }
    }

    /// Validate curve parameters; returns a list of problems, empty when ok
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for class in InsulinClass::all() {
            let profile = self.for_class(class);
            if profile.duration_of_action_minutes == 0 {
                errors.push(format!("{:?}: duration of action must be positive", class));
            }
            if profile.peak_minutes == 0 || profile.peak_minutes >= profile.duration_of_action_minutes
            {
                errors.push(format!(
                    "{:?}: peak ({} min) must lie strictly inside the action window ({} min)",
                    class, profile.peak_minutes, profile.duration_of_action_minutes
                ));
            }
        }

        // Distinct classes must use distinct curves; a single shared profile
        // would collapse long-acting doses onto the rapid curve
        let classes = InsulinClass::all();
        for (i, a) in classes.iter().enumerate() {
            for b in classes.iter().skip(i + 1) {
                if self.for_class(*a) == self.for_class(*b) {
                    errors.push(format!("{:?} and {:?} share an identical decay profile", a, b));
                }
            }
        }

        errors
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("glucolog")
}

fn default_max_bolus_units() -> f64 {
    15.0
}

fn default_max_safe_iob() -> f64 {
    3.0
}

fn default_iob_hard_limit_factor() -> f64 {
    2.0
}

fn default_unusual_dose_factor() -> f64 {
    2.0
}

fn default_minimum_interval_minutes() -> u32 {
    120
}

fn default_carb_absorption_minutes() -> u32 {
    180
}

fn default_rapid_profile() -> DecayProfile {
    default_profiles().rapid
}

fn default_short_profile() -> DecayProfile {
    default_profiles().short
}

fn default_intermediate_profile() -> DecayProfile {
    default_profiles().intermediate
}

fn default_long_profile() -> DecayProfile {
    default_profiles().long
}

fn default_ultra_long_profile() -> DecayProfile {
    default_profiles().ultra_long
}

fn default_premixed_profile() -> DecayProfile {
    default_profiles().premixed
}

impl SafetyConfig {
    /// Validate thresholds; returns a list of problems, empty when ok
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.max_bolus_units.is_finite() || self.max_bolus_units <= 0.0 {
            errors.push("max_bolus_units must be a positive number".to_string());
        }
        if !self.max_safe_iob.is_finite() || self.max_safe_iob <= 0.0 {
            errors.push("max_safe_iob must be a positive number".to_string());
        }
        if !self.iob_hard_limit_factor.is_finite() || self.iob_hard_limit_factor < 1.0 {
            errors.push("iob_hard_limit_factor must be at least 1.0".to_string());
        }
        if !self.unusual_dose_factor.is_finite() || self.unusual_dose_factor < 1.0 {
            errors.push("unusual_dose_factor must be at least 1.0".to_string());
        }
        if self.carb_absorption_minutes == 0 {
            errors.push("carb_absorption_minutes must be positive".to_string());
        }

        errors
    }
}

impl Config {
    /// Load configuration from the standard config path.
    ///
    /// A missing file is an error: safety thresholds must never be silently
    /// assumed. Run `glucolog init` to write the defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "no config file at {:?}; run `glucolog init` to create one",
                path
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.ensure_valid()?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Run all section validators, collapsing problems into a single error
    pub fn ensure_valid(&self) -> Result<()> {
        let mut errors = self.safety.validate();
        errors.extend(self.profiles.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("glucolog").join("config.toml")
    }

    /// Save the current configuration to a specific path.
    ///
    /// Writes through a temp file in the target directory and renames so a
    /// concurrent reader never sees a half-written threshold file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "config path missing parent")
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(contents.as_bytes())?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| Error::Config(format!("Failed to persist config: {}", e)))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
