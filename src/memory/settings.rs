//! Heap sizing and collection policy

use thiserror::Error;
use toml::Value;

/// Default cells per young semispace
pub const DEFAULT_YOUNG_CAPACITY: usize = 10 * 1024;
/// Default cells in the old generation
pub const DEFAULT_OLD_CAPACITY: usize = 4 * 10 * 1024;
/// Default old generation occupancy that triggers compaction
pub const DEFAULT_OLD_HIGH_WATER: usize = 4 * 9 * 1024;
/// Default number of young collections a cell survives before promotion
pub const DEFAULT_PROMOTION_THRESHOLD: u8 = 2;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid heap settings TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("heap settings must be a TOML table")]
    NotATable,
    #[error("setting '{key}' must be a non-negative integer")]
    BadValue { key: String },
    #[error("unknown heap setting '{key}'")]
    UnknownKey { key: String },
    #[error("inconsistent heap settings: {0}")]
    Invalid(String),
}

/// Generation sizes and promotion policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSettings {
    /// Capacity of each of the two young buffers, in cells
    pub young_capacity: usize,
    /// Capacity of the old buffer, in cells
    pub old_capacity: usize,
    /// Old generation is compacted when it holds more cells than this
    pub old_high_water: usize,
    /// Survivals needed before a young cell is promoted (1..=3)
    pub promotion_threshold: u8,
}

impl Default for HeapSettings {
    fn default() -> Self {
        HeapSettings {
            young_capacity: DEFAULT_YOUNG_CAPACITY,
            old_capacity: DEFAULT_OLD_CAPACITY,
            old_high_water: DEFAULT_OLD_HIGH_WATER,
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

impl HeapSettings {
    pub fn with_young_capacity(mut self, cells: usize) -> Self {
        self.young_capacity = cells;
        self
    }

    /// Set the old capacity, keeping the high-water mark at the same
    /// 90% proportion as the defaults
    pub fn with_old_capacity(mut self, cells: usize) -> Self {
        self.old_capacity = cells;
        self.old_high_water = cells / 10 * 9;
        self
    }

    pub fn with_old_high_water(mut self, cells: usize) -> Self {
        self.old_high_water = cells;
        self
    }

    pub fn with_promotion_threshold(mut self, survivals: u8) -> Self {
        self.promotion_threshold = survivals;
        self
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.young_capacity == 0 {
            return Err(SettingsError::Invalid(
                "young capacity must be at least one cell".to_string(),
            ));
        }
        if self.young_capacity > u32::MAX as usize || self.old_capacity > u32::MAX as usize {
            return Err(SettingsError::Invalid(
                "capacities must fit in 32 bits".to_string(),
            ));
        }
        if self.old_high_water > self.old_capacity {
            return Err(SettingsError::Invalid(format!(
                "old high-water mark {} exceeds old capacity {}",
                self.old_high_water, self.old_capacity
            )));
        }
        if !(1..=3).contains(&self.promotion_threshold) {
            return Err(SettingsError::Invalid(format!(
                "promotion threshold {} is outside 1..=3",
                self.promotion_threshold
            )));
        }
        Ok(())
    }

    /// Parse settings from TOML text, starting from the defaults
    ///
    /// ```toml
    /// young_capacity = 4096
    /// old_capacity = 16384
    /// old_high_water = 15000
    /// promotion_threshold = 3
    /// ```
    ///
    /// `old_capacity` without `old_high_water` keeps the 90% proportion.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Self::from_toml_with_high_water(text).map(|(settings, _)| settings)
    }

    /// As [`HeapSettings::from_toml`], also returning the high-water
    /// mark if the text gave one explicitly, so that later capacity
    /// overrides can keep it
    pub fn from_toml_with_high_water(
        text: &str,
    ) -> Result<(Self, Option<usize>), SettingsError> {
        let value = text.parse::<Value>()?;
        let table = value.as_table().ok_or(SettingsError::NotATable)?;

        let mut settings = HeapSettings::default();
        let mut high_water = None;

        for (key, value) in table {
            match key.as_str() {
                "young_capacity" => settings.young_capacity = cells(key, value)?,
                "old_capacity" => settings = settings.with_old_capacity(cells(key, value)?),
                "old_high_water" => high_water = Some(cells(key, value)?),
                "promotion_threshold" => {
                    settings.promotion_threshold = u8::try_from(cells(key, value)?)
                        .map_err(|_| SettingsError::BadValue { key: key.clone() })?
                }
                _ => return Err(SettingsError::UnknownKey { key: key.clone() }),
            }
        }

        if let Some(cells) = high_water {
            settings.old_high_water = cells;
        }

        settings.validate()?;
        Ok((settings, high_water))
    }
}

fn cells(key: &str, value: &Value) -> Result<usize, SettingsError> {
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| SettingsError::BadValue {
            key: key.to_string(),
        })
}
