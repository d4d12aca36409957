//! Engine defaults (flag map layer 3)
//!
//! Keys some recipes reference that neither platform.txt nor boards.txt
//! define outside the Arduino IDE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ARCH_KEY: &str = "build.arch";
pub const IDE_VERSION_KEY: &str = "runtime.ide.version";
pub const INCLUDES_KEY: &str = "includes";

/// IDE version the Arduino 1.6.7 tooling reports.
pub const DEFAULT_IDE_VERSION: &str = "10607";

/// Named default values injected into the flag map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDefaults {
    /// Architecture identifier (`build.arch`), e.g. "AVR"
    pub arch: String,

    /// IDE/runtime version marker (`runtime.ide.version`)
    #[serde(default = "default_ide_version")]
    pub ide_version: String,

    /// Value for the `{includes}` placeholder; the generator adds its own
    #[serde(default)]
    pub includes: String,

    /// Further keys a target needs
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_ide_version() -> String {
    DEFAULT_IDE_VERSION.to_string()
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self::avr()
    }
}

impl EngineDefaults {
    /// Classic AVR boards (Uno, Nano, Pro Mini, Mega).
    pub fn avr() -> Self {
        Self {
            arch: "AVR".to_string(),
            ide_version: default_ide_version(),
            includes: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// DxCore AVR DD parts. The build.* values normally come from the IDE
    /// menus that DxCore hides when a single chip is selected.
    pub fn dxcore() -> Self {
        Self {
            arch: "MEGAAVR".to_string(),
            ide_version: default_ide_version(),
            includes: String::new(),
            extra: BTreeMap::new(),
        }
        .with_value("build.clocksource", "0")
        .with_value("build.wiremode", "MORS_SINGLE")
        .with_value("build.millistimer", "B2")
        .with_value("build.attachmode", "-DCORE_ATTACH_ALL")
        .with_value("build.flmapopts", "-DLOCK_FLMAP -DFLMAPSECTION1")
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "avr" => Some(Self::avr()),
            "dxcore" | "megaavr" => Some(Self::dxcore()),
            _ => None,
        }
    }

    /// Set a value by flag map key. Named keys go to their field.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == ARCH_KEY {
            self.arch = value;
        } else if key == IDE_VERSION_KEY {
            self.ide_version = value;
        } else if key == INCLUDES_KEY {
            self.includes = value;
        } else {
            self.extra.insert(key, value);
        }
        self
    }

    /// All key/value pairs of the layer. Named fields win over `extra`.
    pub fn entries(&self) -> BTreeMap<String, String> {
        let mut entries = self.extra.clone();
        entries.insert(ARCH_KEY.to_string(), self.arch.clone());
        entries.insert(IDE_VERSION_KEY.to_string(), self.ide_version.clone());
        entries.insert(INCLUDES_KEY.to_string(), self.includes.clone());
        entries
    }
}
