//! Target profiles
//!
//! A profile names everything that distinguishes one target from another:
//! the board id and menu choices (or an explicit scope list), the engine
//! defaults, whether a project override file is required and which recipes
//! may be absent. Profiles are built in or loaded from YAML:
//!
//! ```yaml
//! name: dxcore
//! board: avrdd
//! menu:
//!   chip: avr64dd32
//! preset: dxcore
//! defaults:
//!   build.millistimer: B1
//! override_policy: required
//! optional_recipes: [link]
//! ```

use crate::config_file::ConfigFile;
use crate::defaults::EngineDefaults;
use crate::error::{EngineResult, ProfileError};
use crate::flag_map::OverridePolicy;
use crate::postprocess::TargetSyntax;
use crate::recipe::RecipeKind;
use crate::scope::{MenuSelection, ScopePrefix};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Names accepted by [`TargetProfile::builtin`].
pub const BUILTIN_PROFILES: [&str; 2] = ["nano", "dxcore"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProfile {
    pub name: String,
    pub board: String,
    pub menu: BTreeMap<String, String>,
    /// Explicit scopes, used instead of menu discovery when set
    pub scopes: Option<ScopePrefix>,
    pub defaults: EngineDefaults,
    pub override_policy: OverridePolicy,
    pub optional_recipes: Vec<RecipeKind>,
    pub target_syntax: TargetSyntax,
}

/// On-disk form of a profile.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileDocument {
    name: String,
    #[serde(default)]
    board: String,
    #[serde(default)]
    menu: BTreeMap<String, String>,
    #[serde(default)]
    scopes: Option<ScopePrefix>,
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    override_policy: OverridePolicy,
    #[serde(default = "default_optional_recipes")]
    optional_recipes: Vec<RecipeKind>,
    #[serde(default)]
    target_syntax: TargetSyntax,
}

fn default_optional_recipes() -> Vec<RecipeKind> {
    vec![RecipeKind::Link]
}

impl TargetProfile {
    /// Arduino Nano with the ATmega328P menu option.
    pub fn nano() -> Self {
        Self {
            name: "nano".to_string(),
            board: "nano".to_string(),
            menu: BTreeMap::from([("cpu".to_string(), "atmega328".to_string())]),
            scopes: None,
            defaults: EngineDefaults::avr(),
            override_policy: OverridePolicy::Optional,
            optional_recipes: default_optional_recipes(),
            target_syntax: TargetSyntax::CMake,
        }
    }

    /// DxCore AVR64DD32. DxCore leaves several build.* keys to IDE menus, so
    /// the project is expected to provide an override file.
    pub fn dxcore() -> Self {
        Self {
            name: "dxcore".to_string(),
            board: "avrdd".to_string(),
            menu: BTreeMap::from([("chip".to_string(), "avr64dd32".to_string())]),
            scopes: None,
            defaults: EngineDefaults::dxcore(),
            override_policy: OverridePolicy::Required,
            optional_recipes: default_optional_recipes(),
            target_syntax: TargetSyntax::CMake,
        }
    }

    pub fn builtin(name: &str) -> Result<Self, ProfileError> {
        match name {
            "nano" => Ok(Self::nano()),
            "dxcore" => Ok(Self::dxcore()),
            _ => Err(ProfileError::UnknownProfile(name.to_string())),
        }
    }

    /// Load a YAML profile from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ProfileError::Io(path.to_path_buf(), e.to_string()))?;
        let profile = Self::parse(&content, &path.display().to_string())?;
        debug!("Loaded profile '{}' from {}", profile.name, path.display());
        Ok(profile)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        Self::parse(yaml, "<inline>")
    }

    fn parse(yaml: &str, origin: &str) -> Result<Self, ProfileError> {
        let doc: ProfileDocument = serde_yaml::from_str(yaml)
            .map_err(|e| ProfileError::Parse(origin.to_string(), e.to_string()))?;

        if doc.board.is_empty() && doc.scopes.is_none() {
            return Err(ProfileError::Parse(
                origin.to_string(),
                "profile needs a board or an explicit scope list".to_string(),
            ));
        }

        let base = match &doc.preset {
            Some(preset) => EngineDefaults::preset(preset).ok_or_else(|| {
                ProfileError::Parse(origin.to_string(), format!("unknown defaults preset '{}'", preset))
            })?,
            None => EngineDefaults::avr(),
        };
        let defaults = doc
            .defaults
            .into_iter()
            .fold(base, |defaults, (key, value)| defaults.with_value(key, value));

        Ok(Self {
            name: doc.name,
            board: doc.board,
            menu: doc.menu,
            scopes: doc.scopes,
            defaults,
            override_policy: doc.override_policy,
            optional_recipes: doc.optional_recipes,
            target_syntax: doc.target_syntax,
        })
    }

    pub fn selection(&self) -> MenuSelection {
        MenuSelection {
            board: self.board.clone(),
            choices: self.menu.clone(),
        }
    }

    /// Explicit scopes if the profile has them, otherwise the scopes the
    /// board file declares for the menu selection.
    pub fn resolve_scopes(&self, board_file: &ConfigFile) -> EngineResult<ScopePrefix> {
        match &self.scopes {
            Some(scopes) => Ok(scopes.clone()),
            None => Ok(self.selection().scopes(board_file)?),
        }
    }

    pub fn is_optional(&self, kind: RecipeKind) -> bool {
        self.optional_recipes.contains(&kind)
    }
}
