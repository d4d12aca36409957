//! Flag map construction
//!
//! Merges four layers, lowest precedence first:
//! 1. platform.txt keys (flat)
//! 2. boards.txt keys under the selected scopes, prefix stripped
//! 3. engine defaults
//! 4. caller overrides (override file, then inline values)
//!
//! A later layer always replaces an earlier layer's value for the same key.

use crate::config_file::{ConfigFile, ConfigIssue, Requirement, read_config_file};
use crate::defaults::EngineDefaults;
use crate::error::{Diagnostic, EngineError, EngineResult};
use crate::scope::{ScopePrefix, ScopedKeyMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key holding the board variant directory name.
pub const VARIANT_KEY: &str = "build.variant";

/// Which layer a flag map value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Platform,
    Board,
    Default,
    Override,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Platform => "platform",
            Layer::Board => "board",
            Layer::Default => "default",
            Layer::Override => "override",
        }
    }
}

/// A value plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagValue {
    pub value: String,
    pub layer: Layer,
}

/// Merged key → value table with bare (unscoped) keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagMap {
    entries: BTreeMap<String, FlagValue>,
}

impl FlagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding a single layer.
    pub fn from_layer<I, K, V>(layer: Layer, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        map.merge_layer(layer, entries);
        map
    }

    /// Merge a layer on top of the map. Returns how many existing keys were
    /// replaced.
    pub fn merge_layer<I, K, V>(&mut self, layer: Layer, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut replaced = 0;
        for (key, value) in entries {
            let previous = self.entries.insert(
                key.into(),
                FlagValue {
                    value: value.into(),
                    layer,
                },
            );
            if previous.is_some() {
                replaced += 1;
            }
        }
        replaced
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.value.as_str())
    }

    pub fn layer_of(&self, key: &str) -> Option<Layer> {
        self.entries.get(key).map(|v| v.layer)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.value.as_str()))
    }

    /// Entries with provenance, in key order.
    pub fn iter_with_layer(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Board variant directory (`build.variant`), unresolved.
    pub fn variant(&self) -> Option<&str> {
        self.get(VARIANT_KEY)
    }
}

/// Whether a target needs a project override file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverridePolicy {
    #[default]
    Optional,
    Required,
}

/// Caller overrides: an optional `key=value` file plus in-memory values.
/// In-memory values win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSource {
    pub file: Option<PathBuf>,
    pub values: BTreeMap<String, String>,
}

impl OverrideSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// A built flag map and the non-fatal conditions met while building it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagMapBuild {
    pub map: FlagMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a [`FlagMap`] from platform, board and override sources.
#[derive(Debug, Clone, Default)]
pub struct FlagMapBuilder {
    defaults: EngineDefaults,
    override_policy: OverridePolicy,
}

impl FlagMapBuilder {
    pub fn new(defaults: EngineDefaults) -> Self {
        Self {
            defaults,
            override_policy: OverridePolicy::Optional,
        }
    }

    pub fn override_policy(mut self, policy: OverridePolicy) -> Self {
        self.override_policy = policy;
        self
    }

    /// Read the files and merge all four layers.
    ///
    /// A missing or unreadable platform or board file is fatal; override
    /// problems end up in [`FlagMapBuild::diagnostics`].
    pub fn build(
        &self,
        platform_path: &Path,
        board_path: &Path,
        scopes: &ScopePrefix,
        overrides: &OverrideSource,
    ) -> EngineResult<FlagMapBuild> {
        let platform = load_mandatory(platform_path)?;
        let board = load_mandatory(board_path)?;
        Ok(self.build_from(&platform, &board, scopes, overrides))
    }

    /// Merge already loaded platform and board files.
    pub fn build_from(
        &self,
        platform: &ConfigFile,
        board: &ConfigFile,
        scopes: &ScopePrefix,
        overrides: &OverrideSource,
    ) -> FlagMapBuild {
        let mut map = FlagMap::new();
        let mut diagnostics = Vec::new();

        map.merge_layer(Layer::Platform, platform.to_map());
        debug!("Layer platform: {} keys", map.len());

        let scoped = ScopedKeyMatcher::new(scopes).filter_and_strip(board.entries());
        let replaced = map.merge_layer(Layer::Board, scoped);
        debug!("Layer board: replaced {} platform keys", replaced);

        let replaced = map.merge_layer(Layer::Default, self.defaults.entries());
        debug!("Layer defaults: replaced {} keys", replaced);

        let override_values = self.load_overrides(overrides, &mut diagnostics);
        let replaced = map.merge_layer(Layer::Override, override_values);
        debug!("Layer overrides: replaced {} keys", replaced);

        FlagMapBuild { map, diagnostics }
    }

    fn load_overrides(
        &self,
        overrides: &OverrideSource,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeMap<String, String> {
        let required = self.override_policy == OverridePolicy::Required;
        let requirement = if required {
            Requirement::Mandatory
        } else {
            Requirement::Optional
        };

        let mut values = BTreeMap::new();
        match &overrides.file {
            Some(path) => {
                let read = read_config_file(path, requirement);
                match read.issue {
                    Some(ConfigIssue::MissingFile { path }) => {
                        diagnostics.push(Diagnostic::MissingOverrideFile { path: Some(path) });
                    }
                    Some(ConfigIssue::Unreadable { path, reason }) => {
                        diagnostics.push(Diagnostic::UnreadableOverrideFile { path, reason });
                    }
                    None => {}
                }
                values.extend(read.file.to_map());
            }
            None if required => {
                debug!("Target requires an override file but none was given");
                diagnostics.push(Diagnostic::MissingOverrideFile { path: None });
            }
            None => {}
        }

        values.extend(
            overrides
                .values
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        values
    }
}

/// Read a platform or board file, turning any problem into a fatal error.
pub(crate) fn load_mandatory(path: &Path) -> EngineResult<ConfigFile> {
    let read = read_config_file(path, Requirement::Mandatory);
    match read.issue {
        None => Ok(read.file),
        Some(ConfigIssue::MissingFile { path }) => Err(EngineError::MissingConfigFile { path }),
        Some(ConfigIssue::Unreadable { path, reason }) => {
            Err(EngineError::UnreadableConfigFile { path, reason })
        }
    }
}
