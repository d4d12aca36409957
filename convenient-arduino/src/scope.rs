// Scope prefixes for boards.txt keys
// Selects the board/menu-option lines that apply and strips their prefix

use crate::config_file::{ConfigEntry, ConfigFile};
use crate::error::ScopeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Separator every scope string has to end with.
pub const SCOPE_SEPARATOR: char = '.';

/// Residual prefix of menu declarations. Selected options reach the map
/// through their own scope, never through the board scope.
const MENU_PREFIX: &str = "menu.";

/// Ordered scope strings, most specific first.
///
/// e.g. `["avrdd.menu.chip.avr64dd32.", "avrdd."]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScopePrefix(Vec<String>);

impl ScopePrefix {
    /// Validate and wrap a list of scopes.
    pub fn new<I, S>(scopes: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
        for scope in &scopes {
            if scope.is_empty() {
                return Err(ScopeError::Empty);
            }
            if !scope.ends_with(SCOPE_SEPARATOR) {
                return Err(ScopeError::MissingSeparator(scope.clone()));
            }
        }
        Ok(Self(scopes))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for ScopePrefix {
    type Error = ScopeError;

    fn try_from(scopes: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(scopes)
    }
}

impl From<ScopePrefix> for Vec<String> {
    fn from(scopes: ScopePrefix) -> Self {
        scopes.0
    }
}

/// Filters board entries by scope and strips the matched prefix.
pub struct ScopedKeyMatcher<'a> {
    scopes: &'a ScopePrefix,
}

impl<'a> ScopedKeyMatcher<'a> {
    pub fn new(scopes: &'a ScopePrefix) -> Self {
        Self { scopes }
    }

    /// Keep entries under one of the scopes, keyed by the residual key.
    /// Menu option lines only apply through the scope of the selected
    /// option; the board scope does not carry them.
    ///
    /// A more specific scope (earlier in the list) owns a residual key no
    /// matter where its line sits in the file. Within one scope the later
    /// line wins.
    pub fn filter_and_strip<'e, I>(&self, entries: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = &'e ConfigEntry>,
    {
        let mut ranked: BTreeMap<String, (usize, String)> = BTreeMap::new();

        for entry in entries {
            for (rank, scope) in self.scopes.iter().enumerate() {
                let Some(residual) = entry.key.strip_prefix(scope) else {
                    continue;
                };
                if residual.is_empty() || residual.starts_with(MENU_PREFIX) {
                    continue;
                }

                match ranked.get(residual) {
                    Some((owner, _)) if *owner < rank => {}
                    _ => {
                        ranked.insert(residual.to_string(), (rank, entry.value.clone()));
                    }
                }
            }
        }

        debug!(
            "Matched {} board keys across {} scopes",
            ranked.len(),
            self.scopes.len()
        );

        ranked
            .into_iter()
            .map(|(key, (_, value))| (key, value))
            .collect()
    }
}

/// A board id plus the chosen option for some of its menus.
///
/// Menus without a choice fall back to the first option the board file
/// declares for them, the same way the Arduino IDE preselects options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSelection {
    pub board: String,
    #[serde(default)]
    pub choices: BTreeMap<String, String>,
}

impl MenuSelection {
    pub fn new(board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            choices: BTreeMap::new(),
        }
    }

    pub fn with_choice(mut self, menu: impl Into<String>, option: impl Into<String>) -> Self {
        self.choices.insert(menu.into(), option.into());
        self
    }

    /// Menus the board declares, with their options in declaration order.
    pub fn declared_menus(&self, board_file: &ConfigFile) -> Vec<(String, Vec<String>)> {
        let menu_root = format!("{}.menu.", self.board);
        let mut menus: Vec<(String, Vec<String>)> = Vec::new();

        for entry in board_file.entries() {
            let Some(rest) = entry.key.strip_prefix(&menu_root) else {
                continue;
            };
            let mut parts = rest.splitn(3, SCOPE_SEPARATOR);
            let (Some(menu), Some(option)) = (parts.next(), parts.next()) else {
                continue;
            };
            if menu.is_empty() || option.is_empty() {
                continue;
            }

            match menus.iter_mut().find(|(name, _)| name == menu) {
                Some((_, options)) => {
                    if !options.iter().any(|o| o == option) {
                        options.push(option.to_string());
                    }
                }
                None => menus.push((menu.to_string(), vec![option.to_string()])),
            }
        }

        menus
    }

    /// Expand the selection into scopes, menu options first, board last.
    pub fn scopes(&self, board_file: &ConfigFile) -> Result<ScopePrefix, ScopeError> {
        let board_scope = format!("{}{}", self.board, SCOPE_SEPARATOR);
        if !board_file
            .entries()
            .iter()
            .any(|entry| entry.key.starts_with(&board_scope))
        {
            return Err(ScopeError::UnknownBoard(self.board.clone()));
        }

        let menus = self.declared_menus(board_file);

        for (menu, option) in &self.choices {
            let known = menus
                .iter()
                .any(|(name, options)| name == menu && options.contains(option));
            if !known {
                return Err(ScopeError::UnknownMenuOption {
                    board: self.board.clone(),
                    menu: menu.clone(),
                    option: option.clone(),
                });
            }
        }

        let mut scopes = Vec::with_capacity(menus.len() + 1);
        for (menu, options) in &menus {
            let option = self
                .choices
                .get(menu)
                .or_else(|| options.first())
                .ok_or(ScopeError::Empty)?;
            scopes.push(format!("{}.menu.{}.{}.", self.board, menu, option));
        }
        scopes.push(board_scope);

        debug!("Scopes for {}: {:?}", self.board, scopes);
        ScopePrefix::new(scopes)
    }
}
