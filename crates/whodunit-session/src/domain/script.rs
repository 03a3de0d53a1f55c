//! Scripts: the character rosters a session is started from.
//!
//! Scripts are authored elsewhere; the engine only needs to look one up by
//! id when a session starts.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use whodunit_core::error::DomainError;

/// A playable character as described by a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Stable character identifier.
    pub character_id: String,
    /// Display name.
    pub name: String,
    /// Short public description.
    #[serde(default)]
    pub description: String,
    /// Avatar asset path, if any.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A mystery script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Stable script identifier.
    pub script_id: String,
    /// Display title.
    pub title: String,
    /// Number of acts; the engine default applies when absent.
    #[serde(default)]
    pub max_acts: Option<u32>,
    /// Characters players can occupy.
    pub characters: Vec<CharacterProfile>,
}

impl Script {
    /// Checks that the script can be played.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the roster is empty, a
    /// character id is blank or repeated, or `max_acts` is zero.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.characters.is_empty() {
            return Err(DomainError::InvalidInput(format!(
                "script {} has no characters",
                self.script_id
            )));
        }
        if self.max_acts == Some(0) {
            return Err(DomainError::InvalidInput(format!(
                "script {} must have at least one act",
                self.script_id
            )));
        }
        let mut seen = BTreeSet::new();
        for character in &self.characters {
            if character.character_id.trim().is_empty() {
                return Err(DomainError::InvalidInput(format!(
                    "script {} has a character without an id",
                    self.script_id
                )));
            }
            if !seen.insert(character.character_id.as_str()) {
                return Err(DomainError::InvalidInput(format!(
                    "script {} lists character {} twice",
                    self.script_id, character.character_id
                )));
            }
        }
        Ok(())
    }
}

/// Lookup of scripts by id.
#[async_trait]
pub trait ScriptCatalog: Send + Sync {
    /// Returns the script, or `None` if the catalog does not know it.
    async fn find_script(&self, script_id: &str) -> Result<Option<Script>, DomainError>;
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    scripts: Vec<Script>,
}

/// Catalog held in memory, typically loaded from a YAML file at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScriptCatalog {
    scripts: HashMap<String, Script>,
}

impl InMemoryScriptCatalog {
    /// Creates a catalog from a list of scripts. Later duplicates replace
    /// earlier ones.
    #[must_use]
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|script| (script.script_id.clone(), script))
                .collect(),
        }
    }

    /// Parses a catalog from YAML of the form `scripts: [...]`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the document does not match the format.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let file: ScriptFile = serde_yaml::from_str(yaml)?;
        Ok(Self::new(file.scripts))
    }

    /// Number of scripts in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Returns `true` if the catalog holds no scripts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[async_trait]
impl ScriptCatalog for InMemoryScriptCatalog {
    async fn find_script(&self, script_id: &str) -> Result<Option<Script>, DomainError> {
        Ok(self.scripts.get(script_id).cloned())
    }
}
