//! Driver schemas: which configuration attributes a driver declares.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage type of a configuration attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
    /// Short text.
    #[default]
    Text,
    /// Multi-line text, such as a running configuration.
    LongText,
    /// Number.
    Numeric,
    /// Boolean.
    Binary,
    /// Reference to a stored file.
    BinaryFile,
}

/// Declaration of one configuration attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name, the key in snapshots.
    pub name: String,
    /// Human-readable title, used to key diff output.
    #[serde(default)]
    pub title: String,
    /// Storage type.
    #[serde(default, rename = "type")]
    pub kind: AttributeKind,
    /// Whether the attribute takes part in diffs.
    #[serde(default)]
    pub comparable: bool,
    /// Whether rules may read the attribute.
    #[serde(default)]
    pub checkable: bool,
}

impl AttributeDefinition {
    /// Creates a text attribute that is neither comparable nor checkable.
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            kind,
            comparable: false,
            checkable: false,
        }
    }

    /// Marks the attribute as comparable.
    #[must_use]
    pub fn comparable(mut self) -> Self {
        self.comparable = true;
        self
    }

    /// Marks the attribute as checkable.
    #[must_use]
    pub fn checkable(mut self) -> Self {
        self.checkable = true;
        self
    }

    /// Title, falling back to the name.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }
}

/// The attribute schema of a device driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSchema {
    /// Driver identifier (e.g., "CiscoIOS12").
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Declared attributes, in display order.
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

impl DriverSchema {
    /// Creates a schema without attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    /// Attributes taking part in diffs, in schema order.
    pub fn comparable(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.iter().filter(|a| a.comparable)
    }

    /// Whether rules may read the named attribute.
    #[must_use]
    pub fn is_checkable(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.checkable && a.name == name)
    }
}

/// Known driver schemas, by driver name.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, DriverSchema>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any schema with the same name.
    pub fn register(&mut self, schema: DriverSchema) {
        self.drivers.insert(schema.name.clone(), schema);
    }

    /// Looks a schema up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DriverSchema> {
        self.drivers.get(name)
    }

    /// Returns the driver description, or the name itself if unknown.
    #[must_use]
    pub fn description<'a>(&'a self, name: &'a str) -> &'a str {
        self.drivers
            .get(name)
            .map(|d| d.description.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(name)
    }

    /// Iterates over registered schemas.
    pub fn iter(&self) -> impl Iterator<Item = &DriverSchema> {
        self.drivers.values()
    }

    /// Number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether no schema is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl FromIterator<DriverSchema> for DriverRegistry {
    fn from_iter<I: IntoIterator<Item = DriverSchema>>(iter: I) -> Self {
        let mut registry = Self::new();
        for schema in iter {
            registry.register(schema);
        }
        registry
    }
}
