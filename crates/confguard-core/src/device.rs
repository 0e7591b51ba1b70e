//! Devices as seen by rules.

use crate::types::{DeviceId, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value readable from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean flag.
    Flag(bool),
    /// Integer number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Ordered list.
    List(Vec<AttributeValue>),
    /// Named fields.
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list content, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks a field up, if this is a map.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            Self::Map(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Renders the value as text. Lists are rendered one item per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(fields) => {
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// A device under compliance check.
///
/// Implementations expose device fields, current configuration attributes,
/// diagnostic results, interfaces and modules through [`Device::item`].
pub trait Device: Send + Sync {
    /// Returns the device identifier.
    fn id(&self) -> DeviceId;

    /// Returns the device name.
    fn name(&self) -> &str;

    /// Returns the identifier of the driver managing the device.
    fn driver(&self) -> &str;

    /// Returns the groups the device belongs to.
    fn groups(&self) -> &[String];

    /// Reads a named item.
    fn item(&self, key: &str) -> Option<AttributeValue>;

    /// Lists the names readable through [`Device::item`].
    fn item_keys(&self) -> Vec<String>;

    /// Whether the device holds an active exemption for `rule` at `now`.
    fn is_exempted(&self, _rule: RuleId, _now: DateTime<Utc>) -> bool {
        false
    }
}

/// An owned copy of everything a device exposes.
///
/// Script rules hand this to the interpreter so that no borrow of the
/// device outlives the call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceData {
    /// Device identifier.
    pub id: DeviceId,
    /// Device name.
    pub name: String,
    /// Driver identifier.
    pub driver: String,
    /// Every readable item.
    pub items: BTreeMap<String, AttributeValue>,
}

impl DeviceData {
    /// Copies the readable state of a device.
    #[must_use]
    pub fn capture(device: &dyn Device) -> Self {
        let items = device
            .item_keys()
            .into_iter()
            .filter_map(|key| device.item(&key).map(|value| (key, value)))
            .collect();
        Self {
            id: device.id(),
            name: device.name().to_string(),
            driver: device.driver().to_string(),
            items,
        }
    }

    /// Reads a captured item.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&AttributeValue> {
        self.items.get(key)
    }
}

/// A network interface of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInterface {
    /// Interface name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Physical address.
    pub mac: String,
    /// Virtual device (context) the interface belongs to.
    pub virtual_device: String,
    /// VRF instance.
    pub vrf: String,
    /// Administrative state.
    pub enabled: bool,
    /// Whether the interface is routed.
    pub level3: bool,
    /// Addresses with prefix length, such as `10.0.0.1/24`.
    pub ip: Vec<String>,
}

impl NetworkInterface {
    fn to_value(&self) -> AttributeValue {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), self.name.as_str().into());
        fields.insert("description".to_string(), self.description.as_str().into());
        fields.insert("mac".to_string(), self.mac.as_str().into());
        fields.insert(
            "virtualDevice".to_string(),
            self.virtual_device.as_str().into(),
        );
        fields.insert("vrf".to_string(), self.vrf.as_str().into());
        fields.insert("enabled".to_string(), self.enabled.into());
        fields.insert("level3".to_string(), self.level3.into());
        fields.insert(
            "ip".to_string(),
            AttributeValue::List(self.ip.iter().map(|a| a.as_str().into()).collect()),
        );
        AttributeValue::Map(fields)
    }
}

/// A hardware module of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Module {
    /// Slot name.
    pub slot: String,
    /// Part number.
    pub part_number: String,
    /// Serial number.
    pub serial_number: String,
}

impl Module {
    fn to_value(&self) -> AttributeValue {
        let mut fields = BTreeMap::new();
        fields.insert("slot".to_string(), self.slot.as_str().into());
        fields.insert("partNumber".to_string(), self.part_number.as_str().into());
        fields.insert(
            "serialNumber".to_string(),
            self.serial_number.as_str().into(),
        );
        AttributeValue::Map(fields)
    }
}

/// An exemption stored on the device side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceExemption {
    /// Exempted rule.
    pub rule: RuleId,
    /// End of the exemption.
    pub expires: DateTime<Utc>,
}

/// A device held in memory, typically loaded from an inventory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device identifier.
    pub id: DeviceId,
    /// Device name.
    pub name: String,
    /// Driver identifier.
    pub driver: String,
    /// Device groups.
    #[serde(default)]
    pub groups: Vec<String>,
    /// General fields (family, location, softwareVersion, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, AttributeValue>,
    /// Current configuration attributes.
    #[serde(default)]
    pub config: BTreeMap<String, AttributeValue>,
    /// Diagnostic results.
    #[serde(default)]
    pub diagnostics: BTreeMap<String, AttributeValue>,
    /// Network interfaces.
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
    /// Hardware modules.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Exemptions from rules.
    #[serde(default)]
    pub exemptions: Vec<DeviceExemption>,
}

impl DeviceRecord {
    /// Creates a device with no items.
    #[must_use]
    pub fn new(id: DeviceId, name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            driver: driver.into(),
            groups: Vec::new(),
            fields: BTreeMap::new(),
            config: BTreeMap::new(),
            diagnostics: BTreeMap::new(),
            interfaces: Vec::new(),
            modules: Vec::new(),
            exemptions: Vec::new(),
        }
    }

    /// Adds the device to a group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Sets a general field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets a configuration attribute.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Sets a diagnostic result.
    #[must_use]
    pub fn with_diagnostic(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.diagnostics.insert(key.into(), value.into());
        self
    }

    /// Adds a network interface.
    #[must_use]
    pub fn with_interface(mut self, interface: NetworkInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Adds a hardware module.
    #[must_use]
    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Exempts the device from a rule until `expires`.
    #[must_use]
    pub fn with_exemption(mut self, rule: RuleId, expires: DateTime<Utc>) -> Self {
        self.exemptions.push(DeviceExemption { rule, expires });
        self
    }

    /// Keeps only the configuration attributes accepted by `keep`.
    pub fn retain_config<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.config.retain(|name, _| keep(name));
    }
}

const BUILTIN_ITEMS: [&str; 5] = ["name", "type", "groups", "interfaces", "modules"];

impl Device for DeviceRecord {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> &str {
        &self.driver
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn item(&self, key: &str) -> Option<AttributeValue> {
        match key {
            "name" => Some(self.name.as_str().into()),
            "type" => Some(self.driver.as_str().into()),
            "groups" => Some(AttributeValue::List(
                self.groups.iter().map(|g| g.as_str().into()).collect(),
            )),
            "interfaces" => Some(AttributeValue::List(
                self.interfaces
                    .iter()
                    .map(NetworkInterface::to_value)
                    .collect(),
            )),
            "modules" => Some(AttributeValue::List(
                self.modules.iter().map(Module::to_value).collect(),
            )),
            _ => self
                .config
                .get(key)
                .or_else(|| self.fields.get(key))
                .or_else(|| self.diagnostics.get(key))
                .cloned(),
        }
    }

    fn item_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = BUILTIN_ITEMS.iter().map(ToString::to_string).collect();
        for key in self
            .config
            .keys()
            .chain(self.fields.keys())
            .chain(self.diagnostics.keys())
        {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn is_exempted(&self, rule: RuleId, now: DateTime<Utc>) -> bool {
        self.exemptions
            .iter()
            .any(|e| e.rule == rule && now < e.expires)
    }
}
