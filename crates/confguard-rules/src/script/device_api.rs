//! The `device` object handed to scripts.
//!
//! The free functions hold the lookups shared by both interpreters.

use confguard_core::{
    find_sections, full_match_regex, AttributeValue, DeviceData, EvaluationLog, Section,
};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map};
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;

/// A resolved host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRecord {
    /// Host name.
    pub name: String,
    /// IP address.
    pub address: String,
}

/// Name resolution backend for the script `nslookup` function.
pub trait HostResolver: Send + Sync {
    /// Resolves a host name or address. `None` when resolution fails.
    fn resolve(&self, host: &str) -> Option<HostRecord>;
}

/// Resolves through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<HostRecord> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(HostRecord {
                name: host.to_string(),
                address: ip.to_string(),
            });
        }
        let address = (host, 0).to_socket_addrs().ok()?.next()?.ip();
        Some(HostRecord {
            name: host.to_string(),
            address: address.to_string(),
        })
    }
}

/// Script view of one device.
///
/// Holds an owned copy of the device, so nothing borrowed from the caller
/// survives the evaluation.
#[derive(Clone)]
pub struct ScriptDevice {
    data: Arc<DeviceData>,
    resolver: Option<Arc<dyn HostResolver>>,
    log: EvaluationLog,
}

impl ScriptDevice {
    pub(crate) fn new(
        data: DeviceData,
        resolver: Option<Arc<dyn HostResolver>>,
        log: EvaluationLog,
    ) -> Self {
        Self {
            data: Arc::new(data),
            resolver,
            log,
        }
    }

    fn get(&mut self, key: &str) -> Dynamic {
        self.data.item(key).map_or(Dynamic::UNIT, to_dynamic)
    }

    fn get_by_id(&mut self, key: &str, id: &str) -> Dynamic {
        element_by_id(&self.data, key, id).map_or(Dynamic::UNIT, to_dynamic)
    }

    fn get_at(&mut self, key: &str, index: i64) -> Dynamic {
        element_at(&self.data, key, index).map_or(Dynamic::UNIT, to_dynamic)
    }

    fn nslookup(&mut self, host: &str) -> Map {
        let record = lookup_host(self.resolver.as_deref(), host, &self.log);
        let mut map = Map::new();
        map.insert("name".into(), Dynamic::from(record.name));
        map.insert("address".into(), Dynamic::from(record.address));
        map
    }

    fn find_sections(&mut self, text: &str, pattern: &str) -> Result<Array, Box<EvalAltResult>> {
        Ok(sections(text, pattern)?
            .into_iter()
            .map(|section| {
                let mut map = Map::new();
                map.insert("title".into(), Dynamic::from(section.title));
                map.insert("body".into(), Dynamic::from(section.body));
                Dynamic::from_map(map)
            })
            .collect())
    }
}

/// Element of a list item whose `name` or `slot` field equals `id`.
pub(crate) fn element_by_id<'a>(
    data: &'a DeviceData,
    key: &str,
    id: &str,
) -> Option<&'a AttributeValue> {
    data.item(key)
        .and_then(AttributeValue::as_list)
        .and_then(|items| {
            items.iter().find(|item| {
                ["name", "slot"]
                    .iter()
                    .any(|field| item.field(field).and_then(AttributeValue::as_str) == Some(id))
            })
        })
}

/// Element of a list item by position. Negative indexes find nothing.
pub(crate) fn element_at<'a>(
    data: &'a DeviceData,
    key: &str,
    index: i64,
) -> Option<&'a AttributeValue> {
    data.item(key)
        .and_then(AttributeValue::as_list)
        .zip(usize::try_from(index).ok())
        .and_then(|(items, index)| items.get(index))
}

/// Resolves `host`, or returns an empty record. `None` means lookups are disabled.
pub(crate) fn lookup_host(
    resolver: Option<&dyn HostResolver>,
    host: &str,
    log: &EvaluationLog,
) -> HostRecord {
    match resolver {
        Some(resolver) => resolver.resolve(host).unwrap_or_else(|| {
            log.debug(format!("Unable to resolve '{host}'"));
            HostRecord::default()
        }),
        None => {
            log.warn("nslookup is disabled by configuration");
            HostRecord::default()
        }
    }
}

/// Sections of `text` opened by lines fully matching `pattern`.
pub(crate) fn sections(text: &str, pattern: &str) -> Result<Vec<Section>, String> {
    let regex =
        full_match_regex(pattern).map_err(|e| format!("Invalid pattern '{pattern}': {e}"))?;
    Ok(find_sections(text, &regex, ""))
}

/// Registers the `Device` type and its methods.
pub(crate) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptDevice>("Device")
        .register_fn("get", |d: &mut ScriptDevice, key: &str| d.get(key))
        .register_fn("get", |d: &mut ScriptDevice, key: &str, id: &str| {
            d.get_by_id(key, id)
        })
        .register_fn("get", |d: &mut ScriptDevice, key: &str, index: i64| {
            d.get_at(key, index)
        })
        .register_fn("nslookup", |d: &mut ScriptDevice, host: &str| d.nslookup(host))
        .register_fn(
            "findSections",
            |d: &mut ScriptDevice, text: &str, pattern: &str| d.find_sections(text, pattern),
        );
}

fn to_dynamic(value: &AttributeValue) -> Dynamic {
    match value {
        AttributeValue::Flag(flag) => Dynamic::from(*flag),
        AttributeValue::Integer(number) => Dynamic::from(*number),
        AttributeValue::Float(number) => Dynamic::from(*number),
        AttributeValue::Text(text) => Dynamic::from(text.clone()),
        AttributeValue::List(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        AttributeValue::Map(entries) => Dynamic::from_map(
            entries
                .iter()
                .map(|(key, value)| (key.as_str().into(), to_dynamic(value)))
                .collect(),
        ),
    }
}
