//! Loads the sectioned (`.ini`-style) configuration file into brokers,
//! devices, guard trees, and reporters.
//!
//! Deliberately hand-rolled rather than built on a full INI crate: the
//! format here is a thin layer (named sections, `Enabled` lists referencing
//! other sections by name, a handful of mandatory/optional keys per section
//! kind) that a generic INI parser wouldn't meaningfully simplify, and
//! keeping it in-house matches how the original tool's own `configparser`
//! usage was a thin wrapper rather than the source of truth for structure.

use crate::alarms::{Alarm, DataTypeAlarm, ErrorCodesAlarm, FloodingAlarm, RangeAlarm, TimeoutAlarm};
use crate::error::{MqguardError, Result};
use crate::guard::{DeviceGuard, DevicePresence, UpdateGuard};
use crate::identifier::{BrokerDescriptor, DataIdentifier};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One `[Name]` section: an ordered list of `key = value` options.
#[derive(Debug, Default)]
struct Section {
    options: Vec<(String, String)>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&str> {
        self.options.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }

    fn require(&self, section_name: &str, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| MqguardError::config(format!("section [{}] is missing required key '{}'", section_name, key)))
    }
}

struct IniFile {
    sections: HashMap<String, Section>,
}

impl IniFile {
    fn parse(text: &str) -> Result<Self> {
        let mut sections: HashMap<String, Section> = HashMap::new();
        let mut current: Option<String> = None;
        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| MqguardError::config(format!("line {}: unterminated section header", lineno + 1)))?
                    .trim()
                    .to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| MqguardError::config(format!("line {}: expected 'key = value'", lineno + 1)))?;
            let section_name = current
                .as_ref()
                .ok_or_else(|| MqguardError::config(format!("line {}: option outside of any section", lineno + 1)))?;
            sections
                .entry(section_name.clone())
                .or_default()
                .options
                .push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(IniFile { sections })
    }

    fn section(&self, name: &str) -> Result<&Section> {
        self.sections.get(name).ok_or_else(|| MqguardError::config(format!("missing section [{}]", name)))
    }

    fn enabled(&self, section_name: &str) -> Result<Vec<String>> {
        let section = self.section(section_name)?;
        let raw = section.require(section_name, "Enabled")?;
        Ok(raw.split_whitespace().map(str::to_string).collect())
    }
}

/// A fully loaded configuration, ready to be materialised into a running
/// registry, broker clients, and reporters.
pub struct LoadedConfig {
    pub brokers: Vec<BrokerDescriptor>,
    pub devices: Vec<(Arc<str>, Arc<DeviceGuard>)>,
    pub reporters: Vec<ReporterSpec>,
}

/// One configured reporter, not yet instantiated (instantiation needs the
/// registry mailbox handle, which doesn't exist until the process is wired
/// up in `main`).
pub enum ReporterSpec {
    Log { path: String },
    Print,
    Socket { listen_address: String },
    Websocket { listen_address: String },
}

/// Parses `path` into a `LoadedConfig`. Every failure is a `MqguardError::Config`
/// — configuration errors are fatal at startup and never partially applied.
pub fn load(path: impl AsRef<Path>) -> Result<LoadedConfig> {
    let text = std::fs::read_to_string(path)?;
    let ini = IniFile::parse(&text)?;

    let brokers = load_brokers(&ini)?;
    let devices = load_devices(&ini)?;
    let reporters = load_reporters(&ini)?;

    Ok(LoadedConfig { brokers, devices, reporters })
}

fn load_brokers(ini: &IniFile) -> Result<Vec<BrokerDescriptor>> {
    let mut brokers = Vec::new();
    for name in ini.enabled("Brokers")? {
        let section = ini.section(&name)?;
        let host = section.get("Host").unwrap_or("127.0.0.1").to_string();
        let port: u16 = match section.get("Port") {
            Some(raw) => raw.parse().map_err(|_| MqguardError::config(format!("broker [{}]: invalid Port '{}'", name, raw)))?,
            None => 1883,
        };
        let credentials = match (section.get("User"), section.get("Password")) {
            (Some(user), Some(password)) => Some((user.to_string(), password.to_string())),
            (None, None) => None,
            _ => return Err(MqguardError::config(format!("broker [{}]: User and Password must both be set or both absent", name))),
        };
        let subscriptions = section
            .require(&name, "Topic")?
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();
        if subscriptions.is_empty() {
            return Err(MqguardError::config(format!("broker [{}] declares no subscriptions", name)));
        }
        let mut descriptor = BrokerDescriptor::new(name.as_str(), host, port);
        descriptor.credentials = credentials;
        descriptor.subscriptions = subscriptions;
        brokers.push(descriptor);
    }
    Ok(brokers)
}

fn build_alarms(update_guard_name: &str, section: &Section) -> Result<Vec<Arc<dyn Alarm>>> {
    let mut alarms: Vec<Arc<dyn Alarm>> = Vec::new();

    if let Some(kind) = section.get("Type") {
        let alarm: DataTypeAlarm = match kind {
            "numeric" => DataTypeAlarm::numeric(),
            "alphanumeric" => DataTypeAlarm::alphanumeric(),
            "alphabetic" => DataTypeAlarm::alphabetic(),
            other => {
                return Err(MqguardError::config(format!(
                    "update-guard [{}]: unknown Type '{}' (expected numeric, alphanumeric, or alphabetic)",
                    update_guard_name, other
                )))
            }
        };
        alarms.push(Arc::new(alarm));
    }

    let min = section.get("ValidRangeMin").map(str::parse::<f64>).transpose().map_err(|_| {
        MqguardError::config(format!("update-guard [{}]: ValidRangeMin is not a number", update_guard_name))
    })?;
    let max = section.get("ValidRangeMax").map(str::parse::<f64>).transpose().map_err(|_| {
        MqguardError::config(format!("update-guard [{}]: ValidRangeMax is not a number", update_guard_name))
    })?;
    match (min, max) {
        (Some(min), Some(max)) => alarms.push(Arc::new(RangeAlarm::at_interval(min, max))),
        (Some(min), None) => alarms.push(Arc::new(RangeAlarm::lower_limit(min))),
        (None, Some(max)) => alarms.push(Arc::new(RangeAlarm::upper_limit(max))),
        (None, None) => {}
    }

    if let Some(raw) = section.get("PeriodMin") {
        let seconds: u64 = raw
            .parse()
            .map_err(|_| MqguardError::config(format!("update-guard [{}]: PeriodMin is not a whole number of seconds", update_guard_name)))?;
        alarms.push(Arc::new(FloodingAlarm::from_seconds(seconds)));
    }

    if let Some(raw) = section.get("PeriodMax") {
        let seconds: u64 = raw
            .parse()
            .map_err(|_| MqguardError::config(format!("update-guard [{}]: PeriodMax is not a whole number of seconds", update_guard_name)))?;
        alarms.push(Arc::new(TimeoutAlarm::from_seconds(seconds)));
    }

    if let Some(raw) = section.get("ErrorCodes") {
        let codes = raw.split_whitespace().map(str::to_string);
        alarms.push(Arc::new(ErrorCodesAlarm::new(codes)));
    }

    if alarms.is_empty() {
        return Err(MqguardError::config(format!(
            "update-guard [{}] declares no alarms (need at least one of Type/ValidRangeMin/ValidRangeMax/PeriodMin/PeriodMax/ErrorCodes)",
            update_guard_name
        )));
    }

    Ok(alarms)
}

fn parse_identifier(guard_set_name: &str, raw: &str) -> Result<DataIdentifier> {
    let mut parts = raw.splitn(2, char::is_whitespace);
    let broker = parts.next().filter(|s| !s.is_empty());
    let topic = parts.next().map(str::trim).filter(|s| !s.is_empty());
    match (broker, topic) {
        (Some(broker), Some(topic)) => Ok(DataIdentifier::new(broker, topic)),
        _ => Err(MqguardError::config(format!(
            "guard set [{}]: '{}' is not a valid '<broker> <topic>' entry",
            guard_set_name, raw
        ))),
    }
}

fn load_update_guards(ini: &IniFile, guard_set_name: &str) -> Result<Vec<Arc<UpdateGuard>>> {
    let section = ini.section(guard_set_name)?;
    let mut guards = Vec::new();
    let mut seen_names = std::collections::HashSet::new();
    for (key, update_guard_name) in &section.options {
        let identifier = parse_identifier(guard_set_name, key)?;
        if !seen_names.insert(update_guard_name.clone()) {
            return Err(MqguardError::config(format!(
                "guard set [{}]: update-guard '{}' is mapped to more than one identifier",
                guard_set_name, update_guard_name
            )));
        }
        let update_guard_section = ini.section(update_guard_name)?;
        let alarms = build_alarms(update_guard_name, update_guard_section)?;
        guards.push(Arc::new(UpdateGuard::new(update_guard_name.as_str(), identifier, alarms)));
    }
    Ok(guards)
}

fn load_devices(ini: &IniFile) -> Result<Vec<(Arc<str>, Arc<DeviceGuard>)>> {
    let mut devices = Vec::new();
    for name in ini.enabled("Devices")? {
        let section = ini.section(&name)?;
        let guard_set_name = section.require(&name, "Guard")?;
        let update_guards = load_update_guards(ini, guard_set_name)?;

        let presence = match section.get("PresenceTopic") {
            Some(raw) => {
                let identifier = parse_identifier(&name, raw)?;
                let online = section.require(&name, "PresenceOnline")?.to_string();
                let offline = section.require(&name, "PresenceOffline")?.to_string();
                Some(DevicePresence { identifier, online, offline })
            }
            None => None,
        };

        let device_guard = Arc::new(DeviceGuard::new(presence, update_guards));
        devices.push((Arc::<str>::from(name.as_str()), device_guard));
    }
    Ok(devices)
}

fn load_reporters(ini: &IniFile) -> Result<Vec<ReporterSpec>> {
    let mut reporters = Vec::new();
    for name in ini.enabled("Reporters")? {
        let section = ini.section(&name)?;
        let kind = section.require(&name, "Type")?;
        let spec = match kind {
            "print" => ReporterSpec::Print,
            "log" => ReporterSpec::Log {
                path: section.require(&name, "LogFile")?.to_string(),
            },
            "socket" => ReporterSpec::Socket {
                listen_address: listen_address(&name, section)?,
            },
            "websocket" => ReporterSpec::Websocket {
                listen_address: listen_address(&name, section)?,
            },
            other => {
                return Err(MqguardError::config(format!(
                    "reporter [{}]: unknown Type '{}' (expected socket, websocket, log, or print)",
                    name, other
                )))
            }
        };
        reporters.push(spec);
    }
    Ok(reporters)
}

fn listen_address(reporter_name: &str, section: &Section) -> Result<String> {
    let address = section.get("ListenAddress").unwrap_or("0.0.0.0");
    let port = section.require(reporter_name, "ListenPort")?;
    port.parse::<u16>()
        .map_err(|_| MqguardError::config(format!("reporter [{}]: invalid ListenPort '{}'", reporter_name, port)))?;
    Ok(format!("{}:{}", address, port))
}
