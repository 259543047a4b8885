use crate::context::make_identifier;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareKind {
    DcMotor,
    Servo,
    TouchSensor,
}

impl HardwareKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "DcMotor" => HardwareKind::DcMotor,
            "Servo" => HardwareKind::Servo,
            "TouchSensor" => HardwareKind::TouchSensor,
            _ => return None,
        })
    }

    /// Simple class name; also a key of the known type table.
    pub fn class_name(self) -> &'static str {
        match self {
            HardwareKind::DcMotor => "DcMotor",
            HardwareKind::Servo => "Servo",
            HardwareKind::TouchSensor => "TouchSensor",
        }
    }

    /// Appended to script identifiers, and to compiled identifiers that collide.
    pub fn identifier_suffix(self) -> &'static str {
        match self {
            HardwareKind::DcMotor => "AsDcMotor",
            HardwareKind::Servo => "AsServo",
            HardwareKind::TouchSensor => "AsTouchSensor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub kind: HardwareKind,
}

impl Device {
    pub fn script_identifier(&self) -> String {
        format!("{}{}", make_identifier(&self.name), self.kind.identifier_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub name: String,
    pub kind: HardwareKind,
    pub configured: bool,
}

/// The active robot configuration: which devices exist and what they are.
#[derive(Debug, Clone, Default)]
pub struct HardwareConfig {
    devices: Vec<Device>,
}

impl HardwareConfig {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read hardware configuration '{}'.", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid hardware configuration '{}'.", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        let entries = root
            .get("devices")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Hardware configuration missing 'devices' array."))?;
        let mut devices = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Device {} missing 'name'.", index))?;
            let kind_name = entry
                .get("kind")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Device '{}' missing 'kind'.", name))?;
            let kind = HardwareKind::from_name(kind_name)
                .ok_or_else(|| anyhow!("Device '{}' has unknown kind '{}'.", name, kind_name))?;
            devices.push(Device {
                name: name.to_string(),
                kind,
            });
        }
        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn contains(&self, name: &str, kind: HardwareKind) -> bool {
        self.devices.iter().any(|d| d.kind == kind && d.name == name)
    }

    /// Maps a device block's script identifier (`leftMotorAsDcMotor`) back to a device.
    /// Unconfigured devices fall back to the identifier without its kind suffix.
    pub fn resolve_identifier(&self, identifier: &str, kind: HardwareKind) -> ResolvedDevice {
        if let Some(device) = self
            .devices
            .iter()
            .find(|d| d.kind == kind && d.script_identifier() == identifier)
        {
            return ResolvedDevice {
                name: device.name.clone(),
                kind,
                configured: true,
            };
        }
        let name = identifier
            .strip_suffix(kind.identifier_suffix())
            .unwrap_or(identifier)
            .to_string();
        ResolvedDevice {
            configured: self.contains(&name, kind),
            name,
            kind,
        }
    }
}
