//! Closed classifications used across the engine.
//!
//! Probes report types as free-form strings. They are resolved once, at the
//! payload boundary, into one of these enumerations. Unrecognized strings
//! either fail (`from_name` returns `None`) or fall back to the explicit
//! `Unknown` variant (`classify`), depending on what the caller needs.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a component model (what kind of part a model describes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Processor,
    Memory,
    Disk,
    Ethernet,
    Expansion,
    Fibre,
    Share,
    Unknown,
    Management,
    Power,
    Cooling,
    Media,
    Chassis,
    Backup,
    Software,
    Os,
}

impl ComponentKind {
    pub const ALL: [Self; 16] = [
        Self::Processor,
        Self::Memory,
        Self::Disk,
        Self::Ethernet,
        Self::Expansion,
        Self::Fibre,
        Self::Share,
        Self::Unknown,
        Self::Management,
        Self::Power,
        Self::Cooling,
        Self::Media,
        Self::Chassis,
        Self::Backup,
        Self::Software,
        Self::Os,
    ];

    /// Short machine name, as emitted in snapshots.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Ethernet => "ethernet",
            Self::Expansion => "expansion",
            Self::Fibre => "fibre",
            Self::Share => "share",
            Self::Unknown => "unknown",
            Self::Management => "management",
            Self::Power => "power",
            Self::Cooling => "cooling",
            Self::Media => "media",
            Self::Chassis => "chassis",
            Self::Backup => "backup",
            Self::Software => "software",
            Self::Os => "os",
        }
    }

    /// Human-readable label. Probes report either this or [`Self::name`].
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::Memory => "memory",
            Self::Disk => "disk drive",
            Self::Ethernet => "ethernet card",
            Self::Expansion => "expansion card",
            Self::Fibre => "fibre channel card",
            Self::Share => "disk share",
            Self::Unknown => "unknown",
            Self::Management => "management",
            Self::Power => "power module",
            Self::Cooling => "cooling device",
            Self::Media => "media tray",
            Self::Chassis => "chassis",
            Self::Backup => "backup",
            Self::Software => "software",
            Self::Os => "operating system",
        }
    }

    /// Resolves a probe-supplied type string. Matches the name or the label,
    /// case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted || kind.label() == wanted)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownKind {
            what: "component kind",
            name: s.to_string(),
        })
    }
}

/// The record family a component belongs to. Each class has its own field
/// map and unique-key groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    Disk,
    Memory,
    Processor,
    Ethernet,
    FibreChannelCard,
    GenericPart,
    DiskShare,
    DiskShareMount,
    Software,
    OperatingSystem,
}

impl ComponentClass {
    pub const ALL: [Self; 10] = [
        Self::Disk,
        Self::Memory,
        Self::Processor,
        Self::Ethernet,
        Self::FibreChannelCard,
        Self::GenericPart,
        Self::DiskShare,
        Self::DiskShareMount,
        Self::Software,
        Self::OperatingSystem,
    ];

    /// Name used as the storage discriminator.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Memory => "memory",
            Self::Processor => "processor",
            Self::Ethernet => "ethernet",
            Self::FibreChannelCard => "fibre_channel_card",
            Self::GenericPart => "generic_part",
            Self::DiskShare => "disk_share",
            Self::DiskShareMount => "disk_share_mount",
            Self::Software => "software",
            Self::OperatingSystem => "operating_system",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownKind {
            what: "component class",
            name: s.to_string(),
        })
    }
}

/// Classification of a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Rack,
    BladeSystem,
    Management,
    PowerDistributionUnit,
    DataCenter,
    Switch,
    Router,
    LoadBalancer,
    Firewall,
    SmtpGateway,
    Appliance,
    SwitchStack,
    VirtualChassis,
    RackServer,
    BladeServer,
    VirtualServer,
    CloudServer,
    Storage,
    FibreChannelSwitch,
    Unknown,
}

impl DeviceKind {
    pub const ALL: [Self; 20] = [
        Self::Rack,
        Self::BladeSystem,
        Self::Management,
        Self::PowerDistributionUnit,
        Self::DataCenter,
        Self::Switch,
        Self::Router,
        Self::LoadBalancer,
        Self::Firewall,
        Self::SmtpGateway,
        Self::Appliance,
        Self::SwitchStack,
        Self::VirtualChassis,
        Self::RackServer,
        Self::BladeServer,
        Self::VirtualServer,
        Self::CloudServer,
        Self::Storage,
        Self::FibreChannelSwitch,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rack => "rack",
            Self::BladeSystem => "blade_system",
            Self::Management => "management",
            Self::PowerDistributionUnit => "power_distribution_unit",
            Self::DataCenter => "data_center",
            Self::Switch => "switch",
            Self::Router => "router",
            Self::LoadBalancer => "load_balancer",
            Self::Firewall => "firewall",
            Self::SmtpGateway => "smtp_gateway",
            Self::Appliance => "appliance",
            Self::SwitchStack => "switch_stack",
            Self::VirtualChassis => "virtual_chassis",
            Self::RackServer => "rack_server",
            Self::BladeServer => "blade_server",
            Self::VirtualServer => "virtual_server",
            Self::CloudServer => "cloud_server",
            Self::Storage => "storage",
            Self::FibreChannelSwitch => "fibre_channel_switch",
            Self::Unknown => "unknown",
        }
    }

    /// Resolves a probe-supplied type string. Accepts `rack_server`,
    /// `rack server` and any casing of either.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|kind| kind.name() == wanted)
    }

    /// Like [`Self::from_name`], falling back to [`DeviceKind::Unknown`].
    #[must_use]
    pub fn classify(name: &str) -> Self {
        Self::from_name(name).unwrap_or(Self::Unknown)
    }

    /// Stacks and virtual chassis own their members through the logical
    /// parent relation instead of the physical one.
    #[must_use]
    pub const fn is_logical_container(self) -> bool {
        matches!(self, Self::SwitchStack | Self::VirtualChassis)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownKind {
            what: "device kind",
            name: s.to_string(),
        })
    }
}
