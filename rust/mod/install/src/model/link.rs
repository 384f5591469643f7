use serde::{Deserialize, Serialize};

use super::DeviceSerial;

/// InstallationLink: binds one device serial to a site's installation code.
///
/// At most one link references a given serial. Several links may share an
/// installation code: that is how extra devices join an existing site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallationLink {
    pub id: String,
    pub installation_code: String,
    pub serial_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

/// A link joined with the device it references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSerial {
    pub link: InstallationLink,
    #[serde(default)]
    pub serial: Option<DeviceSerial>,
}

/// Role of a device at its site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceRole {
    /// Supplies the site's port capacity: the oldest linked device with a nonzero capacity.
    Active,
    /// Any other device linked under the same code.
    Attached,
}

/// A device at a site with its explicit role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteDevice {
    pub link: InstallationLink,
    #[serde(default)]
    pub serial: Option<DeviceSerial>,
    pub role: DeviceRole,
}
