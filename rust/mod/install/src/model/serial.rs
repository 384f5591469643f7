use serde::{Deserialize, Serialize};

/// Product: the catalogue entry a device serial belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
}

/// DeviceSerial: one physical unit, identified by its scanned serial number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSerial {
    pub id: String,

    /// Scanned value. Unique, matched exactly and case-sensitively.
    pub serial_number: String,

    pub product: Product,

    /// Number of subscriber ports (e.g. 8 or 16). Absent or zero means the
    /// device does not supply port capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,

    /// Informational only; never consulted for allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_remaining: Option<u32>,

    /// Set when the serial is bound to an installation. Detaching leaves it as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

impl DeviceSerial {
    /// Port capacity when present and nonzero.
    pub fn port_capacity(&self) -> Option<u32> {
        self.capacity.filter(|c| *c > 0)
    }

    pub fn is_installed(&self) -> bool {
        self.installed_at.is_some()
    }
}

/// Inventory provisioning input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSerial {
    pub serial_number: String,
    pub product_name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(capacity: Option<u32>) -> DeviceSerial {
        DeviceSerial {
            id: "s1".into(),
            serial_number: "SN-001".into(),
            product: Product { id: "p1".into(), name: "ODP-8".into() },
            capacity,
            capacity_remaining: None,
            installed_at: None,
            create_at: None,
            update_at: None,
        }
    }

    #[test]
    fn zero_capacity_is_not_a_port_capacity() {
        assert_eq!(serial(Some(8)).port_capacity(), Some(8));
        assert_eq!(serial(Some(0)).port_capacity(), None);
        assert_eq!(serial(None).port_capacity(), None);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(serial(Some(16))).unwrap();
        assert_eq!(json["serialNumber"], "SN-001");
        assert_eq!(json["capacity"], 16);
        assert!(json.get("installedAt").is_none());
    }
}
