use serde::{Deserialize, Serialize};

/// Subscriber details entered by the technician.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFields {
    /// Subscriber id printed on the service order.
    pub customer_code: String,

    #[serde(default)]
    pub address: String,

    /// Service package descriptor.
    #[serde(default)]
    pub service: String,

    /// Optical power reading taken at the port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_signal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modem_serial: Option<String>,
}

/// Customer: a subscriber provisioned on one port of a site.
///
/// Keyed to the site by installation code, not by link id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub installation_code: String,

    /// 1-based port number, within the site's capacity.
    pub port: u32,

    #[serde(flatten)]
    pub fields: CustomerFields,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_flattened_on_the_wire() {
        let c = Customer {
            id: "c1".into(),
            installation_code: "SITE-7".into(),
            port: 3,
            fields: CustomerFields {
                customer_code: "CUST-42".into(),
                address: "Jl. Merdeka 1".into(),
                service: "50 Mbps".into(),
                power_signal: Some("-19.5".into()),
                modem_serial: None,
            },
            create_at: None,
            update_at: None,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["customerCode"], "CUST-42");
        assert_eq!(json["installationCode"], "SITE-7");
        assert_eq!(json["powerSignal"], "-19.5");

        let back: Customer = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
