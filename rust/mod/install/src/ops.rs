//! Operations understood by the record store.
//!
//! Names match the wire protocol. Every operation commits on its own;
//! `InstallProduct` is the only one that performs two writes atomically.

use invent_remote::Operation;
use serde::{Deserialize, Serialize};

use crate::model::{Customer, CustomerFields, DeviceSerial, InstallationLink, LinkedSerial};

macro_rules! operation {
    ($ty:ident, $name:expr, $vars:ty, $data:ty) => {
        pub struct $ty;

        impl Operation for $ty {
            const NAME: &'static str = $name;
            type Variables = $vars;
            type Data = $data;
        }
    };
}

operation!(FindProductBySerialNumber, "FindProductBySerialNumber", SerialNumberVars, ProductSerialsData);
operation!(InsertInstallationLink, "InsertInstallationLink", LinkVars, LinkData);
operation!(StampInstalledAt, "StampInstalledAt", StampVars, SerialData);
operation!(InstallProduct, "InstallProduct", InstallVars, InstallData);
operation!(FindInstallationsByCode, "FindInstallationsByCode", CodeVars, InstallationsData);
operation!(FindCustomersByInstallationCode, "FindCustomersByInstallationCode", CodeVars, CustomersData);
operation!(InsertCustomer, "InsertCustomer", NewCustomerVars, CustomerData);
operation!(DeleteInstallationLink, "DeleteInstallationLink", IdVars, DeletedLinkData);
operation!(DeleteCustomer, "DeleteCustomer", IdVars, DeletedCustomerData);
operation!(UpdateSerialCapacity, "UpdateSerialCapacity", CapacityVars, SerialData);

// ── Variables ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialNumberVars {
    pub serial_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkVars {
    pub installation_code: String,
    pub serial_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampVars {
    pub serial_id: String,
    pub installed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallVars {
    pub installation_code: String,
    pub serial_id: String,
    pub installed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVars {
    pub installation_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomerVars {
    pub installation_code: String,
    pub port: u32,
    #[serde(flatten)]
    pub fields: CustomerFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdVars {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityVars {
    pub serial_id: String,
    pub capacity: u32,
}

// ── Data ──

/// A serial with its installation link, if bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialWithInstallation {
    #[serde(flatten)]
    pub serial: DeviceSerial,
    #[serde(default)]
    pub installation: Option<InstallationLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSerialsData {
    pub product_serials: Vec<SerialWithInstallation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkData {
    pub link: InstallationLink,
}

/// `serial` is null when no row matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialData {
    #[serde(default)]
    pub serial: Option<DeviceSerial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallData {
    pub link: InstallationLink,
    pub serial: DeviceSerial,
}

/// Oldest link first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationsData {
    pub installations: Vec<LinkedSerial>,
}

/// Ordered by port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomersData {
    pub customers: Vec<Customer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerData {
    pub customer: Customer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedLinkData {
    #[serde(default)]
    pub link: Option<InstallationLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedCustomerData {
    #[serde(default)]
    pub customer: Option<Customer>,
}
