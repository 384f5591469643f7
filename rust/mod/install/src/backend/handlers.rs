//! One function per operation. Each runs on whatever executor it is given;
//! callers decide whether that is a transaction.

use invent_core::{new_id, now_rfc3339, ServiceError};
use invent_sql::{SQLExec, Value};

use super::records::{delete_record, find_one_by, find_record, insert_record, list_by, update_record};
use crate::allocator::active_capacity;
use crate::model::{Customer, DeviceSerial, InstallationLink, LinkedSerial, NewSerial, Product};
use crate::ops::{
    CapacityVars, CodeVars, CustomerData, CustomersData, DeletedCustomerData, DeletedLinkData,
    IdVars, InstallData, InstallVars, InstallationsData, LinkData, LinkVars, NewCustomerVars,
    ProductSerialsData, SerialData, SerialNumberVars, SerialWithInstallation, StampVars,
};

pub(crate) const PRODUCTS: &str = "products";
pub(crate) const SERIALS: &str = "product_serials";
pub(crate) const LINKS: &str = "installation_links";
pub(crate) const CUSTOMERS: &str = "customers";

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn require(value: &str, what: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn serial_indexes(serial: &DeviceSerial) -> Vec<(&'static str, Value)> {
    vec![
        ("serial_number", text(&serial.serial_number)),
        ("product_id", text(&serial.product.id)),
        ("create_at", serial.create_at.clone().into()),
        ("update_at", serial.update_at.clone().into()),
    ]
}

pub(crate) fn find_product_by_serial_number<E: SQLExec + ?Sized>(
    db: &E,
    vars: &SerialNumberVars,
) -> Result<ProductSerialsData, ServiceError> {
    let serial: Option<DeviceSerial> =
        find_one_by(db, SERIALS, "serial_number", text(&vars.serial_number))?;
    let Some(serial) = serial else {
        return Ok(ProductSerialsData { product_serials: Vec::new() });
    };
    let installation = find_one_by(db, LINKS, "serial_id", text(&serial.id))?;
    Ok(ProductSerialsData {
        product_serials: vec![SerialWithInstallation { serial, installation }],
    })
}

pub(crate) fn insert_installation_link<E: SQLExec + ?Sized>(
    db: &E,
    vars: &LinkVars,
) -> Result<LinkData, ServiceError> {
    require(&vars.installation_code, "installation code")?;
    if find_record::<_, DeviceSerial>(db, SERIALS, &vars.serial_id)?.is_none() {
        return Err(ServiceError::NotFound(format!("{}/{}", SERIALS, vars.serial_id)));
    }

    let now = now_rfc3339();
    let link = InstallationLink {
        id: new_id(),
        installation_code: vars.installation_code.clone(),
        serial_id: vars.serial_id.clone(),
        create_at: Some(now.clone()),
        update_at: Some(now.clone()),
    };
    insert_record(
        db,
        LINKS,
        &link.id,
        &link,
        &[
            ("installation_code", text(&link.installation_code)),
            ("serial_id", text(&link.serial_id)),
            ("create_at", text(&now)),
            ("update_at", text(&now)),
        ],
    )
    .map_err(|e| match e {
        ServiceError::Conflict(_) => {
            ServiceError::Conflict(format!("serial {} is already bound", vars.serial_id))
        }
        other => other,
    })?;
    Ok(LinkData { link })
}

pub(crate) fn stamp_installed_at<E: SQLExec + ?Sized>(
    db: &E,
    vars: &StampVars,
) -> Result<SerialData, ServiceError> {
    let Some(mut serial) = find_record::<_, DeviceSerial>(db, SERIALS, &vars.serial_id)? else {
        return Ok(SerialData { serial: None });
    };
    serial.installed_at = Some(vars.installed_at.clone());
    serial.update_at = Some(now_rfc3339());
    update_record(db, SERIALS, &serial.id, &serial, &serial_indexes(&serial))?;
    Ok(SerialData { serial: Some(serial) })
}

/// Link insert and installed-at stamp; meant to run inside one transaction.
pub(crate) fn install_product<E: SQLExec + ?Sized>(
    db: &E,
    vars: &InstallVars,
) -> Result<InstallData, ServiceError> {
    let LinkData { link } = insert_installation_link(
        db,
        &LinkVars {
            installation_code: vars.installation_code.clone(),
            serial_id: vars.serial_id.clone(),
        },
    )?;
    let stamped = stamp_installed_at(
        db,
        &StampVars {
            serial_id: vars.serial_id.clone(),
            installed_at: vars.installed_at.clone(),
        },
    )?;
    let serial = stamped
        .serial
        .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", SERIALS, vars.serial_id)))?;
    Ok(InstallData { link, serial })
}

pub(crate) fn find_installations_by_code<E: SQLExec + ?Sized>(
    db: &E,
    vars: &CodeVars,
) -> Result<InstallationsData, ServiceError> {
    let links: Vec<InstallationLink> =
        list_by(db, LINKS, "installation_code", text(&vars.installation_code), "rowid ASC")?;
    let installations = links
        .into_iter()
        .map(|link| {
            let serial = find_record(db, SERIALS, &link.serial_id)?;
            Ok(LinkedSerial { link, serial })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;
    Ok(InstallationsData { installations })
}

pub(crate) fn find_customers_by_installation_code<E: SQLExec + ?Sized>(
    db: &E,
    vars: &CodeVars,
) -> Result<CustomersData, ServiceError> {
    let customers =
        list_by(db, CUSTOMERS, "installation_code", text(&vars.installation_code), "port ASC")?;
    Ok(CustomersData { customers })
}

/// Port range is checked against the site's current capacity; port
/// uniqueness is left to the table constraint.
pub(crate) fn insert_customer<E: SQLExec + ?Sized>(
    db: &E,
    vars: &NewCustomerVars,
) -> Result<CustomerData, ServiceError> {
    require(&vars.installation_code, "installation code")?;
    require(&vars.fields.customer_code, "customer id")?;

    let site = find_installations_by_code(
        db,
        &CodeVars {
            installation_code: vars.installation_code.clone(),
        },
    )?;
    let capacity = active_capacity(&site.installations);
    if vars.port == 0 || vars.port > capacity {
        return Err(ServiceError::Validation(format!(
            "port {} is outside 1..={} at installation {}",
            vars.port, capacity, vars.installation_code
        )));
    }

    let now = now_rfc3339();
    let customer = Customer {
        id: new_id(),
        installation_code: vars.installation_code.clone(),
        port: vars.port,
        fields: vars.fields.clone(),
        create_at: Some(now.clone()),
        update_at: Some(now.clone()),
    };
    insert_record(
        db,
        CUSTOMERS,
        &customer.id,
        &customer,
        &[
            ("installation_code", text(&customer.installation_code)),
            ("port", Value::Integer(i64::from(customer.port))),
            ("customer_code", text(&customer.fields.customer_code)),
            ("create_at", text(&now)),
            ("update_at", text(&now)),
        ],
    )
    .map_err(|e| match e {
        ServiceError::Conflict(_) => ServiceError::Conflict(format!(
            "port {} at installation {} is already taken",
            vars.port, vars.installation_code
        )),
        other => other,
    })?;
    Ok(CustomerData { customer })
}

pub(crate) fn delete_installation_link<E: SQLExec + ?Sized>(
    db: &E,
    vars: &IdVars,
) -> Result<DeletedLinkData, ServiceError> {
    let link: Option<InstallationLink> = find_record(db, LINKS, &vars.id)?;
    if link.is_none() || !delete_record(db, LINKS, &vars.id)? {
        return Ok(DeletedLinkData { link: None });
    }
    Ok(DeletedLinkData { link })
}

pub(crate) fn delete_customer<E: SQLExec + ?Sized>(
    db: &E,
    vars: &IdVars,
) -> Result<DeletedCustomerData, ServiceError> {
    let customer: Option<Customer> = find_record(db, CUSTOMERS, &vars.id)?;
    if customer.is_none() || !delete_record(db, CUSTOMERS, &vars.id)? {
        return Ok(DeletedCustomerData { customer: None });
    }
    Ok(DeletedCustomerData { customer })
}

/// Rejected when the site's resulting capacity would strand an occupied port.
pub(crate) fn update_serial_capacity<E: SQLExec + ?Sized>(
    db: &E,
    vars: &CapacityVars,
) -> Result<SerialData, ServiceError> {
    if vars.capacity == 0 {
        return Err(ServiceError::Validation("capacity must be greater than zero".into()));
    }
    let Some(mut serial) = find_record::<_, DeviceSerial>(db, SERIALS, &vars.serial_id)? else {
        return Ok(SerialData { serial: None });
    };

    if let Some(link) = find_one_by::<_, InstallationLink>(db, LINKS, "serial_id", text(&serial.id))? {
        let code = CodeVars {
            installation_code: link.installation_code.clone(),
        };
        let mut site = find_installations_by_code(db, &code)?.installations;
        for entry in site.iter_mut() {
            if let Some(s) = entry.serial.as_mut().filter(|s| s.id == serial.id) {
                s.capacity = Some(vars.capacity);
            }
        }
        let resulting = active_capacity(&site);
        let highest = find_customers_by_installation_code(db, &code)?
            .customers
            .iter()
            .map(|c| c.port)
            .max();
        if let Some(highest) = highest.filter(|p| *p > resulting) {
            return Err(ServiceError::Validation(format!(
                "port {} is occupied at installation {}, capacity cannot drop to {}",
                highest, link.installation_code, resulting
            )));
        }
    }

    serial.capacity = Some(vars.capacity);
    serial.update_at = Some(now_rfc3339());
    update_record(db, SERIALS, &serial.id, &serial, &serial_indexes(&serial))?;
    Ok(SerialData { serial: Some(serial) })
}

/// Inventory intake: the product is created on first use of its name.
pub(crate) fn provision_serial<E: SQLExec + ?Sized>(
    db: &E,
    input: &NewSerial,
) -> Result<DeviceSerial, ServiceError> {
    require(&input.serial_number, "serial number")?;
    require(&input.product_name, "product name")?;

    let now = now_rfc3339();
    let product = match find_one_by::<_, Product>(db, PRODUCTS, "name", text(&input.product_name))? {
        Some(product) => product,
        None => {
            let product = Product {
                id: new_id(),
                name: input.product_name.clone(),
            };
            insert_record(
                db,
                PRODUCTS,
                &product.id,
                &product,
                &[
                    ("name", text(&product.name)),
                    ("create_at", text(&now)),
                    ("update_at", text(&now)),
                ],
            )?;
            product
        }
    };

    let serial = DeviceSerial {
        id: new_id(),
        serial_number: input.serial_number.clone(),
        product,
        capacity: input.capacity,
        capacity_remaining: input.capacity,
        installed_at: None,
        create_at: Some(now.clone()),
        update_at: Some(now),
    };
    insert_record(db, SERIALS, &serial.id, &serial, &serial_indexes(&serial)).map_err(|e| {
        match e {
            ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                "serial number {} already exists",
                input.serial_number
            )),
            other => other,
        }
    })?;
    Ok(serial)
}
