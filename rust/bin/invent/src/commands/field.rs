//! One-shot field operations against the record store.

use std::sync::Arc;

use anyhow::Result;
use install::model::{Customer, CustomerFields};
use install::{
    BindMode, DismantleHandler, InstallationBinder, PortAllocator, Resolution, SerialResolver,
    UuidGenerator,
};
use invent_remote::RemoteService;
use serde_json::json;

use super::{print_json, Output};

pub async fn resolve(remote: Arc<dyn RemoteService>, serial: &str, output: Output) -> Result<()> {
    let resolution = SerialResolver::new(remote).resolve(serial).await?;
    if output == Output::Json {
        return print_json(&resolution);
    }
    print_resolution(&resolution);
    Ok(())
}

pub async fn bind(
    remote: Arc<dyn RemoteService>,
    serial: &str,
    site: Option<&str>,
    mode: BindMode,
    output: Output,
) -> Result<()> {
    let resolution = SerialResolver::new(Arc::clone(&remote)).resolve(serial).await?;
    let link = InstallationBinder::new(remote, Arc::new(UuidGenerator))
        .with_mode(mode)
        .bind(&resolution, site)
        .await?;
    if output == Output::Json {
        return print_json(&link);
    }
    println!("{} bound to installation {} (link {})", serial, link.installation_code, link.id);
    Ok(())
}

pub async fn ports(remote: Arc<dyn RemoteService>, code: &str, output: Output) -> Result<()> {
    let allocator = PortAllocator::new(remote);
    let devices = allocator.site_devices(code).await?;
    let customers = allocator.customers(code).await?;
    let free = allocator.available_ports(code).await?;

    if output == Output::Json {
        return print_json(&json!({
            "installationCode": code,
            "devices": devices,
            "customers": customers,
            "freePorts": free,
        }));
    }

    println!("Installation {}", code);
    println!("{:10} {:24} {:10} {}", "ROLE", "SERIAL", "CAPACITY", "LINK");
    for device in &devices {
        let (serial, capacity) = match &device.serial {
            Some(s) => (
                s.serial_number.as_str(),
                s.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            ),
            None => ("(missing)", "-".to_string()),
        };
        println!("{:10} {:24} {:10} {}", format!("{:?}", device.role), serial, capacity, device.link.id);
    }
    println!();
    print_customers(&customers);
    let free: Vec<String> = free.iter().map(u32::to_string).collect();
    println!(
        "Free ports: {}",
        if free.is_empty() { "none".to_string() } else { free.join(", ") }
    );
    Ok(())
}

pub async fn assign(
    remote: Arc<dyn RemoteService>,
    code: &str,
    port: Option<u32>,
    fields: CustomerFields,
    output: Output,
) -> Result<()> {
    let allocator = PortAllocator::new(remote);
    let customer = match port {
        Some(port) => allocator.assign(code, port, fields).await?,
        None => allocator.assign_first_free(code, fields).await?,
    };
    if output == Output::Json {
        return print_json(&customer);
    }
    println!(
        "Customer {} provisioned on port {} of installation {} (id {})",
        customer.fields.customer_code, customer.port, customer.installation_code, customer.id
    );
    Ok(())
}

pub async fn capacity(remote: Arc<dyn RemoteService>, serial: &str, capacity: u32) -> Result<()> {
    let resolution = SerialResolver::new(Arc::clone(&remote)).resolve(serial).await?;
    let updated = PortAllocator::new(remote).update_capacity(&resolution, capacity).await?;
    println!(
        "{} now has {} ports",
        updated.serial_number,
        updated.capacity.unwrap_or(0)
    );
    Ok(())
}

pub async fn detach(remote: Arc<dyn RemoteService>, link_id: &str) -> Result<()> {
    DismantleHandler::new(remote).detach_installation(link_id).await?;
    println!("Installation link {} removed.", link_id);
    Ok(())
}

pub async fn dismantle(remote: Arc<dyn RemoteService>, customer_id: &str) -> Result<()> {
    DismantleHandler::new(remote).dismantle_customer(customer_id).await?;
    println!("Customer {} removed.", customer_id);
    Ok(())
}

pub(crate) fn print_resolution(resolution: &Resolution) {
    let serial = &resolution.serial;
    println!("Serial:       {}", serial.serial_number);
    println!("Product:      {}", serial.product.name);
    println!(
        "Capacity:     {}",
        serial.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
    );
    println!("Installed at: {}", serial.installed_at.as_deref().unwrap_or("-"));
    match &resolution.link {
        Some(link) => println!("Installation: {} (link {})", link.installation_code, link.id),
        None => println!("Installation: not bound"),
    }
}

fn print_customers(customers: &[Customer]) {
    if customers.is_empty() {
        println!("No customers.");
        return;
    }
    println!("{:6} {:16} {:32} {:16} {}", "PORT", "CUSTOMER", "ADDRESS", "SERVICE", "ID");
    for c in customers {
        println!(
            "{:<6} {:16} {:32} {:16} {}",
            c.port, c.fields.customer_code, c.fields.address, c.fields.service, c.id
        );
    }
}
