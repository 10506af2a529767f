use std::future::Future;
use std::time::Duration;
use btleplug::api::{BDAddr, Central, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use btleplug::api::Manager as _;
use indexmap::IndexSet;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::device::constants::MAX_SCAN_SECONDS;
use crate::device::types::FoundDevice;
use crate::error::DeviceError;

/// Case-insensitive "name contains filter". Unnamed devices only match an empty filter.
pub fn matches_name_filter(name: Option<&str>, filter: &str) -> bool {
    let filter = filter.trim().to_uppercase();
    match name {
        Some(name) => name.to_uppercase().contains(&filter),
        None => filter.is_empty(),
    }
}

/// When a scan of `duration` started at `start` ends; capped at `MAX_SCAN_SECONDS`.
pub fn scan_deadline(start: Instant, duration: Duration) -> Instant {
    start + duration.min(Duration::from_secs(MAX_SCAN_SECONDS))
}

/// Extracts the address from a `FoundDevice` label ("name - address").
pub fn address_from_label(label: &str) -> &str {
    match label.rsplit_once(" - ") {
        Some((_, address)) => address.trim(),
        None => label.trim(),
    }
}

pub async fn start_scanning(manager: &Manager) -> Result<Vec<Adapter>, DeviceError> {
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(DeviceError::NoAdapter);
    }

    // The relay firmware does not always advertise its service uuid, so filtering happens on the
    // device name instead.
    start_in_order(
        &adapters,
        |adapter| {
            let adapter = adapter.clone();
            async move {
                info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
                adapter.start_scan(ScanFilter::default()).await
            }
        },
        |adapter| {
            let adapter = adapter.clone();
            async move { stop_adapter(&adapter).await }
        },
    ).await?;

    Ok(adapters)
}

/// Starts every item in order. If one fails, the items started before it are stopped again.
async fn start_in_order<T, E, S, SFut, P, PFut>(items: &[T], mut start: S, mut stop: P) -> Result<(), E>
where
    S: FnMut(&T) -> SFut,
    SFut: Future<Output = Result<(), E>>,
    P: FnMut(&T) -> PFut,
    PFut: Future<Output = ()>,
{
    for (index, item) in items.iter().enumerate() {
        if let Err(err) = start(item).await {
            for started in &items[..index] {
                stop(started).await;
            }
            return Err(err);
        }
    }

    Ok(())
}

async fn stop_adapter(adapter: &Adapter) {
    if let Err(err) = adapter.stop_scan().await {
        warn!("Failed to stop scanning: {:?}", err);
    }
}

pub async fn stop_scanning(adapters: &[Adapter]) {
    for adapter in adapters {
        stop_adapter(adapter).await;
    }
}

async fn peripherals_of(adapters: &[Adapter]) -> Vec<Peripheral> {
    let mut result = Vec::new();

    for adapter in adapters {
        match adapter.peripherals().await {
            Ok(peripherals) => result.extend(peripherals),
            Err(err) => warn!("Failed to query BLE adapter for peripherals: {}", err),
        }
    }

    result
}

/// Looks for an already discovered peripheral with the given address.
pub async fn find_peripheral(adapters: &[Adapter], address: BDAddr) -> Option<Peripheral> {
    for peripheral in peripherals_of(adapters).await {
        if peripheral.address() == address {
            return Some(peripheral);
        }
    }

    None
}

/// A scan started by the user. Reports each matching device once.
pub struct ScanSession {
    adapters: Vec<Adapter>,
    deadline: Instant,
    name_filter: String,
    seen: IndexSet<BDAddr>,
}

impl ScanSession {
    pub async fn start(manager: &Manager, duration: Duration, name_filter: String) -> Result<Self, DeviceError> {
        let adapters = start_scanning(manager).await?;

        Ok(ScanSession {
            adapters,
            deadline: scan_deadline(Instant::now(), duration),
            name_filter,
            seen: IndexSet::new(),
        })
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn found_count(&self) -> usize {
        self.seen.len()
    }

    /// Returns the matching devices that were discovered since the previous poll.
    pub async fn poll(&mut self) -> Vec<FoundDevice> {
        let mut found = Vec::new();

        for peripheral in peripherals_of(&self.adapters).await {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                    continue;
                },
            };

            if self.seen.contains(&properties.address) {
                continue;
            }

            if !matches_name_filter(properties.local_name.as_deref(), &self.name_filter) {
                debug!("Ignoring peripheral {} {:?}", properties.address, properties.local_name);
                continue;
            }

            let device = FoundDevice {
                name: properties.local_name.unwrap_or_default(),
                address: properties.address.to_string(),
            };
            info!("Found {}", device);
            self.seen.insert(properties.address);
            found.push(device);
        }

        found
    }

    pub async fn stop(self) {
        stop_scanning(&self.adapters).await;
    }
}
