//! Stable per-host device identification.
//!
//! The identifier is resolved from the first available source: the systemd
//! machine-id file, the hostname, the hardware address of the first
//! non-loopback network interface, and finally a fixed fallback literal.

use std::path::Path;

use fs::file::reader::FileReader;
use fs::LocalFile;
use tracing::debug;

pub mod hostname;
mod mac;

use crate::hostname::{Hostname, HostnameGetter};

/// Returned when no identification source is available on the host.
pub const UNKNOWN_DEVICE: &str = "unknown-device";

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

pub struct DeviceIdProvider<F = LocalFile, H = HostnameGetter>
where
    F: FileReader,
    H: Hostname,
{
    file_reader: F,
    hostname_getter: H,
}

impl Default for DeviceIdProvider {
    fn default() -> Self {
        Self {
            file_reader: LocalFile,
            hostname_getter: HostnameGetter,
        }
    }
}

impl<F, H> DeviceIdProvider<F, H>
where
    F: FileReader,
    H: Hostname,
{
    pub fn new(file_reader: F, hostname_getter: H) -> Self {
        Self {
            file_reader,
            hostname_getter,
        }
    }

    /// Resolves the device identifier. Infallible: every source miss falls
    /// through to the next one, ending at [UNKNOWN_DEVICE].
    pub fn provide(&self) -> String {
        if let Some(machine_id) = self.machine_id() {
            return machine_id;
        }
        if let Some(hostname) = self.hostname() {
            return hostname;
        }
        if let Some(mac) = mac::first_non_loopback(&self.file_reader) {
            return mac;
        }
        debug!("no device identification source available, using fallback");
        UNKNOWN_DEVICE.to_string()
    }

    fn machine_id(&self) -> Option<String> {
        for path in MACHINE_ID_PATHS {
            match self.file_reader.read(Path::new(path)) {
                Ok(contents) => {
                    let machine_id = contents.trim();
                    if !machine_id.is_empty() {
                        return Some(machine_id.to_string());
                    }
                }
                Err(err) => debug!(path, %err, "machine-id source unavailable"),
            }
        }
        None
    }

    fn hostname(&self) -> Option<String> {
        match self.hostname_getter.get() {
            Ok(hostname) => {
                let hostname = hostname.into_string().unwrap_or_default();
                (!hostname.is_empty()).then_some(hostname)
            }
            Err(err) => {
                debug!(%err, "hostname unavailable");
                None
            }
        }
    }
}
