use std::path::Path;

use fs::file::reader::FileReader;
use tracing::debug;

const SYSFS_NET_DIR: &str = "/sys/class/net";
const NIL_ADDRESS: &str = "00:00:00:00:00:00";

/// Hardware address of the first non-loopback interface, by interface name
/// order. Virtual interfaces with a nil address are skipped.
pub(crate) fn first_non_loopback<F: FileReader>(reader: &F) -> Option<String> {
    let mut interfaces = match reader.dir_entries(Path::new(SYSFS_NET_DIR)) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(%err, "cannot list network interfaces");
            return None;
        }
    };
    interfaces.sort();

    for interface in interfaces {
        let Some(name) = interface.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == "lo" {
            continue;
        }
        let Ok(address) = reader.read(&interface.join("address")) else {
            continue;
        };
        let address = address.trim();
        if !address.is_empty() && address != NIL_ADDRESS {
            return Some(address.to_string());
        }
    }
    None
}
