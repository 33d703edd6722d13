//! Read-only device metadata keyed by hardware address.
//!
//! The directory is a CSV sheet with the columns `MAC Addr, Device Name, Tipo, Descripción, Owner`
//! (English headers `Device, Name, Type, Description, Owner` are accepted too). A missing file is
//! an empty directory. Lookups return `Option`; an unknown device is a normal outcome.

use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use wifitrack_core::DeviceId;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub device_type: String,
    pub description: String,
    pub owner: String,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "MAC Addr", alias = "Device", alias = "MAC", default)]
    mac: Option<String>,
    #[serde(rename = "Device Name", alias = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Tipo", alias = "Type", default)]
    device_type: Option<String>,
    #[serde(rename = "Descripción", alias = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Owner", default)]
    owner: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<DeviceId, DirectoryEntry>,
}

impl Directory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a CSV file. A missing file yields an empty directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no device directory at {}; devices will show as Unknown", path.display());
            return Ok(Self::empty());
        }
        let dir = Self::from_reader(std::fs::File::open(path)?)?;
        info!("loaded {} devices from {}", dir.len(), path.display());
        Ok(dir)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectoryError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(reader);
        let mut entries = Vec::new();
        for (n, row) in rdr.deserialize::<Row>().enumerate() {
            let row = row?;
            let Some(id) = row.mac.as_deref().and_then(DeviceId::parse) else {
                warn!("directory row {} has no address; skipped", n + 2);
                continue;
            };
            entries.push((
                id,
                DirectoryEntry {
                    name: row.name.unwrap_or_default(),
                    device_type: row.device_type.unwrap_or_default(),
                    description: row.description.unwrap_or_default(),
                    owner: row.owner.unwrap_or_default(),
                },
            ));
        }
        Ok(Self::from_entries(entries))
    }

    /// Build from explicit pairs. The first entry for an address wins.
    pub fn from_entries<I: IntoIterator<Item = (DeviceId, DirectoryEntry)>>(entries: I) -> Self {
        let mut map = HashMap::new();
        for (id, e) in entries {
            map.entry(id).or_insert(e);
        }
        Directory { entries: map }
    }

    pub fn resolve(&self, id: &DeviceId) -> Option<&DirectoryEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHEET: &str = "MAC Addr,Device Name,Tipo,Descripción,Owner\n\
AA:BB:CC:DD:EE:01, Laptop ,PC,Work laptop,Omar\n\
,Orphan,PC,no address,Nobody\n\
aa:bb:cc:dd:ee:01,Duplicate,PC,second row,Someone\n\
11:22:33:44:55:66,Printer,,,\n";

    #[test]
    fn resolves_case_insensitively_and_first_row_wins() {
        let dir = Directory::from_reader(SHEET.as_bytes()).unwrap();
        assert_eq!(dir.len(), 2);
        let e = dir.resolve(&DeviceId::from("aa:bb:cc:dd:ee:01")).unwrap();
        assert_eq!(e.name, "Laptop");
        assert_eq!(e.device_type, "PC");
        assert_eq!(e.description, "Work laptop");
        assert_eq!(e.owner, "Omar");
    }

    #[test]
    fn empty_cells_become_empty_strings() {
        let dir = Directory::from_reader(SHEET.as_bytes()).unwrap();
        let e = dir.resolve(&DeviceId::from("11:22:33:44:55:66")).unwrap();
        assert_eq!(e.name, "Printer");
        assert!(e.owner.is_empty());
    }

    #[test]
    fn unknown_device_is_none() {
        let dir = Directory::from_reader(SHEET.as_bytes()).unwrap();
        assert!(dir.resolve(&DeviceId::from("00:00:00:00:00:00")).is_none());
    }

    #[test]
    fn english_headers_are_accepted() {
        let sheet = "Device,Name,Type,Description,Owner\nde:ad:be:ef:00:01,Phone,Mobile,Android,Ana\n";
        let dir = Directory::from_reader(sheet.as_bytes()).unwrap();
        assert_eq!(dir.resolve(&DeviceId::from("DE:AD:BE:EF:00:01")).unwrap().device_type, "Mobile");
    }

    #[test]
    fn missing_file_is_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Directory::load(tmp.path().join("devices.csv")).unwrap();
        assert!(dir.is_empty());
    }

    #[test]
    fn load_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(SHEET.as_bytes()).unwrap();
        let dir = Directory::load(f.path()).unwrap();
        assert_eq!(dir.len(), 2);
    }
}
