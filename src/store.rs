//! Device inventory.
//!
//! The dispatcher never touches the store: the CLI reads the selected
//! devices through [`DeviceStore`], closes it, and hands plain [`Device`]
//! values to the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::device::{Device, dedup_devices, validate_device_name};
use crate::error::StoreError;

/// Storage of device records and their tags.
pub trait DeviceStore {
    /// Devices carrying every tag in `tags`; all devices when `tags` is empty.
    fn list_devices(&self, tags: &[String]) -> Vec<Device>;

    fn get_device(&self, name: &str) -> Result<Device, StoreError>;

    fn add_device(&mut self, device: Device) -> Result<(), StoreError>;

    /// Removes a device and returns its record.
    fn remove_device(&mut self, name: &str) -> Result<Device, StoreError>;

    fn tag_device(&mut self, name: &str, tag: &str) -> Result<(), StoreError>;

    fn untag_device(&mut self, name: &str, tag: &str) -> Result<(), StoreError>;

    /// Tags of one device.
    fn device_tags(&self, name: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Every tag with the names of the devices carrying it.
    fn list_tags(&self) -> BTreeMap<String, BTreeSet<String>>;

    /// Persists pending changes.
    fn save(&self) -> Result<(), StoreError>;
}

/// Devices carrying all `tags` plus the devices named in `names`.
///
/// With neither tags nor names every device is selected; with names only,
/// just the named devices are. A name that is not in the store is an error.
pub fn select_devices(
    store: &dyn DeviceStore,
    tags: &[String],
    names: &[String],
) -> Result<Vec<Device>, StoreError> {
    let mut selected = if tags.is_empty() && !names.is_empty() {
        Vec::new()
    } else {
        store.list_devices(tags)
    };
    for name in names {
        selected.push(store.get_device(name)?);
    }
    Ok(dedup_devices(selected))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredDevice {
    #[serde(flatten)]
    device: Device,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    devices: Vec<StoredDevice>,
}

/// A [`DeviceStore`] kept in a single JSON file.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    devices: BTreeMap<String, StoredDevice>,
}

impl JsonStore {
    /// Opens the store at `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => StoreFile::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(err) => return Err(err.into()),
        };
        let devices = file
            .devices
            .into_iter()
            .map(|stored| (stored.device.name.clone(), stored))
            .collect::<BTreeMap<_, _>>();
        debug!("loaded {} device(s) from {}", devices.len(), path.display());
        Ok(Self { path, devices })
    }

    /// Creates an empty store file at `path`, replacing any existing one.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            devices: BTreeMap::new(),
        };
        store.save()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn stored_mut(&mut self, name: &str) -> Result<&mut StoredDevice, StoreError> {
        self.devices
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

impl DeviceStore for JsonStore {
    fn list_devices(&self, tags: &[String]) -> Vec<Device> {
        self.devices
            .values()
            .filter(|stored| tags.iter().all(|tag| stored.tags.contains(tag)))
            .map(|stored| stored.device.clone())
            .collect()
    }

    fn get_device(&self, name: &str) -> Result<Device, StoreError> {
        self.devices
            .get(name)
            .map(|stored| stored.device.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn add_device(&mut self, device: Device) -> Result<(), StoreError> {
        validate_device_name(&device.name).map_err(|reason| StoreError::InvalidName {
            name: device.name.clone(),
            reason,
        })?;
        if self.devices.contains_key(&device.name) {
            return Err(StoreError::AlreadyExists(device.name));
        }
        self.devices.insert(
            device.name.clone(),
            StoredDevice {
                device,
                tags: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn remove_device(&mut self, name: &str) -> Result<Device, StoreError> {
        self.devices
            .remove(name)
            .map(|stored| stored.device)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn tag_device(&mut self, name: &str, tag: &str) -> Result<(), StoreError> {
        let stored = self.stored_mut(name)?;
        if !stored.tags.insert(tag.to_string()) {
            return Err(StoreError::AlreadyTagged(name.to_string(), tag.to_string()));
        }
        Ok(())
    }

    fn untag_device(&mut self, name: &str, tag: &str) -> Result<(), StoreError> {
        let stored = self.stored_mut(name)?;
        if !stored.tags.remove(tag) {
            return Err(StoreError::NotTagged(name.to_string(), tag.to_string()));
        }
        Ok(())
    }

    fn device_tags(&self, name: &str) -> Result<BTreeSet<String>, StoreError> {
        self.devices
            .get(name)
            .map(|stored| stored.tags.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list_tags(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for stored in self.devices.values() {
            for tag in &stored.tags {
                tags.entry(tag.clone())
                    .or_default()
                    .insert(stored.device.name.clone());
            }
        }
        tags
    }

    /// Writes a temporary file next to the store and renames it into place.
    fn save(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            devices: self.devices.values().cloned().collect(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, contents.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "saved {} device(s) to {}",
            self.devices.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Writes `contents` to `path`, readable and writable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies when the file is created.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::write(path, contents)
}
