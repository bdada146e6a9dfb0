//! Secret registry.
//!
//! Secrets are keyed by UUID and by their usage (`"<type>:<id>"`), so two
//! secrets can never serve the same volume, Ceph client or iSCSI target.
//! Definitions live in `<config_dir>/<uuid>.json`, values base64-encoded in
//! `<config_dir>/<uuid>.base64`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{PoolObjError, Result};
use crate::object::{LockedPoolObj, PoolObj};
use crate::persist;
use crate::table::{AclFilterFn, AssignDefFn, MatchFilterFn, PoolObjTable};
use crate::types::{PoolObjEntry, PoolObjTableType};

const BASE64_EXT: &str = "base64";

/// A secret object.
pub type SecretObj = PoolObj<SecretDef, SecretPrivate>;

/// A locked, referenced secret.
pub type LockedSecret = LockedPoolObj<SecretDef, SecretPrivate>;

/// What a secret is used for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretUsage {
    #[default]
    None,
    /// Encrypted volume, by path
    Volume { volume: String },
    /// Ceph client
    Ceph { name: String },
    /// iSCSI target
    Iscsi { target: String },
    /// TLS credentials
    Tls { name: String },
    /// Virtual TPM state
    Vtpm { name: String },
}

impl SecretUsage {
    pub fn usage_type(&self) -> &'static str {
        match self {
            SecretUsage::None => "none",
            SecretUsage::Volume { .. } => "volume",
            SecretUsage::Ceph { .. } => "ceph",
            SecretUsage::Iscsi { .. } => "iscsi",
            SecretUsage::Tls { .. } => "tls",
            SecretUsage::Vtpm { .. } => "vtpm",
        }
    }

    pub fn usage_id(&self) -> Option<&str> {
        match self {
            SecretUsage::None => None,
            SecretUsage::Volume { volume } => Some(volume),
            SecretUsage::Ceph { name }
            | SecretUsage::Tls { name }
            | SecretUsage::Vtpm { name } => Some(name),
            SecretUsage::Iscsi { target } => Some(target),
        }
    }

    /// `"<type>:<id>"`, or `None` for secrets without a usage.
    pub fn key(&self) -> Option<String> {
        self.usage_id()
            .map(|id| format!("{}:{}", self.usage_type(), id))
    }
}

/// Secret definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDef {
    pub uuid: Uuid,
    #[serde(default)]
    pub usage: SecretUsage,
    #[serde(default)]
    pub description: Option<String>,
    /// Never written to disk
    #[serde(default)]
    pub ephemeral: bool,
    /// Value may not be read back through the public API
    #[serde(default)]
    pub private: bool,
}

impl SecretDef {
    pub fn new(uuid: Uuid, usage: SecretUsage) -> Self {
        Self {
            uuid,
            usage,
            description: None,
            ephemeral: false,
            private: false,
        }
    }

    /// Name-table key: the usage key, or the UUID for usage-less secrets.
    fn table_key(&self) -> String {
        self.usage.key().unwrap_or_else(|| self.uuid.to_string())
    }
}

/// Secret bytes, zeroed when dropped.
pub struct SecretValue(Vec<u8>);

impl SecretValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for SecretValue {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for SecretValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(<{} bytes>)", self.0.len())
    }
}

/// Per-secret driver state.
#[derive(Debug)]
pub struct SecretPrivate {
    config_file: PathBuf,
    base64_file: PathBuf,
    value: Option<SecretValue>,
}

impl SecretPrivate {
    fn new(config_dir: &Path, uuid: &Uuid) -> Self {
        let stem = uuid.to_string();
        Self {
            config_file: persist::build_path(config_dir, &stem, persist::JSON_EXT),
            base64_file: persist::build_path(config_dir, &stem, BASE64_EXT),
            value: None,
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn base64_file(&self) -> &Path {
        &self.base64_file
    }

    pub fn value(&self) -> Option<&SecretValue> {
        self.value.as_ref()
    }

    /// Size of the value in bytes, 0 if unset.
    pub fn value_size(&self) -> usize {
        self.value.as_ref().map_or(0, SecretValue::len)
    }
}

fn assign_secret_def(
    obj: &mut SecretObj,
    def: SecretDef,
    old_def: Option<&mut Option<SecretDef>>,
    _flags: u32,
) -> Result<()> {
    if obj.def().private && !def.private {
        return Err(PoolObjError::OperationInvalid(
            "cannot change private flag on existing secret".to_string(),
        ));
    }

    let previous = obj.replace_def(def);
    if let Some(slot) = old_def {
        *slot = Some(previous);
    }
    Ok(())
}

bitflags! {
    /// Filters for [`SecretList::export`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListSecretsFlags: u32 {
        const EPHEMERAL = 1 << 0;
        const NO_EPHEMERAL = 1 << 1;
        const PRIVATE = 1 << 2;
        const NO_PRIVATE = 1 << 3;

        const FILTERS_EPHEMERAL = Self::EPHEMERAL.bits() | Self::NO_EPHEMERAL.bits();
        const FILTERS_PRIVATE = Self::PRIVATE.bits() | Self::NO_PRIVATE.bits();
    }
}

fn secret_matches(obj: &SecretObj, flags: u32) -> bool {
    let flags = ListSecretsFlags::from_bits_truncate(flags);
    let def = obj.def();

    if flags.intersects(ListSecretsFlags::FILTERS_EPHEMERAL)
        && !((flags.contains(ListSecretsFlags::EPHEMERAL) && def.ephemeral)
            || (flags.contains(ListSecretsFlags::NO_EPHEMERAL) && !def.ephemeral))
    {
        return false;
    }

    if flags.intersects(ListSecretsFlags::FILTERS_PRIVATE)
        && !((flags.contains(ListSecretsFlags::PRIVATE) && def.private)
            || (flags.contains(ListSecretsFlags::NO_PRIVATE) && !def.private))
    {
        return false;
    }

    true
}

/// Public handle to a secret, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretHandle {
    pub uuid: Uuid,
    pub usage: SecretUsage,
}

/// The host's secrets.
#[derive(Debug)]
pub struct SecretList {
    secrets: PoolObjTable<SecretDef, SecretPrivate>,
}

impl SecretList {
    pub fn new() -> Self {
        Self {
            secrets: PoolObjTable::with_default_size(PoolObjTableType::Secret, false),
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Define a secret or redefine the one with the same UUID.
    ///
    /// A redefinition must keep the usage, and a private secret cannot be
    /// made public. The replaced definition is handed back through
    /// `old_def`, which is cleared first. New secrets get their file paths
    /// under `config_dir`.
    #[instrument(skip(self, def, old_def), fields(uuid = %def.uuid, usage = ?def.usage.key()))]
    pub fn add(
        &self,
        def: SecretDef,
        config_dir: &Path,
        mut old_def: Option<&mut Option<SecretDef>>,
    ) -> Result<LockedSecret> {
        if let Some(slot) = old_def.as_mut() {
            **slot = None;
        }

        let uuid = def.uuid;
        let entry = PoolObjEntry::new(def.table_key(), def).with_uuid(uuid);
        let assign: &AssignDefFn<SecretDef, SecretPrivate> = &assign_secret_def;

        let mut obj = self.secrets.add(entry, Some(assign), old_def, 0)?;
        if obj.private_data().is_none() {
            obj.set_private_data(SecretPrivate::new(config_dir, &uuid));
        }
        Ok(obj)
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<LockedSecret> {
        self.secrets.find_by_uuid(uuid)
    }

    /// Find the secret serving `usage`. Never matches [`SecretUsage::None`].
    pub fn find_by_usage(&self, usage: &SecretUsage) -> Option<LockedSecret> {
        self.secrets.find_by_name(&usage.key()?)
    }

    pub fn remove(&self, obj: LockedSecret) {
        self.secrets.remove(obj);
    }

    /// Count secrets visible through `acl`.
    pub fn num_of_secrets<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, SecretDef>>,
    ) -> usize {
        self.secrets.list(conn, acl, |_| Ok(())).unwrap_or(0)
    }

    /// UUIDs of at most `max` secrets visible through `acl`.
    pub fn get_uuids<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, SecretDef>>,
        max: usize,
    ) -> Result<Vec<Uuid>> {
        let mut uuids = Vec::new();
        self.secrets.list(conn, acl, |obj| {
            if uuids.len() < max {
                uuids.push(obj.def().uuid);
            }
            Ok(())
        })?;
        Ok(uuids)
    }

    /// Handles for every secret visible through `acl` and passing `flags`.
    pub fn export<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, SecretDef>>,
        flags: ListSecretsFlags,
    ) -> Vec<SecretHandle> {
        let matchf: &MatchFilterFn<SecretDef, SecretPrivate> = &secret_matches;
        self.secrets
            .collect(conn, acl, Some(matchf), flags.bits())
            .iter()
            .map(|shared| {
                let obj = shared.lock();
                SecretHandle {
                    uuid: obj.def().uuid,
                    usage: obj.def().usage.clone(),
                }
            })
            .collect()
    }

    /// Load every `<uuid>.json` secret under `config_dir` along with its
    /// value, if one was saved.
    ///
    /// Bad entries are logged and skipped. Returns the number loaded.
    #[instrument(skip(self))]
    pub fn load_all_configs(&self, config_dir: &Path) -> Result<usize> {
        let mut loaded = 0;

        for config_file in persist::list_files(config_dir, persist::JSON_EXT)? {
            match self.load_one(config_dir, &config_file) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "Error reading secret")
                }
            }
        }

        info!(count = loaded, "Secrets loaded");
        Ok(loaded)
    }

    fn load_one(&self, config_dir: &Path, config_file: &Path) -> Result<()> {
        let def: SecretDef = persist::read_json(config_file)?;

        let uuid = def.uuid.to_string();
        if persist::file_stem(config_file) != Some(uuid.as_str()) {
            return Err(PoolObjError::InvalidArgument(format!(
                "<uuid> does not match secret file name '{}'",
                config_file.display()
            )));
        }

        let mut obj = self.add(def, config_dir, None)?;
        match obj.load_value() {
            Ok(()) => {
                debug!(uuid = %uuid, has_value = obj.secret_private()?.value.is_some(), "Loaded secret");
                Ok(())
            }
            Err(e) => {
                self.remove(obj);
                Err(e)
            }
        }
    }
}

impl Default for SecretList {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_private(name: &str) -> PoolObjError {
    PoolObjError::Internal(format!("secret '{}' has no private data", name))
}

impl PoolObj<SecretDef, SecretPrivate> {
    /// The secret's sidecar; attached by [`SecretList::add`].
    pub fn secret_private(&self) -> Result<&SecretPrivate> {
        self.private_data().ok_or_else(|| missing_private(self.name()))
    }

    fn secret_private_mut(&mut self) -> Result<&mut SecretPrivate> {
        let name = self.name().to_string();
        self.private_data_mut().ok_or_else(|| missing_private(&name))
    }

    /// Write the definition to its config file.
    #[instrument(skip(self), fields(uuid = %self.def().uuid))]
    pub fn save_config(&self) -> Result<()> {
        let config_file = &self.secret_private()?.config_file;
        persist::write_json(config_file, self.def(), persist::PRIVATE_MODE)
    }

    /// Write the value, if any, base64-encoded to its value file.
    #[instrument(skip(self), fields(uuid = %self.def().uuid))]
    pub fn save_data(&self) -> Result<()> {
        let private = self.secret_private()?;
        let Some(value) = &private.value else {
            return Ok(());
        };

        let encoded = Zeroizing::new(STANDARD.encode(value.as_bytes()));
        persist::write_file(&private.base64_file, encoded.as_bytes(), persist::PRIVATE_MODE)
    }

    /// Delete the config file of a persistent secret.
    pub fn delete_config(&self) -> Result<()> {
        if self.def().ephemeral {
            return Ok(());
        }
        persist::remove_file(&self.secret_private()?.config_file)
    }

    /// Delete the value file. Failure is only logged: with the config gone
    /// the secret will not be loaded again anyway.
    pub fn delete_data(&self) {
        let Ok(private) = self.secret_private() else {
            return;
        };
        if let Err(e) = persist::remove_file(&private.base64_file) {
            warn!(file = %private.base64_file.display(), error = %e, "Failed to delete secret value");
        }
    }

    /// A copy of the secret value.
    pub fn get_value(&self) -> Result<Vec<u8>> {
        self.secret_private()?
            .value
            .as_ref()
            .map(|value| value.as_bytes().to_vec())
            .ok_or_else(|| {
                PoolObjError::NoSecret(format!(
                    "secret '{}' does not have a value",
                    self.def().uuid
                ))
            })
    }

    /// Replace the value, persisting it unless the secret is ephemeral.
    ///
    /// If persisting fails the previous value is restored.
    #[instrument(skip(self, value), fields(uuid = %self.def().uuid, size = value.len()))]
    pub fn set_value(&mut self, value: &[u8]) -> Result<()> {
        let old = self
            .secret_private_mut()?
            .value
            .replace(SecretValue::from(value));

        if !self.def().ephemeral {
            if let Err(e) = self.save_data() {
                self.secret_private_mut()?.value = old;
                return Err(e);
            }
        }

        debug!("Secret value updated");
        Ok(())
    }

    /// Read the value file, if there is one.
    fn load_value(&mut self) -> Result<()> {
        let base64_file = self.secret_private()?.base64_file.clone();
        let contents = match fs::read(&base64_file) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(PoolObjError::io(&base64_file, e)),
        };

        let decoded = STANDARD.decode(contents.trim_ascii()).map_err(|_| {
            PoolObjError::Serialization(format!("invalid base64 in '{}'", base64_file.display()))
        })?;

        self.secret_private_mut()?.value = Some(SecretValue::from(decoded));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ceph(name: &str) -> SecretDef {
        SecretDef::new(
            Uuid::new_v4(),
            SecretUsage::Ceph {
                name: name.to_string(),
            },
        )
    }

    #[test]
    fn test_usage_keys() {
        assert_eq!(
            SecretUsage::Volume {
                volume: "/var/lib/images/enc.qcow2".to_string()
            }
            .key()
            .as_deref(),
            Some("volume:/var/lib/images/enc.qcow2")
        );
        assert_eq!(SecretUsage::None.key(), None);

        let def = SecretDef::new(Uuid::nil(), SecretUsage::None);
        assert_eq!(def.table_key(), Uuid::nil().to_string());
    }

    #[test]
    fn test_add_and_find() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let def = ceph("client.admin");
        let uuid = def.uuid;
        drop(list.add(def.clone(), dir.path(), None).unwrap());

        let by_uuid = list.find_by_uuid(&uuid).unwrap();
        assert_eq!(by_uuid.def(), &def);
        assert_eq!(
            by_uuid.secret_private().unwrap().config_file(),
            dir.path().join(format!("{}.json", uuid))
        );
        drop(by_uuid);

        assert!(list.find_by_usage(&def.usage).is_some());
        assert!(list.find_by_usage(&SecretUsage::None).is_none());
    }

    #[test]
    fn test_redefine_returns_old_def() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let def = ceph("client.admin");
        drop(list.add(def.clone(), dir.path(), None).unwrap());

        let mut updated = def.clone();
        updated.description = Some("rbd pool key".to_string());
        let mut old = Some(ceph("stale"));
        let obj = list.add(updated.clone(), dir.path(), Some(&mut old)).unwrap();

        assert_eq!(old, Some(def));
        assert_eq!(obj.def(), &updated);
        drop(obj);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_usage_and_uuid_conflicts() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let def = ceph("client.admin");
        drop(list.add(def.clone(), dir.path(), None).unwrap());

        // same usage, different uuid
        let err = list.add(ceph("client.admin"), dir.path(), None).unwrap_err();
        assert!(matches!(err, PoolObjError::OperationFailed(_)));

        // same uuid, different usage
        let mut moved = def.clone();
        moved.usage = SecretUsage::Iscsi {
            target: "iqn.2024-01.local:storage".to_string(),
        };
        let err = list.add(moved, dir.path(), None).unwrap_err();
        assert!(matches!(err, PoolObjError::OperationFailed(_)));

        assert_eq!(list.find_by_uuid(&def.uuid).unwrap().def(), &def);
    }

    #[test]
    fn test_private_flag_cannot_be_dropped() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let mut def = ceph("client.admin");
        def.private = true;
        drop(list.add(def.clone(), dir.path(), None).unwrap());

        let mut public = def.clone();
        public.private = false;
        let err = list.add(public, dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("cannot change private flag"));
        assert!(list.find_by_uuid(&def.uuid).unwrap().def().private);
    }

    #[test]
    fn test_set_and_get_value() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let mut obj = list.add(ceph("client.admin"), dir.path(), None).unwrap();

        assert!(matches!(obj.get_value(), Err(PoolObjError::NoSecret(_))));

        obj.set_value(b"AQBzd2VldHNlY3JldA==").unwrap();
        assert_eq!(obj.get_value().unwrap(), b"AQBzd2VldHNlY3JldA==");
        assert_eq!(obj.secret_private().unwrap().value_size(), 20);

        let stored = fs::read_to_string(obj.secret_private().unwrap().base64_file()).unwrap();
        assert_eq!(STANDARD.decode(stored).unwrap(), b"AQBzd2VldHNlY3JldA==");
    }

    #[test]
    fn test_ephemeral_value_not_persisted() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let mut def = ceph("client.scratch");
        def.ephemeral = true;
        let mut obj = list.add(def, dir.path(), None).unwrap();

        obj.set_value(b"scratch").unwrap();
        assert!(!obj.secret_private().unwrap().base64_file().exists());
        obj.delete_config().unwrap();
    }

    #[test]
    fn test_set_value_restores_on_failure() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("secrets");
        let list = SecretList::new();
        let mut obj = list.add(ceph("client.admin"), &config_dir, None).unwrap();
        obj.set_value(b"first").unwrap();

        // Replace the directory by a plain file so the next write fails.
        fs::remove_dir_all(&config_dir).unwrap();
        fs::write(&config_dir, b"").unwrap();

        assert!(obj.set_value(b"second").is_err());
        assert_eq!(obj.get_value().unwrap(), b"first");
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_files_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let mut obj = list.add(ceph("client.admin"), dir.path(), None).unwrap();
        obj.save_config().unwrap();
        obj.set_value(b"topsecret").unwrap();

        let private = obj.secret_private().unwrap();
        for path in [private.config_file(), private.base64_file()] {
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0, "{} has mode {:o}", path.display(), mode);
        }
    }

    #[test]
    fn test_failed_value_write_leaves_no_copy() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let mut obj = list.add(ceph("client.admin"), dir.path(), None).unwrap();
        obj.set_value(b"first").unwrap();

        // A non-empty directory in place of the value file makes the rename fail.
        let base64_file = obj.secret_private().unwrap().base64_file().to_path_buf();
        fs::remove_file(&base64_file).unwrap();
        fs::create_dir_all(base64_file.join("blocker")).unwrap();

        assert!(obj.set_value(b"topsecret").is_err());
        assert_eq!(obj.get_value().unwrap(), b"first");

        let encoded = STANDARD.encode(b"topsecret");
        for entry in fs::read_dir(dir.path()).unwrap() {
            let path = entry.unwrap().path();
            if path.is_file() {
                let contents = fs::read_to_string(&path).unwrap();
                assert!(!contents.contains(&encoded), "{} holds the value", path.display());
            }
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let def = ceph("client.admin");
        let uuid = def.uuid;
        let mut obj = list.add(def.clone(), dir.path(), None).unwrap();
        obj.save_config().unwrap();
        obj.set_value(b"hunter2").unwrap();
        drop(obj);

        let no_value = ceph("client.novalue");
        let obj = list.add(no_value.clone(), dir.path(), None).unwrap();
        obj.save_config().unwrap();
        drop(obj);

        // file name not matching the uuid inside
        persist::write_json(
            &dir.path().join("wrong.json"),
            &ceph("client.wrong"),
            persist::PUBLIC_MODE,
        )
        .unwrap();
        fs::write(dir.path().join(format!("{}.base64", Uuid::new_v4())), b"orphan").unwrap();

        let reloaded = SecretList::new();
        assert_eq!(reloaded.load_all_configs(dir.path()).unwrap(), 2);
        let obj = reloaded.find_by_uuid(&uuid).unwrap();
        assert_eq!(obj.def(), &def);
        assert_eq!(obj.get_value().unwrap(), b"hunter2");

        obj.delete_config().unwrap();
        obj.delete_data();
        assert!(!obj.secret_private().unwrap().config_file().exists());
        assert!(!obj.secret_private().unwrap().base64_file().exists());
        drop(obj);

        let obj = reloaded.find_by_uuid(&no_value.uuid).unwrap();
        assert!(obj.get_value().is_err());
    }

    #[test]
    fn test_invalid_base64_skips_secret() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();
        let def = ceph("client.admin");
        list.add(def.clone(), dir.path(), None)
            .unwrap()
            .save_config()
            .unwrap();
        fs::write(dir.path().join(format!("{}.base64", def.uuid)), b"!!not base64!!").unwrap();

        let reloaded = SecretList::new();
        assert_eq!(reloaded.load_all_configs(dir.path()).unwrap(), 0);
        assert!(reloaded.find_by_uuid(&def.uuid).is_none());
    }

    #[test]
    fn test_counts_and_export_filters() {
        let dir = TempDir::new().unwrap();
        let list = SecretList::new();

        let mut private = ceph("client.private");
        private.private = true;
        let mut ephemeral = ceph("client.ephemeral");
        ephemeral.ephemeral = true;
        for def in [ceph("client.plain"), private.clone(), ephemeral.clone()] {
            drop(list.add(def, dir.path(), None).unwrap());
        }

        assert_eq!(list.num_of_secrets(&(), None), 3);
        let hide_private: &AclFilterFn<(), SecretDef> = &|_, def| !def.private;
        assert_eq!(list.num_of_secrets(&(), Some(hide_private)), 2);
        assert_eq!(list.get_uuids(&(), None, 2).unwrap().len(), 2);

        let handles = list.export(&(), None, ListSecretsFlags::PRIVATE);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].uuid, private.uuid);

        let handles = list.export(
            &(),
            None,
            ListSecretsFlags::NO_EPHEMERAL | ListSecretsFlags::NO_PRIVATE,
        );
        assert_eq!(handles.len(), 1);
        assert_eq!(
            handles[0].usage,
            SecretUsage::Ceph {
                name: "client.plain".to_string()
            }
        );

        assert_eq!(list.export(&(), None, ListSecretsFlags::FILTERS_EPHEMERAL).len(), 3);
    }

    #[test]
    fn test_secret_value_debug_is_redacted() {
        let value = SecretValue::from(&b"hunter2"[..]);
        assert_eq!(format!("{:?}", value), "SecretValue(<7 bytes>)");
    }
}
