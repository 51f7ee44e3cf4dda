//! The manager registry: a named collection of independent entry stores,
//! at most one of which is the default at any time.
//!
//! The registry is the explicit context object for everything that used
//! to be ambient state: the default manager, the pre-hash toggle and the
//! working snapshot path all live here, and callers thread a registry
//! handle (usually an `Arc<Registry>`) through their calls.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::crypto::kdf::KdfParams;
use crate::errors::{LockboxError, Result};
use crate::store::manager::Manager;
use crate::store::snapshot::{Snapshot, SNAPSHOT_VERSION};

/// Named collection of independent entry stores.
pub struct Registry {
    managers: RwLock<HashMap<String, Arc<Manager>>>,
    default_name: RwLock<Option<String>>,

    /// Remembered working-set path.  Set by disk reads/writes, cleared
    /// by `set_temporary`.
    snapshot_path: Mutex<Option<PathBuf>>,

    /// KDF parameters handed to every manager this registry creates.
    params: KdfParams,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with default KDF parameters.
    pub fn new() -> Self {
        Self::with_params(KdfParams::default())
    }

    /// Create an empty registry with explicit KDF parameters.
    pub fn with_params(params: KdfParams) -> Self {
        Self {
            managers: RwLock::new(HashMap::new()),
            default_name: RwLock::new(None),
            snapshot_path: Mutex::new(None),
            params,
        }
    }

    // ------------------------------------------------------------------
    // Manager lifecycle
    // ------------------------------------------------------------------

    /// Register an empty store under `name`.
    pub fn register(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(LockboxError::InvalidArgument(
                "manager name must not be empty".into(),
            ));
        }

        let mut map = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if map.contains_key(name) {
            return Err(LockboxError::AlreadyExists(name.to_string()));
        }

        map.insert(name.to_string(), Arc::new(Manager::new(self.params)));
        Ok(())
    }

    /// Remove a manager and its backing state.  When the default is
    /// deregistered, no default remains set.
    pub fn deregister(&self, name: &str) -> Result<()> {
        let mut map = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if map.remove(name).is_none() {
            return Err(LockboxError::ManagerNotFound(name.to_string()));
        }
        drop(map);

        let mut default = self
            .default_name
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if default.as_deref() == Some(name) {
            *default = None;
        }

        Ok(())
    }

    /// Mark a registered manager as the default.
    pub fn set_default(&self, name: &str) -> Result<()> {
        let map = self.managers.read().unwrap_or_else(PoisonError::into_inner);
        if !map.contains_key(name) {
            return Err(LockboxError::ManagerNotFound(name.to_string()));
        }
        drop(map);

        *self
            .default_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        Ok(())
    }

    /// Name of the current default manager, if any.
    pub fn default_name(&self) -> Option<String> {
        self.default_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handle to the current default manager.
    pub fn default_manager(&self) -> Result<Arc<Manager>> {
        let name = self.default_name().ok_or(LockboxError::NoDefaultManager)?;
        self.manager(&name)
    }

    /// Handle to a manager by name.
    pub fn manager(&self, name: &str) -> Result<Arc<Manager>> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| LockboxError::ManagerNotFound(name.to_string()))
    }

    /// All registered manager names, sorted.
    pub fn manager_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    // ------------------------------------------------------------------
    // Default-manager configuration
    // ------------------------------------------------------------------

    /// Flip the default manager's password pre-hash flag and return the
    /// new state.
    pub fn toggle_hash(&self) -> Result<bool> {
        Ok(self.default_manager()?.toggle_hash_passwords())
    }

    /// Enable recovery on the default manager.
    pub fn enable_recovery(&self, key: &str) -> Result<()> {
        self.default_manager()?.enable_recovery(key);
        Ok(())
    }

    /// Disable recovery on the default manager.
    pub fn disable_recovery(&self) -> Result<()> {
        self.default_manager()?.disable_recovery();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Default-manager entry operations
    // ------------------------------------------------------------------

    /// `Manager::overwrite` on the default manager.
    pub fn overwrite(&self, id: &str, value: &str, password: &str) -> Result<()> {
        self.default_manager()?.overwrite(id, value, password)
    }

    /// `Manager::get` on the default manager.
    pub fn get(&self, id: &str, password: &str) -> Result<String> {
        self.default_manager()?.get(id, password)
    }

    /// `Manager::check` on the default manager.
    pub fn check(&self, id: &str, password: &str, expected: &str) -> Result<bool> {
        self.default_manager()?.check(id, password, expected)
    }

    /// `Manager::set` on the default manager.
    pub fn set(&self, id: &str, old_value: &str, new_value: &str, password: &str) -> Result<()> {
        self.default_manager()?.set(id, old_value, new_value, password)
    }

    /// `Manager::unset` on the default manager.
    pub fn unset(&self, id: &str, value: &str, password: &str) -> Result<()> {
        self.default_manager()?.unset(id, value, password)
    }

    /// `Manager::exists` on the default manager.
    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.default_manager()?.exists(id))
    }

    /// `Manager::list` on the default manager.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.default_manager()?.list())
    }

    /// `Manager::list_joined` on the default manager.
    pub fn list_joined(&self, delimiter: &str) -> Result<String> {
        self.default_manager()?.list_joined(delimiter)
    }

    /// `Manager::delete` on the default manager.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.default_manager()?.delete(id)
    }

    /// `Manager::rewrite_key` on the default manager.
    pub fn rewrite_key(&self, id: &str, old_password: &str, new_password: &str) -> Result<()> {
        self.default_manager()?
            .rewrite_key(id, old_password, new_password)
    }

    /// Remove every entry from every manager's store.  Managers stay
    /// registered.  Idempotent, never fails.
    pub fn clean(&self) {
        let map = self.managers.read().unwrap_or_else(PoisonError::into_inner);
        for manager in map.values() {
            manager.clear();
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Capture the current registry state as a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let map = self.managers.read().unwrap_or_else(PoisonError::into_inner);

        let managers = map
            .iter()
            .map(|(name, manager)| {
                let entries: BTreeMap<String, String> =
                    manager.export_entries().into_iter().collect();
                (name.clone(), entries)
            })
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            default: self.default_name(),
            managers,
        }
    }

    /// Replace all in-memory state from a snapshot.
    ///
    /// Per-manager runtime configuration (pre-hash flag, recovery key)
    /// is not part of a snapshot and starts out fresh.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut rebuilt: HashMap<String, Arc<Manager>> = HashMap::new();
        for (name, entries) in snapshot.managers {
            let manager = Manager::new(self.params);
            manager.replace_entries(entries.into_iter().collect());
            rebuilt.insert(name, Arc::new(manager));
        }

        let mut map = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *map = rebuilt;
        drop(map);

        // Only honor a default that actually exists in the snapshot.
        let default = snapshot.default.filter(|name| {
            self.managers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(name)
        });
        *self
            .default_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = default;
    }

    /// Serialize the registry to its textual snapshot form.
    pub fn dump_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    /// Replace all in-memory state from the textual snapshot form.
    pub fn load_json(&self, input: &str) -> Result<()> {
        let snapshot = Snapshot::from_json(input)?;
        self.restore(snapshot);
        Ok(())
    }

    /// Write the registry snapshot to a file, overwriting it, and
    /// remember `path` as the working-set location.
    pub fn write_to_disk(&self, path: &Path) -> Result<()> {
        self.snapshot().write_to(path)?;
        *self
            .snapshot_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace all in-memory state from a snapshot file and remember
    /// `path` as the working-set location.
    pub fn read_from_disk(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot::read_from(path)?;
        self.restore(snapshot);
        *self
            .snapshot_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());
        Ok(())
    }

    /// Write the snapshot to the remembered working-set path.
    pub fn save(&self) -> Result<()> {
        let path = self
            .snapshot_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                LockboxError::InvalidArgument(
                    "no working snapshot path — use write_to_disk first".into(),
                )
            })?;
        self.snapshot().write_to(&path)
    }

    /// Mark the in-memory state as the working set, detached from any
    /// disk location.  Later disk writes need an explicit path again.
    pub fn set_temporary(&self) {
        *self
            .snapshot_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
