//! Persisted role bindings.
//!
//! A binding maps a [`Role`] to `serial-VID-PID`. The default backend keeps
//! them as `KEY="value"` lines in `/etc/environment` so login shells see
//! them too; the SQLite backend avoids touching system files.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::NamedTempFile;

use crate::domain::{AppConfig, Binding, Result, Role, StoreBackend, ZebraError};

/// Key/value store for role bindings.
pub trait BindingStore {
    /// Binding for `role`, if one has been stored.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read or the value is malformed.
    fn get(&self, role: Role) -> Result<Option<Binding>>;

    /// Store `binding` under `role`, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn set(&self, role: Role, binding: &Binding) -> Result<()>;

    /// Role whose binding names `serial`, if any. Read errors count as unbound.
    fn role_of(&self, serial: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| match self.get(*role) {
            Ok(Some(binding)) => binding.serial == serial,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Could not read printer binding");
                false
            }
        })
    }

    /// When the binding for `role` was last written, if the backend keeps
    /// timestamps.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn updated_at(&self, _role: Role) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// Open the backend selected in the configuration.
///
/// # Errors
/// Returns error if the SQLite database cannot be opened.
pub fn open_store(config: &AppConfig) -> Result<Box<dyn BindingStore>> {
    match config.store.backend {
        StoreBackend::Environment => Ok(Box::new(EnvironmentFileStore::new(
            config.paths.environment_file.clone(),
        ))),
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.store.sqlite_path())?)),
    }
}

/// Bindings kept as `KEY="value"` lines in an environment file.
///
/// Reads prefer the process environment, so a binding exported by a shell
/// or service unit wins over the file.
pub struct EnvironmentFileStore {
    path: PathBuf,
    process_env: fn(&str) -> Option<String>,
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl EnvironmentFileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            process_env,
        }
    }

    #[cfg(test)]
    fn with_process_env(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.process_env = lookup;
        self
    }

    /// Replace the file through a sibling temp file and a rename, keeping
    /// the original mode. The original stays intact if anything fails.
    fn replace_contents(&self, content: &str) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let fail = |e: std::io::Error| {
            ZebraError::io(format!("Failed to write {}", self.path.display()), e)
        };

        let permissions = match fs::metadata(&self.path) {
            Ok(meta) => meta.permissions(),
            Err(_) => fs::Permissions::from_mode(0o644),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(fail)?;
        tmp.write_all(content.as_bytes()).map_err(fail)?;
        tmp.as_file().sync_all().map_err(fail)?;
        tmp.as_file().set_permissions(permissions).map_err(fail)?;
        tmp.persist(&self.path).map_err(|e| fail(e.error))?;

        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(String::from).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ZebraError::io(
                format!("Failed to read {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Value of `key` if `line` assigns it.
fn assignment<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let line = line.trim();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let value = line.strip_prefix(key)?.strip_prefix('=')?;
    Some(value.trim().trim_matches(|c| c == '"' || c == '\''))
}

impl BindingStore for EnvironmentFileStore {
    fn get(&self, role: Role) -> Result<Option<Binding>> {
        let exported = (self.process_env)(role.env_key());
        if let Some(value) = exported.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return Binding::parse(value).map(Some);
        }

        self.read_lines()?
            .iter()
            .rev()
            .find_map(|line| assignment(line, role.env_key()))
            .filter(|value| !value.is_empty())
            .map(Binding::parse)
            .transpose()
    }

    fn set(&self, role: Role, binding: &Binding) -> Result<()> {
        let key = role.env_key();
        let entry = format!("{key}=\"{binding}\"");

        let mut lines: Vec<String> = self
            .read_lines()?
            .into_iter()
            .filter(|line| assignment(line, key).is_none())
            .collect();
        lines.push(entry);

        let mut content = lines.join("\n");
        content.push('\n');

        self.replace_contents(&content)?;

        tracing::info!(path = %self.path.display(), key, "Printer binding saved");

        Ok(())
    }
}

/// Bindings kept in a SQLite table.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates the bindings database.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or the schema created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ZebraError::io("Failed to create store directory", e))?;
        }

        let conn = Connection::open(path).map_err(|e| ZebraError::database(path, e))?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS bindings (
                role TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| ZebraError::database(path, e))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }
}

impl BindingStore for SqliteStore {
    fn get(&self, role: Role) -> Result<Option<Binding>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM bindings WHERE role = ?1",
                [role.env_key()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ZebraError::database(&self.path, e))?;

        value.as_deref().map(Binding::parse).transpose()
    }

    fn set(&self, role: Role, binding: &Binding) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO bindings (role, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(role) DO UPDATE SET value = excluded.value,
                                                 updated_at = excluded.updated_at",
                params![role.env_key(), binding.to_string(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| ZebraError::database(&self.path, e))?;

        tracing::info!(path = %self.path.display(), role = %role, "Printer binding saved");

        Ok(())
    }

    fn updated_at(&self, role: Role) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM bindings WHERE role = ?1",
                [role.env_key()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ZebraError::database(&self.path, e))?;

        Ok(raw.and_then(|s| s.parse::<DateTime<Utc>>().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UsbId;
    use tempfile::tempdir;

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    fn file_only(path: PathBuf) -> EnvironmentFileStore {
        EnvironmentFileStore::new(path).with_process_env(no_env)
    }

    #[test]
    fn test_environment_store_roundtrip_keeps_other_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment");
        fs::write(
            &path,
            "PATH=\"/usr/local/bin:/usr/bin\"\nMFG_PRINTER=\"OLD123-0a5f-0001\"\n",
        )
        .unwrap();

        let store = file_only(path.clone());
        let binding = Binding::new("ABC123", UsbId::from_hex("0a5f", "0120"));
        store.set(Role::Primary, &binding).unwrap();

        assert_eq!(store.get(Role::Primary).unwrap(), Some(binding));
        assert_eq!(store.get(Role::Supplementary).unwrap(), None);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("PATH=\"/usr/local/bin:/usr/bin\""));
        assert!(!content.contains("OLD123"));
        assert!(content.contains("MFG_PRINTER=\"ABC123-0a5f-0120\""));
    }

    #[test]
    fn test_environment_store_keys_do_not_collide() {
        let dir = tempdir().unwrap();
        let store = file_only(dir.path().join("environment"));

        store
            .set(Role::Supplementary, &Binding::new("XXL999", None))
            .unwrap();

        assert_eq!(store.get(Role::Primary).unwrap(), None);
        assert_eq!(store.role_of("XXL999"), Some(Role::Supplementary));
        assert_eq!(store.role_of("ABC123"), None);
    }

    #[test]
    fn test_environment_store_replaces_file_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment");
        fs::write(&path, "PATH=\"/usr/bin\"\nLANG=\"C.UTF-8\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = file_only(path.clone());
        store
            .set(Role::Primary, &Binding::new("ABC123", UsbId::from_hex("0a5f", "0120")))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "PATH=\"/usr/bin\"\nLANG=\"C.UTF-8\"\nMFG_PRINTER=\"ABC123-0a5f-0120\"\n"
        );
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_environment_store_failed_write_keeps_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment");
        fs::write(&path, "PATH=\"/usr/bin\"\n").unwrap();

        // The parent is a regular file, so the update cannot go through.
        let store = file_only(path.join("nested"));
        assert!(store.set(Role::Primary, &Binding::new("ABC123", None)).is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), "PATH=\"/usr/bin\"\n");
    }

    #[test]
    fn test_environment_store_prefers_process_environment() {
        fn exported(key: &str) -> Option<String> {
            (key == "MFG_PRINTER").then(|| "ENV999-0a5f-0120".to_string())
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("environment");
        fs::write(
            &path,
            "MFG_PRINTER=\"FILE111-0a5f-0001\"\nMFG_PRINTER_XXL=\"XXL222\"\n",
        )
        .unwrap();

        let store = EnvironmentFileStore::new(path).with_process_env(exported);
        assert_eq!(
            store.get(Role::Primary).unwrap(),
            Some(Binding::new("ENV999", UsbId::from_hex("0a5f", "0120")))
        );
        assert_eq!(
            store.get(Role::Supplementary).unwrap(),
            Some(Binding::new("XXL222", None))
        );
    }

    #[test]
    fn test_environment_store_missing_file() {
        let dir = tempdir().unwrap();
        let store = file_only(dir.path().join("nope"));
        assert_eq!(store.get(Role::Primary).unwrap(), None);
    }

    #[test]
    fn test_sqlite_store() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("bindings.db")).unwrap();

        assert_eq!(store.get(Role::Primary).unwrap(), None);

        let first = Binding::new("ABC123", UsbId::from_hex("0a5f", "0120"));
        store.set(Role::Primary, &first).unwrap();
        let second = Binding::new("DEF456", UsbId::from_hex("0a5f", "0120"));
        store.set(Role::Primary, &second).unwrap();

        assert_eq!(store.get(Role::Primary).unwrap(), Some(second));
        assert!(store.updated_at(Role::Primary).unwrap().is_some());
        assert_eq!(store.role_of("DEF456"), Some(Role::Primary));
    }
}
