use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use super::types::{Config, ServiceContext};
use super::{resolve_path, Store, CONFIG_FILE, CONFIG_PATH_ENV, CONTEXT_FILE, CONTEXT_PATH_ENV};
use crate::error::{Error, Result};

/// JSON document at a fixed path, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

pub type ServiceContextFile = JsonFile<ServiceContext>;

impl<T> JsonFile<T> {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }
}

impl JsonFile<ServiceContext> {
    /// The service context file in the default location.
    pub fn service_context() -> Result<Self> {
        Ok(Self::at(resolve_path(CONTEXT_PATH_ENV, CONTEXT_FILE)?))
    }
}

impl<T: Serialize> JsonFile<T> {
    /// Writes `document` into a temp file next to the target, then hands it to
    /// `persist` to move into place. The previous document survives any failure.
    pub(crate) fn write_with<F>(&self, document: &T, persist: F) -> Result<()>
    where
        F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
    {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let contents =
            serde_json::to_vec_pretty(document).map_err(|e| Error::io(&self.path, e.into()))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        file.write_all(&contents)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| Error::io(file.path(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::io(file.path(), e))?;
        }

        persist(file, &self.path).map_err(|e| Error::io(&self.path, e))?;
        debug!(path = %self.path.display(), "saved document");
        Ok(())
    }
}

impl<T> Store<T> for JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<T> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|source| Error::CorruptState {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, document: &T) -> Result<()> {
        self.write_with(document, |file, path| {
            file.persist(path).map(|_| ()).map_err(|e| e.error)
        })
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn location(&self) -> Result<PathBuf> {
        Ok(self.path.clone())
    }
}

/// The config file. Every save stamps `last_updated`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    file: JsonFile<Config>,
}

impl ConfigFile {
    pub fn new() -> Result<Self> {
        Ok(Self::at(resolve_path(CONFIG_PATH_ENV, CONFIG_FILE)?))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::at(path),
        }
    }
}

impl Store<Config> for ConfigFile {
    fn load(&self) -> Result<Config> {
        self.file.load()
    }

    fn save(&self, config: &Config) -> Result<()> {
        let mut stamped = config.clone();
        stamped.last_updated = Utc::now().timestamp();
        self.file.save(&stamped)
    }

    fn remove(&self) -> Result<()> {
        self.file.remove()
    }

    fn location(&self) -> Result<PathBuf> {
        self.file.location()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::tempdir;

    use super::*;
    use crate::storage::{ServiceConfigMap, ServiceRegistryConfig};

    fn sample_config() -> Config {
        Config {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            services: ServiceConfigMap {
                service_registry: Some(ServiceRegistryConfig {
                    instance_id: "1234".into(),
                    name: "my-registry".into(),
                }),
            },
            api_url: "https://api.example.com".into(),
            auth_url: "https://sso.example.com/auth/realms/test".into(),
            client_id: "apicr".into(),
            insecure: true,
            scopes: vec!["openid".into(), "offline_access".into()],
            last_updated: 0,
        }
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let store = ConfigFile::at(dir.path().join("config.json"));
        assert_eq!(store.load().unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConfigFile::at(dir.path().join("config.json"));
        let config = sample_config();

        store.save(&config).unwrap();
        let loaded = store.load().unwrap();

        assert!(loaded.last_updated > 0);
        assert_eq!(
            loaded,
            Config {
                last_updated: loaded.last_updated,
                ..config
            }
        );
    }

    #[test]
    fn test_save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("contexts.json");
        let store = ServiceContextFile::at(&path);

        store.save(&ServiceContext::default()).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        ConfigFile::at(&path).save(&sample_config()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_malformed_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ConfigFile::at(&path).load().unwrap_err();
        match &err {
            Error::CorruptState { path: reported, .. } => assert_eq!(reported, &path),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_failed_rename_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonFile::<Config>::at(&path);
        store.save(&sample_config()).unwrap();

        let mut replacement = sample_config();
        replacement.access_token = "new-access".into();
        let err = store
            .write_with(&replacement, |file, _| {
                drop(file);
                Err(io::Error::new(io::ErrorKind::Other, "rename interrupted"))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        assert_eq!(store.load().unwrap().access_token, "access");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temp file should be cleaned up");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigFile::at(&path);

        store.remove().unwrap();
        store.save(&sample_config()).unwrap();
        store.remove().unwrap();
        assert!(!path.exists());
        assert_eq!(store.load().unwrap(), Config::default());
    }

    #[test]
    fn test_location_is_the_configured_path() {
        let store = ConfigFile::at("/tmp/apicr-test/config.json");
        assert_eq!(
            store.location().unwrap(),
            PathBuf::from("/tmp/apicr-test/config.json")
        );
    }

    #[test]
    fn test_last_write_wins_without_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let first = ConfigFile::at(&path);
        let second = ConfigFile::at(&path);

        let mut older = first.load().unwrap();
        let mut newer = second.load().unwrap();
        newer.refresh_token = "newer-refresh".into();
        older.refresh_token = "older-refresh".into();

        second.save(&newer).unwrap();
        first.save(&older).unwrap();

        // The stale refresh token wins; the file is still a valid document.
        assert_eq!(second.load().unwrap().refresh_token, "older-refresh");
    }

    #[test]
    fn test_concurrent_writers_leave_valid_document() {
        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().join("config.json"));

        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let store = ConfigFile::at(path.as_ref());
                    for i in 0..25 {
                        let config = Config {
                            access_token: format!("writer-{writer}-{i}"),
                            ..Config::default()
                        };
                        store.save(&config).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded = ConfigFile::at(path.as_ref()).load().unwrap();
        assert!(loaded.access_token.starts_with("writer-"));
        assert!(loaded.access_token.ends_with("-24"));
    }
}
