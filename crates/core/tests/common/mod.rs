//! In-memory bucket used by the pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use sitepush_core::hash::bytes_digest;
use sitepush_core::{
    resolve_config, ConfigOverrides, DeployConfig, Error, LocalEntry, ObjectStore, RemoteEntry,
    Result,
};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub failing_puts: HashSet<String>,
    pub list_status: Option<u16>,
    pub puts: AtomicUsize,
    pub delete_requests: AtomicUsize,
}

impl MemoryStore {
    pub fn with_objects(objects: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.objects.lock().unwrap();
            for (key, content) in objects {
                map.insert(key.to_string(), content.as_bytes().to_vec());
            }
        }
        store
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn content(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        if let Some(status) = self.list_status {
            return Err(Error::RemoteList {
                status: Some(status),
                message: "NoSuchBucket".to_string(),
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, body)| RemoteEntry::new(key, format!("\"{}\"", bytes_digest(body))))
            .collect())
    }

    async fn put(&self, entry: &LocalEntry) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_puts.contains(&entry.key) {
            return Err(Error::Transfer("simulated upload failure".to_string()));
        }
        let body = tokio::fs::read(&entry.absolute_path).await.map_err(|e| {
            Error::Transfer(format!("cannot read {}: {e}", entry.absolute_path.display()))
        })?;
        self.objects.lock().unwrap().insert(entry.key.clone(), body);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        self.delete_requests.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn max_delete_batch(&self) -> usize {
        2
    }
}

/// Write `files` below `root`, creating directories as needed
pub fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// A valid configuration publishing `public_dir`
pub fn config_for(public_dir: &Path, delete_extras: bool) -> DeployConfig {
    let mut overrides = ConfigOverrides::default();
    overrides.storage.credential_id = Some("id".to_string());
    overrides.storage.credential_secret = Some("secret".to_string());
    overrides.storage.bucket = Some("blog".to_string());
    overrides.storage.region = Some("us-east-1".to_string());
    overrides.deploy.public_dir = Some(public_dir.to_path_buf());
    overrides.deploy.delete_extras = Some(delete_extras);
    overrides.deploy.concurrency = Some(3);
    resolve_config(overrides, None, |_| None).unwrap()
}
