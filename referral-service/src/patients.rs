use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::Patient;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Patient file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Patient file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File-backed patient store. The file is parsed once and cached; writes go
/// through `add_unique` and refresh the cache.
pub struct PatientStore {
    path: PathBuf,
    cache: RwLock<Option<Vec<Patient>>>,
}

impl PatientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<Vec<Patient>, StoreError> {
        if let Some(patients) = self.cache.read().await.as_ref() {
            return Ok(patients.clone());
        }

        let patients = read_patients(&self.path).await?;
        info!(count = patients.len(), "Loaded patient records");
        *self.cache.write().await = Some(patients.clone());
        Ok(patients)
    }

    pub async fn get(&self, patient_id: &str) -> Result<Option<Patient>, StoreError> {
        let patients = self.load().await?;
        Ok(patients.into_iter().find(|p| p.patient_id == patient_id))
    }

    /// Patient IDs in file order.
    pub async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let patients = self.load().await?;
        Ok(patients.into_iter().map(|p| p.patient_id).collect())
    }

    /// Appends patients whose IDs are not already present, checking both the
    /// file and earlier entries of the same batch. Returns how many landed.
    pub async fn add_unique(&self, new_patients: Vec<Patient>) -> Result<usize, StoreError> {
        // The cache lock is held across the read-modify-write so concurrent
        // adds cannot interleave on the file.
        let mut cache = self.cache.write().await;

        let mut patients = read_patients(&self.path).await?;
        let mut seen: HashSet<String> = patients.iter().map(|p| p.patient_id.clone()).collect();

        let mut added = 0;
        for patient in new_patients {
            if seen.insert(patient.patient_id.clone()) {
                patients.push(patient);
                added += 1;
            }
        }

        if added > 0 {
            let json = serde_json::to_string_pretty(&patients)?;
            tokio::fs::write(&self.path, json).await?;
            info!(added, "Patient file updated");
            *cache = Some(patients);
        }

        Ok(added)
    }
}

async fn read_patients(path: &Path) -> Result<Vec<Patient>, StoreError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
