// In-memory project store for tests and the demo
//
// Settings go through RON exactly like on disk. Clones share storage.

use crate::project::ProjectError;
use crate::project::store::{ProjectStore, check_source, track_file_name};
use crate::project::types::{ProjectId, ProjectSettings};
use crate::track::{TrackId, TrackSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryInner {
    settings: HashMap<ProjectId, String>,
    files: HashMap<(ProjectId, String), Vec<u8>>,
    save_count: usize,
    fail_saves: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of successful settings saves
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Make every settings save fail (disk full simulation)
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    pub fn has_track_file(&self, project: ProjectId, source: &TrackSource) -> bool {
        self.lock()
            .files
            .contains_key(&(project, source.as_str().to_string()))
    }

    /// Raw stored settings text
    pub fn settings_text(&self, project: ProjectId) -> Option<String> {
        self.lock().settings.get(&project).cloned()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn save_settings(
        &mut self,
        project: ProjectId,
        settings: &ProjectSettings,
    ) -> Result<(), ProjectError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(ProjectError::Io(std::io::Error::other("simulated save failure")));
        }
        let text = ron::to_string(settings)?;
        inner.settings.insert(project, text);
        inner.save_count += 1;
        Ok(())
    }

    fn load_settings(&self, project: ProjectId) -> Result<ProjectSettings, ProjectError> {
        let inner = self.lock();
        let text = inner
            .settings
            .get(&project)
            .ok_or(ProjectError::NotFound(project))?;
        Ok(ron::from_str(text)?)
    }

    fn save_track_file(
        &mut self,
        project: ProjectId,
        track: TrackId,
        bytes: &[u8],
    ) -> Result<TrackSource, ProjectError> {
        let source = TrackSource(track_file_name(track));
        self.lock()
            .files
            .insert((project, source.as_str().to_string()), bytes.to_vec());
        Ok(source)
    }

    fn load_track_file(
        &self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<Vec<u8>, ProjectError> {
        check_source(source)?;
        self.lock()
            .files
            .get(&(project, source.as_str().to_string()))
            .cloned()
            .ok_or_else(|| ProjectError::MissingTrackFile(source.to_string()))
    }

    fn delete_track_file(
        &mut self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<(), ProjectError> {
        check_source(source)?;
        self.lock()
            .files
            .remove(&(project, source.as_str().to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let store = MemoryProjectStore::new();
        let mut writer = store.clone();
        let project = ProjectId::new();

        writer
            .save_settings(project, &ProjectSettings::new("Shared"))
            .unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_settings(project).unwrap().name, "Shared");
    }

    #[test]
    fn test_simulated_failure() {
        let mut store = MemoryProjectStore::new();
        store.set_fail_saves(true);
        assert!(
            store
                .save_settings(ProjectId::new(), &ProjectSettings::new("x"))
                .is_err()
        );
        assert_eq!(store.save_count(), 0);
    }
}
