// File-backed project store
//
// Layout, one directory per project:
//   <root>/<project_id>/settings.ron     session snapshot
//   <root>/<project_id>/manifest.json    name + timestamps
//   <root>/<project_id>/tracks/<id>.wav  track audio

use crate::project::ProjectError;
use crate::project::store::{ProjectStore, check_source, track_file_name};
use crate::project::types::{ProjectId, ProjectManifest, ProjectSettings};
use crate::track::{TrackId, TrackSource};
use chrono::Utc;
use ron::ser::PrettyConfig;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.ron";
const MANIFEST_FILE: &str = "manifest.json";

pub struct FileProjectStore {
    root: PathBuf,
}

impl FileProjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store under the user data directory
    pub fn in_data_dir() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::new(dir.join("stemloop").join("projects")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: ProjectId) -> PathBuf {
        self.root.join(project.to_string())
    }

    pub fn load_manifest(&self, project: ProjectId) -> Result<ProjectManifest, ProjectError> {
        let path = self.project_dir(project).join(MANIFEST_FILE);
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_manifest(
        &self,
        project: ProjectId,
        settings: &ProjectSettings,
    ) -> Result<(), ProjectError> {
        let created = self
            .load_manifest(project)
            .map(|m| m.created)
            .unwrap_or_else(|_| Utc::now());
        let manifest = ProjectManifest {
            name: settings.name.clone(),
            version: settings.version,
            created,
            modified: settings.saved_at,
            track_count: settings.track_settings.len(),
        };
        let path = self.project_dir(project).join(MANIFEST_FILE);
        fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }
}

impl ProjectStore for FileProjectStore {
    fn save_settings(
        &mut self,
        project: ProjectId,
        settings: &ProjectSettings,
    ) -> Result<(), ProjectError> {
        let dir = self.project_dir(project);
        fs::create_dir_all(&dir)?;

        let ron_text = ron::ser::to_string_pretty(settings, PrettyConfig::default())?;
        // Write then rename so a crash never leaves half a file
        let tmp = dir.join(format!("{}.tmp", SETTINGS_FILE));
        fs::write(&tmp, ron_text)?;
        fs::rename(&tmp, dir.join(SETTINGS_FILE))?;

        self.write_manifest(project, settings)?;
        log::debug!("Saved settings of project {} to {}", project, dir.display());
        Ok(())
    }

    fn load_settings(&self, project: ProjectId) -> Result<ProjectSettings, ProjectError> {
        let path = self.project_dir(project).join(SETTINGS_FILE);
        if !path.exists() {
            return Err(ProjectError::NotFound(project));
        }
        let text = fs::read_to_string(&path)?;
        Ok(ron::from_str(&text)?)
    }

    fn save_track_file(
        &mut self,
        project: ProjectId,
        track: TrackId,
        bytes: &[u8],
    ) -> Result<TrackSource, ProjectError> {
        let source = TrackSource(track_file_name(track));
        let path = self.project_dir(project).join(source.as_str());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(source)
    }

    fn load_track_file(
        &self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<Vec<u8>, ProjectError> {
        check_source(source)?;
        let path = self.project_dir(project).join(source.as_str());
        if !path.exists() {
            return Err(ProjectError::MissingTrackFile(source.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn delete_track_file(
        &mut self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<(), ProjectError> {
        check_source(source)?;
        let path = self.project_dir(project).join(source.as_str());
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Track file {} already gone", source);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use tempfile::TempDir;

    #[test]
    fn test_settings_save_load() {
        let dir = TempDir::new().unwrap();
        let mut store = FileProjectStore::new(dir.path());
        let project = ProjectId::new();

        let mut settings = ProjectSettings::new("Scales");
        settings.master_volume = 0.6;
        store.save_settings(project, &settings).unwrap();

        let loaded = store.load_settings(project).unwrap();
        assert_eq!(loaded, settings);
        assert!(store.project_dir(project).join("settings.ron").exists());

        let manifest = store.load_manifest(project).unwrap();
        assert_eq!(manifest.name, "Scales");
        assert_eq!(manifest.track_count, 0);
    }

    #[test]
    fn test_manifest_keeps_creation_date() {
        let dir = TempDir::new().unwrap();
        let mut store = FileProjectStore::new(dir.path());
        let project = ProjectId::new();

        store
            .save_settings(project, &ProjectSettings::new("A"))
            .unwrap();
        let created = store.load_manifest(project).unwrap().created;
        let mut later = ProjectSettings::new("A");
        later.track_settings.push(Track::recordable("Vox"));
        store.save_settings(project, &later).unwrap();

        let manifest = store.load_manifest(project).unwrap();
        assert_eq!(manifest.created, created);
        assert_eq!(manifest.track_count, 1);
    }

    #[test]
    fn test_missing_project() {
        let dir = TempDir::new().unwrap();
        let store = FileProjectStore::new(dir.path());
        let project = ProjectId::new();
        assert!(matches!(
            store.load_settings(project),
            Err(ProjectError::NotFound(id)) if id == project
        ));
    }

    #[test]
    fn test_track_files() {
        let dir = TempDir::new().unwrap();
        let mut store = FileProjectStore::new(dir.path());
        let project = ProjectId::new();
        let track = TrackId::new();

        let source = store.save_track_file(project, track, b"RIFF....").unwrap();
        assert_eq!(source.as_str(), format!("tracks/{}.wav", track));
        assert_eq!(store.load_track_file(project, &source).unwrap(), b"RIFF....");

        store.delete_track_file(project, &source).unwrap();
        assert!(matches!(
            store.load_track_file(project, &source),
            Err(ProjectError::MissingTrackFile(_))
        ));
        // Deleting twice is fine
        store.delete_track_file(project, &source).unwrap();
    }
}
