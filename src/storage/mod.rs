//! Per-widget key-value persistence and the typed load/save/delete flows on top of it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::note::{Mode, NormalizedCrop, NormalizedPoint, PersistedNoteState, WidgetId};

const STORE_FILE: &str = "notes.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("failed to read note store: {path}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write note store: {path}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode note store")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One persisted field of a widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoteField {
    NoteText,
    CaptionText,
    CaptionSize,
    CaptionPosX,
    CaptionPosY,
    NotePosX,
    NotePosY,
    PhotoUri,
    PhotoZoom,
    PhotoRotation,
    Crop,
    Mode,
}

impl NoteField {
    pub const ALL: [NoteField; 12] = [
        Self::NoteText,
        Self::CaptionText,
        Self::CaptionSize,
        Self::CaptionPosX,
        Self::CaptionPosY,
        Self::NotePosX,
        Self::NotePosY,
        Self::PhotoUri,
        Self::PhotoZoom,
        Self::PhotoRotation,
        Self::Crop,
        Self::Mode,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::NoteText => "note",
            Self::CaptionText => "caption",
            Self::CaptionSize => "caption_size",
            Self::CaptionPosX => "caption_pos_x",
            Self::CaptionPosY => "caption_pos_y",
            Self::NotePosX => "note_pos_x",
            Self::NotePosY => "note_pos_y",
            Self::PhotoUri => "photo",
            Self::PhotoZoom => "photo_zoom",
            Self::PhotoRotation => "photo_rot_deg",
            Self::Crop => "crop",
            Self::Mode => "mode",
        }
    }
}

/// Field-level store keyed by widget id.
pub trait NoteRepository {
    fn get(&self, id: WidgetId, field: NoteField) -> Option<String>;
    fn set(&mut self, id: WidgetId, field: NoteField, value: String) -> StoreResult<()>;
    /// Removes every field of `id`.
    fn remove_all(&mut self, id: WidgetId) -> StoreResult<()>;
    fn ids(&self) -> Vec<WidgetId>;

    fn set_many(&mut self, id: WidgetId, entries: Vec<(NoteField, String)>) -> StoreResult<()> {
        for (field, value) in entries {
            self.set(id, field, value)?;
        }
        Ok(())
    }
}

type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct MemoryNoteStore {
    widgets: BTreeMap<WidgetId, FieldMap>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteRepository for MemoryNoteStore {
    fn get(&self, id: WidgetId, field: NoteField) -> Option<String> {
        self.widgets.get(&id)?.get(field.key()).cloned()
    }

    fn set(&mut self, id: WidgetId, field: NoteField, value: String) -> StoreResult<()> {
        self.widgets
            .entry(id)
            .or_default()
            .insert(field.key().to_string(), value);
        Ok(())
    }

    fn remove_all(&mut self, id: WidgetId) -> StoreResult<()> {
        self.widgets.remove(&id);
        Ok(())
    }

    fn ids(&self) -> Vec<WidgetId> {
        self.widgets.keys().copied().collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    widgets: BTreeMap<u32, FieldMap>,
}

/// JSON file store; every mutation rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonNoteStore {
    path: PathBuf,
    contents: StoreFile,
}

impl JsonNoteStore {
    pub fn with_default_path() -> StoreResult<Self> {
        let dir = AppConfig::data_dir().map_err(|_| StoreError::MissingHomeDirectory)?;
        Self::open(dir.join(STORE_FILE))
    }

    /// Opens `path`, starting empty when the file is missing or unparsable.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(
                    ?err,
                    path = %path.display(),
                    "note store is corrupt; starting empty"
                );
                StoreFile::default()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreFile::default(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self { path, contents })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StoreResult<()> {
        let write_error = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let encoded = serde_json::to_string_pretty(&self.contents)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(write_error)?;
        fs::rename(&staging, &self.path).map_err(write_error)?;
        Ok(())
    }
}

impl NoteRepository for JsonNoteStore {
    fn get(&self, id: WidgetId, field: NoteField) -> Option<String> {
        self.contents.widgets.get(&id.0)?.get(field.key()).cloned()
    }

    fn set(&mut self, id: WidgetId, field: NoteField, value: String) -> StoreResult<()> {
        self.set_many(id, vec![(field, value)])
    }

    fn set_many(&mut self, id: WidgetId, entries: Vec<(NoteField, String)>) -> StoreResult<()> {
        let fields = self.contents.widgets.entry(id.0).or_default();
        for (field, value) in entries {
            fields.insert(field.key().to_string(), value);
        }
        self.persist()
    }

    fn remove_all(&mut self, id: WidgetId) -> StoreResult<()> {
        if self.contents.widgets.remove(&id.0).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn ids(&self) -> Vec<WidgetId> {
        self.contents.widgets.keys().copied().map(WidgetId).collect()
    }
}

fn read_float(repo: &dyn NoteRepository, id: WidgetId, field: NoteField, fallback: f64) -> f64 {
    let Some(raw) = repo.get(id, field) else {
        return fallback;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            tracing::warn!(
                %id,
                field = field.key(),
                value = %raw,
                "malformed persisted number; using default"
            );
            fallback
        }
    }
}

fn read_point(
    repo: &dyn NoteRepository,
    id: WidgetId,
    x: NoteField,
    y: NoteField,
    fallback: NormalizedPoint,
) -> NormalizedPoint {
    NormalizedPoint {
        u: read_float(repo, id, x, fallback.u),
        v: read_float(repo, id, y, fallback.v),
    }
}

fn read_crop(repo: &dyn NoteRepository, id: WidgetId) -> Option<NormalizedCrop> {
    let raw = repo.get(id, NoteField::Crop)?;
    if raw.trim().is_empty() {
        return None;
    }
    let crop = NormalizedCrop::parse(&raw);
    if crop.is_none() {
        tracing::warn!(%id, value = %raw, "malformed persisted crop; treating as absent");
    }
    crop
}

/// Reads every field of `id`, falling back to defaults and clamping ranges.
pub fn load_note_state(repo: &dyn NoteRepository, id: WidgetId) -> PersistedNoteState {
    let defaults = PersistedNoteState::default();
    PersistedNoteState {
        note_text: repo.get(id, NoteField::NoteText).unwrap_or_default(),
        caption_text: repo.get(id, NoteField::CaptionText).unwrap_or_default(),
        caption_size_sp: read_float(repo, id, NoteField::CaptionSize, defaults.caption_size_sp),
        caption_position: read_point(
            repo,
            id,
            NoteField::CaptionPosX,
            NoteField::CaptionPosY,
            defaults.caption_position,
        ),
        note_position: read_point(
            repo,
            id,
            NoteField::NotePosX,
            NoteField::NotePosY,
            defaults.note_position,
        ),
        photo_uri: repo.get(id, NoteField::PhotoUri),
        crop: read_crop(repo, id),
        zoom: read_float(repo, id, NoteField::PhotoZoom, defaults.zoom),
        rotation_degrees: read_float(repo, id, NoteField::PhotoRotation, defaults.rotation_degrees),
        mode: Mode::parse_or_default(repo.get(id, NoteField::Mode).as_deref()),
    }
    .sanitized()
}

/// Writes every field of `state` for `id` in one batch.
pub fn save_note_state(
    repo: &mut dyn NoteRepository,
    id: WidgetId,
    state: &PersistedNoteState,
) -> StoreResult<()> {
    let state = state.clone().sanitized();
    let entries = vec![
        (NoteField::NoteText, state.note_text),
        (NoteField::CaptionText, state.caption_text),
        (NoteField::CaptionSize, state.caption_size_sp.to_string()),
        (NoteField::CaptionPosX, state.caption_position.u.to_string()),
        (NoteField::CaptionPosY, state.caption_position.v.to_string()),
        (NoteField::NotePosX, state.note_position.u.to_string()),
        (NoteField::NotePosY, state.note_position.v.to_string()),
        (NoteField::PhotoUri, state.photo_uri.unwrap_or_default()),
        (NoteField::PhotoZoom, state.zoom.to_string()),
        (NoteField::PhotoRotation, state.rotation_degrees.to_string()),
        (
            NoteField::Crop,
            state.crop.map(|crop| crop.format()).unwrap_or_default(),
        ),
        (NoteField::Mode, state.mode.as_str().to_string()),
    ];
    tracing::debug!(%id, mode = state.mode.as_str(), "saving note state");
    repo.set_many(id, entries)
}

/// Persists only the display mode, as the toggle action does.
pub fn save_mode(repo: &mut dyn NoteRepository, id: WidgetId, mode: Mode) -> StoreResult<()> {
    repo.set(id, NoteField::Mode, mode.as_str().to_string())
}

pub fn delete_note_state(repo: &mut dyn NoteRepository, id: WidgetId) -> StoreResult<()> {
    tracing::debug!(%id, "deleting note state");
    repo.remove_all(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{CAPTION_MAX_SP, ZOOM_MAX};

    const ID: WidgetId = WidgetId(7);

    #[test]
    fn missing_widget_loads_defaults() {
        let store = MemoryNoteStore::new();
        assert_eq!(load_note_state(&store, ID), PersistedNoteState::default());
    }

    #[test]
    fn save_then_load_preserves_state() {
        let mut store = MemoryNoteStore::new();
        let state = PersistedNoteState {
            note_text: "milk".to_string(),
            caption_text: "beach".to_string(),
            caption_size_sp: 22.0,
            caption_position: NormalizedPoint::new(0.25, 0.75),
            note_position: NormalizedPoint::new(0.5, 0.4),
            photo_uri: Some("file:///tmp/beach.jpg".to_string()),
            crop: NormalizedCrop::parse("0.1,0.2,0.9,0.95"),
            zoom: 1.5,
            rotation_degrees: 12.5,
            mode: Mode::Photo,
        };
        save_note_state(&mut store, ID, &state).expect("save");
        assert_eq!(load_note_state(&store, ID), state);
    }

    #[test]
    fn malformed_fields_degrade_to_defaults_or_clamp() {
        let mut store = MemoryNoteStore::new();
        store
            .set_many(
                ID,
                vec![
                    (NoteField::Crop, "bad,data".to_string()),
                    (NoteField::CaptionSize, "huge".to_string()),
                    (NoteField::PhotoZoom, "12".to_string()),
                    (NoteField::CaptionPosX, "-3".to_string()),
                    (NoteField::Mode, "SIDEWAYS".to_string()),
                ],
            )
            .expect("set");
        let state = load_note_state(&store, ID);
        assert_eq!(state.crop, None);
        assert_eq!(state.caption_size_sp, 14.0);
        assert_eq!(state.zoom, ZOOM_MAX);
        assert_eq!(state.caption_position.u, 0.0);
        assert_eq!(state.mode, Mode::Note);
    }

    #[test]
    fn out_of_range_size_is_clamped_on_load() {
        let mut store = MemoryNoteStore::new();
        store
            .set(ID, NoteField::CaptionSize, "100".to_string())
            .expect("set");
        assert_eq!(load_note_state(&store, ID).caption_size_sp, CAPTION_MAX_SP);
    }

    #[test]
    fn delete_removes_every_field() {
        let mut store = MemoryNoteStore::new();
        save_note_state(&mut store, ID, &PersistedNoteState::default()).expect("save");
        assert_eq!(store.ids(), vec![ID]);
        delete_note_state(&mut store, ID).expect("delete");
        assert!(store.ids().is_empty());
        for field in NoteField::ALL {
            assert_eq!(store.get(ID, field), None);
        }
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("stickynote-store-{}", std::process::id()));
        let path = dir.join(STORE_FILE);
        let _ = fs::remove_dir_all(&dir);

        let mut store = JsonNoteStore::open(&path).expect("open");
        save_mode(&mut store, ID, Mode::Photo).expect("save mode");
        store
            .set(WidgetId(9), NoteField::NoteText, "hello".to_string())
            .expect("set");

        let reopened = JsonNoteStore::open(&path).expect("reopen");
        assert_eq!(reopened.get(ID, NoteField::Mode).as_deref(), Some("PHOTO"));
        assert_eq!(reopened.ids(), vec![ID, WidgetId(9)]);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_json_store_starts_empty() {
        let dir = std::env::temp_dir().join(format!("stickynote-corrupt-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join(STORE_FILE);
        fs::write(&path, "{{{").expect("write");

        let store = JsonNoteStore::open(&path).expect("open");
        assert!(store.ids().is_empty());

        let _ = fs::remove_dir_all(dir);
    }
}
