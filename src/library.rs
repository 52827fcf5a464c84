//! Asset libraries (characters, scenes, finished panels) and their JSON files

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tracing::{info, warn};

use crate::asset::{strip_data_url, Asset};
use crate::error::{StudioError, StudioResult};

/// Which library a collection of assets belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    Characters,
    Scenes,
    Panels,
}

impl LibraryKind {
    /// Maximum number of assets, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match self {
            LibraryKind::Characters => Some(4),
            LibraryKind::Scenes => Some(8),
            LibraryKind::Panels => None,
        }
    }

    pub fn requires_name(&self) -> bool {
        matches!(self, LibraryKind::Characters | LibraryKind::Panels)
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            LibraryKind::Characters => "char",
            LibraryKind::Scenes => "scene",
            LibraryKind::Panels => "panel",
        }
    }

    /// File name used when the library is saved
    pub fn export_file_name(&self) -> &'static str {
        match self {
            LibraryKind::Characters => "comic-characters.json",
            LibraryKind::Scenes => "comic-scenes.json",
            LibraryKind::Panels => "comic-panels.json",
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LibraryKind::Characters => "Character",
            LibraryKind::Scenes => "Scene",
            LibraryKind::Panels => "Panel",
        })
    }
}

/// Lenient view of an imported record; validation happens after parsing
#[derive(Deserialize)]
struct ImportedAsset {
    id: Option<String>,
    prompt: Option<String>,
    base64: Option<String>,
    name: Option<String>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/// In-memory asset library
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    kind: LibraryKind,
    assets: Vec<Asset>,
    seq: u64,
}

impl AssetLibrary {
    pub fn new(kind: LibraryKind) -> Self {
        Self { kind, assets: Vec::new(), seq: 0 }
    }

    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.kind.capacity().is_some_and(|cap| self.assets.len() >= cap)
    }

    fn next_id(&mut self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.seq += 1;
        format!("{}-{}-{}", self.kind.id_prefix(), millis, self.seq)
    }

    /// Adds a new asset; fails when the library is at capacity
    pub fn add(&mut self, base64: &str, prompt: &str, name: Option<&str>) -> StudioResult<&Asset> {
        if let Some(capacity) = self.kind.capacity() {
            if self.assets.len() >= capacity {
                return Err(StudioError::LibraryFull { kind: self.kind, capacity });
            }
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if self.kind.requires_name() && name.is_none() {
            return Err(StudioError::EmptyName);
        }

        let mut asset = Asset::new(self.next_id(), prompt, strip_data_url(base64));
        asset.name = name.map(str::to_string);
        self.assets.push(asset);
        Ok(&self.assets[self.assets.len() - 1])
    }

    /// Adds a finished panel under a display name
    pub fn add_panel_asset(&mut self, base64: &str, name: &str) -> StudioResult<&Asset> {
        self.add(base64, name.trim(), Some(name))
    }

    /// Adds an uploaded image file. Without an explicit name the file stem is used.
    pub fn upload(&mut self, payload: &str, file_name: &str, name: Option<&str>) -> StudioResult<&Asset> {
        let default_name = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = name.unwrap_or(default_name.as_str()).trim().to_string();
        if name.is_empty() {
            return Err(StudioError::EmptyName);
        }
        self.add(payload, &name, Some(&name))
    }

    /// Replaces the library with the contents of a JSON array.
    ///
    /// On any validation failure the current contents are left untouched.
    pub fn import_json(&mut self, json: &str) -> StudioResult<usize> {
        let imported: Vec<ImportedAsset> = serde_json::from_str(json).map_err(|err| {
            warn!(kind = %self.kind, error = %err, "library import rejected");
            StudioError::InvalidImportFormat(err.to_string())
        })?;

        let mut assets = Vec::with_capacity(imported.len());
        for (index, raw) in imported.into_iter().enumerate() {
            let complete = present(&raw.id) &&
                present(&raw.prompt) &&
                present(&raw.base64) &&
                (self.kind != LibraryKind::Characters || present(&raw.name));
            if !complete {
                warn!(kind = %self.kind, index, "library import rejected: missing fields");
                return Err(StudioError::InvalidImportFormat(format!(
                    "entry {index} is missing required fields"
                )));
            }
            assets.push(Asset {
                id: raw.id.unwrap_or_default(),
                prompt: raw.prompt.unwrap_or_default(),
                base64: raw.base64.unwrap_or_default(),
                name: raw.name,
            });
        }

        if let Some(capacity) = self.kind.capacity() {
            assets.truncate(capacity);
        }
        info!(kind = %self.kind, count = assets.len(), "library imported");
        self.assets = assets;
        Ok(self.assets.len())
    }

    pub fn import_file(&mut self, path: &Path) -> StudioResult<usize> {
        let json = fs::read_to_string(path)?;
        self.import_json(&json)
    }

    /// Pretty JSON array of the library; refuses an empty library
    pub fn export_json(&self) -> StudioResult<String> {
        if self.assets.is_empty() {
            return Err(StudioError::EmptyLibrary(self.kind));
        }
        Ok(serde_json::to_string_pretty(&self.assets)?)
    }

    /// Writes the library into `dir` under its standard file name
    pub fn export_to_dir(&self, dir: &Path) -> StudioResult<PathBuf> {
        let json = self.export_json()?;
        let path = dir.join(self.kind.export_file_name());
        fs::write(&path, json)?;
        info!(kind = %self.kind, path = %path.display(), "library exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_limits() {
        let mut scenes = AssetLibrary::new(LibraryKind::Scenes);
        for i in 0..8 {
            scenes.add("AAAA", &format!("scene {i}"), None).unwrap();
        }
        assert!(scenes.is_full());
        assert!(matches!(
            scenes.add("AAAA", "one more", None),
            Err(StudioError::LibraryFull { kind: LibraryKind::Scenes, capacity: 8 })
        ));

        let mut panels = AssetLibrary::new(LibraryKind::Panels);
        for i in 0..20 {
            panels.add_panel_asset("AAAA", &format!("p{i}")).unwrap();
        }
        assert!(!panels.is_full());
    }

    #[test]
    fn test_add_generates_unique_ids() {
        let mut lib = AssetLibrary::new(LibraryKind::Scenes);
        let a = lib.add("AAAA", "a", None).unwrap().id.clone();
        let b = lib.add("AAAA", "b", None).unwrap().id.clone();
        assert_ne!(a, b);
        assert!(a.starts_with("scene-"));
    }

    #[test]
    fn test_character_requires_name() {
        let mut lib = AssetLibrary::new(LibraryKind::Characters);
        assert!(matches!(lib.add("AAAA", "hero", Some("  ")), Err(StudioError::EmptyName)));
        assert_eq!(lib.add("AAAA", "hero", Some("Max")).unwrap().name.as_deref(), Some("Max"));
    }

    #[test]
    fn test_upload_uses_file_stem() {
        let mut lib = AssetLibrary::new(LibraryKind::Panels);
        let asset = lib.upload("data:image/png;base64,AAAA", "splash.page.png", None).unwrap();
        assert_eq!(asset.name.as_deref(), Some("splash.page"));
        assert_eq!(asset.base64, "AAAA");
        assert!(matches!(lib.upload("AAAA", "x.png", Some(" ")), Err(StudioError::EmptyName)));
    }

    #[test]
    fn test_import_rejects_missing_fields_and_keeps_library() {
        let mut lib = AssetLibrary::new(LibraryKind::Panels);
        lib.add_panel_asset("AAAA", "keep me").unwrap();
        let bad = r#"[{"id": "1", "prompt": "p", "base64": ""}]"#;
        assert!(matches!(lib.import_json(bad), Err(StudioError::InvalidImportFormat(_))));
        assert!(matches!(lib.import_json("{\"not\": \"an array\"}"), Err(StudioError::InvalidImportFormat(_))));
        assert!(matches!(lib.import_json("garbage"), Err(StudioError::InvalidImportFormat(_))));
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.assets()[0].name.as_deref(), Some("keep me"));
    }

    #[test]
    fn test_import_characters_needs_name_and_truncates() {
        let mut lib = AssetLibrary::new(LibraryKind::Characters);
        let unnamed = r#"[{"id": "c1", "prompt": "p", "base64": "AAAA"}]"#;
        assert!(lib.import_json(unnamed).is_err());

        let many: Vec<_> = (0..6)
            .map(|i| serde_json::json!({"id": format!("c{i}"), "prompt": "p", "base64": "AAAA", "name": format!("n{i}")}))
            .collect();
        let count = lib.import_json(&serde_json::to_string(&many).unwrap()).unwrap();
        assert_eq!(count, 4);
        assert_eq!(lib.assets()[3].id, "c3");
    }

    #[test]
    fn test_export_empty_library_refused() {
        let lib = AssetLibrary::new(LibraryKind::Panels);
        let err = lib.export_json().unwrap_err();
        assert_eq!(err.to_string(), "Panel library is empty");
    }

    #[test]
    fn test_export_import_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = AssetLibrary::new(LibraryKind::Panels);
        lib.add_panel_asset("AAAA", "Opening splash").unwrap();
        let path = lib.export_to_dir(dir.path()).unwrap();
        assert!(path.ends_with("comic-panels.json"));

        let mut other = AssetLibrary::new(LibraryKind::Panels);
        assert_eq!(other.import_file(&path).unwrap(), 1);
        assert_eq!(other.assets(), lib.assets());
    }
}
