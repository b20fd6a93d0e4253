//! `install_library` / `update_library` (C10): bundled library content is
//! embedded at compile time via `include_dir!`. Every write is gated by
//! `ctx.admin` and, on update, by a blake3 hash check so an operator's local
//! edits to an installed file are never silently clobbered.

use std::collections::BTreeMap;
use std::path::PathBuf;

use include_dir::{include_dir, Dir};
use pkb_errors::PkbError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::ToolContext;

static LIBRARY_BUNDLE: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/library_bundle");

const MANIFEST_DIR_NAME: &str = "Library/.installed";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstalledManifest {
    version: String,
    files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InstallLibraryInput {
    pub library_name: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct InstallLibraryOutput {
    pub version: String,
    pub installed_files: Vec<String>,
}

pub async fn install_library(
    ctx: &ToolContext,
    input: InstallLibraryInput,
) -> Result<InstallLibraryOutput, PkbError> {
    require_admin(ctx)?;
    let library_dir = bundled_library(&input.library_name)?;
    let version = bundled_version(&library_dir)?;

    let mut installed_files = Vec::new();
    let mut manifest = BTreeMap::new();
    for file in iter_bundled_files(&library_dir) {
        let dest_rel = dest_rel_for(&library_dir, file);
        let dest_abs = ctx.space_root().join(&dest_rel);
        if let Some(parent) = dest_abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PkbError::Internal(e.into()))?;
        }
        std::fs::write(&dest_abs, file.contents()).map_err(|e| PkbError::Internal(e.into()))?;

        let hash = blake3::hash(file.contents()).to_hex().to_string();
        manifest.insert(dest_rel.clone(), hash);
        installed_files.push(dest_rel);
    }

    write_manifest(ctx, &input.library_name, &InstalledManifest { version: version.clone(), files: manifest })?;

    Ok(InstallLibraryOutput {
        version,
        installed_files,
    })
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateLibraryInput {
    pub library_name: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UpdateLibraryOutput {
    pub version: String,
    pub updated_files: Vec<String>,
    pub skipped_files: Vec<String>,
}

/// Updates an already-installed library, overwriting only files whose
/// on-disk content still matches the hash recorded at the last install —
/// any file with local edits is left alone and reported in `skipped_files`.
pub async fn update_library(
    ctx: &ToolContext,
    input: UpdateLibraryInput,
) -> Result<UpdateLibraryOutput, PkbError> {
    require_admin(ctx)?;
    let library_dir = bundled_library(&input.library_name)?;
    let version = bundled_version(&library_dir)?;

    let previous = read_manifest(ctx, &input.library_name)?.ok_or_else(|| {
        PkbError::NotFound(format!("library not installed: {}", input.library_name))
    })?;

    let mut updated_files = Vec::new();
    let mut skipped_files = Vec::new();
    let mut manifest = BTreeMap::new();

    for file in iter_bundled_files(&library_dir) {
        let dest_rel = dest_rel_for(&library_dir, file);
        let dest_abs = ctx.space_root().join(&dest_rel);
        let new_hash = blake3::hash(file.contents()).to_hex().to_string();

        let is_pristine = match (previous.files.get(&dest_rel), std::fs::read(&dest_abs)) {
            (Some(recorded_hash), Ok(on_disk)) => {
                &blake3::hash(&on_disk).to_hex().to_string() == recorded_hash
            }
            (None, _) => true,
            (Some(_), Err(_)) => true,
        };

        if !is_pristine {
            skipped_files.push(dest_rel.clone());
            if let Some(existing_hash) = previous.files.get(&dest_rel) {
                manifest.insert(dest_rel, existing_hash.clone());
            }
            continue;
        }

        if let Some(parent) = dest_abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PkbError::Internal(e.into()))?;
        }
        std::fs::write(&dest_abs, file.contents()).map_err(|e| PkbError::Internal(e.into()))?;
        manifest.insert(dest_rel.clone(), new_hash);
        updated_files.push(dest_rel);
    }

    write_manifest(ctx, &input.library_name, &InstalledManifest { version: version.clone(), files: manifest })?;

    Ok(UpdateLibraryOutput {
        version,
        updated_files,
        skipped_files,
    })
}

fn require_admin(ctx: &ToolContext) -> Result<(), PkbError> {
    if ctx.admin {
        Ok(())
    } else {
        Err(PkbError::InvalidQuery(
            "library installation requires an admin-capable tool context".to_string(),
        ))
    }
}

fn bundled_library(library_name: &str) -> Result<Dir<'static>, PkbError> {
    LIBRARY_BUNDLE
        .get_dir(library_name)
        .copied()
        .ok_or_else(|| PkbError::NotFound(format!("unknown library: {library_name}")))
}

fn bundled_version(library_dir: &Dir<'static>) -> Result<String, PkbError> {
    let file = library_dir
        .get_file(format!("{}/VERSION", library_dir.path().display()))
        .or_else(|| library_dir.get_file("VERSION"))
        .ok_or_else(|| PkbError::Internal(anyhow::anyhow!("library bundle missing VERSION file")))?;
    Ok(std::str::from_utf8(file.contents())
        .unwrap_or_default()
        .trim()
        .to_string())
}

fn iter_bundled_files(library_dir: &Dir<'static>) -> impl Iterator<Item = &'static include_dir::File<'static>> {
    let files_path = format!("{}/files", library_dir.path().display());
    library_dir
        .get_dir(files_path)
        .into_iter()
        .flat_map(|files_dir| files_dir.files().chain(files_dir.dirs().flat_map(|d| d.files())))
}

/// Path relative to the space root that a bundled file under
/// `<library_name>/files/...` installs to, i.e. the `<library_name>/files/`
/// prefix stripped off.
fn dest_rel_for(library_dir: &Dir<'static>, file: &include_dir::File<'static>) -> String {
    let prefix = format!("{}/files/", library_dir.path().display());
    file.path()
        .to_string_lossy()
        .strip_prefix(prefix.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| file.path().to_string_lossy().to_string())
}

fn manifest_path(ctx: &ToolContext, library_name: &str) -> PathBuf {
    ctx.space_root()
        .join(MANIFEST_DIR_NAME)
        .join(format!("{library_name}.json"))
}

fn write_manifest(ctx: &ToolContext, library_name: &str, manifest: &InstalledManifest) -> Result<(), PkbError> {
    let path = manifest_path(ctx, library_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PkbError::Internal(e.into()))?;
    }
    let contents = serde_json::to_string_pretty(manifest).map_err(|e| PkbError::Internal(e.into()))?;
    std::fs::write(&path, contents).map_err(|e| PkbError::Internal(e.into()))
}

fn read_manifest(ctx: &ToolContext, library_name: &str) -> Result<Option<InstalledManifest>, PkbError> {
    let path = manifest_path(ctx, library_name);
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| PkbError::Internal(e.into())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(PkbError::Internal(error.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_proposals::ProposalManager;
    use pkb_store::GraphStore;

    fn admin_ctx() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("db.sqlite"), false, false, true).unwrap();
        let ctx = ToolContext::new(
            store,
            None,
            dir.path(),
            ProposalManager::new(dir.path(), None),
            true,
        );
        (dir, ctx)
    }

    #[tokio::test]
    async fn given_admin_context_when_installed_then_marker_file_written() {
        let (dir, ctx) = admin_ctx();

        let result = install_library(
            &ctx,
            InstallLibraryInput {
                library_name: "proposals".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(result.version, "1.0.0");
        assert!(result.installed_files.contains(&"Library/Proposals.md".to_string()));
        assert!(dir.path().join("Library/Proposals.md").is_file());
    }

    #[tokio::test]
    async fn given_non_admin_context_when_installed_then_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("db.sqlite"), false, false, true).unwrap();
        let ctx = ToolContext::new(store, None, dir.path(), ProposalManager::new(dir.path(), None), false);

        let err = install_library(
            &ctx,
            InstallLibraryInput {
                library_name: "proposals".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), pkb_errors::PkbErrorKind::InvalidQuery);
    }

    #[tokio::test]
    async fn given_locally_edited_file_when_updated_then_skipped() {
        let (dir, ctx) = admin_ctx();
        install_library(
            &ctx,
            InstallLibraryInput {
                library_name: "proposals".to_string(),
            },
        )
        .await
        .unwrap();

        std::fs::write(dir.path().join("Library/Proposals.md"), "locally edited").unwrap();

        let result = update_library(
            &ctx,
            UpdateLibraryInput {
                library_name: "proposals".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(result.skipped_files.contains(&"Library/Proposals.md".to_string()));
        assert!(result.updated_files.is_empty());
    }
}
