//! File-backed loaders for GLTF/GLB, OBJ and FBX

mod fbx_import;
mod gltf_import;
mod obj_import;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use viewer_core::error::{Result, ViewerError};

use crate::loader::{AssetLoader, ImportedModel, LoadFuture, LoadRequest, ModelFormat, ProgressSink};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Loads models from the local filesystem (`file://` URLs or plain paths)
#[derive(Debug, Clone, Copy)]
pub struct FileLoader {
    format: ModelFormat,
}

impl FileLoader {
    pub fn new(format: ModelFormat) -> Self {
        Self { format }
    }
}

impl AssetLoader for FileLoader {
    fn load(&self, request: LoadRequest, progress: ProgressSink) -> LoadFuture {
        let format = self.format;
        Box::pin(async move {
            let path = local_path(&request.url)?;
            let bytes = read_with_progress(&path, &progress).await?;
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();

            let model = tokio::task::spawn_blocking(move || {
                parse_model(format, &bytes, &base_dir, &name)
            })
            .await
            .map_err(|e| ViewerError::Task(e.to_string()))??;

            if !model.is_renderable() {
                return Err(ViewerError::EmptyModel(request.url));
            }
            Ok(Arc::new(model))
        })
    }
}

/// Parse an in-memory model; `base_dir` resolves external buffers and materials
pub fn parse_model(
    format: ModelFormat,
    bytes: &[u8],
    base_dir: &Path,
    name: &str,
) -> Result<ImportedModel> {
    match format {
        ModelFormat::Gltf => gltf_import::parse(bytes, base_dir, name),
        ModelFormat::Obj => obj_import::parse(bytes, base_dir, name),
        ModelFormat::Fbx => fbx_import::parse(bytes, name),
    }
}

fn local_path(url: &str) -> Result<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(ViewerError::UnsupportedScheme(scheme.to_string()));
    }
    Ok(PathBuf::from(url))
}

async fn read_with_progress(path: &Path, progress: &ProgressSink) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let total = file.metadata().await?.len();
    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
    progress.report(0, Some(total));
    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        progress.report(bytes.len() as u64, Some(total));
    }
    Ok(bytes)
}
