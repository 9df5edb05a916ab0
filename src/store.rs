//! Durable storage helpers: atomic JSON files and LZ4-compressed bincode blobs.
//!
//! Every write goes to a sibling temp file which is then renamed over the
//! target, so a crash mid-write leaves either the old or the new file, never
//! a truncated one.

use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::SearchError;

/// Magic bytes identifying LZ4-compressed index files.
pub const LZ4_MAGIC: &[u8; 4] = b"LZ4S";

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp{}", std::process::id()));
    path.with_file_name(name)
}

/// Write `bytes` to `path` via temp-file-then-rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Serialize `value` as pretty JSON and write it atomically.
/// Failures are reported as [`SearchError::Persistence`].
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SearchError> {
    let persistence = |message: String| SearchError::Persistence {
        path: path.display().to_string(),
        message,
    };
    let json = serde_json::to_vec_pretty(value).map_err(|e| persistence(e.to_string()))?;
    write_atomic(path, &json).map_err(|e| persistence(e.to_string()))
}

/// Read a JSON file, returning `T::default()` when the file is missing or
/// unreadable. A corrupt file is logged and treated as empty: the registry
/// and cache are rebuilt by the next registration or scan.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "Cannot read state file, using empty state");
            }
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "State file is corrupt, using empty state");
            T::default()
        }
    }
}

/// Save a serializable value to a file with LZ4 frame compression.
/// Writes magic bytes, then LZ4-compressed bincode data, to a temp file
/// which is renamed over `path` once fully flushed.
pub fn save_compressed<T: Serialize>(path: &Path, data: &T, label: &str) -> Result<(), SearchError> {
    let start = Instant::now();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(path);

    let write = || -> Result<(), SearchError> {
        let file = fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(LZ4_MAGIC)?;
        let mut encoder = lz4_flex::frame::FrameEncoder::new(writer);
        bincode::serialize_into(&mut encoder, data)?;
        let mut writer = encoder.finish().map_err(std::io::Error::other)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    let compressed_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    debug!(
        label,
        path = %path.display(),
        size_mb = format_args!("{:.2}", compressed_size as f64 / 1_048_576.0),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "Saved compressed file"
    );
    Ok(())
}

/// Load a value written by [`save_compressed`].
/// Returns `Err(SearchError::IndexLoad)` with a descriptive message on failure.
pub fn load_compressed<T: DeserializeOwned>(path: &Path, label: &str) -> Result<T, SearchError> {
    let path_str = path.display().to_string();
    let start = Instant::now();
    let load_err = |message: String| SearchError::IndexLoad {
        path: path_str.clone(),
        message,
    };

    let file = fs::File::open(path).map_err(|e| load_err(format!("cannot open file: {}", e)))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| load_err(format!("read error (magic bytes): {}", e)))?;
    if &magic != LZ4_MAGIC {
        return Err(load_err("not an LZ4 index file (bad magic bytes)".to_string()));
    }

    let decoder = lz4_flex::frame::FrameDecoder::new(reader);
    let result = bincode::deserialize_from(decoder)
        .map_err(|e| load_err(format!("LZ4 deserialization failed: {}", e)))?;

    debug!(
        label,
        path = %path_str,
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "Loaded compressed file"
    );
    Ok(result)
}
