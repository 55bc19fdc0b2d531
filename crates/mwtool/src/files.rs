use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// MIME type for an upload, from the file extension. Unknown extensions are
/// left for the server to sniff.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "ogg" | "oga" => "audio/ogg",
        "ogv" => "video/ogg",
        "mp3" => "audio/mpeg",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Streams entries into `entry-<n>.json` files of at most `per_file` entries.
/// Only the chunk being filled is held in memory.
pub struct JsonChunkWriter<T> {
    directory: PathBuf,
    per_file: usize,
    chunk: Vec<T>,
    written: usize,
}

impl<T: Serialize> JsonChunkWriter<T> {
    pub fn create(directory: &Path, per_file: usize) -> Result<Self> {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;
        let per_file = per_file.max(1);
        Ok(Self {
            directory: directory.to_path_buf(),
            per_file,
            chunk: Vec::with_capacity(per_file),
            written: 0,
        })
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.chunk.push(item);
        if self.chunk.len() == self.per_file {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Writes the trailing partial chunk. Returns how many files were written.
    pub fn finish(mut self) -> Result<usize> {
        if !self.chunk.is_empty() {
            self.flush_chunk()?;
        }
        Ok(self.written)
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let path = self.directory.join(format!("entry-{}.json", self.written));
        let rendered = serde_json::to_string(&self.chunk).context("failed to serialize entries")?;
        fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
        self.written += 1;
        self.chunk.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use serde_json::{Value, json};
    use tempfile::tempdir;

    use super::{JsonChunkWriter, mime_type_for};

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type_for(Path::new("Map.PNG")), Some("image/png"));
        assert_eq!(mime_type_for(Path::new("dir/photo.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("archive.xyz")), None);
        assert_eq!(mime_type_for(Path::new("README")), None);
    }

    #[test]
    fn chunks_are_split_by_entry_count() {
        let temp = tempdir().expect("tempdir");
        let mut writer = JsonChunkWriter::create(temp.path(), 2).expect("create");
        for revid in 0..5 {
            writer.push(json!({"revid": revid})).expect("push");
        }
        assert!(temp.path().join("entry-1.json").exists());
        assert!(!temp.path().join("entry-2.json").exists());
        assert_eq!(writer.finish().expect("finish"), 3);

        let last: Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("entry-2.json")).expect("read"),
        )
        .expect("json");
        assert_eq!(last, json!([{"revid": 4}]));
    }

    #[test]
    fn full_chunks_are_written_before_finish() {
        let temp = tempdir().expect("tempdir");
        let mut writer = JsonChunkWriter::create(temp.path(), 1).expect("create");
        writer.push(json!(1)).expect("push");
        assert!(temp.path().join("entry-0.json").exists());
        drop(writer);
        assert!(!temp.path().join("entry-1.json").exists());
    }

    #[test]
    fn empty_writer_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let writer = JsonChunkWriter::<Value>::create(temp.path(), 10).expect("create");
        assert_eq!(writer.finish().expect("finish"), 0);
        assert!(!temp.path().join("entry-0.json").exists());
    }
}
