//! Input resolution: turn an upload into a local file the converter can open.
//!
//! pdfium and the image decoder both want a file-system path. Uploads that
//! arrive as bytes are written to a [`NamedTempFile`] carrying the original
//! extension; the file is removed when the [`StagedInput`] drops, whether
//! extraction finished, failed, or was abandoned on timeout.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::output::{FileKind, RawDocument};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// An upload ready for extraction.
#[derive(Debug)]
pub struct StagedInput {
    pub filename: String,
    pub kind: FileKind,
    pub file_size: u64,
    path: PathBuf,
    _temp: Option<NamedTempFile>,
}

impl StagedInput {
    /// Path of the file to extract from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is a temporary copy owned by this value.
    pub fn is_temporary(&self) -> bool {
        self._temp.is_some()
    }
}

/// Check name and size of an upload against the config.
pub fn validate_upload(filename: &str, size: u64, config: &IngestConfig) -> Result<(), IngestError> {
    if !config.is_allowed(filename) {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        return Err(IngestError::UnsupportedFormat {
            name: filename.to_string(),
            extension,
        });
    }
    if size == 0 {
        return Err(IngestError::UnreadableInput {
            name: filename.to_string(),
            reason: "file is empty".into(),
        });
    }
    if size > config.max_file_size {
        return Err(IngestError::UnreadableInput {
            name: filename.to_string(),
            reason: format!(
                "file is {size} bytes, limit is {} bytes",
                config.max_file_size
            ),
        });
    }
    Ok(())
}

const PDF_MAGIC: &[u8; 4] = b"%PDF";

fn check_pdf_magic(name: &str, head: &[u8]) -> Result<(), IngestError> {
    if head.len() < PDF_MAGIC.len() || &head[..PDF_MAGIC.len()] != PDF_MAGIC {
        let shown = &head[..head.len().min(PDF_MAGIC.len())];
        return Err(IngestError::UnreadableInput {
            name: name.to_string(),
            reason: format!("not a PDF (magic bytes {shown:?})"),
        });
    }
    Ok(())
}

/// Validate a local file and stage it in place.
pub fn stage_path(path: &Path, config: &IngestConfig) -> Result<StagedInput, IngestError> {
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_size = file
        .metadata()
        .map_err(|e| IngestError::UnreadableInput {
            name: filename.clone(),
            reason: e.to_string(),
        })?
        .len();
    validate_upload(&filename, file_size, config)?;

    let kind = FileKind::from_path(path);
    if kind == FileKind::Pdf {
        let mut head = Vec::with_capacity(PDF_MAGIC.len());
        Read::by_ref(&mut file)
            .take(PDF_MAGIC.len() as u64)
            .read_to_end(&mut head)
            .map_err(|e| IngestError::UnreadableInput {
                name: filename.clone(),
                reason: e.to_string(),
            })?;
        check_pdf_magic(&filename, &head)?;
    }

    debug!("Staged local {:?} file: {}", kind, path.display());
    Ok(StagedInput {
        filename,
        kind,
        file_size,
        path: path.to_path_buf(),
        _temp: None,
    })
}

/// Validate an in-memory upload and write it to a temporary file.
pub fn stage_bytes(doc: &RawDocument, config: &IngestConfig) -> Result<StagedInput, IngestError> {
    let file_size = doc.bytes.len() as u64;
    validate_upload(&doc.filename, file_size, config)?;
    if doc.kind == FileKind::Pdf {
        check_pdf_magic(&doc.filename, &doc.bytes)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("ingest-")
        .suffix(&doc.extension())
        .tempfile()
        .map_err(|e| IngestError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(&doc.bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| IngestError::Internal(format!("tempfile write: {e}")))?;

    let path = tmp.path().to_path_buf();
    debug!("Staged {} bytes of '{}' at {}", file_size, doc.filename, path.display());
    Ok(StagedInput {
        filename: doc.filename.clone(),
        kind: doc.kind,
        file_size,
        path,
        _temp: Some(tmp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = stage_path(Path::new("/definitely/not/here.pdf"), &IngestConfig::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn disallowed_extension_rejected() {
        let doc = RawDocument::new("setup.exe", vec![1, 2, 3]);
        let err = stage_bytes(&doc, &IngestConfig::default()).unwrap_err();
        match err {
            IngestError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "exe"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_and_oversized_rejected() {
        let config = IngestConfig::builder().max_file_size(4).build().unwrap();
        let empty = RawDocument::new("a.txt", vec![]);
        assert!(matches!(
            stage_bytes(&empty, &config),
            Err(IngestError::UnreadableInput { .. })
        ));
        let big = RawDocument::new("a.txt", b"12345".to_vec());
        assert!(matches!(
            stage_bytes(&big, &config),
            Err(IngestError::UnreadableInput { .. })
        ));
    }

    #[test]
    fn pdf_magic_checked() {
        let doc = RawDocument::new("fake.pdf", b"hello world".to_vec());
        assert!(matches!(
            stage_bytes(&doc, &IngestConfig::default()),
            Err(IngestError::UnreadableInput { .. })
        ));
    }

    #[test]
    fn truncated_pdf_rejected() {
        for bytes in [&b"%"[..], b"%PD"] {
            let doc = RawDocument::new("short.pdf", bytes.to_vec());
            assert!(matches!(
                stage_bytes(&doc, &IngestConfig::default()),
                Err(IngestError::UnreadableInput { .. })
            ));
        }
        let ok = RawDocument::new("min.pdf", b"%PDF".to_vec());
        assert!(stage_bytes(&ok, &IngestConfig::default()).is_ok());
    }

    #[test]
    fn local_pdf_magic_checked() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.pdf");
        std::fs::write(&short, b"%P").unwrap();
        assert!(matches!(
            stage_path(&short, &IngestConfig::default()),
            Err(IngestError::UnreadableInput { .. })
        ));

        let good = dir.path().join("good.pdf");
        std::fs::write(&good, b"%PDF-1.7\n").unwrap();
        assert_eq!(
            stage_path(&good, &IngestConfig::default()).unwrap().kind,
            FileKind::Pdf
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_pdf_head_is_an_error() {
        // Opening a directory succeeds on unix; reading it does not.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folder.pdf");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(
            stage_path(&path, &IngestConfig::default()),
            Err(IngestError::UnreadableInput { .. })
        ));
    }

    #[test]
    fn temp_copy_removed_on_drop() {
        let doc = RawDocument::new("notes.txt", b"some notes".to_vec());
        let staged = stage_bytes(&doc, &IngestConfig::default()).unwrap();
        let path = staged.path().to_path_buf();
        assert!(staged.is_temporary());
        assert!(path.to_string_lossy().ends_with(".txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"some notes");
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn local_file_staged_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.md");
        std::fs::write(&path, "# Memo").unwrap();
        let staged = stage_path(&path, &IngestConfig::default()).unwrap();
        assert_eq!(staged.filename, "memo.md");
        assert_eq!(staged.kind, FileKind::Text);
        assert_eq!(staged.file_size, 6);
        assert!(!staged.is_temporary());
    }
}
