// src/crawler/mod.rs

use crate::constants::{GZIP_EXTENSION, PGN_EXTENSION};
use crate::error::{BookError, BookResult};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Pgn,
    Gzip,
}

pub fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        PGN_EXTENSION => Some(SourceKind::Pgn),
        GZIP_EXTENSION => Some(SourceKind::Gzip),
        _ => None,
    }
}

/// Collects PGN files and archives under the given roots, in a stable order.
pub fn discover(roots: &[PathBuf]) -> BookResult<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for root in roots {
        if !root.exists() {
            return Err(BookError::io(root, io::Error::from(io::ErrorKind::NotFound)));
        }
        collect(root, &mut sources)?;
    }
    Ok(sources)
}

fn collect(root: &Path, sources: &mut Vec<PathBuf>) -> BookResult<()> {
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BookError::io(path, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if source_kind(&path).is_some() {
            sources.push(path);
        } else {
            trace!(path = %path.display(), "ignoring file");
        }
    }
    Ok(())
}

/// Runs `action` on every PGN file a source yields.
///
/// Archives are expanded into a scratch directory that is removed afterwards,
/// whether or not `action` succeeded.
pub fn visit_source<F>(path: &Path, mut action: F) -> BookResult<()>
where
    F: FnMut(&Path) -> BookResult<()>,
{
    match source_kind(path) {
        Some(SourceKind::Pgn) => action(path),
        Some(SourceKind::Gzip) => {
            let archive_error = |source| BookError::Archive { path: path.to_path_buf(), source };
            let scratch = tempfile::Builder::new()
                .prefix("mkbook-")
                .tempdir()
                .map_err(archive_error)?;
            debug!(archive = %path.display(), scratch = %scratch.path().display(), "expanding");

            let result = expand_gzip(path, scratch.path())
                .map_err(archive_error)
                .and_then(|expanded| action(&expanded));
            let cleanup = scratch.close().map_err(archive_error);
            result?;
            cleanup
        }
        None => Ok(()),
    }
}

/// Decompresses `archive` into `dir`, keeping the inner file name.
fn expand_gzip(archive: &Path, dir: &Path) -> io::Result<PathBuf> {
    let stem = archive
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("archive"));
    let mut target = dir.join(stem);
    if target.extension().is_none() {
        target.set_extension(PGN_EXTENSION);
    }

    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(archive)?));
    let mut out = BufWriter::new(File::create(&target)?);
    io::copy(&mut decoder, &mut out)?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn gzip(path: &Path, text: &str) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn test_discover_walks_directories_in_order() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.pgn"), "").unwrap();
        fs::write(dir.path().join("a.PGN"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("sub").join("c.pgn.gz"), "").unwrap();

        let found = discover(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PGN", "b.pgn", "c.pgn.gz"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(discover(&[missing]), Err(BookError::Io { .. })));
    }

    #[test]
    fn test_archive_is_expanded_and_cleaned_up() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("games.pgn.gz");
        gzip(&archive, "1. e4 *\n");

        let mut seen = None;
        visit_source(&archive, |expanded| {
            assert_eq!(expanded.file_name().unwrap(), "games.pgn");
            assert_eq!(fs::read_to_string(expanded).unwrap(), "1. e4 *\n");
            seen = Some(expanded.to_path_buf());
            Ok(())
        })
        .unwrap();

        let scratch = seen.unwrap();
        assert!(!scratch.exists());
        assert!(!scratch.parent().unwrap().exists());
    }

    #[test]
    fn test_scratch_is_removed_when_action_fails() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("games.gz");
        gzip(&archive, "");

        let mut seen = None;
        let result = visit_source(&archive, |expanded| {
            seen = Some(expanded.to_path_buf());
            Err(BookError::Config("stop".to_string()))
        });
        assert!(matches!(result, Err(BookError::Config(_))));
        assert!(!seen.unwrap().parent().unwrap().exists());
    }

    #[test]
    fn test_corrupt_archive_reports_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.pgn.gz");
        fs::write(&archive, b"not gzip at all").unwrap();
        let result = visit_source(&archive, |_| Ok(()));
        assert!(matches!(result, Err(BookError::Archive { .. })));
    }
}
