//! Directory walk feeding the sender's request list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Collects every regular file under `root`, pre-order: a directory's own
/// files come before its subdirectories' files. Symlinks and special files
/// are skipped. Ordering within a directory is whatever the filesystem
/// yields.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect(root, &mut files)?;
    Ok(files)
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            files.push(entry.path());
        } else if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }
    for subdir in subdirs {
        collect(&subdir, files)?;
    }
    Ok(())
}
