// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Crash-safe file replacement shared by the store, config and mod list.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::Error;

#[cfg(test)]
#[path = "./persist_test.rs"]
mod persist_test;

/// Replace the file at `path` with `contents`.
///
/// Missing parent directories are created. The data is written and synced
/// to a sibling temporary file which is then renamed over `path`, so readers
/// see either the old or the new file and never a truncated one.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> crate::Result<()> {
    let path = path.as_ref();
    let write_failed = |error| Error::WriteFailed {
        path: path.to_path_buf(),
        error,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_failed)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(contents).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    tracing::trace!(path = %path.display(), bytes = contents.len(), "replaced file");
    Ok(())
}
