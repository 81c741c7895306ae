//! Expansion of a successful rename into one event per moved file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::vec;

struct Level {
    old: PathBuf,
    new: PathBuf,
    names: vec::IntoIter<OsString>,
}

/// Called after `rename(old, new)` succeeded. Visits `(old, new)` pairs for
/// every non-directory at or below `new`, depth first in readdir order,
/// mapping each back to where it lived under `old`.
///
/// Symlinks are leaves. Anything that vanished or cannot be read by the
/// time it is inspected is skipped. A directory is read to the end and
/// closed before its children are entered, so the walk holds at most one
/// descriptor whatever the depth.
pub fn walk_rename<E>(
    old: &Path,
    new: &Path,
    mut visit: impl FnMut(&Path, &Path) -> Result<(), E>,
) -> Result<(), E> {
    let mut stack = Vec::new();
    if let Some(level) = enter(old, new, &mut visit)? {
        stack.push(level);
    }

    while let Some(top) = stack.last_mut() {
        let Some(name) = top.names.next() else {
            stack.pop();
            continue;
        };
        let old_child = top.old.join(&name);
        let new_child = top.new.join(&name);
        if let Some(level) = enter(&old_child, &new_child, &mut visit)? {
            stack.push(level);
        }
    }
    Ok(())
}

/// Visit a leaf, or open a directory level for the caller to descend into.
fn enter<E>(
    old: &Path,
    new: &Path,
    visit: &mut impl FnMut(&Path, &Path) -> Result<(), E>,
) -> Result<Option<Level>, E> {
    let Ok(meta) = fs::symlink_metadata(new) else {
        return Ok(None);
    };
    if !meta.is_dir() {
        visit(old, new)?;
        return Ok(None);
    }
    let Ok(entries) = fs::read_dir(new) else {
        return Ok(None);
    };
    let names: Vec<OsString> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.file_name()))
        .collect();
    Ok(Some(Level {
        old: old.to_path_buf(),
        new: new.to_path_buf(),
        names: names.into_iter(),
    }))
}
