//! Deterministic traversal of a working tree.
//!
//! Built on `walkdir`, which keeps its own explicit stack, so pathological
//! nesting cannot overflow ours; depth is additionally capped by
//! `corpus.max_depth`.
//!
//! Ordering within one directory:
//!
//! 1. regular files, ascending by byte-wise file name;
//! 2. then subdirectories, in the order the OS listed them.
//!
//! Because `walkdir` yields pre-order and sorts each directory's children
//! before descending, this gives "all of a directory's files, then each
//! subdirectory in turn". Files near the root are seen first, which is what
//! the budget relies on to favour README-style documents.
//!
//! Both iterators are lazy: when the consumer stops pulling, no further
//! directories are listed and no further files are read.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::extract::extract_text;
use crate::models::{CandidateFile, TraversalEntry};
use crate::policy;

/// Lazily walk `root`, yielding every non-ignored directory and eligible file.
///
/// The root itself is not yielded. Listing errors are logged and skipped.
pub fn walk(root: &Path, max_depth: usize) -> impl Iterator<Item = TraversalEntry> {
    let root_buf = root.to_path_buf();
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by(files_first_then_name)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && policy::is_ignored_dir(&name_of(e))))
        .filter_map(|res| match res {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter_map(move |entry| to_traversal_entry(&root_buf, &entry))
}

/// Lazily walk `root` and read each eligible file into a [`CandidateFile`].
///
/// Files that cannot be read or decoded are logged and skipped.
pub fn candidates(root: &Path, max_depth: usize) -> impl Iterator<Item = CandidateFile> {
    let root_buf: PathBuf = root.to_path_buf();
    walk(root, max_depth)
        .filter(|entry| !entry.is_directory)
        .filter_map(move |entry| read_candidate(&root_buf, entry))
}

fn read_candidate(root: &Path, entry: TraversalEntry) -> Option<CandidateFile> {
    let full = root.join(&entry.relative_path);
    let bytes = match std::fs::read(&full) {
        Ok(b) => b,
        Err(err) => {
            tracing::warn!(path = %entry.relative_path, error = %err, "skipping unreadable file");
            return None;
        }
    };
    match extract_text(bytes, &entry.extension) {
        Ok(text) => {
            tracing::debug!(path = %entry.relative_path, "read candidate");
            Some(CandidateFile::new(entry.relative_path, text))
        }
        Err(err) => {
            tracing::warn!(path = %entry.relative_path, error = %err, "skipping undecodable file");
            None
        }
    }
}

fn to_traversal_entry(root: &Path, entry: &DirEntry) -> Option<TraversalEntry> {
    let file_type = entry.file_type();
    let name = name_of(entry);
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let relative_path = relative.to_string_lossy().replace('\\', "/");

    if file_type.is_dir() {
        return Some(TraversalEntry {
            relative_path,
            extension: String::new(),
            is_directory: true,
        });
    }
    // Symlinks and special files are never read.
    if !file_type.is_file() || !policy::is_eligible(&name) {
        return None;
    }
    Some(TraversalEntry {
        relative_path,
        extension: policy::extension_of(&name),
        is_directory: false,
    })
}

fn name_of(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().into_owned()
}

/// Files before directories; files by name; directories keep read order
/// (walkdir's sort is stable).
fn files_first_then_name(a: &DirEntry, b: &DirEntry) -> Ordering {
    match (a.file_type().is_dir(), b.file_type().is_dir()) {
        (false, false) => a.file_name().cmp(b.file_name()),
        (true, true) => Ordering::Equal,
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
    }
}
