//! Change detection: byte-exact recursive comparison of two directory trees.
//!
//! Two trees are identical when they have the same relative paths, the same
//! entry kinds at each path, and byte-identical files. Neither tree is ever
//! modified.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const CHUNK: usize = 8 * 1024;

/// Everything that made two trees differ, as paths relative to the roots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    /// Present only in the left tree.
    pub left_only: Vec<PathBuf>,
    /// Present only in the right tree.
    pub right_only: Vec<PathBuf>,
    /// Present on both sides with mismatched kinds, or not comparable at all.
    pub funny: Vec<PathBuf>,
    /// Regular files whose bytes differ, or that could not be read.
    pub diff_files: Vec<PathBuf>,
}

impl TreeDiff {
    pub fn is_identical(&self) -> bool {
        self.left_only.is_empty()
            && self.right_only.is_empty()
            && self.funny.is_empty()
            && self.diff_files.is_empty()
    }
}

/// True if the trees rooted at `a` and `b` are not identical.
pub fn differs(a: &Path, b: &Path) -> bool {
    !compare_trees(a, b).is_identical()
}

/// Walks both trees depth-first and reports every difference found.
pub fn compare_trees(a: &Path, b: &Path) -> TreeDiff {
    let mut diff = TreeDiff::default();
    compare_dir(a, b, Path::new(""), &mut diff);
    diff
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
    Other,
}

fn compare_dir(a: &Path, b: &Path, rel: &Path, diff: &mut TreeDiff) {
    let (left, right) = match (list_dir(a), list_dir(b)) {
        (Ok(left), Ok(right)) => (left, right),
        _ => {
            tracing::debug!(left = %a.display(), right = %b.display(), "Directory not listable");
            diff.funny.push(rel.to_path_buf());
            return;
        }
    };

    let mut common_dirs = Vec::new();

    for (name, left_kind) in &left {
        let path = rel.join(name);
        match right.get(name) {
            None => diff.left_only.push(path),
            Some(right_kind) => match (left_kind, right_kind) {
                (Some(Kind::File), Some(Kind::File)) => {
                    if !same_contents(&a.join(name), &b.join(name)) {
                        diff.diff_files.push(path);
                    }
                }
                (Some(Kind::Dir), Some(Kind::Dir)) => common_dirs.push(name.clone()),
                _ => diff.funny.push(path),
            },
        }
    }
    for name in right.keys() {
        if !left.contains_key(name) {
            diff.right_only.push(rel.join(name));
        }
    }

    for name in common_dirs {
        compare_dir(&a.join(&name), &b.join(&name), &rel.join(&name), diff);
    }
}

/// Entry names with their kind; `None` when the entry could not be stat'ed.
fn list_dir(dir: &Path) -> io::Result<BTreeMap<OsString, Option<Kind>>> {
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Follows symlinks, so a link to a file compares as that file.
        let kind = fs::metadata(entry.path()).ok().map(|meta| {
            if meta.is_dir() {
                Kind::Dir
            } else if meta.is_file() {
                Kind::File
            } else {
                Kind::Other
            }
        });
        entries.insert(entry.file_name(), kind);
    }
    Ok(entries)
}

fn same_contents(a: &Path, b: &Path) -> bool {
    match contents_equal(a, b) {
        Ok(equal) => equal,
        Err(e) => {
            tracing::debug!(error = ?e, left = %a.display(), right = %b.display(), "File comparison failed");
            false
        }
    }
}

fn contents_equal(a: &Path, b: &Path) -> io::Result<bool> {
    let mut left = File::open(a)?;
    let mut right = File::open(b)?;
    let mut left_buf = [0u8; CHUNK];
    let mut right_buf = [0u8; CHUNK];
    loop {
        let n = read_full(&mut left, &mut left_buf)?;
        let m = read_full(&mut right, &mut right_buf)?;
        if n != m || left_buf[..n] != right_buf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
