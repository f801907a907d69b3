//! Path index: the directory tree built from an archive's flat entry list.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::Error;
use crate::zip::ZipFile;

use super::metadata::{FileInfo, Node};

/// Key of the root directory.
pub const ROOT: &str = "/";

/// Normalize an archive name or a caller path into an index key.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment
/// and stops at the root, and leading or trailing slashes are ignored, so
/// `"dir/"`, `"/dir"` and `"./x/../dir"` all become `"dir"`. The root is
/// `"/"`.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        ROOT.to_string()
    } else {
        parts.join("/")
    }
}

fn parent_of(key: &str) -> &str {
    match key.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => ROOT,
    }
}

fn depth(key: &str) -> usize {
    if key == ROOT {
        0
    } else {
        key.matches('/').count() + 1
    }
}

#[derive(Default)]
struct Draft {
    file: Option<ZipFile>,
    children: Vec<String>,
}

/// Immutable map from normalized path to metadata.
pub struct Index {
    nodes: HashMap<String, FileInfo>,
}

impl Index {
    /// Build the tree from the archive's entries.
    ///
    /// Every entry is linked into its parent directory; directories that
    /// the archive does not list are synthesized. Children are sorted by
    /// name once all entries are in.
    pub fn build(files: impl IntoIterator<Item = ZipFile>) -> Self {
        let mut drafts: HashMap<String, Draft> = HashMap::new();
        drafts.insert(ROOT.to_string(), Draft::default());
        let mut entries = 0usize;

        for file in files {
            entries += 1;
            let key = normalize_path(&file.entry().file_name);
            if key == ROOT {
                tracing::debug!(name = %file.entry().file_name, "skipping archive entry for the root");
                continue;
            }
            insert_with_parents(&mut drafts, &key);
            if let Some(draft) = drafts.get_mut(&key) {
                if let Some(previous) = &draft.file {
                    tracing::debug!(
                        path = %key,
                        previous = %previous.entry().file_name,
                        name = %file.entry().file_name,
                        "duplicate archive entry replaces earlier one"
                    );
                }
                draft.file = Some(file);
            }
        }

        // Children sit one level below their parent, so building deepest
        // first means every child exists before its parent needs it.
        let mut keys: Vec<String> = drafts.keys().cloned().collect();
        keys.sort_by_key(|k| Reverse(depth(k)));

        let mut nodes: HashMap<String, FileInfo> = HashMap::with_capacity(keys.len());
        for key in keys {
            let Some(draft) = drafts.remove(&key) else {
                continue;
            };
            let mut children: Vec<FileInfo> = draft
                .children
                .iter()
                .filter_map(|child| nodes.get(child).cloned())
                .collect();
            children.sort_by(|a, b| a.name().cmp(b.name()));

            let info = FileInfo::new(Node {
                path: key.clone(),
                file: draft.file,
                children,
            });
            nodes.insert(key, info);
        }

        tracing::debug!(entries, nodes = nodes.len(), "built archive index");
        Self { nodes }
    }

    /// Look up a caller-supplied path.
    pub fn resolve(&self, path: &str) -> Result<FileInfo, Error> {
        self.nodes
            .get(&normalize_path(path))
            .cloned()
            .ok_or(Error::NotFound)
    }

    pub fn root(&self) -> Option<FileInfo> {
        self.nodes.get(ROOT).cloned()
    }

    /// Number of distinct paths, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Create `key` and every missing ancestor, linking each new node into its
/// parent exactly once.
fn insert_with_parents(drafts: &mut HashMap<String, Draft>, key: &str) {
    let mut missing = Vec::new();
    let mut current = key;
    // the root is always present, which ends the walk
    while !drafts.contains_key(current) {
        missing.push(current.to_string());
        current = parent_of(current);
    }

    for key in missing.into_iter().rev() {
        let parent = parent_of(&key).to_string();
        drafts.insert(key.clone(), Draft::default());
        if let Some(parent) = drafts.get_mut(&parent) {
            parent.children.push(key);
        }
    }
}
