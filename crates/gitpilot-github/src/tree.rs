//! Pure tree rewrites used by the rename operations.
//!
//! Only non-`tree` entries are carried into the plan: GitHub rebuilds sub-trees from the
//! blob paths, and posting the full list without `base_tree` makes dropped paths disappear.

use serde::{Deserialize, Serialize};

use crate::GithubError;

/// One row of a recursive git tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.entry_type == "tree"
    }

    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }

    fn relocated(&self, path: String) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }
}

/// Result of rewriting a tree listing for a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub entries: Vec<TreeEntry>,
    pub moved: usize,
}

/// Moves the entry at `old_path` to `new_path`, dropping whatever already sat at `new_path`.
pub fn plan_file_rename(
    entries: &[TreeEntry],
    old_path: &str,
    new_path: &str,
) -> Result<RenamePlan, GithubError> {
    let mut planned = Vec::with_capacity(entries.len());
    let mut renamed = None;
    for entry in entries.iter().filter(|entry| !entry.is_tree()) {
        if entry.path == old_path {
            renamed = Some(entry.relocated(new_path.to_string()));
        } else if entry.path != new_path {
            planned.push(entry.clone());
        }
    }

    let Some(renamed) = renamed else {
        return Err(GithubError::NotFound(format!(
            "File {old_path} not found in the repository"
        )));
    };
    planned.push(renamed);
    Ok(RenamePlan {
        entries: planned,
        moved: 1,
    })
}

/// Moves every entry under `old_dir/` beneath `new_dir/`.
///
/// Trailing slashes are ignored. Existing entries under `new_dir/` are dropped, and only the
/// leading `old_dir` prefix of each moved path is replaced.
pub fn plan_directory_rename(
    entries: &[TreeEntry],
    old_dir: &str,
    new_dir: &str,
) -> Result<RenamePlan, GithubError> {
    let old_dir = old_dir.trim_end_matches('/');
    let new_dir = new_dir.trim_end_matches('/');
    if old_dir.is_empty() || new_dir.is_empty() {
        return Err(GithubError::InvalidArgument(
            "directory paths must not be empty".to_string(),
        ));
    }
    let old_prefix = format!("{old_dir}/");
    let new_prefix = format!("{new_dir}/");

    let mut planned = Vec::with_capacity(entries.len());
    let mut moved = 0_usize;
    for entry in entries.iter().filter(|entry| !entry.is_tree()) {
        if let Some(rest) = entry.path.strip_prefix(old_prefix.as_str()) {
            planned.push(entry.relocated(format!("{new_prefix}{rest}")));
            moved += 1;
        } else if entry.path != old_dir
            && entry.path != new_dir
            && !entry.path.starts_with(new_prefix.as_str())
        {
            planned.push(entry.clone());
        }
    }

    if moved == 0 {
        return Err(GithubError::NotFound(format!(
            "Directory {old_dir} not found or is empty"
        )));
    }
    Ok(RenamePlan {
        entries: planned,
        moved,
    })
}
