// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Search-path resolution shared by the workflow and pipeline loaders
//! (CORE §4.C5: "Loaded from a search path ordered: project-local →
//! user-global. Cached by name; project entries shadow global.").

use std::path::{Path, PathBuf};

/// Ordered directories to look for definitions in, project-local first.
pub fn search_dirs(project_dir: Option<&Path>, global_dir: &Path, subdir: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(project_dir) = project_dir {
        dirs.push(project_dir.join(".gobby").join(subdir));
    }
    dirs.push(global_dir.join(subdir));
    dirs
}

/// The default user-global root, `~/.gobby` (CORE §4: "persisted state
/// layout... optional `~/.gobby/` tree").
pub fn default_global_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".gobby")
}

/// Find the first existing `<name>.yaml` or `<name>.yml` on the search path.
pub fn find_definition_file(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    for dir in dirs {
        for ext in ["yaml", "yml"] {
            let candidate = dir.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_directory_is_searched_before_global() {
        let project = PathBuf::from("/work/demo");
        let global = PathBuf::from("/home/u/.gobby");
        let dirs = search_dirs(Some(&project), &global, "workflows");
        assert_eq!(dirs[0], project.join(".gobby").join("workflows"));
        assert_eq!(dirs[1], global.join("workflows"));
    }

    #[test]
    fn without_project_only_global_is_searched() {
        let global = PathBuf::from("/home/u/.gobby");
        let dirs = search_dirs(None, &global, "pipelines");
        assert_eq!(dirs, vec![global.join("pipelines")]);
    }

    #[test]
    fn finds_file_shadowed_by_project_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("project").join(".gobby").join("workflows");
        let global_dir = tmp.path().join("home").join(".gobby").join("workflows");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(project_dir.join("review.yaml"), "project version").unwrap();
        std::fs::write(global_dir.join("review.yaml"), "global version").unwrap();

        let found = find_definition_file(&[project_dir.clone(), global_dir], "review").unwrap();
        assert_eq!(found, project_dir.join("review.yaml"));
    }
}
