use std::path::{Path, PathBuf};

use crate::error::PluginError;

/// Walk the plugins directory for candidate executables. `node_modules`
/// subtrees are pruned; files without any execute bit are skipped silently.
pub fn discover_plugin_paths(dir: &Path) -> Result<Vec<PathBuf>, PluginError> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(PluginError::Io(err.to_string())),
        };

        for entry in entries {
            let entry = entry.map_err(|e| PluginError::Io(e.to_string()))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| PluginError::Io(e.to_string()))?;

            if file_type.is_dir() {
                if entry.file_name() == "node_modules" {
                    continue;
                }
                stack.push(path);
                continue;
            }

            if file_type.is_file() && is_executable(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn discovers_executable_files_and_skips_non_executable_and_node_modules() {
        let dir = tempfile::tempdir().unwrap();

        let exe_path = dir.path().join("search-plugin");
        std::fs::File::create(&exe_path).unwrap().write_all(b"#!/bin/sh\n").unwrap();
        make_executable(&exe_path);

        let data_path = dir.path().join("readme.txt");
        std::fs::File::create(&data_path).unwrap();

        let nested_dir = dir.path().join("subdir");
        std::fs::create_dir(&nested_dir).unwrap();
        let nested_exe = nested_dir.join("nested-plugin");
        std::fs::File::create(&nested_exe).unwrap();
        make_executable(&nested_exe);

        let node_modules = dir.path().join("node_modules");
        std::fs::create_dir(&node_modules).unwrap();
        let node_modules_exe = node_modules.join("some-binary");
        std::fs::File::create(&node_modules_exe).unwrap();
        make_executable(&node_modules_exe);

        let found = discover_plugin_paths(dir.path()).unwrap();
        assert_eq!(found, vec![exe_path, nested_exe]);
    }

    #[test]
    fn missing_directory_yields_empty_list() {
        let found = discover_plugin_paths(Path::new("/nonexistent/pixie-plugins-dir")).unwrap();
        assert!(found.is_empty());
    }
}
