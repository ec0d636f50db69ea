use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Write an executable `sh` script named `name` into `dir`.
///
/// `body` is everything after the shebang line.
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}

/// Create `<root>/<path>` as a project working directory.
pub fn project_dir(root: &Path, path: &str) -> Result<PathBuf> {
    let dir = root.join(path);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Whether a process with `pid` still exists (Linux `/proc` check).
#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        // Zombies still have an entry; treat them as gone.
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}
