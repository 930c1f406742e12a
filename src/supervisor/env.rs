//! Runtime PATH resolution
//! Apps launched from the Finder or a launch agent get a minimal environment,
//! while pm2 usually lives under a package-manager prefix only the user's
//! interactive shell knows about.
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

use super::client::{run_captured, Captured};

pub const DEFAULT_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin:/usr/local/bin:/opt/homebrew/bin";

const SHELL_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Inherited PATH if non-empty, else the login shell's PATH, else `DEFAULT_PATH`
pub fn resolve_path(inherited: Option<String>, login_shell: &Path) -> String {
    if let Some(path) = inherited.filter(|p| !p.trim().is_empty()) {
        return path;
    }

    match query_login_shell(login_shell, SHELL_QUERY_TIMEOUT) {
        Some(path) => path,
        None => {
            warn!("Falling back to default PATH: {}", DEFAULT_PATH);
            DEFAULT_PATH.to_string()
        }
    }
}

/// Ask `<shell> -l -c 'echo $PATH'` for its PATH; output is trimmed and used as is
pub fn query_login_shell(shell: &Path, timeout: Duration) -> Option<String> {
    let mut command = Command::new(shell);
    command
        .args(["-l", "-c", "echo $PATH"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    match run_captured(command, Some(timeout)) {
        Ok(Captured {
            status: Some(_),
            output,
        }) => {
            let path = output.trim();
            if path.is_empty() {
                debug!("Login shell {:?} printed an empty PATH", shell);
                None
            } else {
                Some(path.to_string())
            }
        }
        Ok(Captured { status: None, .. }) => {
            warn!("Login shell {:?} did not answer within {:?}", shell, timeout);
            None
        }
        Err(e) => {
            warn!("Could not query login shell {:?}: {}", shell, e);
            None
        }
    }
}

/// Append package-manager bin directories that exist but are missing from `path`
pub fn with_package_manager_dirs(path: &str, home: &Path) -> String {
    let mut entries: Vec<String> = path
        .split(':')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    for dir in package_manager_dirs(home) {
        let dir = dir.to_string_lossy().to_string();
        if !entries.contains(&dir) {
            debug!("Adding {} to PATH", dir);
            entries.push(dir);
        }
    }

    entries.join(":")
}

fn package_manager_dirs(home: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/opt/homebrew/bin"), // homebrew arm64
        PathBuf::from("/usr/local/bin"),    // homebrew intel
        home.join(".local").join("bin"),
        home.join(".npm-global").join("bin"),
        home.join("Library").join("pnpm"),
        home.join(".bun").join("bin"),
    ];

    // Every installed nvm node version
    let nvm_dir = home.join(".nvm").join("versions").join("node");
    if let Ok(entries) = std::fs::read_dir(&nvm_dir) {
        let mut versions: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path().join("bin"))
            .collect();
        versions.sort();
        candidates.extend(versions);
    }

    candidates.into_iter().filter(|dir| dir.is_dir()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_inherited_path_wins() {
        let path = resolve_path(Some("/a:/b".to_string()), Path::new("/no/such/shell"));
        assert_eq!(path, "/a:/b");
    }

    #[test]
    fn test_blank_inherited_path_falls_through_to_default() {
        let path = resolve_path(Some("  ".to_string()), Path::new("/no/such/shell"));
        assert_eq!(path, DEFAULT_PATH);

        let path = resolve_path(None, Path::new("/no/such/shell"));
        assert_eq!(path, DEFAULT_PATH);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_output_is_trimmed_and_used_verbatim() {
        // echo just prints its arguments back, which is enough to see what we'd use
        let path = query_login_shell(Path::new("/bin/echo"), Duration::from_secs(5));
        assert_eq!(path.as_deref(), Some("-l -c echo $PATH"));
    }

    #[cfg(unix)]
    #[test]
    fn test_profile_background_job_does_not_hang_the_query() {
        use std::os::unix::fs::PermissionsExt;

        // A login profile that leaves a job running with the shell's stdout
        let dir = tempdir().unwrap();
        let shell = dir.path().join("fake-shell");
        std::fs::write(&shell, "#!/bin/sh\nsleep 8 &\necho /profile/bin\n").unwrap();
        std::fs::set_permissions(&shell, std::fs::Permissions::from_mode(0o755)).unwrap();

        let started = std::time::Instant::now();
        let path = query_login_shell(&shell, Duration::from_secs(1));

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(path.as_deref(), Some("/profile/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unresponsive_shell_gives_none() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let shell = dir.path().join("slow-shell");
        std::fs::write(&shell, "#!/bin/sh\nsleep 8\necho /never/bin\n").unwrap();
        std::fs::set_permissions(&shell, std::fs::Permissions::from_mode(0o755)).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(query_login_shell(&shell, Duration::from_secs(1)), None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_package_manager_dirs_are_appended_once() {
        let home = tempdir().unwrap();
        let local_bin = home.path().join(".local").join("bin");
        let nvm_bin = home.path().join(".nvm/versions/node/v20.11.0/bin");
        std::fs::create_dir_all(&local_bin).unwrap();
        std::fs::create_dir_all(&nvm_bin).unwrap();

        let base = format!("/usr/bin:{}", local_bin.display());
        let path = with_package_manager_dirs(&base, home.path());
        let entries: Vec<&str> = path.split(':').collect();

        assert_eq!(entries[0], "/usr/bin");
        assert_eq!(entries[1], local_bin.to_str().unwrap());
        assert_eq!(
            entries.iter().filter(|e| **e == local_bin.to_str().unwrap()).count(),
            1
        );
        assert_eq!(entries.last().copied(), nvm_bin.to_str());
    }
}
