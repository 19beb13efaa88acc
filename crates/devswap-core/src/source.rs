//! Host source tree resolution and the git clone helper

use crate::{CoreError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Directory name a remote repository is cloned into.
///
/// `git@host:org/repo.git` and `https://host/org/repo` both give `repo`.
pub fn repo_dir_name(remote: &str) -> Result<String> {
    let trimmed = remote.trim().trim_end_matches('/');
    let last = trimmed.rsplit(&['/', ':'][..]).next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() || name == "." || name == ".." {
        return Err(CoreError::InvalidRemote(remote.to_string()));
    }
    Ok(name.to_string())
}

/// Clone `branch` of `remote` into `base_dir/<repo>`, replacing whatever is there
pub async fn clone_remote(remote: &str, branch: &str, base_dir: &Path) -> Result<PathBuf> {
    let dir = base_dir.join(repo_dir_name(remote)?);

    match tokio::fs::symlink_metadata(&dir).await {
        Ok(meta) if meta.is_dir() => {
            tracing::info!("Removing existing {}", dir.display());
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(_) => {
            tracing::info!("Removing existing {}", dir.display());
            tokio::fs::remove_file(&dir).await?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!("Cloning {} ({}) into {}", remote, branch, dir.display());
    let status = Command::new("git")
        .arg("clone")
        .arg(remote)
        .arg(&dir)
        .args(["-b", branch, "--single-branch"])
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| CoreError::Clone(format!("failed to run git: {}", e)))?;

    if !status.success() {
        return Err(CoreError::Clone(match status.code() {
            Some(code) => format!("git exited with code {}", code),
            None => "git was killed by a signal".to_string(),
        }));
    }

    Ok(dir)
}

/// Absolute host path of the source tree; the working directory when none is given
pub fn resolve_source(source: Option<&str>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(absolutize(source, &cwd))
}

fn absolutize(source: Option<&str>, cwd: &Path) -> PathBuf {
    match source.filter(|s| !s.is_empty()) {
        Some(s) => {
            let path = PathBuf::from(shellexpand::tilde(s).as_ref());
            if path.is_absolute() {
                path
            } else {
                cwd.join(path)
            }
        }
        None => cwd.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("git@host:org/repo.git").unwrap(), "repo");
        assert_eq!(repo_dir_name("https://github.com/org/service").unwrap(), "service");
        assert_eq!(repo_dir_name("https://github.com/org/service/").unwrap(), "service");
        assert_eq!(repo_dir_name("git@host:repo.git").unwrap(), "repo");
        assert_eq!(repo_dir_name("/srv/git/tools.git").unwrap(), "tools");
    }

    #[test]
    fn test_repo_dir_name_rejects_empty() {
        assert!(matches!(
            repo_dir_name("https://host/org/.git"),
            Err(CoreError::InvalidRemote(_))
        ));
        assert!(matches!(repo_dir_name(""), Err(CoreError::InvalidRemote(_))));
        assert!(matches!(repo_dir_name("host:.."), Err(CoreError::InvalidRemote(_))));
    }

    #[test]
    fn test_absolutize() {
        let cwd = Path::new("/work");
        assert_eq!(absolutize(None, cwd), PathBuf::from("/work"));
        assert_eq!(absolutize(Some(""), cwd), PathBuf::from("/work"));
        assert_eq!(absolutize(Some("svc"), cwd), PathBuf::from("/work/svc"));
        assert_eq!(absolutize(Some("/abs/svc"), cwd), PathBuf::from("/abs/svc"));
    }

    #[test]
    fn test_absolutize_expands_tilde() {
        let path = absolutize(Some("~/src"), Path::new("/work"));
        assert!(path.is_absolute());
        assert!(path.ends_with("src"));
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Local repository `<tmp>/origin/tool.git` with a `dev` branch holding `main.go`
    fn make_origin(tmp: &Path) -> PathBuf {
        let work = tmp.join("work");
        std::fs::create_dir_all(&work).unwrap();
        git(&work, &["init", "-q"]);
        git(&work, &["checkout", "-q", "-b", "dev"]);
        std::fs::write(work.join("main.go"), "package main\n").unwrap();
        git(&work, &["add", "main.go"]);
        git(&work, &["commit", "-q", "-m", "init"]);

        let origin = tmp.join("origin").join("tool.git");
        std::fs::create_dir_all(origin.parent().unwrap()).unwrap();
        git(
            tmp,
            &["clone", "-q", "--bare", work.to_str().unwrap(), origin.to_str().unwrap()],
        );
        origin
    }

    #[tokio::test]
    async fn test_clone_replaces_existing_directory() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let origin = make_origin(tmp.path());
        let base = tmp.path().join("clones");
        std::fs::create_dir_all(base.join("tool")).unwrap();
        std::fs::write(base.join("tool").join("stale.txt"), "old").unwrap();

        let dir = clone_remote(origin.to_str().unwrap(), "dev", &base)
            .await
            .unwrap();

        assert_eq!(dir, base.join("tool"));
        assert!(dir.join("main.go").exists());
        assert!(!dir.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_clone_missing_branch_fails() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let origin = make_origin(tmp.path());

        let result = clone_remote(origin.to_str().unwrap(), "no-such-branch", tmp.path()).await;
        assert!(matches!(result, Err(CoreError::Clone(_))));
    }
}
