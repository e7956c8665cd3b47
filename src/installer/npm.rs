//! Installer backed by an npminstall-compatible command line program.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use super::{InstallRequest, Installer};

/// Program used when none is configured.
pub const DEFAULT_INSTALLER: &str = "npminstall";

/// Number of trailing stderr lines kept in an install failure.
const STDERR_TAIL_LINES: usize = 20;

/// Runs `<program> --root=<root> [--storeDir=<store>] --registry=<url> <name>@<version>`.
///
/// The program is expected to leave the package under
/// `<store>/_<name>@<version>@<name>` with its `package.json` at the top.
pub struct NpmInstaller {
    program: String,
    registry_url: String,
}

impl NpmInstaller {
    pub fn new(program: &str, registry_url: &str) -> Self {
        Self {
            program: program.to_string(),
            registry_url: registry_url.to_string(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line arguments for `request`.
    pub fn args(&self, request: &InstallRequest) -> Vec<String> {
        let mut args = vec![format!("--root={}", request.root.display())];
        if let Some(store) = &request.store_dir {
            args.push(format!("--storeDir={}", store.display()));
        }
        args.push(format!("--registry={}", self.registry_url));
        args.push(request.package_spec());
        args
    }
}

#[async_trait]
impl Installer for NpmInstaller {
    #[tracing::instrument(skip(self))]
    async fn install(&self, request: &InstallRequest) -> Result<()> {
        let args = self.args(request);
        info!("Installing {} with {}...", request.package_spec(), self.program);
        debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run installer '{}'", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{} output:\n{}", self.program, stdout.trim_end());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            bail!(
                "'{}' exited with {}{}",
                self.program,
                output.status,
                if tail.is_empty() {
                    String::new()
                } else {
                    format!(":\n{}", tail)
                }
            );
        }

        info!("Installed {}.", request.package_spec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use std::path::PathBuf;

    fn request(store_dir: Option<PathBuf>) -> InstallRequest {
        InstallRequest {
            root: PathBuf::from("/deps"),
            store_dir,
            name: "@scope/cmd".into(),
            version: Version::parse("1.2.0").unwrap(),
        }
    }

    #[test]
    fn test_args_with_store() {
        let installer = NpmInstaller::new("npminstall", "https://registry.npmmirror.com/");
        let args = installer.args(&request(Some(PathBuf::from("/deps/node_modules"))));
        assert_eq!(
            args,
            vec![
                format!("--root={}", PathBuf::from("/deps").display()),
                format!("--storeDir={}", PathBuf::from("/deps/node_modules").display()),
                "--registry=https://registry.npmmirror.com/".to_string(),
                "@scope/cmd@1.2.0".to_string(),
            ]
        );
    }

    #[test]
    fn test_args_without_store() {
        let installer = NpmInstaller::new("npminstall", "https://registry.npmjs.org/");
        let args = installer.args(&request(None));
        assert_eq!(args.len(), 3);
        assert!(!args.iter().any(|a| a.starts_with("--storeDir")));
    }

    #[tokio::test]
    async fn test_install_missing_program_fails() {
        let installer = NpmInstaller::new("cmdpack-no-such-installer", "http://localhost/");
        let err = installer.install(&request(None)).await.unwrap_err();
        assert!(err.to_string().contains("cmdpack-no-such-installer"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_nonzero_exit_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "#!/bin/sh\necho \"404 $4\" >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let installer = NpmInstaller::new(script.to_str().unwrap(), "http://localhost/");
        let err = installer
            .install(&request(Some(PathBuf::from("/deps/node_modules"))))
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("exited with"));
        assert!(msg.contains("404 @scope/cmd@1.2.0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_passes_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("args.txt");
        let script = dir.path().join("record.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > '{}'\n", record.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let installer = NpmInstaller::new(script.to_str().unwrap(), "http://localhost/");
        installer.install(&request(None)).await.unwrap();

        let recorded = std::fs::read_to_string(&record).unwrap();
        assert_eq!(
            recorded.trim(),
            "--root=/deps --registry=http://localhost/ @scope/cmd@1.2.0"
        );
    }
}
