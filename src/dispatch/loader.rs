//! Turning a resolved entry file into something that can be invoked.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Environment variable carrying the JSON [`CommandContext`] to the child.
pub const CONTEXT_ENV: &str = "CMDPACK_COMMAND_CONTEXT";

/// What the invoked command learns about how it was resolved.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandContext {
    pub command: String,
    pub package: String,
    /// `None` for local overrides, which carry no resolved version.
    pub version: Option<String>,
    pub entry: PathBuf,
}

/// A loaded command, ready to run.
#[async_trait]
pub trait Command: Send + Sync {
    /// Run with the caller's arguments and return the exit code.
    async fn invoke(&self, args: &[String], context: &CommandContext) -> Result<i32>;
}

/// Knows how to load entry files of some kind.
pub trait CommandLoader: Send + Sync {
    fn name(&self) -> &str;
    fn supports(&self, entry: &Path) -> bool;
    fn load(&self, entry: &Path) -> Result<Box<dyn Command>>;
}

/// Runs entries through an interpreter chosen by file extension.
pub struct ScriptLoader {
    interpreter: String,
    extensions: Vec<String>,
}

impl ScriptLoader {
    pub fn new(interpreter: &str, extensions: &[&str]) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn node() -> Self {
        Self::new("node", &["js", "cjs", "mjs"])
    }

    pub fn shell() -> Self {
        Self::new("sh", &["sh"])
    }
}

impl CommandLoader for ScriptLoader {
    fn name(&self) -> &str {
        &self.interpreter
    }

    fn supports(&self, entry: &Path) -> bool {
        entry
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    fn load(&self, entry: &Path) -> Result<Box<dyn Command>> {
        Ok(Box::new(ProcessCommand {
            program: OsString::from(&self.interpreter),
            leading_args: vec![entry.as_os_str().to_os_string()],
        }))
    }
}

/// Executes the entry file itself.
pub struct NativeLoader;

impl CommandLoader for NativeLoader {
    fn name(&self) -> &str {
        "native"
    }

    fn supports(&self, _entry: &Path) -> bool {
        true
    }

    fn load(&self, entry: &Path) -> Result<Box<dyn Command>> {
        Ok(Box::new(ProcessCommand {
            program: entry.as_os_str().to_os_string(),
            leading_args: Vec::new(),
        }))
    }
}

struct ProcessCommand {
    program: OsString,
    leading_args: Vec<OsString>,
}

#[async_trait]
impl Command for ProcessCommand {
    async fn invoke(&self, args: &[String], context: &CommandContext) -> Result<i32> {
        let context_json =
            serde_json::to_string(context).context("Failed to encode command context")?;
        debug!(
            "Running {:?} {:?} {:?}",
            self.program, self.leading_args, args
        );

        let status = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .env(CONTEXT_ENV, context_json)
            .status()
            .await
            .with_context(|| format!("Failed to start {:?}", self.program))?;

        Ok(exit_code(status))
    }
}

/// Exit code of a finished child; signals map to `128 + signo` on unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Ordered set of loaders; the first one supporting an entry wins.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn CommandLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self {
            loaders: vec![
                Box::new(ScriptLoader::node()),
                Box::new(ScriptLoader::shell()),
                Box::new(NativeLoader),
            ],
        }
    }
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Add a loader ahead of the existing ones.
    pub fn register(&mut self, loader: Box<dyn CommandLoader>) {
        self.loaders.insert(0, loader);
    }

    pub fn loader_for(&self, entry: &Path) -> Option<&dyn CommandLoader> {
        self.loaders
            .iter()
            .find(|l| l.supports(entry))
            .map(|l| l.as_ref())
    }

    pub fn load(&self, entry: &Path) -> Result<Box<dyn Command>> {
        let loader = self
            .loader_for(entry)
            .ok_or_else(|| anyhow!("No loader can run {:?}", entry))?;
        debug!("Loading {:?} with the {} loader", entry, loader.name());
        loader.load(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(entry: &Path) -> CommandContext {
        CommandContext {
            command: "init".into(),
            package: "@cmdpack/init".into(),
            version: Some("1.0.0".into()),
            entry: entry.to_path_buf(),
        }
    }

    #[test]
    fn test_default_loader_selection() {
        let registry = LoaderRegistry::default();
        assert_eq!(registry.loader_for(Path::new("/p/cli.js")).unwrap().name(), "node");
        assert_eq!(registry.loader_for(Path::new("/p/cli.MJS")).unwrap().name(), "node");
        assert_eq!(registry.loader_for(Path::new("/p/run.sh")).unwrap().name(), "sh");
        assert_eq!(registry.loader_for(Path::new("/p/bin/tool")).unwrap().name(), "native");
    }

    #[test]
    fn test_registered_loader_takes_priority() {
        let mut registry = LoaderRegistry::default();
        registry.register(Box::new(ScriptLoader::new("bun", &["js", "ts"])));
        assert_eq!(registry.loader_for(Path::new("/p/cli.js")).unwrap().name(), "bun");
        assert_eq!(registry.loader_for(Path::new("/p/cli.ts")).unwrap().name(), "bun");
    }

    #[test]
    fn test_empty_registry_cannot_load() {
        let registry = LoaderRegistry::empty();
        assert!(registry.load(Path::new("/p/cli.js")).is_err());
    }

    #[test]
    fn test_context_serializes_as_flat_json() {
        let json = serde_json::to_value(context(Path::new("/p/cli.js"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "init",
                "package": "@cmdpack/init",
                "version": "1.0.0",
                "entry": "/p/cli.js",
            })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_script_gets_args_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let entry = dir.path().join("run.sh");
        std::fs::write(
            &entry,
            format!(
                "printf '%s|%s' \"$*\" \"$CMDPACK_COMMAND_CONTEXT\" > '{}'\nexit 7\n",
                out.display()
            ),
        )
        .unwrap();

        let command = LoaderRegistry::default().load(&entry).unwrap();
        let code = command
            .invoke(&["a".into(), "b c".into()], &context(&entry))
            .await
            .unwrap();

        assert_eq!(code, 7);
        let recorded = std::fs::read_to_string(&out).unwrap();
        let (args, ctx) = recorded.split_once('|').unwrap();
        assert_eq!(args, "a b c");
        let ctx: serde_json::Value = serde_json::from_str(ctx).unwrap();
        assert_eq!(ctx["package"], "@cmdpack/init");
        assert_eq!(ctx["entry"], entry.display().to_string());
    }

    #[tokio::test]
    async fn test_missing_native_entry_fails_to_start() {
        let command = NativeLoader
            .load(Path::new("/nonexistent/cmdpack/bin/tool"))
            .unwrap();
        let err = command
            .invoke(&[], &context(Path::new("/nonexistent/cmdpack/bin/tool")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to start"));
    }
}
