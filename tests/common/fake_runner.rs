//! Scripted git runner for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use reviewit::error::{Error, Result};
use reviewit::integration::{CommandOutput, CommandRunner, GitCommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Commit hash `rev-parse HEAD` reports by default
pub const FAKE_HEAD: &str = "0123456789abcdef0123456789abcdef01234567";

/// What a scripted subcommand does
#[derive(Debug, Clone)]
enum Script {
    Fail(String),
    Error(String),
    Panic(String),
}

/// Fake `CommandRunner`
///
/// Features:
/// - Every command succeeds unless scripted otherwise
/// - Call tracking for verification
/// - Per-subcommand failure, error, or panic injection
/// - Captures the patch file contents handed to `git am`
pub struct FakeRunner {
    scripts: Mutex<HashMap<String, Script>>,
    head: Mutex<String>,
    calls: Mutex<Vec<GitCommand>>,
    applied_patches: Mutex<Vec<String>>,
    workspaces_seen: Mutex<Vec<PathBuf>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRunner {
    /// Runner where everything succeeds
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            head: Mutex::new(FAKE_HEAD.to_string()),
            calls: Mutex::new(Vec::new()),
            applied_patches: Mutex::new(Vec::new()),
            workspaces_seen: Mutex::new(Vec::new()),
        }
    }

    // === Scripting ===

    /// Make `subcommand` exit non-zero with `output`
    pub fn fail_on(&self, subcommand: &str, output: &str) {
        self.script(subcommand, Script::Fail(output.to_string()));
    }

    /// Make `subcommand` fail to launch
    pub fn error_on(&self, subcommand: &str, msg: &str) {
        self.script(subcommand, Script::Error(msg.to_string()));
    }

    /// Make `subcommand` panic
    pub fn panic_on(&self, subcommand: &str, msg: &str) {
        self.script(subcommand, Script::Panic(msg.to_string()));
    }

    /// Hash reported by `rev-parse HEAD`
    pub fn set_head(&self, hash: &str) {
        *self.head.lock().unwrap() = hash.to_string();
    }

    fn script(&self, subcommand: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(subcommand.to_string(), script);
    }

    // === Call tracking ===

    /// Every command run, in order
    pub fn calls(&self) -> Vec<GitCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Subcommands run, in order
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.subcommand().map(String::from))
            .collect()
    }

    /// Contents of every patch file passed to `git am`
    pub fn applied_patches(&self) -> Vec<String> {
        self.applied_patches.lock().unwrap().clone()
    }

    /// Workspace directories commands ran in (excluding the clone's base dir)
    pub fn workspaces_seen(&self) -> Vec<PathBuf> {
        self.workspaces_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &GitCommand) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let subcommand = command.subcommand().unwrap_or_default().to_string();

        if subcommand != "clone" {
            let mut seen = self.workspaces_seen.lock().unwrap();
            if !seen.contains(&command.cwd) {
                seen.push(command.cwd.clone());
            }
        }

        if subcommand == "am" {
            if let Some(path) = command.args.get(1) {
                let text = std::fs::read_to_string(path).unwrap_or_default();
                self.applied_patches.lock().unwrap().push(text);
            }
        }

        let script = self.scripts.lock().unwrap().get(&subcommand).cloned();
        match script {
            Some(Script::Fail(output)) => return Ok(CommandOutput::failure(output)),
            Some(Script::Error(msg)) => return Err(Error::Git(msg)),
            Some(Script::Panic(msg)) => panic!("{msg}"),
            None => {}
        }

        let output = match subcommand.as_str() {
            "rev-parse" => self.head.lock().unwrap().clone(),
            "clone" => "Cloning into 'workspace'...".to_string(),
            "am" => "Applying: patch".to_string(),
            _ => String::new(),
        };
        Ok(CommandOutput::success(output))
    }
}
