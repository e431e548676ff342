//! Shared mocks for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use workshop_triggers::audit::MemoryAuditLog;
use workshop_triggers::tools::{CommandOutput, CommandRunner, ExecutionTimeout, ToolLocator};
use workshop_triggers::triggers::{AuthorizationTriggers, TriggerSettings};

/// Runner that never spawns anything
///
/// Replies are matched by substring against the command, first match wins;
/// unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<(String, ExecutionTimeout)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, needle: &str, output: CommandOutput) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((needle.to_string(), output));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn timeouts(&self) -> Vec<ExecutionTimeout> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, timeout: ExecutionTimeout) -> CommandOutput {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), timeout));
        self.replies
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::success("", ""))
    }
}

/// Locator that knows a fixed set of tools under `/opt/tools`
pub struct FixedTools {
    available: HashSet<String>,
}

impl FixedTools {
    pub fn with(tools: &[&str]) -> Self {
        Self {
            available: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn none() -> Self {
        Self::with(&[])
    }
}

#[async_trait]
impl ToolLocator for FixedTools {
    async fn resolve(&self, tool: &str) -> Option<PathBuf> {
        self.available
            .contains(tool)
            .then(|| PathBuf::from(format!("/opt/tools/{}", tool)))
    }
}

pub struct Harness {
    pub triggers: AuthorizationTriggers,
    pub runner: Arc<ScriptedRunner>,
    pub audit: Arc<MemoryAuditLog>,
}

pub fn harness(runner: ScriptedRunner, tools: FixedTools) -> Harness {
    harness_with_settings(runner, tools, TriggerSettings::default())
}

pub fn harness_with_settings(
    runner: ScriptedRunner,
    tools: FixedTools,
    settings: TriggerSettings,
) -> Harness {
    let runner = Arc::new(runner);
    let audit = Arc::new(MemoryAuditLog::new());
    let triggers = AuthorizationTriggers::new(runner.clone(), Arc::new(tools), audit.clone())
        .with_settings(settings);
    Harness {
        triggers,
        runner,
        audit,
    }
}

/// Quoted path the mock locator yields for a tool
pub fn quoted(tool: &str) -> String {
    format!("\"/opt/tools/{}\"", tool)
}
