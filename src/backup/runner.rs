use std::fs;

use crate::config::{Config, ProjectLayout, RuleConfig};
use crate::manifest::{ArchiveTool, SevenZip};

use super::error::{BackupError, BackupResult};
use super::operation::{OperationDispatcher, StepOutcome, destination_dir};
use super::script::ScriptRunner;

/// Which rules a routine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSelection {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub errors: Vec<String>,
}

/// Result of a routine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutineSummary {
    pub completed: Vec<String>,
    pub failed: Vec<RuleFailure>,
    /// Requested rule names that are not in the config.
    pub unknown: Vec<String>,
    pub outcomes: Vec<StepOutcome>,
}

impl RoutineSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BackupRunner<T: ArchiveTool> {
    config: Config,
    scripts: ScriptRunner,
    dispatcher: OperationDispatcher<T>,
}

impl BackupRunner<SevenZip> {
    pub fn new(config: Config, layout: &ProjectLayout) -> Self {
        let dispatcher = OperationDispatcher::from_config(&config);
        Self::with_dispatcher(config, layout, dispatcher)
    }
}

impl<T: ArchiveTool> BackupRunner<T> {
    pub fn with_dispatcher(
        config: Config,
        layout: &ProjectLayout,
        dispatcher: OperationDispatcher<T>,
    ) -> Self {
        let scripts = ScriptRunner::new(layout, &config);
        Self { config, scripts, dispatcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a selection to configured rules, in config order.
    pub fn select_rules(&self, selection: &RuleSelection) -> (Vec<&RuleConfig>, Vec<String>) {
        match selection {
            RuleSelection::All => (self.config.rules.iter().collect(), Vec::new()),
            RuleSelection::Named(names) => {
                let rules =
                    self.config.rules.iter().filter(|r| names.contains(&r.name)).collect();
                let unknown =
                    names.iter().filter(|n| self.config.rule(n).is_none()).cloned().collect();
                (rules, unknown)
            }
        }
    }

    /// Run the routine: global init script, selected rules, global post script.
    pub fn run(&self, selection: &RuleSelection) -> BackupResult<RoutineSummary> {
        let root = &self.config.global.destination_root_dir;
        if !root.exists() {
            tracing::info!("Backup destination directory '{}' does not exist: creating it", root.display());
            fs::create_dir_all(root).map_err(|e| BackupError::io(root, e))?;
        }

        tracing::info!("Starting prefbak backup routine");

        if let Some(script) = &self.config.global.init_script {
            tracing::info!("Running the configured global init script");
            self.scripts.run(script)?;
        }

        let (rules, unknown) = self.select_rules(selection);
        for name in &unknown {
            tracing::warn!(rule = %name, "Requested rule is not configured");
        }

        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        tracing::info!(
            "Starting routine for the given ({}) configured backup rules: {:?}",
            rules.len(),
            names
        );

        let mut summary = RoutineSummary { unknown, ..Default::default() };

        for rule in rules {
            let (outcomes, errors) = self.run_rule(rule);
            summary.outcomes.extend(outcomes);

            if errors.is_empty() {
                summary.completed.push(rule.name.clone());
            } else {
                tracing::error!(rule = %rule.name, failures = errors.len(), "Rule finished with errors");
                summary.failed.push(RuleFailure { rule: rule.name.clone(), errors });
            }
        }

        if let Some(script) = &self.config.global.post_script {
            tracing::info!("Running the configured global post script");
            self.scripts.run(script)?;
        }

        tracing::info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            "Backup routine finished"
        );

        Ok(summary)
    }

    fn run_rule(&self, rule: &RuleConfig) -> (Vec<StepOutcome>, Vec<String>) {
        tracing::info!("=====> Beginning rule: {}", rule.name);

        let mut outcomes = Vec::new();
        let mut errors = Vec::new();

        if let Some(script) = &rule.init_script {
            tracing::info!("Running the rule's configured init script");
            if let Err(e) = self.scripts.run(script) {
                tracing::error!(rule = %rule.name, error = %e, "Rule init script failed");
                errors.push(e.to_string());
                return (outcomes, errors);
            }
        }

        for file in &rule.files {
            let step = destination_dir(
                &self.config.global.destination_root_dir,
                &rule.name,
                file.destination_sub_dir.as_deref(),
            )
            .and_then(|dest_dir| {
                tracing::info!(
                    "Starting file backup: '{}' to dir --> '{}'",
                    file.source_path.display(),
                    dest_dir.display()
                );
                self.dispatcher.perform(&file.source_path, &dest_dir, file.operation)
            });

            match step {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(
                        rule = %rule.name,
                        source = %file.source_path.display(),
                        operation = %file.operation,
                        error = %e,
                        "Backup step failed"
                    );
                    errors.push(e.to_string());
                }
            }
        }

        if let Some(script) = &rule.post_script {
            tracing::info!("Running the rule's configured post script");
            if let Err(e) = self.scripts.run(script) {
                tracing::error!(rule = %rule.name, error = %e, "Rule post script failed");
                errors.push(e.to_string());
            }
        }

        (outcomes, errors)
    }
}
