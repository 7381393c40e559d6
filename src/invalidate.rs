use anyhow::Result;
use colored::Colorize;

use graph::Graph;

use crate::fs::{Fs, TaskPaths};
use crate::hash::HashStore;
use crate::settings::Settings;
use crate::ui::Ui;

/// Logic for invalidating tasks from previous executions.
///
/// Invalidating a task only removes its stored hash; its outputs stay
/// where they are until it regenerates on the next run.
pub struct Invalidator<'a> {
    fs: &'a Fs,
    ui: &'a Ui,
    settings: &'a Settings,
}

impl<'a> Invalidator<'a> {
    /// Create a new `Invalidator`.
    pub fn new(settings: &'a Settings, ui: &'a Ui, fs: &'a Fs) -> Self {
        Self { settings, ui, fs }
    }
}

impl Invalidator<'_> {
    /// Invalidate every task in `graph` named on the command line.
    /// Returns the number of hashes actually removed.
    pub fn invalidate(&self, graph: &Graph) -> Result<usize> {
        let mut stores = Vec::new();
        for name in &self.settings.tasks {
            let mut found_any = false;
            for node in graph.named(name) {
                found_any = true;
                let store = HashStore::new(&TaskPaths::new(&node.output_dir).hash);
                if self.fs.exists(store.path()) {
                    eprintln!("{} {}", "Invalidating".magenta(), node.display_name().cyan());
                    stores.push(store);
                } else {
                    eprintln!("{} is already invalid; skipping.", node.display_name());
                }
            }
            if !found_any {
                eprintln!("{} no task named {}.", "Warning:".yellow(), name.cyan());
            }
        }

        if stores.is_empty() {
            eprintln!("No tasks to invalidate.");
            return Ok(0);
        }
        if self.settings.dry_run || !self.ui.confirm("Proceed?")? {
            return Ok(0);
        }
        for store in &stores {
            log::debug!("removing {:?}", store.path());
            store.clear(self.fs)?;
        }
        Ok(stores.len())
    }
}
