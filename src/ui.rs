use std::cell::RefCell;

use anyhow::Result;
use colored::Colorize;

use util::Timer;

use crate::exec::Report;
use crate::settings::Settings;
use crate::task::TaskState;

/// What a run would do with one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Planned {
    UpToDate,
    Run,
}

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// -y setting, ignores all points where the user is prompted to enter 'y'
    override_confirmation: bool,
    /// keeps track of time for each phase
    timer: Timer,
    /// buffer to hold strings internally when getting input
    strbuf: RefCell<String>,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            override_confirmation: settings.yes,
            timer: Timer::now(),
            // Refcell so we can call confirm() w/o needing a unique reference:
            strbuf: RefCell::new(String::with_capacity(16)),
        }
    }

    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.override_confirmation {
            return Ok(true);
        }
        eprintln!("{} (y/N)", prompt);

        let mut strbuf = self.strbuf.borrow_mut();

        strbuf.clear();
        std::io::stdin().read_line(&mut strbuf)?;
        match strbuf.chars().next() {
            Some('y') => Ok(true),
            _ => Ok(false),
        }
    }

    pub fn start_timer(&mut self) {
        if self.verbose {
            self.timer.reset();
        }
    }

    pub fn print_elapsed(&self, phase: &str) {
        if self.verbose {
            self.timer.print_elapsed(phase)
        }
    }

    pub fn verbose_progress(&self, msg: &str) {
        if self.verbose {
            eprint!("{}... ", msg.magenta());
        }
    }

    pub fn verbose_progress_debug<T: std::fmt::Debug>(&self, msg: &str, arg: T) {
        if self.verbose {
            eprint!("{} {:?}... ", msg.magenta(), arg);
        }
    }

    pub fn done(&self) {
        if self.verbose {
            eprintln!("{}.", "done".green());
        }
    }

    /// Print which tasks are up to date and which will run.
    /// Up-to-date tasks are only listed individually with -v.
    pub fn print_plan(&self, plan: &[(String, Planned)]) {
        let to_run = plan.iter().filter(|(_, p)| *p == Planned::Run).count();
        eprintln!(
            "\n{} tasks: {} up to date, {} to run.",
            plan.len(),
            (plan.len() - to_run).to_string().green(),
            to_run.to_string().cyan(),
        );
        for (name, planned) in plan {
            match planned {
                Planned::Run => eprintln!("  {} {name}", "RUN".cyan()),
                Planned::UpToDate if self.verbose => eprintln!("  {} {name}", "OK".green()),
                Planned::UpToDate => (),
            }
        }
        eprintln!();
    }

    /// Print the terminal state of every task.
    pub fn print_report(&self, report: &Report) {
        eprintln!("\n{}", "Pipeline finished.".magenta());
        for (name, kind, state) in &report.entries {
            let state_str = format!("{state:<16}");
            let state_str = match state {
                TaskState::FinishedSuccess => state_str.green(),
                TaskState::FinishedFailure => state_str.red(),
                _ => state_str.yellow(),
            };
            eprintln!("  {state_str} {kind}/{name}");
        }
        let failed = report.failed();
        if failed == 0 {
            eprintln!("{}", "All tasks succeeded.".green());
        } else {
            eprintln!("{} {failed} of {} tasks.", "Failed:".red(), report.entries.len());
        }
    }
}
