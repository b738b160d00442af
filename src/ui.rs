//! Terminal output: chain progress bar and coloured state markers.
//!
//! `indicatif` draws the chain position, `console` colours the per-state
//! markers and split listings.

use chrono::{DateTime, Utc};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::assembly::Assembly;
use crate::state_machine::{
    Job, JobProgressTracker, JobState, Procedure, ProgressEvaluator, State,
};

/// How a state is shown in the progress listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMarker {
    Done,
    Running,
    Waiting,
}

impl StateMarker {
    pub fn of(state: &State, procedure: &Procedure) -> Self {
        if ProgressEvaluator::is_complete(Some(state), procedure) {
            StateMarker::Done
        } else if ProgressEvaluator::is_pending(Some(state), procedure) {
            StateMarker::Running
        } else {
            StateMarker::Waiting
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            StateMarker::Done => "✓",
            StateMarker::Running => "▶",
            StateMarker::Waiting => "·",
        }
    }
}

/// Renders jobs and split results to stdout.
pub struct JobProgressView {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for JobProgressView {
    fn default() -> Self {
        Self::new()
    }
}

impl JobProgressView {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    fn job_state_style(&self, state: JobState) -> &Style {
        match state {
            JobState::Finished => &self.green,
            JobState::Cancelled => &self.red,
            JobState::Processing => &self.yellow,
            JobState::Pending => &self.dim,
        }
    }

    /// Prints the chain bar, the job flags and one line per state.
    pub fn render_job(&self, job: &Job, tracker: &JobProgressTracker<'_>, now: DateTime<Utc>) {
        let state_style = self.job_state_style(job.job_state);
        println!(
            "{} {}",
            console::style(&job.name).bold(),
            state_style.apply_to(job.job_state)
        );

        let total = job.procedures.len() as u64;
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_position(JobProgressTracker::current_progress_in_chain(job) as u64);
        bar.abandon_with_message(format!(
            "{:.0}% ({} remaining, est. {} min)",
            JobProgressTracker::progress_in_chain(job) * 100.0,
            JobProgressTracker::remaining_progress_in_chain(job),
            job.process_chain.est_duration()
        ));

        let mut flags = Vec::new();
        let checks = [
            (JobProgressTracker::is_creating(Some(job)), "creating"),
            (JobProgressTracker::is_deleting(Some(job)), "deleting"),
            (JobProgressTracker::is_modifying(Some(job)), "modifying"),
            (tracker.needs_delivery(Some(job)), "needs delivery"),
            (tracker.needs_collection(Some(job)), "needs collection"),
        ];
        for (set, label) in checks {
            if set {
                flags.push(label);
            }
        }
        match tracker.is_old_active_job(Some(job), now) {
            Ok(true) => flags.push("old"),
            Ok(false) => {}
            Err(err) => tracing::warn!(job = %job.name, error = %err, "age check skipped"),
        }
        if !flags.is_empty() {
            println!("  {}", self.yellow.apply_to(flags.join(", ")));
        }

        for procedure in &job.procedures {
            println!("  {}", console::style(&procedure.process_step.name).underlined());
            for state in &procedure.state_machine().states {
                let marker = StateMarker::of(state, procedure);
                let symbol = match marker {
                    StateMarker::Done => self.green.apply_to(marker.symbol()),
                    StateMarker::Running => self.yellow.apply_to(marker.symbol()),
                    StateMarker::Waiting => self.dim.apply_to(marker.symbol()),
                };
                println!("    {symbol} {state}");
            }
        }
    }

    pub fn print_assemblies(&self, assemblies: &[Assembly]) {
        for assembly in assemblies {
            println!(
                "  {} {} {}",
                self.green.apply_to("•"),
                assembly.identifier,
                self.dim.apply_to(format!("({} samples)", assembly.sample_count))
            );
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {message}", self.red.apply_to("✗"));
    }
}
