use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;

use kcb::assembly::{Assembly, SplitDirective, SplitEngine};
use kcb::carrier::{Carrier, CarrierType, Location, StaticLocator};
use kcb::cli::{Cli, Command};
use kcb::config::KcbConfig;
use kcb::logging;
use kcb::orchestrator::AssemblyOrchestrator;
use kcb::repository::InMemoryAssemblyRepository;
use kcb::state_machine::{
    Job, JobProgressTracker, JobState, Priority, ProcessChain, ProcessStep, State, StateMachine,
    TRANSPORT_STATE,
};
use kcb::ui::JobProgressView;

fn main() {
    let cli = Cli::parse();
    let view = JobProgressView::new();
    if let Err(err) = run(cli, &view) {
        view.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli, view: &JobProgressView) -> Result<()> {
    let config = KcbConfig::load_from(&cli.config)?;
    let filter = if cli.verbose {
        "kcb=debug"
    } else {
        config.log_filter.as_str()
    };
    logging::init(filter);

    match cli.command {
        Command::Split {
            identifier,
            samples,
            mode,
        } => print_split(view, &identifier, samples, mode.directive()),
        Command::Separate {
            identifier,
            samples,
        } => print_split(view, &identifier, samples, SplitDirective::Separate),
        Command::Progress { job } => {
            let contents = std::fs::read_to_string(&job)
                .with_context(|| format!("reading {}", job.display()))?;
            let job: Job = serde_json::from_str(&contents)?;
            let locator = StaticLocator::new();
            let tracker = JobProgressTracker::new(&config, &locator);
            view.render_job(&job, &tracker, Utc::now());
            Ok(())
        }
        Command::Demo => run_demo(&config, view),
    }
}

fn print_split(
    view: &JobProgressView,
    identifier: &str,
    samples: u32,
    directive: SplitDirective,
) -> Result<()> {
    let assembly = Assembly::new(identifier, samples, "");
    let result = SplitEngine::split(&assembly, directive)?;
    println!("{identifier} split {directive}:");
    let children: Vec<Assembly> = result.iter().cloned().collect();
    view.print_assemblies(&children);
    Ok(())
}

fn run_demo(config: &KcbConfig, view: &JobProgressView) -> Result<()> {
    let now = Utc::now();
    let tray = CarrierType::new("tray");
    let carrier = Arc::new(Carrier::new(tray.clone()));
    let mut locator = StaticLocator::new();
    locator.place(&carrier, Location::Workstation("furnace-1".to_string()));

    let machine = Arc::new(StateMachine::new(
        "default",
        vec![
            State::new("Prepare", false),
            State::new("Process", true),
            State::new(TRANSPORT_STATE, false),
        ],
    ));
    let cast = ProcessStep::new("Cast", Arc::clone(&machine))
        .with_output(tray.clone())
        .at_workstation("caster")
        .estimated(45);
    let anneal = ProcessStep::new("Anneal", machine)
        .with_preparation(tray.clone())
        .with_output(tray)
        .at_workstation("furnace-1")
        .estimated(120);
    let chain = Arc::new(ProcessChain::new(
        "cast and anneal",
        vec![Arc::new(cast), Arc::new(anneal)],
    ));

    let mut orchestrator = AssemblyOrchestrator::new(InMemoryAssemblyRepository::new());
    let mut job = Job::new("demo", chain, Priority::default());
    job.start(now)?;

    while job.job_state == JobState::Processing {
        let (delivery, collection, creates) = match job.current_procedure() {
            Some((_, p)) => (
                p.needs_delivery(),
                p.needs_collection(),
                p.is_in_last_executable_state_and_creates(),
            ),
            None => (true, false, false),
        };
        if delivery {
            job.deliver(now)?;
            continue;
        }
        if collection {
            job.collect(now)?;
            continue;
        }
        if creates && job.assemblies.is_empty() {
            let cast =
                Assembly::new("demo.1.1", 12, "AlSi10Mg").with_carrier(Arc::clone(&carrier));
            job.assemblies.push(orchestrator.register(&cast)?);
        }
        job.execute_current(now)?;
        orchestrator.finish_state(&mut job, now, Some(15))?;
    }
    info!(job = %job.name, state = %job.job_state, "demo job done");

    let tracker = JobProgressTracker::new(config, &locator);
    view.render_job(&job, &tracker, now);

    let children = orchestrator.split("demo.1.1", SplitDirective::ByParts(5))?;
    println!("demo.1.1 split {}:", SplitDirective::ByParts(5));
    view.print_assemblies(&children);
    Ok(())
}
