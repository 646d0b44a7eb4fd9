use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use minvr_engine::{EngineConfig, VrEngine};
use minvr_fsm::{Condition, ConditionSet, FsmDefinition, TokenRegistry};
use minvr_input::ScriptedDevice;
use minvr_router::shared;
use minvr_tools::{EventRecorder, FsmInspector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "minvr-cli", about = "CLI tool for MinVR state machines")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Check that an FSM definition builds
    Validate {
        /// FSM definition (YAML)
        fsm: PathBuf,
        /// Condition available to arcs, as NAME or NAME=true|false
        #[arg(short, long = "condition")]
        conditions: Vec<String>,
    },
    /// Replay an event script through an FSM and print its transitions
    Run {
        /// FSM definition (YAML)
        fsm: PathBuf,
        /// Event script (JSON array of frames)
        events: PathBuf,
        /// Engine settings (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Condition available to arcs, as NAME or NAME=true|false
        #[arg(long = "condition")]
        conditions: Vec<String>,
        /// Seconds reported in each frame's delta-time event
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Print every dispatched event
        #[arg(long)]
        trace_events: bool,
    },
}

fn parse_conditions(specs: &[String]) -> anyhow::Result<ConditionSet> {
    let mut set = ConditionSet::new();
    for spec in specs {
        let (name, value) = match spec.split_once('=') {
            Some((name, value)) => {
                let value: bool = value
                    .parse()
                    .with_context(|| format!("condition {name:?} needs true or false"))?;
                (name, value)
            }
            None => (spec.as_str(), true),
        };
        set.insert(Condition::new(name, value));
    }
    Ok(set)
}

fn load_definition(path: &Path) -> anyhow::Result<FsmDefinition> {
    FsmDefinition::load(path).with_context(|| format!("loading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("minvr-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("events: {}", minvr_events::crate_info());
            println!("router: {}", minvr_router::crate_info());
            println!("fsm: {}", minvr_fsm::crate_info());
            println!("input: {}", minvr_input::crate_info());
            println!("engine: {}", minvr_engine::crate_info());
            println!("tools: {}", minvr_tools::crate_info());
        }
        Commands::Validate { fsm, conditions } => {
            let definition = load_definition(&fsm)?;
            let conditions = parse_conditions(&conditions)?;
            let built = definition
                .build(TokenRegistry::new(), &conditions)
                .with_context(|| format!("building {}", fsm.display()))?;
            println!("{}", FsmInspector::summary(&built));
            for arc in FsmInspector::list_arcs(&built) {
                println!("  {arc}");
            }
            println!("OK");
        }
        Commands::Run {
            fsm,
            events,
            config,
            conditions,
            dt,
            trace_events,
        } => {
            let engine_config = match &config {
                Some(path) => EngineConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let definition = load_definition(&fsm)?;
            let conditions = parse_conditions(&conditions)?;
            let script = ScriptedDevice::load(&events)
                .with_context(|| format!("loading {}", events.display()))?;
            let frames = script.remaining();

            let mut engine = VrEngine::new(engine_config);
            let machine = engine.load_fsm(&definition, &conditions)?;
            engine
                .event_manager_mut()
                .add_polled_input_device(shared(script));
            let recorder = shared(EventRecorder::new());
            if trace_events {
                engine
                    .event_manager_mut()
                    .register_listener(recorder.clone(), i32::MIN);
            }

            println!("{}", FsmInspector::summary(&machine.borrow()));
            for _ in 0..frames {
                let report = engine.tick(dt)?;
                for recorded in recorder.borrow_mut().drain_events() {
                    println!("tick {}: event {}", recorded.tick, recorded.event);
                }
                let transitions = machine.borrow_mut().drain_transitions();
                let fsm = machine.borrow();
                for t in transitions {
                    println!(
                        "tick {}: {}-->{} on {}",
                        report.tick,
                        fsm.state_name(t.from).unwrap_or("?"),
                        fsm.state_name(t.to).unwrap_or("?"),
                        t.trigger
                    );
                }
                if report.listener_faults > 0 {
                    tracing::warn!(
                        tick = report.tick,
                        faults = report.listener_faults,
                        "listener faults"
                    );
                }
            }
            println!("{}", FsmInspector::summary(&machine.borrow()));
            engine.shutdown()?;
        }
    }

    Ok(())
}
