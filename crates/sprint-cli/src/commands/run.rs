use std::path::PathBuf;

use clap::Subcommand;
use sprint_core::session::{replay, replay_realtime, SensorTrace};
use sprint_core::{Config, Database, Event, MemoryRecordStore, RunRecordStore};

#[derive(Subcommand)]
pub enum RunAction {
    /// Replay a recorded sensor trace through a full session
    Replay {
        /// Trace file (JSON)
        trace: PathBuf,
        /// Play back on the wall clock instead of instantly
        #[arg(long)]
        realtime: bool,
        /// Keep the finished run out of history
        #[arg(long)]
        no_save: bool,
    },
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "could not encode event"),
    }
}

pub fn run(action: RunAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RunAction::Replay {
            trace,
            realtime,
            no_save,
        } => {
            let settings = Config::load()?.run_settings()?;
            let trace = SensorTrace::load(&trace)?;
            let store: Box<dyn RunRecordStore> = if no_save {
                Box::new(MemoryRecordStore::new())
            } else {
                Box::new(Database::open()?)
            };

            if realtime {
                let runtime = tokio::runtime::Runtime::new()?;
                let record = runtime.block_on(replay_realtime(settings, &trace, store, print_event))?;
                if record.is_none() {
                    return Err("run ended without a record".into());
                }
            } else {
                let outcome = replay(settings, &trace, store)?;
                outcome.events.iter().for_each(print_event);
                if outcome.record.is_none() {
                    return Err("run ended without a record".into());
                }
            }
        }
    }
    Ok(())
}
