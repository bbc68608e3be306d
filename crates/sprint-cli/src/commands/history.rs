use chrono::NaiveDate;
use clap::Subcommand;
use sprint_core::Database;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List stored runs, newest last
    List {
        /// Only runs on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Dates that have at least one run
    Dates,
    /// Totals and bests across all runs
    Stats,
    /// Delete a run by id
    Delete { id: i64 },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { date } => {
            let runs = match date {
                Some(date) => db.runs_on(date)?,
                None => db.list_runs()?,
            };
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
        HistoryAction::Dates => {
            println!("{}", serde_json::to_string_pretty(&db.run_dates()?)?);
        }
        HistoryAction::Stats => {
            println!("{}", serde_json::to_string_pretty(&db.stats()?)?);
        }
        HistoryAction::Delete { id } => {
            if !db.delete_run(id)? {
                return Err(format!("no run with id {id}").into());
            }
            println!("deleted run {id}");
        }
    }
    Ok(())
}
