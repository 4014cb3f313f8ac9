use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, ActionPhase, ActivityField, ActivityForm, ActivityStore, HttpActivityAgent,
    StoreEvent,
};
use shared::domain::{combine_date_and_time, format_activity_date, Activity, ActivityId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "activities", about = "Browse and edit activities on a remote API")]
struct Cli {
    /// Base URL of the API, e.g. http://localhost:5000/api
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        json: bool,
    },
    Show {
        id: String,
    },
    Create {
        #[command(flatten)]
        fields: FieldArgs,
    },
    Edit {
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Full timestamp, e.g. 2024-06-01T18:30
    #[arg(long, conflicts_with_all = ["day", "time"])]
    date: Option<String>,
    #[arg(long, requires = "time")]
    day: Option<NaiveDate>,
    #[arg(long, requires = "day")]
    time: Option<NaiveTime>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    venue: Option<String>,
}

impl FieldArgs {
    fn apply(self, form: &mut ActivityForm) {
        let date = match (self.day, self.time) {
            (Some(day), Some(time)) => {
                Some(format_activity_date(combine_date_and_time(day, time)))
            }
            _ => self.date,
        };
        let values = [
            (ActivityField::Title, self.title),
            (ActivityField::Description, self.description),
            (ActivityField::Category, self.category),
            (ActivityField::Date, date),
            (ActivityField::City, self.city),
            (ActivityField::Venue, self.venue),
        ];
        for (field, value) in values {
            if let Some(value) = value {
                form.set(field, value);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.api_token = Some(token);
    }

    let agent = HttpActivityAgent::from_settings(&settings).with_context(|| {
        format!("failed to build api client for '{}'", settings.api_base_url)
    })?;
    info!(base_url = %agent.base_url(), "activities: using api");
    let store = ActivityStore::new(Arc::new(agent));
    let events = tokio::spawn(log_store_events(store.subscribe()));

    let outcome = run(&store, cli.command).await;
    // Dropping the last handle closes the channel; the logger drains and exits.
    drop(store);
    match events.await {
        Ok(logged) => debug!(logged, "activities: event log drained"),
        Err(err) => warn!("activities: event logger failed: {err}"),
    }
    outcome
}

async fn run(store: &ActivityStore, command: Command) -> Result<()> {
    match command {
        Command::List { json } => {
            store.load_all().await?;
            let activities = store.by_date();
            if json {
                println!("{}", serde_json::to_string_pretty(&activities)?);
            } else if activities.is_empty() {
                println!("no activities");
            } else {
                for activity in &activities {
                    print_summary(activity);
                }
            }
        }
        Command::Show { id } => {
            store.load_all().await?;
            let id = ActivityId::from(id);
            store.select(&id);
            let activity = store
                .selected_activity()
                .ok_or_else(|| anyhow!("activity {id} not found"))?;
            print_details(&activity);
        }
        Command::Create { fields } => {
            store.open_create_form();
            let mut form = ActivityForm::new(None);
            fields.apply(&mut form);
            let (id, _) = form.submit(store).await?;
            println!("created activity {id}");
        }
        Command::Edit { id, fields } => {
            store.load_all().await?;
            let id = ActivityId::from(id);
            store.open_edit_form(&id);
            let Some(existing) = store.selected_activity() else {
                store.cancel_form_open();
                bail!("activity {id} not found");
            };
            let mut form = ActivityForm::new(Some(existing));
            fields.apply(&mut form);
            form.submit(store).await?;
            println!("updated activity {id}");
        }
        Command::Delete { id } => {
            let id = ActivityId::from(id);
            store.remove(&id, format!("delete-{id}")).await?;
            println!("deleted activity {id}");
        }
    }
    Ok(())
}

/// Logs store events until every sender is gone and returns how many it saw.
async fn log_store_events(mut events: broadcast::Receiver<StoreEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(StoreEvent {
                action,
                phase: ActionPhase::Aborted(message),
            }) => warn!(?action, "store: aborted: {message}"),
            Ok(event) => debug!(action = ?event.action, phase = ?event.phase, "store: event"),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "store: event log lagged");
                continue;
            }
            Err(RecvError::Closed) => return logged,
        }
        logged += 1;
    }
}

fn print_summary(activity: &Activity) {
    println!(
        "{}  {}  {} ({}, {})",
        activity.date, activity.id, activity.title, activity.venue, activity.city
    );
}

fn print_details(activity: &Activity) {
    println!("id:          {}", activity.id);
    println!("title:       {}", activity.title);
    println!("category:    {}", activity.category);
    println!("date:        {}", activity.date);
    println!("city:        {}", activity.city);
    println!("venue:       {}", activity.venue);
    println!("description: {}", activity.description);
}
