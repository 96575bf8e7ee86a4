use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use one_on_one_coach::logging::init_logging;
use one_on_one_coach::{
    AiError, AppConfig, CoachingAdvisor, CompletionOptions, DateRange, FileSettingsStore, Member,
    OneOnOne, SessionRecord, Settings,
};

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "AI coaching for one-on-one meetings")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "coach.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a raw prompt through the cache and fallback chain
    Complete {
        prompt: String,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Show or change the stored API settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Coaching advice for one meeting (JSON: {"member": ..., "oneOnOne": ...})
    Advice { record: PathBuf },
    /// Questions for the next meeting (same input as `advice`)
    Questions { record: PathBuf },
    /// Management style analysis over a JSON array of session records
    Analysis {
        sessions: PathBuf,
        /// Analyze a single member instead of the whole team
        #[arg(long)]
        member_id: Option<i64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingInput {
    member: Member,
    one_on_one: OneOnOne,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };
    let _guard = init_logging(&config.logging)?;

    let store = Arc::new(FileSettingsStore::new(config.settings.path.clone()));
    let advisor = CoachingAdvisor::from_config(&config, store)?;

    if let Err(e) = run(cli.command, &advisor).await {
        match e.downcast_ref::<AiError>() {
            Some(ai_error) => eprintln!("{} ({})", ai_error.user_message(), ai_error),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, advisor: &CoachingAdvisor) -> anyhow::Result<()> {
    let client = advisor.client();

    match command {
        Commands::Complete {
            prompt,
            temperature,
            max_tokens,
            no_cache,
        } => {
            let options = CompletionOptions {
                max_tokens,
                temperature,
                use_cache: !no_cache,
            };
            println!("{}", client.complete(&prompt, &options).await?);
        }
        Commands::Settings { action: SettingsAction::Show } => {
            let settings = client.current_settings().await?;
            println!("API key: {}", settings.masked_api_key());
            println!("Model:   {}", settings.model);
            if let Some(updated_at) = settings.updated_at {
                println!("Updated: {}", updated_at.to_rfc3339());
            }
        }
        Commands::Settings {
            action: SettingsAction::Set { api_key, model },
        } => {
            let current = client.current_settings().await?;
            let settings = Settings {
                api_key: api_key.or(current.api_key),
                model: model.unwrap_or(current.model),
                updated_at: current.updated_at,
            };
            let saved = client.update_settings(settings).await?;
            println!("Settings saved (model: {})", saved.model);
        }
        Commands::Advice { record } => {
            let input: MeetingInput = read_json(&record)?;
            println!("{}", advisor.generate_advice(&input.one_on_one, &input.member).await?);
        }
        Commands::Questions { record } => {
            let input: MeetingInput = read_json(&record)?;
            println!("{}", advisor.generate_questions(&input.one_on_one, &input.member).await?);
        }
        Commands::Analysis {
            sessions,
            member_id,
            from,
            to,
        } => {
            let records: Vec<SessionRecord> = read_json(&sessions)?;
            let range = DateRange::new(from, to);

            let report = match member_id {
                Some(id) => {
                    let member = records
                        .iter()
                        .map(|r| &r.member)
                        .find(|m| m.id == id)
                        .cloned()
                        .ok_or(AiError::NoSessions)?;
                    let member_sessions: Vec<OneOnOne> = records.into_iter().map(|r| r.session).collect();
                    advisor.analyze_management_style(&member, &member_sessions, range).await?
                }
                None => advisor.overall_analysis(&records, range).await?,
            };

            println!("Sessions analyzed: {}\n", report.sessions_count);
            println!("{}", report.analysis);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
