use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketscope::config::{Config, LlmConfig, ProviderKind};
use ticketscope::db::{open_summary_store, SummaryStore};
use ticketscope::llm::{LlmProvider, TextGenerator};
use ticketscope::models::{GroupFilter, TimelinePosition};
use ticketscope::pipeline::{GroupOutcome, GroupReport, SummaryPipeline};
use ticketscope::processing::{filter_groups, group_counts, TicketPreprocessor};
use ticketscope::summary::{GeneratorOptions, SummaryGenerator};

#[derive(Parser)]
#[command(name = "ticketscope")]
#[command(about = "Summarize support tickets per customer and product and lay them out on a timeline")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize every (customer, product) group in a ticket export
    Summarize {
        file: PathBuf,
        #[arg(long)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        model: Option<String>,
        /// Only these customers (repeatable)
        #[arg(long = "customer")]
        customers: Vec<String>,
        /// Only these products (repeatable)
        #[arg(long = "product")]
        products: Vec<String>,
        /// Ignore cached summaries and overwrite them
        #[arg(long)]
        regenerate: bool,
        /// Do not read or write the summary cache
        #[arg(long)]
        no_cache: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List groups and their ticket counts without calling a provider
    Groups {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List models offered by the provider
    Models {
        #[arg(long)]
        provider: Option<ProviderKind>,
    },
    /// Inspect or empty the summary cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    Clear,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    provider: &'a str,
    model: &'a str,
    groups: &'a [GroupReport],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ticketscope=info".into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::from_env()?;

    match args.command {
        Command::Summarize {
            file,
            provider,
            model,
            customers,
            products,
            regenerate,
            no_cache,
            format,
        } => {
            override_llm(&mut config.llm, provider, model);
            if no_cache {
                config.cache.enabled = false;
            }
            let filter = GroupFilter {
                customers,
                products,
            };
            summarize(&config, &file, &filter, regenerate, format).await
        }
        Command::Groups { file, format } => list_groups(&config, &file, format).await,
        Command::Models { provider } => {
            override_llm(&mut config.llm, provider, None);
            list_models(&config.llm).await
        }
        Command::Cache { action } => {
            let store = open_summary_store(&config.database, &config.cache).await?;
            match action {
                CacheAction::Stats => {
                    println!("{} cached summaries in {}", store.count().await?, config.database.url);
                    if let Some(at) = store.last_cleared().await? {
                        println!("Last cleared {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                    }
                }
                CacheAction::Clear => {
                    let removed = store.clear().await?;
                    tracing::info!(removed, "Summary cache cleared");
                    println!("Removed {removed} cached summaries");
                }
            }
            Ok(())
        }
    }
}

fn override_llm(llm: &mut LlmConfig, provider: Option<ProviderKind>, model: Option<String>) {
    if let Some(provider) = provider {
        llm.switch_provider(provider);
    }
    if let Some(model) = model {
        llm.model = model;
    }
}

async fn summarize(
    config: &Config,
    file: &Path,
    filter: &GroupFilter,
    regenerate: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let groups = TicketPreprocessor::new(&config.processing).process(&bytes)?;
    let selected: Vec<_> = filter_groups(&groups, filter).collect();
    tracing::info!(
        groups = groups.len(),
        selected = selected.len(),
        file = %file.display(),
        "Ticket export loaded"
    );

    let store: Option<Arc<dyn SummaryStore>> = if config.cache.enabled {
        match open_summary_store(&config.database, &config.cache).await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "Summary cache unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Initializing LLM provider"
    );
    let provider: Arc<dyn TextGenerator> = Arc::new(LlmProvider::new(&config.llm)?);
    let generator = SummaryGenerator::new(
        provider,
        store,
        GeneratorOptions::from_config(&config.llm, &config.cache),
    );
    let pipeline = SummaryPipeline::new(Arc::new(generator), config.processing.concurrency)
        .with_regenerate(regenerate);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let reports = pipeline.run(selected, &cancel_token).await;

    match format {
        OutputFormat::Json => {
            let output = RunOutput {
                provider: config.llm.provider.as_str(),
                model: &config.llm.model,
                groups: &reports,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => print_reports(&reports),
    }

    let failed = reports.iter().filter(|r| !r.is_ready()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} groups could not be summarized", reports.len());
    }
    Ok(())
}

fn print_reports(reports: &[GroupReport]) {
    for report in reports {
        println!(
            "== Customer {} - {} ({} tickets, {})",
            report.customer_number,
            report.product,
            report.ticket_count,
            report.content_hash.short()
        );
        match &report.outcome {
            GroupOutcome::Ready {
                source,
                attempts,
                events,
                ..
            } => {
                println!("   source: {source}, attempts: {attempts}");
                for event in events {
                    let when = match event.position {
                        TimelinePosition::Dated { date } => date.to_string(),
                        TimelinePosition::Undated {
                            after: Some(date),
                            ordinal,
                        } => format!("after {date} (#{ordinal})"),
                        TimelinePosition::Undated {
                            after: None,
                            ordinal,
                        } => format!("undated (#{ordinal})"),
                    };
                    println!("   {when:<24} {}: {}", event.label, event.text);
                }
            }
            GroupOutcome::Failed { error } => println!("   FAILED: {error}"),
        }
        for warning in &report.cache_warnings {
            println!("   warning: {warning}");
        }
        println!();
    }
}

async fn list_groups(config: &Config, file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let groups = TicketPreprocessor::new(&config.processing).process(&bytes)?;
    let counts = group_counts(&groups);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
        OutputFormat::Text => {
            println!("{:<16} {:<16} {:>8}", "CUSTOMER", "PRODUCT", "TICKETS");
            for count in &counts {
                println!(
                    "{:<16} {:<16} {:>8}",
                    count.customer_number, count.product, count.ticket_count
                );
            }
        }
    }
    Ok(())
}

async fn list_models(llm: &LlmConfig) -> anyhow::Result<()> {
    let provider = LlmProvider::new(llm)?;
    let models = provider.list_models().await?;
    if models.is_empty() {
        tracing::warn!(provider = %provider.kind(), "Provider reported no models");
    }
    for model in models {
        let marker = if model == llm.model { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling in-flight summaries...");
    cancel_token.cancel();
}
