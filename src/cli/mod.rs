use anyhow::Result;
use console::style;

use crate::config::Config;
use crate::core::engine::DispatchEngine;
use crate::core::mailer::SmtpMailer;
use crate::core::pitch::{PitchGenerator, RetryPolicy, providers};
use crate::core::store::LeadStore;
use crate::core::sync::{GitHubSync, StateSync};
use crate::core::terminal;

fn print_help() {
    terminal::print_banner();
    println!(
        "\n {} single-run and batch lead outreach\n",
        style("autopitch:").bold()
    );
    println!(
        "   {}   pitch the next unsent lead (drip mode)",
        style("run").green()
    );
    println!(
        "   {} pitch a cap-limited batch of unsent leads",
        style("batch").green()
    );
    println!(
        "\n {} {} <command> [flags]",
        style("Usage:").bold(),
        style("autopitch").green()
    );
    println!("\n Batch flags: --batch-size <n>  --cap <n>  --delay <seconds>\n");
}

pub(crate) async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("run") => {
            init_tracing();
            let engine = build_engine(Config::from_env()?)?;
            run_single(engine).await
        }
        Some("batch") => {
            init_tracing();
            let mut cfg = Config::from_env()?;
            let flags = parse_batch_flags(&args, 2);
            if let Some(n) = flags.batch_size {
                cfg.run.batch_size = n;
            }
            if let Some(n) = flags.daily_cap {
                cfg.run.daily_cap = n;
            }
            if let Some(secs) = flags.drip_delay_secs {
                cfg.run.drip_delay = std::time::Duration::from_secs(secs);
            }
            run_batch(build_engine(cfg)?).await
        }
        Some("help") | Some("--help") | Some("-h") | None => {
            print_help();
            Ok(())
        }
        Some(other) => {
            terminal::print_error(&format!("Unknown command '{other}'"));
            print_help();
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();
}

fn build_engine(cfg: Config) -> Result<DispatchEngine> {
    let store = LeadStore::new(cfg.store_path.clone());
    let provider = providers::build(&cfg.generation);
    let policy = RetryPolicy {
        max_retries: cfg.run.max_retries,
        token_reduction_factor: cfg.run.token_reduction_factor,
        ..RetryPolicy::default()
    };
    let generator = PitchGenerator::new(
        provider,
        policy,
        cfg.generation.temperature,
        cfg.generation.max_output_tokens,
    );
    let mailer = SmtpMailer::new(&cfg.smtp, cfg.sender.clone())?;
    let file_name = cfg
        .store_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("leads.csv")
        .to_string();
    let sync = cfg
        .sync
        .as_ref()
        .map(|s| Box::new(GitHubSync::new(s, file_name)) as Box<dyn StateSync>);
    Ok(DispatchEngine::new(
        store,
        generator,
        Box::new(mailer),
        sync,
        cfg.run.clone(),
        cfg.value_add,
        cfg.sender.name,
    ))
}

async fn run_single(engine: DispatchEngine) -> Result<()> {
    terminal::print_banner();
    terminal::print_step("Pitching the next unsent lead...");
    match engine.run_single().await? {
        Some(selected) => {
            terminal::print_target(
                &selected.lead.company_name,
                &selected.lead.role,
                &selected.lead.contact_email,
            );
            terminal::print_success(&format!(
                "Done! Pitched {} for {}.",
                selected.lead.company_name, selected.lead.role
            ));
        }
        None => terminal::print_info("No unsent leads remaining. Nothing to do."),
    }
    Ok(())
}

async fn run_batch(engine: DispatchEngine) -> Result<()> {
    terminal::print_banner();
    terminal::print_step("Dispatching batch...");
    let report = engine.run_batch().await?;
    if report.selected == 0 {
        terminal::print_info("Nothing to send: daily cap reached or queue empty.");
    } else if report.skipped > 0 {
        terminal::print_warn(&format!(
            "Batch finished: {} sent, {} skipped of {} selected.",
            report.sent, report.skipped, report.selected
        ));
    } else {
        terminal::print_success(&format!(
            "Batch finished: {} of {} sent.",
            report.sent, report.selected
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BatchFlags {
    pub batch_size: Option<usize>,
    pub daily_cap: Option<usize>,
    pub drip_delay_secs: Option<u64>,
}

pub(crate) fn parse_batch_flags(args: &[String], start: usize) -> BatchFlags {
    let mut flags = BatchFlags::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--batch-size" | "-n" => {
                if i + 1 < args.len() {
                    flags.batch_size = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--cap" => {
                if i + 1 < args.len() {
                    flags.daily_cap = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--delay" => {
                if i + 1 < args.len() {
                    flags.drip_delay_secs = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    flags
}
