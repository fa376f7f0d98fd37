use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use smart_tester::parser::{builtin_scenarios, load_scenarios, parse_request, select_scenarios};
use smart_tester::runner::poller::{EXIT_EXECUTION_ERROR, EXIT_TESTS_FAILED};
use smart_tester::runner::{ExecutorOptions, RunMode};
use smart_tester::utils::config::Config;
use smart_tester::{report, runner};

#[derive(Parser)]
#[command(name = "smart-tester")]
#[command(version)]
#[command(about = "Natural-language driven browser end-to-end tests", long_about = None)]
struct Cli {
    /// Base URL of the application under test
    #[arg(long, global = true, env = "BASE_URL")]
    base_url: Option<String>,

    /// Output directory for reports and artifacts
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tests a natural-language request asks for
    Run {
        /// What to test, e.g. "create equipment and delete it"
        #[arg(env = "TEST_REQUEST")]
        prompt: String,

        /// Dispatcher: smart (rule-based actions) or scenario (keyword-scored scenarios)
        #[arg(short, long, default_value = "smart")]
        mode: String,

        /// YAML scenario table replacing the built-in one (scenario mode)
        #[arg(long)]
        scenarios: Option<PathBuf>,

        /// Run the browser without a window
        #[arg(long, default_value = "false")]
        headless: bool,

        /// Also write HTML and JUnit reports
        #[arg(long, default_value = "false")]
        report: bool,

        /// Do not open an issue for failures
        #[arg(long, default_value = "false")]
        no_issue: bool,
    },

    /// Show what a request would run, without a browser
    Plan {
        prompt: String,

        #[arg(short, long, default_value = "smart")]
        mode: String,

        #[arg(long)]
        scenarios: Option<PathBuf>,
    },

    /// Poll the application for pending test tasks and run them
    Poll {
        /// Poll a single time, run what was found and exit
        #[arg(long, default_value = "false")]
        once: bool,

        /// Delay between polls
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Generate report from test results
    Report {
        /// Path to test results JSON
        results: PathBuf,

        /// Output format (json, html, junit)
        #[arg(short, long, default_value = "html")]
        format: String,
    },
}

fn parse_mode(mode: &str) -> anyhow::Result<RunMode> {
    RunMode::parse(mode).ok_or_else(|| anyhow::anyhow!("Unknown mode: {} (use smart or scenario)", mode))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ref dir) = cli.output {
        config.output_dir = dir.clone();
    }

    match cli.command {
        Commands::Run {
            prompt,
            mode,
            scenarios,
            headless,
            report,
            no_issue,
        } => {
            let mode = parse_mode(&mode)?;
            if headless {
                config.headless = true;
            }

            println!("{} Smart test runner", "▶".green().bold());
            println!("  Target: {}", config.base_url.cyan());
            println!("  Browser: {}", config.browser.as_str().cyan());
            println!("  Output: {}", config.output_dir.display().to_string().cyan());
            if report {
                println!("  Reports: {}", "Enabled".green());
            }

            let options = ExecutorOptions {
                mode,
                scenarios,
                extra_reports: report,
            };
            match runner::run_prompt(&config, &prompt, options, !no_issue).await {
                Ok(result) if !result.all_passed() => std::process::exit(EXIT_TESTS_FAILED),
                Ok(_) => {}
                Err(e) => {
                    eprintln!("{} {:#}", "Error:".red().bold(), e);
                    std::process::exit(EXIT_EXECUTION_ERROR);
                }
            }
        }

        Commands::Plan {
            prompt,
            mode,
            scenarios,
        } => match parse_mode(&mode)? {
            RunMode::Smart => {
                for request in parse_request(&prompt) {
                    println!(
                        "{}. {} - {} [{}]",
                        request.priority,
                        request.action.to_string().cyan(),
                        request.description,
                        request.flags.join(", ")
                    );
                }
            }
            RunMode::Scenario => {
                let table = match scenarios {
                    Some(path) => load_scenarios(&path)?,
                    None => builtin_scenarios(),
                };
                for scenario in select_scenarios(&table, &prompt) {
                    let actions: Vec<String> =
                        scenario.actions.iter().map(|a| a.to_string()).collect();
                    println!(
                        "{} - {}: {}",
                        scenario.name.cyan(),
                        scenario.description,
                        actions.join(", ")
                    );
                }
            }
        },

        Commands::Poll { once, interval_ms } => {
            if let Some(ms) = interval_ms {
                config.poll_interval_ms = ms;
            }
            println!(
                "{} Polling {} for test tasks...",
                "🔄".to_string().blue(),
                config.task_endpoint().cyan()
            );
            runner::poll_tasks(&config, once).await?;
        }

        Commands::Report { results, format } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, cli.output.as_deref())?;
        }
    }

    Ok(())
}
