use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_scanner::{cli, config, error, output, pipeline, transport};
use cli::{Cli, Commands};
use error::CliError;
use scanner_common::{ProcessingMode, StatusMessage};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use transport::ReqwestTransport;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = config::load().context("設定ファイルを読み込めません")?;

    match cli.command {
        Commands::Analyze { image, filter, endpoint, output } => {
            if let Some(endpoint) = endpoint {
                config = config.with_endpoint(endpoint);
            }
            let mode = if filter {
                ProcessingMode::filtered()
            } else {
                ProcessingMode::full_text()
            };
            let transport = ReqwestTransport::new(config.endpoint.clone());

            let pb = spinner(&StatusMessage::Processing.text());
            let analysis = pipeline::analyze_file(&image, mode, &config, &transport).await;
            pb.finish_and_clear();
            let analysis = analysis.with_context(|| format!("{} を解析できません", image.display()))?;

            println!("{}", analysis.status.text());
            if let StatusMessage::Failed(err) = analysis.status {
                return Err(CliError::Scan(err).into());
            }
            if !analysis.text.is_empty() {
                println!("\n{}", analysis.text);
            }

            match (output, analysis.csv) {
                (Some(target), Some(csv)) => {
                    let path = output::write_csv(&csv, &target).context("CSVを保存できません")?;
                    println!("\n✔ CSVを保存: {}", path.display());
                }
                (Some(_), None) => println!("\n結果がないためCSVは保存しません"),
                _ => {}
            }
        }

        Commands::Config { set_endpoint, show } => {
            if let Some(endpoint) = set_endpoint {
                config = config.with_endpoint(endpoint);
                config::save(&config).context("設定ファイルを保存できません")?;
                println!("✔ エンドポイントを設定しました");
            }

            if show {
                println!("設定:");
                println!("  エンドポイント: {}", config.endpoint);
                println!("  最大サイズ: {}x{}px", config.max_width, config.max_height);
                println!("  JPEG品質: {}", config.jpeg_quality);
                println!("  CSVファイル名: {}", config.csv_file_name);
            }
        }
    }

    Ok(())
}
