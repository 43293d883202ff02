use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use healthreport_pdf::{AnalyzerConfig, Error, FontConfig, Fonts, GeminiClient, intake};

#[derive(Parser)]
#[command(version, about = "Clinical report analysis to bilingual PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Extra font directory searched before the system ones
    #[arg(long, global = true)]
    fonts: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Render a saved model response to PDF
    Render {
        input: PathBuf,
        #[arg(short, long, default_value = "health_report.pdf")]
        output: PathBuf,
    },
    /// Analyze a report image or PDF and render the result
    Analyze {
        input: PathBuf,
        #[arg(short, long, default_value = "health_report.pdf")]
        output: PathBuf,
        /// Also write the raw model response here
        #[arg(long)]
        save_response: Option<PathBuf>,
    },
    /// Run the HTTP service
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: std::net::SocketAddr,
        #[arg(long, env = "HEALTHREPORT_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },
}

fn load_fonts(extra_dir: Option<PathBuf>) -> Result<Fonts, Error> {
    let mut config = FontConfig::from_env();
    if let Some(dir) = extra_dir {
        config.search_dirs.insert(0, dir);
    }
    Fonts::load(&config)
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Render { input, output } => {
            let text = std::fs::read_to_string(&input)?;
            let fonts = load_fonts(cli.fonts)?;
            let bytes = healthreport_pdf::render_response_to_bytes(&text, &fonts)?;
            std::fs::write(&output, bytes)?;
            println!("{}", output.display());
        }
        Command::Analyze {
            input,
            output,
            save_response,
        } => {
            let analyzer = GeminiClient::new(AnalyzerConfig::from_env()?)?;
            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = std::fs::read(&input)?;
            let fonts = load_fonts(cli.fonts)?;
            let rasterizer = intake::default_rasterizer();

            let pages = intake::load_pages(&filename, &bytes, rasterizer.as_ref())?;
            let text = healthreport_pdf::gemini::analyze_pages(&analyzer, &pages)?;
            if let Some(path) = save_response {
                std::fs::write(path, &text)?;
            }
            let pdf = healthreport_pdf::render_response_to_bytes(&text, &fonts)?;
            std::fs::write(&output, pdf)?;
            println!("{}", output.display());
        }
        #[cfg(feature = "server")]
        Command::Serve { bind, output_dir } => {
            use std::sync::Arc;

            use healthreport_pdf::ArtifactStore;
            use healthreport_pdf::server::{AppState, serve};

            // Fail fast on missing configuration before binding
            let analyzer = GeminiClient::new(AnalyzerConfig::from_env()?)?;
            let store = ArtifactStore::new(output_dir.unwrap_or_else(ArtifactStore::default_dir))?;
            let state = AppState {
                analyzer: Arc::new(analyzer),
                rasterizer: Arc::from(intake::default_rasterizer()),
                fonts: Arc::new(load_fonts(cli.fonts)?),
                store,
            };
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(bind, state))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
