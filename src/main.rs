use anyhow::Result;
use clap::{Parser, Subcommand};
use querybot::chart::PlotKind;
use querybot::insights::InsightsBoard;
use querybot::llm::OpenAiClient;
use querybot::loader;
use querybot::session::{PlotRequest, QueryBot};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "querybot")]
#[command(about = "Natural-language SQL assistant for uploaded CSV/Excel data")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question about an uploaded file
    Ask {
        /// CSV file to load (delimiter auto-detected)
        #[arg(short, long)]
        file: PathBuf,

        /// The question in natural language
        question: String,

        /// Explicit plot type: histogram, scatter, line, bar, pie
        #[arg(long)]
        plot_type: Option<String>,

        /// Columns for the explicit plot (derived from the question if omitted)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Derive a chart from keywords in the question
        #[arg(long, conflicts_with = "plot_type")]
        auto_plot: bool,

        /// Run generated SQL unguarded (default rejects non-SELECT statements)
        #[arg(long)]
        allow_writes: bool,
    },
    /// Generate free-form insights over an Excel dashboard extract
    Insights {
        /// Excel workbook (.xlsx)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Instructions regarding the dashboard
        #[arg(long, default_value = "")]
        instructions: String,

        /// The query to send
        prompt: String,

        /// Directory for uploaded workbooks
        #[arg(long, default_value = "input_excel_folder")]
        input_dir: PathBuf,

        /// Directory for generated responses
        #[arg(long, default_value = "output_responses_folder")]
        output_dir: PathBuf,

        /// Directory for daily logs
        #[arg(long, default_value = "log_folder")]
        log_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let client = Arc::new(OpenAiClient::from_env(args.api_key.clone())?);

    match args.command {
        Command::Ask {
            file,
            question,
            plot_type,
            columns,
            auto_plot,
            allow_writes,
        } => {
            let bytes = std::fs::read(&file)?;
            let mut bot = QueryBot::new(client);
            if allow_writes {
                bot = bot.allow_writes();
            }
            bot.load_csv(&bytes)?;
            info!(file = %file.display(), "dataset loaded");

            let plot = match plot_type {
                Some(kind) => PlotRequest::Explicit {
                    kind: PlotKind::from_str(&kind)?,
                    columns,
                },
                None if auto_plot => PlotRequest::Auto,
                None => PlotRequest::None,
            };

            let response = bot.ask(&question, plot).await;
            if let Some(sql) = &response.sql {
                println!("Generated SQL Query: {}", sql);
            }
            match &response.outcome {
                Some(querybot::executor::QueryOutcome::Table(table)) => {
                    println!("Query Result:\n{}", table.to_grid());
                }
                Some(querybot::executor::QueryOutcome::Failure(message)) => {
                    println!("{}", message);
                }
                None => {}
            }
            if let Some(chart) = &response.chart {
                println!("{}", chart.to_text());
            }
            for notice in &response.notices {
                println!("{}", notice);
            }
        }
        Command::Insights {
            file,
            instructions,
            prompt,
            input_dir,
            output_dir,
            log_dir,
        } => {
            let mut board = InsightsBoard::new(client, input_dir, output_dir, log_dir)?;
            let sheets = match &file {
                Some(path) => {
                    let saved = board.save_upload(path)?;
                    loader::load_workbook(&saved)?
                }
                None => Vec::new(),
            };
            let response = board.generate(&instructions, &prompt, &sheets).await?;
            println!("Conversation Response:\n{}", response);
        }
    }

    Ok(())
}
