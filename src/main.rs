// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::StreamExt;
use llm_workbench::utils::logging::{format_error, format_header, format_success, format_warning};
use llm_workbench::{
    Adapter, Config, ImagePipeline, IndexManifest, PromptTemplate, RagOrchestrator, Segmenter,
    Validator, collect_report, embedding, imaging, index, llm,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "llm_workbench")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Local RAG, LLM adapters, image segmentation and hardware reporting", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the OS, CPU, RAM, storage and GPU report
    Hardware {
        #[arg(long)]
        json: bool,

        /// Skip GPU enumeration
        #[arg(long)]
        no_gpu: bool,
    },

    /// Build the vector index from the corpus directory
    Index {
        #[arg(long, value_name = "DIR")]
        corpus: Option<PathBuf>,
    },

    /// Retrieve the closest chunks without generating an answer
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Answer one or more questions
    Ask {
        #[arg(required = true)]
        questions: Vec<String>,

        /// Print tokens as they are generated
        #[arg(long)]
        stream: bool,

        /// Rebuild the index before answering
        #[arg(long)]
        rebuild: bool,

        /// Send the question to the model without retrieval
        #[arg(long)]
        raw: bool,
    },

    /// Show the persisted index manifest
    Stats,

    /// Apply image transforms and save the result
    Enhance {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, num_args = 1.., required = true)]
        transforms: Vec<String>,
    },

    /// Generate segmentation masks for an image
    Segment {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON lines file for mask records
        #[arg(short, long)]
        masks: Option<PathBuf>,

        /// Transforms committed before mask generation
        #[arg(short, long, num_args = 1..)]
        enhance: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    llm_workbench::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Hardware { json, no_gpu } => cmd_hardware(json, no_gpu)?,
        Commands::Index { corpus } => cmd_index(&config, corpus, cli.color).await?,
        Commands::Search { query, limit } => cmd_search(&config, &query, limit).await?,
        Commands::Ask {
            questions,
            stream,
            rebuild,
            raw,
        } => cmd_ask(&config, &questions, stream, rebuild, raw).await?,
        Commands::Stats => cmd_stats(&config).await?,
        Commands::Enhance {
            input,
            output,
            transforms,
        } => cmd_enhance(&input, &output, &transforms)?,
        Commands::Segment {
            input,
            output,
            masks,
            enhance,
        } => cmd_segment(&config, &input, output, masks, enhance)?,
    }

    Ok(())
}

fn cmd_hardware(json: bool, no_gpu: bool) -> Result<()> {
    let report = collect_report(!no_gpu).context(
        "Hardware query failed (use --no-gpu when no NVIDIA driver is available)",
    )?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

fn orchestrator(config: &Config) -> Result<RagOrchestrator> {
    let embedder = embedding::build_embedder(config).context("Failed to create embedder")?;
    Ok(RagOrchestrator::new(config.clone(), embedder)?)
}

async fn cmd_index(config: &Config, corpus: Option<PathBuf>, colored: bool) -> Result<()> {
    let corpus = corpus.unwrap_or_else(|| config.corpus.directory.clone());
    Validator::validate_directory(&corpus)?;
    info!("Building index from {}", corpus.display());

    let mut rag = orchestrator(config)?.with_progress(colored);
    let stats = rag
        .build_index(&corpus)
        .await
        .context("Index build failed")?;

    println!(
        "{}",
        format_success(&format!(
            "Indexed {} chunks from {} documents in {:.2}s ({:.1} chunks/s)",
            stats.chunks,
            stats.documents,
            stats.duration_secs,
            stats.chunks_per_second()
        ))
    );
    if let Some(manifest) = rag.manifest() {
        println!("{}", manifest.summary());
    }
    Ok(())
}

async fn cmd_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    info!("Searching for: {}", query);

    let mut rag = orchestrator(config)?;
    rag.load_index(&config.index.storage_path)
        .await
        .context("Failed to load index (run `index` first)")?;

    let limit = limit.unwrap_or(config.index.top_k);
    let results = rag.search(query, limit).await.context("Search failed")?;

    if results.is_empty() {
        println!("{}", format_warning(&format!("No results for \"{}\"", query)));
        return Ok(());
    }

    println!("{}", format_header(&format!("Results for \"{}\"", query)));
    for (idx, hit) in results.iter().enumerate() {
        print!("{}. {}", idx + 1, hit.format_summary(300));
    }
    Ok(())
}

async fn cmd_ask(
    config: &Config,
    questions: &[String],
    stream: bool,
    rebuild: bool,
    raw: bool,
) -> Result<()> {
    if raw {
        let generator = llm::load_generator(config)
            .await
            .context("Failed to load model")?;
        let adapter = match config.model.backend {
            llm_workbench::config::ModelBackend::Hosted => Adapter::hosted(generator, None),
            llm_workbench::config::ModelBackend::Llama => Adapter::local(generator),
        }
        .with_verbose(config.model.verbose);

        for question in questions {
            print_answer(&adapter, question, stream).await;
        }
        return Ok(());
    }

    let mut rag = orchestrator(config)?.with_progress(true);
    rag.start(rebuild || config.index.rebuild)
        .await
        .context("Failed to prepare index and model")?;

    if stream {
        let adapter = rag.adapter()?;
        for question in questions {
            print_answer(&adapter, question, true).await;
        }
        return Ok(());
    }

    let outcomes = rag.answer_all(questions).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in outcomes {
        println!("{}", format_header(&outcome.question));
        match outcome.result {
            Ok(answer) => println!("{}\n", answer.trim()),
            Err(e) => println!("{}\n", format_error(&e.to_string())),
        }
    }
    if failed > 0 {
        warn!("{} of {} questions failed", failed, questions.len());
    }
    Ok(())
}

/// Per-question failures are printed and do not stop the remaining questions.
async fn print_answer(adapter: &Adapter, question: &str, stream: bool) {
    println!("{}", format_header(question));
    if !stream {
        match adapter.answer(question).await {
            Ok(answer) => println!("{}\n", answer.trim()),
            Err(e) => println!("{}\n", format_error(&e.to_string())),
        }
        return;
    }

    let mut tokens = match adapter.answer_stream(question).await {
        Ok(tokens) => tokens,
        Err(e) => {
            println!("{}\n", format_error(&e.to_string()));
            return;
        }
    };
    let mut stdout = std::io::stdout();
    while let Some(piece) = tokens.next().await {
        match piece {
            Ok(text) => {
                print!("{}", text);
                let _ = stdout.flush();
            }
            Err(e) => {
                println!("\n{}", format_error(&e.to_string()));
                break;
            }
        }
    }
    println!("\n");
}

async fn cmd_stats(config: &Config) -> Result<()> {
    let storage = &config.index.storage_path;
    if !IndexManifest::exists(storage) {
        println!(
            "{}",
            format_warning(&format!("No index found in {}", storage.display()))
        );
        return Ok(());
    }

    let (store, manifest) = index::open(&config.index)
        .await
        .context("Failed to open index")?;
    println!("{}", format_header("Index"));
    println!("{}", manifest.summary());
    println!("Backend: {}", store.backend());
    println!("Rows: {}", store.count().await?);
    println!("Location: {}", storage.join(&manifest.location).display());
    let template = PromptTemplate::from_config(&config.prompt)?;
    println!("Prompt language: {}", template.language());
    Ok(())
}

fn cmd_enhance(input: &Path, output: &Path, transforms: &[String]) -> Result<()> {
    let image = imaging::load_rgb(input).context("Failed to read input image")?;
    let mut pipeline = ImagePipeline::new(image);
    let report = pipeline.apply_sequence(transforms);
    for name in &report.rejected {
        println!("{}", format_warning(&format!("Skipped unknown transform '{}'", name)));
    }
    imaging::save_rgb(pipeline.current(), output).context("Failed to save output image")?;
    println!(
        "{}",
        format_success(&format!(
            "Applied {} transform(s), saved {}",
            report.applied.len(),
            output.display()
        ))
    );
    Ok(())
}

fn cmd_segment(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    masks: Option<PathBuf>,
    enhance: Vec<String>,
) -> Result<()> {
    let mut segmenter =
        Segmenter::load(&config.segmentation).context("Failed to load segmentation model")?;
    segmenter
        .set_image(input)
        .context("Failed to read input image")?;
    if !enhance.is_empty() {
        segmenter.enhance(enhance, true)?;
    }

    let count = segmenter.run().context("Mask generation failed")?.len();
    println!("{}", format_success(&format!("Generated {} masks", count)));

    if let Some(path) = output {
        segmenter.render(Some(&path))?;
        println!("Annotated image: {}", path.display());
    }
    if let Some(path) = masks {
        segmenter.serialize(&path)?;
        println!("Mask records: {}", path.display());
    }
    Ok(())
}
