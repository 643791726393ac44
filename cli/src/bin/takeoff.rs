use clap::{Parser, Subcommand};
use cli::{load_by_extension, load_context, load_price_table, AnnotationMode, BatchConfig};
use color_eyre::eyre::{eyre, Result};
use costing::{AggregatorConfig, CostAnalyzer, RateCard};
use drawing::{DetectionSettings, PageAnalyzer, PageConsolidator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use takeoff::{
    AnnotationSource, BatchRunner, DocumentEstimate, DocumentPipeline, DocumentRequest, EstimateSink,
    FixedDrawingType, JsonDirectorySink, NoAnnotations, SidecarAnnotations,
};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate a single document from its page images
    Estimate {
        /// Page images in page order
        #[arg(required = true)]
        pages: Vec<PathBuf>,
        /// Document id, defaults to the first page's file stem
        #[arg(long)]
        id: Option<String>,
        /// Project context file (.toml or .json)
        #[arg(long)]
        context: Option<PathBuf>,
        /// Price table file (.toml or .json)
        #[arg(long)]
        prices: Option<PathBuf>,
        /// Summary of an accompanying report (.toml or .json)
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write the estimate JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write per-page GeoJSON of the detected elements to this directory
        #[arg(long)]
        geojson_dir: Option<PathBuf>,
        /// Ignore `<page>.annotations.json` sidecar files
        #[arg(long)]
        no_annotations: bool,
    },
    /// Estimate every document of a batch configuration file
    Batch {
        /// Path to the TOML or JSON batch configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the JSON schema of the batch configuration
    Schema {
        /// Write the schema here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            pages,
            id,
            context,
            prices,
            report,
            output,
            geojson_dir,
            no_annotations,
        } => {
            let id = match id {
                Some(id) => id,
                None => pages
                    .first()
                    .and_then(|p| p.file_stem())
                    .map(|s| s.to_string_lossy().into_owned())
                    .ok_or_else(|| eyre!("Cannot derive a document id from the page paths"))?,
            };
            let costing = CostAnalyzer::new(
                Arc::new(load_price_table(prices.as_deref())?),
                load_context(context.as_deref())?,
                RateCard::default(),
                AggregatorConfig::default(),
            );
            let mut request = DocumentRequest::new(id, pages);
            if let Some(path) = report {
                request = request.with_report(load_by_extension(&path)?);
            }
            let settings = DetectionSettings::default();

            let estimate = if no_annotations {
                estimate_document(&settings, NoAnnotations, costing, geojson_dir, &request).await
            } else {
                estimate_document(&settings, SidecarAnnotations, costing, geojson_dir, &request).await
            };
            write_estimate(&estimate, output.as_deref())?;
        }
        Commands::Batch { config } => {
            run_batch(&config).await?;
        }
        Commands::Schema { output } => {
            let schema = schemars::schema_for!(BatchConfig);
            let json = serde_json::to_string_pretty(&schema)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    info!("Schema written to {:?}", path);
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn build_pipeline<A: AnnotationSource + 'static>(
    settings: &DetectionSettings,
    annotations: A,
    costing: CostAnalyzer,
    geojson_dir: Option<PathBuf>,
) -> DocumentPipeline<A, FixedDrawingType> {
    let pipeline = DocumentPipeline::new(
        PageAnalyzer::from_settings(settings),
        PageConsolidator::new(settings.default_scale.clone()),
        annotations,
        FixedDrawingType::default(),
        costing,
    );
    match geojson_dir {
        Some(dir) => pipeline.with_geojson_dir(dir),
        None => pipeline,
    }
}

async fn estimate_document<A: AnnotationSource + 'static>(
    settings: &DetectionSettings,
    annotations: A,
    costing: CostAnalyzer,
    geojson_dir: Option<PathBuf>,
    request: &DocumentRequest,
) -> DocumentEstimate {
    if let Some(dir) = &geojson_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create GeoJSON directory {:?}: {}", dir, e);
        }
    }
    info!("📐 Estimating {} ({} pages)", request.document_id, request.pages.len());
    build_pipeline(settings, annotations, costing, geojson_dir)
        .run(request)
        .await
}

fn write_estimate(estimate: &DocumentEstimate, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(estimate)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("✅ Estimate written to {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_batch(config_path: &Path) -> Result<()> {
    let config = BatchConfig::from_file(config_path)?;
    info!("Batch configuration: {} documents", config.documents.len());

    let costing = CostAnalyzer::new(
        Arc::new(config.load_price_table()?),
        config.load_context()?,
        config.rates.clone(),
        config.aggregator.clone(),
    );
    if let Some(dir) = &config.geojson_dir {
        std::fs::create_dir_all(dir)?;
    }

    let estimates = match config.annotations {
        AnnotationMode::None => run_documents(&config, NoAnnotations, costing).await,
        AnnotationMode::Sidecar => run_documents(&config, SidecarAnnotations, costing).await,
    };

    let sink = JsonDirectorySink::new(&config.output_dir);
    let mut stored = 0;
    for estimate in &estimates {
        info!(
            "{}: {:?}, {} {} incl. VAT",
            estimate.document_id,
            estimate.status,
            estimate.cost.total_incl_vat(),
            estimate.cost.currency
        );
        match sink.store(estimate).await {
            Ok(_) => stored += 1,
            Err(e) => error!("Could not store estimate {}: {}", estimate.document_id, e),
        }
    }

    info!("✅ Batch completed: {} of {} estimates stored in {:?}", stored, estimates.len(), config.output_dir);
    Ok(())
}

async fn run_documents<A: AnnotationSource + 'static>(
    config: &BatchConfig,
    annotations: A,
    costing: CostAnalyzer,
) -> Vec<DocumentEstimate> {
    let pipeline = build_pipeline(&config.detection, annotations, costing, config.geojson_dir.clone());
    let runner = BatchRunner::new(pipeline).with_max_concurrent_documents(config.max_concurrent_documents);

    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling documents that have not started");
            cancel.cancel();
        }
    });

    runner.run(config.requests()).await
}
