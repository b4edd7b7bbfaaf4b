use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid_align::analysis::{residual_error, BenchmarkRunner};
use rigid_align::config::{load_config_or_default, Config};
use rigid_align::data::{load_image, save_image, validate_image_size};
use rigid_align::logging::{self, init_logging};
use rigid_align::visualization::{print_comparison_table, print_results};
use rigid_align::{AlgorithmConfig, AlignerRegistry, Image, ImageTransformer, SyntheticImage, Transform};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "align")]
#[command(about = "Rigid image alignment: translation, rotation and mirror recovery")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML or JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Align an image to a reference
    Align {
        /// Image to move
        #[arg(short, long)]
        image: PathBuf,

        /// Reference image
        #[arg(short, long)]
        reference: PathBuf,

        /// Registered aligner name
        #[arg(short, long, default_value = "rotate_translate_flip")]
        aligner: String,

        /// Comparator name (defaults to the configured one)
        #[arg(long)]
        comparator: Option<String>,

        /// Follow the aligner with simplex refinement
        #[arg(long)]
        refine: bool,

        /// Aligner parameter override, `key=value` (value parsed as JSON when possible)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Where to write the aligned image
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the JSON report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run several aligners on the same image pair
    Compare {
        #[arg(short, long)]
        image: PathBuf,

        #[arg(short, long)]
        reference: PathBuf,

        /// Aligners to compare (comma-separated)
        #[arg(short, long, default_value = "translational,rotate_translate,rotate_translate_flip,rtf_exhaustive")]
        aligners: String,

        #[arg(long)]
        comparator: Option<String>,

        /// Runs per aligner
        #[arg(short = 'n', long, default_value = "1")]
        iterations: usize,

        /// Output file for the comparison results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List aligners with their parameters, and comparators
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Recover known poses applied to a synthetic phantom
    Selftest {
        /// Aligners to check (comma-separated)
        #[arg(short, long, default_value = "translational,rotate_translate,rotate_translate_flip,rtf_exhaustive")]
        aligners: String,

        /// Override the configured number of poses per aligner
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config_or_default(cli.config.as_deref().and_then(|p| p.to_str()));
    match cli.verbose {
        0 => {}
        1 => config.logging.global_level = "info".to_string(),
        2 => config.logging.global_level = "debug".to_string(),
        _ => {
            config.logging.global_level = "trace".to_string();
            config.logging.algorithm_level = "trace".to_string();
        }
    }
    let _guard = init_logging(&config.logging)?;

    let registry = AlignerRegistry::with_defaults();

    match cli.command {
        Commands::Align {
            image,
            reference,
            aligner,
            comparator,
            refine,
            params,
            output,
            report,
        } => {
            let aligner = if refine { format!("refined:{}", aligner) } else { aligner };
            let overrides = parse_params(&params)?;
            handle_align(&registry, &config, &image, &reference, &aligner, comparator, &overrides, output, report)?;
        }
        Commands::Compare {
            image,
            reference,
            aligners,
            comparator,
            iterations,
            output,
        } => {
            handle_compare(&registry, &config, &image, &reference, &aligners, comparator, iterations, output)?;
        }
        Commands::List { format } => {
            handle_list(&registry, format)?;
        }
        Commands::Selftest { aligners, iterations } => {
            handle_selftest(&registry, &config, &aligners, iterations)?;
        }
    }

    Ok(())
}

/// `key=value` pairs; values that are not valid JSON are kept as strings
fn parse_params(params: &[String]) -> anyhow::Result<AlgorithmConfig> {
    let mut config = AlgorithmConfig::new();
    for param in params {
        let Some((key, raw)) = param.split_once('=') else {
            bail!("Parameter '{}' is not of the form key=value", param);
        };
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        config.set_param(key.trim(), value);
    }
    Ok(config)
}

fn load_pair(image: &Path, reference: &Path) -> anyhow::Result<(Image, Image)> {
    let image = load_image(image).with_context(|| format!("loading {}", image.display()))?;
    let reference = load_image(reference).with_context(|| format!("loading {}", reference.display()))?;
    validate_image_size(&image, 8)?;
    validate_image_size(&reference, 8)?;
    tracing::info!(image = %image.describe_dims(), reference = %reference.describe_dims(), "Images loaded");
    Ok((image, reference))
}

#[allow(clippy::too_many_arguments)]
fn handle_align(
    registry: &AlignerRegistry,
    config: &Config,
    image_path: &Path,
    reference_path: &Path,
    aligner: &str,
    comparator: Option<String>,
    overrides: &AlgorithmConfig,
    output: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (image, reference) = load_pair(image_path, reference_path)?;
    let comparator = comparator.unwrap_or_else(|| config.comparator.name.clone());
    let base_name = aligner.strip_prefix("refined:").unwrap_or(aligner);
    let aligner_config = config.aligner_config(base_name).merged_with(overrides);

    logging::new_correlation_id();
    let (alignment, report) = registry.align_with_report(
        aligner,
        &image,
        Some(&reference),
        &comparator,
        &config.comparator.params,
        &aligner_config,
    )?;

    print_results(std::slice::from_ref(&report));

    if let Some(path) = output {
        save_image(&alignment.image, &path)?;
        println!("Aligned image saved to {}", path.display());
    }
    if let Some(path) = report_path {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_compare(
    registry: &AlignerRegistry,
    config: &Config,
    image_path: &Path,
    reference_path: &Path,
    aligners: &str,
    comparator: Option<String>,
    iterations: usize,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (image, reference) = load_pair(image_path, reference_path)?;
    let comparator = comparator.unwrap_or_else(|| config.comparator.name.clone());

    let mut runner = BenchmarkRunner::new()
        .with_comparator(&comparator, config.comparator.params.clone())
        .with_iterations(iterations);
    runner.aligner_configs = config.aligners.clone();
    for name in aligners.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        runner.add_aligner(name);
    }

    let outcome = runner.run_benchmark(registry, &image, &reference);
    print_comparison_table(&outcome.reports);
    for (aligner, error) in &outcome.failures {
        tracing::warn!(aligner = %aligner, error = %error, "Aligner failed");
    }

    if let Some(path) = output {
        let json = serde_json::json!({
            "reports": outcome.reports,
            "failures": outcome.failures,
            "timing": outcome.stats,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&json)?)?;
        println!("Comparison results saved to {}", path.display());
    }
    Ok(())
}

fn handle_list(registry: &AlignerRegistry, format: ListFormat) -> anyhow::Result<()> {
    let listing = registry.list();
    match format {
        ListFormat::Json => {
            let json = serde_json::json!({
                "aligners": listing,
                "comparators": registry.comparators().names(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        ListFormat::Text => {
            println!("Aligners (prefix any name with 'refined:' to add simplex refinement):");
            for (name, params) in &listing {
                println!("  {}", name);
                for param in params {
                    println!("      {:<12} {:?} = {}  {}", param.name, param.value_type, param.default_value, param.description);
                }
            }
            println!("Comparators: {}", registry.comparators().names().join(", "));
        }
    }
    Ok(())
}

/// Random pose within what the phantom tolerates without wrapping
fn random_pose(rng: &mut StdRng, rotate: bool, mirror: bool) -> Transform {
    let angle = if rotate { rng.gen_range(-170.0f32..170.0) } else { 0.0 };
    let tx = rng.gen_range(-3i32..=3) as f32;
    let ty = rng.gen_range(-3i32..=3) as f32;
    Transform::new_2d(angle, tx, ty, mirror)
}

fn handle_selftest(
    registry: &AlignerRegistry,
    config: &Config,
    aligners: &str,
    iterations: Option<usize>,
) -> anyhow::Result<()> {
    let testing = &config.testing;
    let iterations = iterations.unwrap_or(testing.iterations).max(1);
    let reference = SyntheticImage::phantom(testing.image_size)
        .with_noise(testing.noise_sigma, testing.seed)
        .render();
    let mut rng = StdRng::seed_from_u64(testing.seed);
    let mut failures = 0usize;

    for name in aligners.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let base_name = name.strip_prefix("refined:").unwrap_or(name);
        let rotate = base_name != "translational";
        let handed = base_name.contains("flip") || base_name.starts_with("rtf_");
        let aligner_config = config.aligner_config(base_name);

        for i in 0..iterations {
            let mirror = handed && i % 2 == 1;
            let applied = random_pose(&mut rng, rotate, mirror);
            let moving = ImageTransformer::apply(&reference, &applied);

            let recovered = registry.align(
                name,
                &moving,
                Some(&reference),
                &config.comparator.name,
                &config.comparator.params,
                &aligner_config,
            )?;
            let error = residual_error(&applied, &recovered.transform);
            let pass = error.within(testing.translation_tolerance_px, testing.rotation_tolerance_deg);
            if !pass {
                failures += 1;
            }
            println!(
                "{:<24} applied ({:7.2}°, {:5.1}, {:5.1}, mirror {:5}) residual {:.2}px {:.2}° {}",
                name,
                applied.angle(),
                applied.tx(),
                applied.ty(),
                applied.is_mirrored(),
                error.translation_px,
                error.rotation_deg,
                if pass { "ok" } else { "FAIL" }
            );
        }
    }

    if failures > 0 {
        bail!("{} pose(s) outside tolerance", failures);
    }
    println!("All poses recovered within tolerance");
    Ok(())
}
