mod config;
mod renderer;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use weighted_tree_core::model::{AggregatedCallSite, DifferentialWeightedTree, Symbol};
use weighted_tree_core::palette::{DifferentialPalette, FlameDefaultPalette};
use weighted_tree_core::parsers::parse_auto;
use weighted_tree_core::provider::{
    CallGraphProvider, DifferentialWeightedTreeProvider, WeightedTreeProvider,
};

use crate::config::Config;
use crate::renderer::{TextRenderer, format_change};

#[derive(Debug, Parser)]
#[command(name = "wtree", version, about = "Aggregate, group and compare weighted call trees")]
struct Cli {
    /// Config file; `wtree.toml` in the working directory by default.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Leading frames naming elements, outermost first (e.g. `process,thread`).
    #[arg(long, global = true, value_delimiter = ',')]
    levels: Option<Vec<String>>,

    /// Deepest call-tree level to print.
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the aggregated call trees of each element.
    Tree {
        /// Folded stacks, or a JSON tree set written by `--json`.
        file: PathBuf,
        /// Grouping level: 0 merges all elements, 1 is the outermost level.
        #[arg(long, value_name = "LEVEL")]
        group_by: Option<usize>,
        /// Emit the tree set as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare a profile against a baseline, node by node.
    Diff {
        baseline: PathBuf,
        comparison: PathBuf,
        #[arg(long, value_name = "LEVEL")]
        group_by: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_PATH));
    let loaded = Config::load_optional(&config_path);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => Config::default(),
    };
    init_logging(&config.log_level);
    match loaded {
        Ok(Some(_)) => debug!(path = %config_path.display(), "loaded config"),
        Ok(None) if cli.config.is_some() => warn!(path = %config_path.display(), "config file not found, using defaults"),
        Ok(None) => {}
        Err(err) => warn!("{err:#}, using defaults"),
    }

    if let Some(levels) = cli.levels {
        config.element_levels = levels;
    }
    if cli.max_depth.is_some() {
        config.max_depth = cli.max_depth;
    }

    let output = match cli.command {
        Command::Tree { file, group_by, json } => {
            config.group_level = group_by.or(config.group_level);
            tree_command(&config, &file, json)?
        }
        Command::Diff {
            baseline,
            comparison,
            group_by,
            json,
        } => {
            config.group_level = group_by.or(config.group_level);
            diff_command(&config, &baseline, &comparison, json)?
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse `path` and regroup it at the configured level.
fn load_provider(config: &Config, path: &Path) -> Result<CallGraphProvider> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let options = config.collapsed_options();
    let set = parse_auto(&data, &options).with_context(|| format!("failed to parse {}", path.display()))?;

    let title = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let mut provider = CallGraphProvider::new(title, set)
        .with_weight_type(config.weight_unit)
        .with_group_descriptor(options.group_hierarchy());
    if let Some(colors) = config.palette_colors {
        provider = provider.with_palette(FlameDefaultPalette::new(colors));
    }

    Ok(match config.group_level {
        Some(level) => provider.grouped(level),
        None => provider,
    })
}

fn tree_command(config: &Config, file: &Path, json: bool) -> Result<String> {
    let provider = load_provider(config, file)?;
    if json {
        return Ok(serde_json::to_string_pretty(&provider.tree_set().snapshot())? + "\n");
    }
    let metrics = provider.additional_metrics();
    Ok(TextRenderer::new(&provider, config.max_depth).render(|site: &AggregatedCallSite| {
        let columns: Vec<String> = metrics
            .iter()
            .enumerate()
            .filter_map(|(index, metric)| {
                let value = provider.additional_metric(site, index)?;
                Some(format!("{}: {}", metric.title.to_lowercase(), value.format(metric)))
            })
            .collect();
        (!columns.is_empty()).then(|| columns.join(", "))
    }))
}

fn diff_command(config: &Config, baseline: &Path, comparison: &Path, json: bool) -> Result<String> {
    let baseline = load_provider(config, baseline)?;
    let comparison = load_provider(config, comparison)?;

    let mut diff = DifferentialWeightedTreeProvider::from_tree_sets(
        &comparison,
        baseline.tree_set(),
        comparison.tree_set(),
    )
    .context("comparison profile has no elements")?;
    if let Some(colors) = config.palette_colors {
        diff = diff.with_palette(DifferentialPalette::new(colors));
    }

    if json {
        return Ok(serde_json::to_string_pretty(&diff.tree_set().snapshot())? + "\n");
    }
    Ok(TextRenderer::new(&diff, config.max_depth)
        .render(|tree: &DifferentialWeightedTree<Symbol>| Some(format_change(tree))))
}
