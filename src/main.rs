//! Aquatic Connectivity CLI
//!
//! Command-line driver for one hydrographic region: reads the four input
//! tables, runs the snap/cut/network pipeline, and writes the five output
//! tables plus a short human-readable summary.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use aquatic_connectivity::barrier::BarrierKind;
use aquatic_connectivity::config::EngineConfig;
use aquatic_connectivity::error::Error;
use aquatic_connectivity::{csv, cutter, network, snapper, spatial_index::FlowlineIndex};

/// How the final pipeline summary is rendered. Mirrors the teacher CLI's
/// `OutputFormat` (text/json/csv), minus the csv variant since this crate
/// already writes its five output tables as csv regardless of this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SummaryFormat {
    Text,
    Json,
}

/// Per-stage counts printed at the end of a run.
#[derive(Debug, Serialize)]
struct PipelineSummary {
    flowlines_in: usize,
    joins_in: usize,
    barriers_in: usize,
    floodplain_rows: usize,
    barriers_enabled: usize,
    barriers_deduped: usize,
    barriers_snapped: usize,
    flowlines_out: usize,
    joins_out: usize,
    barrier_joins_out: usize,
    networks: usize,
    out_dir: String,
}

#[derive(Parser)]
#[command(name = "aquatic-connectivity")]
#[command(version)]
#[command(about = "Functional aquatic connectivity analysis for one hydrographic region", long_about = None)]
struct Cli {
    /// Path to the flowlines CSV (lineID, NHDPlusID, geometry, length, sinuosity, size_class, stream_order)
    #[arg(long, value_name = "FILE")]
    flowlines: PathBuf,

    /// Path to the joins CSV (upstream_id, downstream_id, upstream, downstream, type)
    #[arg(long, value_name = "FILE")]
    joins: PathBuf,

    /// Path to the barriers CSV (barrier_id, geometry, kind)
    #[arg(long, value_name = "FILE")]
    barriers: PathBuf,

    /// Path to the optional per-NHDPlusID floodplain statistics CSV
    #[arg(long, value_name = "FILE")]
    floodplain: Option<PathBuf>,

    /// Maximum snap distance, in metres
    #[arg(long, default_value_t = 100.0)]
    snap_tolerance_m: f64,

    /// Barriers within this distance of each other are deduplicated before snapping
    #[arg(long, default_value_t = 10.0)]
    duplicate_tolerance_m: f64,

    /// Snap to the nearer flowline endpoint when within tolerance, instead of the curvilinear projection
    #[arg(long, default_value_t = false)]
    prefer_endpoint: bool,

    /// Comma-separated barrier kinds that participate as cutting barriers (waterfalls are always included)
    #[arg(long, value_name = "KINDS", default_value = "dam,waterfall,small_barrier")]
    barrier_kinds: String,

    /// First lineID to allocate to new sub-segments produced by cutting (default: one past the input's max lineID)
    #[arg(long, value_name = "N")]
    next_segment_id: Option<u32>,

    /// Directory to write the rewired flowlines/joins/barrier-joins/stats tables into
    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,

    /// How to render the final pipeline summary
    #[arg(long, value_enum, default_value = "text")]
    summary_format: SummaryFormat,
}

fn parse_barrier_kinds(spec: &str) -> Result<HashSet<BarrierKind>, String> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "dam" => Ok(BarrierKind::Dam),
            "waterfall" => Ok(BarrierKind::Waterfall),
            "small_barrier" => Ok(BarrierKind::SmallBarrier),
            other => Err(format!("unknown barrier kind {other:?}")),
        })
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_pipeline(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_pipeline(cli: &Cli) -> Result<(), Error> {
    let barrier_kinds_enabled = parse_barrier_kinds(&cli.barrier_kinds)
        .map_err(|e| Error::Io {
            path: "--barrier-kinds".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

    let config = EngineConfig {
        snap_tolerance_m: cli.snap_tolerance_m,
        duplicate_tolerance_m: cli.duplicate_tolerance_m,
        prefer_endpoint: cli.prefer_endpoint,
        barrier_kinds_enabled,
        ..EngineConfig::default()
    };

    let text = cli.summary_format == SummaryFormat::Text;

    if text {
        println!("Loading region inputs...");
    }
    let flowlines = csv::read_flowlines_csv(&cli.flowlines)?;
    flowlines.validate()?;

    let joins = csv::read_joins_csv(&cli.joins)?;
    joins.validate(&flowlines)?;

    let barriers = csv::read_barriers_csv(&cli.barriers)?;

    let floodplain = match &cli.floodplain {
        Some(path) => csv::read_floodplain_csv(path)?,
        None => Vec::new(),
    };

    let barrier_table = aquatic_connectivity::barrier::BarrierTable::new(barriers);
    let enabled_barriers = barrier_table.filter_enabled(&config.barrier_kinds_enabled);
    let deduped = snapper::dedupe_points(&enabled_barriers, config.duplicate_tolerance_m);
    if text {
        println!(
            "  {} flowlines, {} joins, {} barrier points, {} floodplain rows",
            flowlines.len(),
            joins.len(),
            barrier_table.len(),
            floodplain.len()
        );
        println!(
            "  {} barriers enabled, {} after deduplication",
            enabled_barriers.len(),
            deduped.len()
        );
        println!("\nBuilding spatial index...");
    }
    let rects: Vec<_> = flowlines.rows().iter().map(|f| f.geometry.bounding_rect()).collect();
    let index = FlowlineIndex::build(&rects);

    if text {
        println!("\nSnapping barriers onto flowlines...");
    }
    let snapped = snapper::snap(&deduped, &flowlines, &index, config.snap_tolerance_m, config.prefer_endpoint);
    if text {
        println!("  {} barriers snapped within tolerance", snapped.len());
        println!("\nCutting flowlines at barrier positions...");
    }
    let cut = cutter::cut_flowlines(
        &flowlines,
        &joins,
        &snapped,
        cli.next_segment_id,
        config.epsilon_endpoint_m,
    )?;
    cut.flowlines.validate()?;
    cut.joins.validate(&cut.flowlines)?;

    if text {
        println!(
            "  {} flowlines, {} joins, {} barrier joins after cutting",
            cut.flowlines.len(),
            cut.joins.len(),
            cut.barrier_joins.len()
        );
        println!("\nBuilding functional networks...");
    }
    let assignment = network::build_networks(&cut.flowlines, &cut.joins, &cut.barrier_joins);
    let stats = network::network_stats(&assignment, &cut.flowlines, &floodplain);
    let metrics = network::barrier_metrics(&cut.barrier_joins, &assignment, &stats)?;

    std::fs::create_dir_all(&cli.out_dir).map_err(|e| Error::Io {
        path: cli.out_dir.display().to_string(),
        source: e,
    })?;

    csv::write_flowlines_csv(cli.out_dir.join("flowlines.csv"), &cut.flowlines)?;
    csv::write_joins_csv(cli.out_dir.join("joins.csv"), &cut.joins)?;
    csv::write_barrier_joins_csv(cli.out_dir.join("barrier_joins.csv"), &cut.barrier_joins)?;
    csv::write_network_stats_csv(cli.out_dir.join("network_stats.csv"), &stats)?;
    csv::write_barrier_metrics_csv(cli.out_dir.join("barrier_metrics.csv"), &metrics)?;

    let summary = PipelineSummary {
        flowlines_in: flowlines.len(),
        joins_in: joins.len(),
        barriers_in: barrier_table.len(),
        floodplain_rows: floodplain.len(),
        barriers_enabled: enabled_barriers.len(),
        barriers_deduped: deduped.len(),
        barriers_snapped: snapped.len(),
        flowlines_out: cut.flowlines.len(),
        joins_out: cut.joins.len(),
        barrier_joins_out: cut.barrier_joins.len(),
        networks: stats.len(),
        out_dir: cli.out_dir.display().to_string(),
    };

    match cli.summary_format {
        SummaryFormat::Text => {
            println!(
                "  {} functional networks\n\nWrote outputs to {}",
                summary.networks, summary.out_dir
            );
        }
        SummaryFormat::Json => {
            let json = serde_json::to_string_pretty(&summary).map_err(|e| Error::Io {
                path: "<summary>".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
