//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `garden_core` linkage by printing its version.
//! - Given a database path, open the garden and print a read-only summary.

use clap::Parser;
use garden_core::growth::{next_stage_config, stage_config};
use garden_core::repo::category_repo::resolve_path;
use garden_core::{Category, CategoryNode, Garden, GardenConfig, KvBackend, LinkGraph, Note};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "garden")]
#[command(about = "Inspect a digital garden database")]
struct Cli {
    /// SQLite database to summarize; only the version is printed without it
    db_path: Option<PathBuf>,

    /// Absolute directory for rotated log files
    #[arg(long)]
    log_dir: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("garden_core ping={}", garden_core::ping());
    println!("garden_core version={}", garden_core::core_version());

    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = garden_core::init_logging(garden_core::default_log_level(), log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    let Some(db_path) = cli.db_path else {
        return ExitCode::SUCCESS;
    };
    match summarize(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(db_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let conn = garden_core::open_db(db_path)?;
    let garden = Garden::open_sqlite(&conn, GardenConfig::default())?;

    let notes = garden.notes();
    println!("notes={}", notes.len());

    let categories = garden.categories();
    println!("categories:");
    for node in garden.category_tree() {
        print_node(&categories, &notes, &node);
    }

    println!("tags:");
    for tag in garden.tags().list() {
        println!("  {} ({})", tag.name, tag.count);
    }

    let growth = garden.growth_state();
    let stage = stage_config(growth.current_stage);
    println!(
        "growth: {} {} total_words={} progress={:.1}%",
        stage.emoji,
        stage.name,
        growth.total_words,
        growth.progress_to_next_stage()
    );
    if let Some(next) = next_stage_config(growth.current_stage) {
        println!("next stage: {} at {} words", next.name, next.min_words);
    }

    let graph = LinkGraph::build(&notes);
    println!("links={}", graph.edge_count());

    let keys = garden.store().backend().keys()?;
    println!("collections={}", keys.join(","));

    let usage = garden.storage_usage()?;
    println!(
        "storage: {:.2}MB ({:.1}% of limit)",
        usage.used_mb(),
        usage.percent_of_hard_limit()
    );
    Ok(())
}

fn print_node(categories: &[Category], notes: &[Note], node: &CategoryNode) {
    let category = &node.category;
    let held = notes
        .iter()
        .filter(|note| note.category == category.name)
        .count();
    println!(
        "  {} {held} notes",
        resolve_path(categories, &category.name)
    );
    for child in &node.children {
        print_node(categories, notes, child);
    }
}
