/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use clock_mgmt::config::Board;
use clock_mgmt::hal::{Delay, RecordingDelay, StdDelay};
use clock_mgmt::OwnerId;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Load a board description, apply device clock states and rate requests,
/// then print the resulting clock tree.
///
/// Example:
///   clock-mgmt --board boards/lpc55s69.yaml \
///              --state flexcomm0=default --set pll0=150000000
#[derive(Debug, Parser)]
#[command(
    name = "clock-mgmt",
    about = "Clock tree model – apply states and rate requests to a board",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML board description.
    #[arg(short = 'b', long = "board")]
    board: PathBuf,

    /// Apply a device clock state, as `<device>=<index>` or `<device>=<name>`.
    #[arg(short = 's', long = "state", value_parser = parse_pair)]
    states: Vec<(String, String)>,

    /// Request a clock rate, as `<clock>=<hz>`.
    #[arg(short = 'r', long = "set", value_parser = parse_pair)]
    rates: Vec<(String, String)>,

    /// Consumer id used for `--set` requests.
    #[arg(short = 'o', long = "owner", default_value_t = 0)]
    owner: u32,

    /// Record PLL settling delays instead of sleeping.
    #[arg(long = "skip-delays", default_value_t = false)]
    skip_delays: bool,
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() && !v.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected <name>=<value>, got '{s}'")),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        board       = %cli.board.display(),
        states      = cli.states.len(),
        rates       = cli.rates.len(),
        owner       = cli.owner,
        skip_delays = cli.skip_delays,
        "Configuration"
    );

    if let Err(e) = run(&cli) {
        error!("clock-mgmt failed: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // ── Load board ────────────────────────────────────────────────────────────
    let delay: Arc<dyn Delay> = if cli.skip_delays {
        Arc::new(RecordingDelay::new())
    } else {
        Arc::new(StdDelay)
    };
    let board = Board::load(&cli.board, delay)?;

    // ── Apply device states ───────────────────────────────────────────────────
    for (device, state) in &cli.states {
        let dev = board
            .device(device)
            .ok_or_else(|| anyhow!("unknown device '{device}'"))?;
        let index = match state.parse::<usize>() {
            Ok(i) => i,
            Err(_) => dev
                .state_index(state)
                .ok_or_else(|| anyhow!("device '{device}' has no state '{state}'"))?,
        };
        dev.apply_state(&board.tree, index)
            .with_context(|| format!("applying state '{state}' of '{device}'"))?;
    }

    // ── Apply rate requests ───────────────────────────────────────────────────
    let owner = OwnerId::Consumer(cli.owner);
    for (clock, hz) in &cli.rates {
        let id = board
            .tree
            .find(clock)
            .ok_or_else(|| anyhow!("unknown clock '{clock}'"))?;
        let hz: u32 = hz
            .parse()
            .with_context(|| format!("invalid rate '{hz}' for '{clock}'"))?;
        let achieved = board
            .tree
            .set_rate(id, hz, owner)
            .with_context(|| format!("set_rate({clock}, {hz})"))?;
        if achieved != hz {
            warn!(clock = %clock, requested = hz, achieved, "rate not met exactly");
        }
    }

    // ── Print clock tree ──────────────────────────────────────────────────────
    print_tree(&board)
}

fn print_tree(board: &Board) -> Result<()> {
    let tree = &board.tree;
    if tree.is_empty() {
        bail!("board defines no clocks");
    }
    info!("Clock tree ({} clock(s)):", tree.len());
    for id in tree.ids() {
        let rate = match tree.get_rate(id) {
            Ok(hz) => hz.to_string(),
            Err(e) => format!("error: {e}"),
        };
        let owner = tree
            .owner(id)
            .map_or_else(|| "-".to_string(), |o| o.to_string());
        info!(
            "  [{name}]  kind={kind}  rate={rate}  owner={owner}",
            name = tree.name(id)?,
            kind = tree.kind(id)?,
        );
    }
    Ok(())
}
