//! Import a trace file and print its chronological open/close replay.
//!
//! Usage: `cargo run --example replay -- trace.json`

#![allow(clippy::print_stdout)]

use std::cell::Cell;

use anyhow::{Context, Result};
use stackweave_core::parsers::parse_auto;

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .context("usage: replay <trace.json>")?;
    let data = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    let profiles = parse_auto(&data).with_context(|| format!("importing {path}"))?;

    for profile in &profiles {
        println!(
            "{} — {} {} ({} samples)",
            if profile.metadata.name.is_empty() {
                "(unnamed)"
            } else {
                profile.metadata.name.as_str()
            },
            profile.duration(),
            profile.metadata.unit,
            profile.samples().len(),
        );

        let depth = Cell::new(0usize);
        profile.for_each(
            |frame, node| {
                println!(
                    "{:indent$}> {} ({:.3} total, {:.3} self)",
                    "",
                    frame.name,
                    node.total_weight,
                    node.self_weight,
                    indent = depth.get() * 2,
                );
                depth.set(depth.get() + 1);
            },
            |_, _| depth.set(depth.get().saturating_sub(1)),
        );
    }

    Ok(())
}
