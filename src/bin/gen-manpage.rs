//! Man page generator for pavr2
//!
//! Writes `pavr2.1` plus one `pavr2-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, path: &Path) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    fs::write(path, buffer)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let main_page = output_dir.join("pavr2.1");
    render(cmd.clone(), &main_page)?;
    println!("Generated {}", main_page.display());

    for sub in cmd.get_subcommands() {
        let name = format!("pavr2-{}", sub.get_name());
        let path = output_dir.join(format!("{}.1", name));
        render(sub.clone().display_name(name), &path)?;
        println!("Generated {}", path.display());
    }

    println!("\nTo view: man -l {}", main_page.display());
    Ok(())
}
