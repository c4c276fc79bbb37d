//! Renders the `galileo(8)` manual page from the command-line definition.
//!
//! The page lands in `target/generated-man` unless `GALILEO_MAN_DIR` names
//! another directory.

use std::{
    env,
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

const DEFAULT_MAN_DIR: &str = "target/generated-man";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=GALILEO_MAN_DIR");

    let dir = env::var_os("GALILEO_MAN_DIR")
        .map_or_else(|| PathBuf::from(DEFAULT_MAN_DIR), PathBuf::from);
    fs::create_dir_all(&dir)?;

    let name = env::var("CARGO_PKG_NAME")?;
    let version = env::var("CARGO_PKG_VERSION")?;
    let page = Man::new(cli::Cli::command())
        .section("8")
        .manual("System Manager's Manual")
        .source(format!("{name} {version}"));

    let mut out = BufWriter::new(File::create(dir.join(format!("{name}.8")))?);
    page.render(&mut out)?;
    out.flush()?;
    Ok(())
}
