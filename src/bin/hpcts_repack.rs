use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use hpc_ts::container::repack;

#[derive(Parser)]
#[command(name = "hpcts-repack")]
#[command(about = "Copy selected datasets of a container into a new container")]
struct Cli {
    /// Container to read
    #[arg(long)]
    src: PathBuf,

    /// Container to write (replaced if it exists)
    #[arg(long)]
    dest: PathBuf,

    /// Dataset to keep (repeatable, e.g. --dataset /bbstats/readrates)
    #[arg(long = "dataset", required = true)]
    datasets: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.src == cli.dest {
        bail!("--src and --dest must differ");
    }
    let datasets: Vec<&str> = cli.datasets.iter().map(String::as_str).collect();
    repack(&cli.src, &cli.dest, &datasets)
        .with_context(|| format!("repack {} -> {}", cli.src.display(), cli.dest.display()))?;
    Ok(())
}
