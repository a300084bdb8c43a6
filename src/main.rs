use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Instant,
};

mod convert;
mod dates;
mod error;
mod flex;
mod records;

use convert::process_file;

const CSV_EXTENSION: &str = ".csv";

/// Converts vendor Flexfiles into processed rate files using the flex grid.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the flex grid and the Flexfiles (default: current directory)
    #[arg(value_hint = clap::ValueHint::DirPath)]
    dir: Option<PathBuf>,

    /// File name of the flex grid inside the directory
    #[arg(long, default_value = "Grid.csv")]
    grid: String,

    /// Name prefix of the Flexfiles to convert
    #[arg(long, default_value = "Flexfiles")]
    prefix: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let start = Instant::now();
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => dir,
        None => env::current_dir().context("error getting working directory")?,
    };
    info!("working directory: {}", dir.display());

    let grid = dir.join(&args.grid);
    if !grid.is_file() {
        bail!("{} not found in {}", args.grid, dir.display());
    }

    let files = find_flexfiles(&dir, &args.prefix)?;
    if files.is_empty() {
        bail!(
            "no files starting with '{}' found in {}",
            args.prefix,
            dir.display()
        );
    }
    info!("found {} Flexfiles to process", files.len());

    for file in &files {
        info!("processing {}", file.display());
        if let Err(e) = process_file(file, &grid) {
            error!("error processing {}: {}", file.display(), e);
        }
    }

    info!("processing complete, total time: {:?}", start.elapsed());
    Ok(())
}

/// Lists `<prefix>*.csv` files in `dir`, sorted by path.
fn find_flexfiles(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("error reading {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let path = entry.path();
        if name.starts_with(prefix) && name.ends_with(CSV_EXTENSION) && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_flexfiles_matches_prefix_and_extension() {
        let dir = TempDir::new().unwrap();
        for name in [
            "Flexfiles_b.csv",
            "Flexfiles_a.csv",
            "Flexfiles_c.txt",
            "processed_Flexfiles_a.txt",
            "Grid.csv",
            "other.csv",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("Flexfiles_dir.csv")).unwrap();

        let files = find_flexfiles(dir.path(), "Flexfiles").unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("Flexfiles_a.csv"),
                dir.path().join("Flexfiles_b.csv"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn find_flexfiles_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("export.csv");
        fs::write(&target, "").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("Flexfiles_link.csv")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("gone.csv"),
            dir.path().join("Flexfiles_dangling.csv"),
        )
        .unwrap();

        let files = find_flexfiles(dir.path(), "Flexfiles").unwrap();

        assert_eq!(files, vec![dir.path().join("Flexfiles_link.csv")]);
    }

    #[test]
    fn find_flexfiles_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(find_flexfiles(&dir.path().join("nope"), "Flexfiles").is_err());
    }

    #[test]
    fn args_defaults() {
        let args = Args::parse_from(["flexfile-convert"]);
        assert_eq!(args.dir, None);
        assert_eq!(args.grid, "Grid.csv");
        assert_eq!(args.prefix, "Flexfiles");
    }
}
