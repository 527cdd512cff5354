use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use inquire::Select;
use log::LevelFilter;
use macho_inspector::{
    parse_file, parse_file_permissive, CpuType, DisplayList, ParsedImage, SliceOutcome,
};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect the header and load commands of a Mach-O file")]
struct Args {
    /// The Mach-O or universal file to inspect
    input_file: PathBuf,
    /// Only show the slice for this architecture (arm64, x86_64, ...)
    #[arg(long, short)]
    arch: Option<String>,
    /// Show every slice without asking
    #[arg(long, conflicts_with = "arch")]
    all: bool,
    /// Keep going when a slice fails to decode
    #[arg(long, short)]
    permissive: bool,
    /// Only print the image headers
    #[arg(long)]
    header_only: bool,
    /// Run without asking for a selection
    #[arg(long, short('y'))]
    all_yes: bool,
    /// Increase log verbosity (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

const ALL_SLICES: &str = "all architectures";

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    ensure!(
        args.input_file.exists(),
        "Input file `{}` does not exist",
        args.input_file.display()
    );
    ensure!(
        args.input_file.is_file(),
        "Input file `{}` is not a file",
        args.input_file.display()
    );

    let outcomes = args.load(&args.input_file)?;
    if outcomes.is_empty() {
        bail!("`{}` contains no architectures", args.input_file.display());
    }
    let is_fat = outcomes.iter().any(|o| o.arch.is_some());
    let kind = if is_fat {
        format!("fat ({} archs)", outcomes.len())
    } else {
        match &outcomes[0].result {
            Ok(image) if image.header.is_64() => "64-bit Mach-O".to_string(),
            Ok(_) => "32-bit Mach-O".to_string(),
            Err(_) => "Mach-O".to_string(),
        }
    };
    println!("match {} file", kind.red());

    let mut failed = false;
    for outcome in args.select(outcomes)? {
        match &outcome.result {
            Ok(image) => args.print_image(image),
            Err(err) => {
                failed = true;
                eprintln!(
                    "{} {}: {}",
                    "failed".red().bold(),
                    slice_name(&outcome),
                    err.to_string().red()
                );
            }
        }
    }

    if failed {
        println!("{}", "Done, with errors".yellow().bold());
    } else {
        println!("{}", "Done!".green().bold());
    }
    Ok(())
}

/// Architecture name from the decoded image, or from the fat descriptor if
/// the image did not decode.
fn slice_name(outcome: &SliceOutcome) -> String {
    let raw = match (&outcome.result, &outcome.arch) {
        (Ok(image), _) => return image.cpu_type.arch_name(),
        (Err(_), Some(arch)) => arch.cpu_type,
        (Err(_), None) => return "unknown".to_string(),
    };
    CpuType::lookup(raw)
        .known()
        .map_or_else(|| format!("cpu {:#x}", raw), CpuType::arch_name)
}

fn print_list(list: &DisplayList, indent: usize) {
    let width = list.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in list {
        let label = format!("{label:width$}");
        println!("{:indent$}{}  {}", "", label.bold(), value);
    }
}

trait Inspect {
    fn load(&self, path: &Path) -> Result<Vec<SliceOutcome>>;
    fn select(&self, outcomes: Vec<SliceOutcome>) -> Result<Vec<SliceOutcome>>;
    fn print_image(&self, image: &ParsedImage);
}

impl Inspect for Args {
    fn load(&self, path: &Path) -> Result<Vec<SliceOutcome>> {
        if self.permissive {
            return parse_file_permissive(path)
                .with_context(|| format!("failed to read `{}`", path.display()));
        }
        let set = parse_file(path).with_context(|| format!("failed to parse `{}`", path.display()))?;
        Ok(set
            .images
            .into_iter()
            .map(|image| SliceOutcome {
                arch: image.arch,
                result: Ok(image),
            })
            .collect())
    }

    fn select(&self, outcomes: Vec<SliceOutcome>) -> Result<Vec<SliceOutcome>> {
        if let Some(wanted) = &self.arch {
            let selected: Vec<_> = outcomes
                .into_iter()
                .filter(|o| slice_name(o).eq_ignore_ascii_case(wanted))
                .collect();
            if selected.is_empty() {
                bail!("no slice for architecture `{}`", wanted);
            }
            return Ok(selected);
        }

        if outcomes.len() < 2 || self.all || self.all_yes {
            return Ok(outcomes);
        }

        let mut options: Vec<String> = outcomes.iter().map(slice_name).collect();
        options.push(ALL_SLICES.to_string());
        let choice = Select::new("Which architecture?", options)
            .raw_prompt()
            .context("architecture selection was cancelled")?;
        if choice.index == outcomes.len() {
            return Ok(outcomes);
        }
        Ok(outcomes.into_iter().skip(choice.index).take(1).collect())
    }

    fn print_image(&self, image: &ParsedImage) {
        println!();
        match &image.arch {
            Some(arch) => println!(
                "{} at offset {:#x}, {:#x} bytes, align 2^{}",
                image.cpu_type.arch_name().red().bold(),
                arch.offset,
                arch.size,
                arch.align
            ),
            None => println!("{}", image.cpu_type.arch_name().red().bold()),
        }
        print_list(&image.header_fields(), 2);

        if self.header_only {
            return;
        }
        for (index, command) in image.commands.iter().enumerate() {
            println!();
            println!("  {} {:#x}", format!("#{}", index).cyan(), command.offset);
            print_list(&command.display_fields(), 4);
        }
    }
}
