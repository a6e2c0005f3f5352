//! Command-line tools for slide-record synchronization.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use decksync_core::layout::LayoutKind;
use decksync_core::locator::resolve_path;
use decksync_core::patch::{
    read_patch_file, write_patch_file, ApplyOptions, BoxOptions, ExportOptions,
};
use decksync_core::record::{
    dedupe_records, merge_records, read_records, set_style_group, write_records,
};
use decksync_core::sync::{Pipeline, PipelineOptions};
use decksync_core::validate::{validate_records, ValidateOptions};
use decksync_core::DeckLoader;
use decksync_deckjson::{save_deck, JsonDeckLoader, JsonRenderer};
use std::path::{Path, PathBuf};

/// Keep a CSV slide index, a YAML edit file, and rendered decks in sync.
#[derive(Parser, Debug)]
#[command(name = "decksync")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index deck snapshots into a CSV of slide records
    Index {
        /// Input deck snapshot(s) (.json)
        #[arg(required = true)]
        decks: Vec<PathBuf>,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge CSV batches into one file
    Merge {
        /// Input CSV file(s), concatenated in argument order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Sort the merged rows by this column
        #[arg(long)]
        sort_by: Option<String>,
    },

    /// Drop rows whose content_hash duplicates an earlier row
    Dedupe {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long, conflicts_with = "inplace")]
        output: Option<PathBuf>,

        /// Rewrite the input file in place
        #[arg(long)]
        inplace: bool,
    },

    /// Rewrite the style_group column
    SetStyleGroup {
        /// Input CSV file
        input: PathBuf,

        /// New style group value
        style_group: String,

        /// Only touch rows from this source document
        #[arg(long)]
        source: Option<String>,

        /// Output CSV path
        #[arg(short, long, conflicts_with = "inplace")]
        output: Option<PathBuf>,

        /// Rewrite the input file in place
        #[arg(long)]
        inplace: bool,
    },

    /// Validate a CSV of slide records
    Validate {
        /// Input CSV file
        input: PathBuf,

        /// Resolve each source document on disk
        #[arg(long)]
        check_sources: bool,

        /// Recompute content hashes against the live sources
        #[arg(long)]
        verify_hashes: bool,

        /// Treat warnings as errors and ambiguous paths as fatal
        #[arg(long)]
        strict: bool,
    },

    /// Export a deck's text to a YAML edit file
    Export {
        /// Input deck snapshot (.json)
        deck: PathBuf,

        /// Output YAML path
        #[arg(short, long)]
        output: PathBuf,

        /// Include speaker notes as an editable box per slide
        #[arg(short, long)]
        notes: bool,

        /// Include subtitle placeholders
        #[arg(long)]
        include_subtitle: bool,

        /// Include footer placeholders
        #[arg(long)]
        include_footer: bool,
    },

    /// Apply a YAML edit file back onto its deck
    Apply {
        /// Input YAML edit file
        patches: PathBuf,

        /// Deck snapshot to apply onto (defaults to resolving the edit
        /// file's source_document next to it)
        #[arg(long)]
        deck: Option<PathBuf>,

        /// Output deck path
        #[arg(short, long, conflicts_with = "inplace")]
        output: Option<PathBuf>,

        /// Rewrite the deck snapshot in place
        #[arg(long)]
        inplace: bool,

        /// Apply edits even when recorded fingerprints mismatch
        #[arg(long)]
        force: bool,

        /// Include subtitle placeholders when locating boxes
        #[arg(long)]
        include_subtitle: bool,

        /// Include footer placeholders when locating boxes
        #[arg(long)]
        include_footer: bool,
    },

    /// Rebuild an output deck from a CSV of slide records
    Rebuild {
        /// Input CSV file
        input: PathBuf,

        /// Template deck snapshot providing the layout inventory
        #[arg(short, long)]
        template: PathBuf,

        /// Output deck path
        #[arg(short, long)]
        output: PathBuf,

        /// Strict mode: no layout fallback, overflow truncates
        #[arg(long)]
        strict: bool,

        /// Default style group for layout fallback
        #[arg(long, requires = "fallback_layout")]
        fallback_style_group: Option<String>,

        /// Default layout kind for layout fallback
        #[arg(long, requires = "fallback_style_group")]
        fallback_layout: Option<LayoutKind>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match args.command {
        Command::Index { decks, output } => run_index(&decks, &output),
        Command::Merge {
            inputs,
            output,
            sort_by,
        } => run_merge(&inputs, &output, sort_by.as_deref()),
        Command::Dedupe {
            input,
            output,
            inplace,
        } => run_dedupe(&input, output.as_deref(), inplace),
        Command::SetStyleGroup {
            input,
            style_group,
            source,
            output,
            inplace,
        } => run_set_style_group(
            &input,
            &style_group,
            source.as_deref(),
            output.as_deref(),
            inplace,
        ),
        Command::Validate {
            input,
            check_sources,
            verify_hashes,
            strict,
        } => run_validate(&input, check_sources, verify_hashes, strict),
        Command::Export {
            deck,
            output,
            notes,
            include_subtitle,
            include_footer,
        } => run_export(&deck, &output, notes, include_subtitle, include_footer),
        Command::Apply {
            patches,
            deck,
            output,
            inplace,
            force,
            include_subtitle,
            include_footer,
        } => run_apply(
            &patches,
            deck.as_deref(),
            output.as_deref(),
            inplace,
            force,
            include_subtitle,
            include_footer,
        ),
        Command::Rebuild {
            input,
            template,
            output,
            strict,
            fallback_style_group,
            fallback_layout,
        } => run_rebuild(
            &input,
            &template,
            &output,
            strict,
            fallback_style_group.zip(fallback_layout),
        ),
    }
}

/// Pick where a rewriting command writes. Rewriting the input without an
/// explicit `--inplace` is refused.
fn output_target<'a>(input: &'a Path, output: Option<&'a Path>, inplace: bool) -> Result<&'a Path> {
    match output {
        Some(path) => Ok(path),
        None if inplace => Ok(input),
        None => bail!("refusing to rewrite {} in place; pass --inplace or --output", input.display()),
    }
}

fn run_index(decks: &[PathBuf], output: &Path) -> Result<()> {
    let loader = JsonDeckLoader;
    let mut rows = Vec::new();
    for path in decks {
        let deck = loader
            .load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let indexed = decksync_core::index_deck(&deck);
        log::info!("indexed {} slides from {}", indexed.len(), deck.name);
        rows.extend(indexed);
    }
    write_records(output, &rows)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Indexed {} slides into {}", rows.len(), output.display());
    Ok(())
}

fn run_merge(inputs: &[PathBuf], output: &Path, sort_by: Option<&str>) -> Result<()> {
    let mut batches = Vec::new();
    for path in inputs {
        let rows = read_records(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        batches.push(rows);
    }
    let merged = merge_records(batches, sort_by)?;
    write_records(output, &merged)?;
    println!("Merged {} rows into {}", merged.len(), output.display());
    Ok(())
}

fn run_dedupe(input: &Path, output: Option<&Path>, inplace: bool) -> Result<()> {
    let target = output_target(input, output, inplace)?;
    let rows = read_records(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let (kept, removed) = dedupe_records(rows);
    write_records(target, &kept)?;
    println!(
        "Removed {} duplicate rows, kept {} in {}",
        removed,
        kept.len(),
        target.display()
    );
    Ok(())
}

fn run_set_style_group(
    input: &Path,
    style_group: &str,
    source: Option<&str>,
    output: Option<&Path>,
    inplace: bool,
) -> Result<()> {
    let target = output_target(input, output, inplace)?;
    let mut rows = read_records(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let changed = set_style_group(&mut rows, style_group, source);
    write_records(target, &rows)?;
    println!("Changed style_group on {} rows in {}", changed, target.display());
    Ok(())
}

fn run_validate(input: &Path, check_sources: bool, verify_hashes: bool, strict: bool) -> Result<()> {
    let rows = read_records(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let options = ValidateOptions {
        check_sources,
        verify_hashes,
        strict,
        anchor_dir: input.parent().map(|p| p.to_path_buf()),
    };
    let loader = JsonDeckLoader;
    let report = validate_records(&rows, &options, Some(&loader));
    for line in report.formatted_lines() {
        eprintln!("{}", line);
    }
    if !report.is_ok() {
        bail!(
            "{} rows checked: {} error(s), {} warning(s)",
            rows.len(),
            report.errors.len(),
            report.warnings.len()
        );
    }
    println!(
        "{} rows checked: OK ({} warning(s))",
        rows.len(),
        report.warnings.len()
    );
    Ok(())
}

fn run_export(
    deck_path: &Path,
    output: &Path,
    notes: bool,
    include_subtitle: bool,
    include_footer: bool,
) -> Result<()> {
    let deck = JsonDeckLoader
        .load(deck_path)
        .with_context(|| format!("Failed to load {}", deck_path.display()))?;
    let options = ExportOptions {
        include_notes: notes,
        boxes: BoxOptions {
            include_subtitle,
            include_footer,
        },
    };
    let (patch, fallback_slides) = decksync_core::export_patches(&deck, options);
    for index in &fallback_slides {
        log::warn!("slide {}: no placeholders, matched text boxes by shape", index);
    }
    write_patch_file(output, &patch)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Exported {} text boxes across {} slides to {}",
        patch.box_count(),
        patch.patches.len(),
        output.display()
    );
    Ok(())
}

fn run_apply(
    patch_path: &Path,
    deck_path: Option<&Path>,
    output: Option<&Path>,
    inplace: bool,
    force: bool,
    include_subtitle: bool,
    include_footer: bool,
) -> Result<()> {
    if output.is_none() && !inplace {
        bail!("refusing to rewrite the deck in place; pass --inplace or --output");
    }
    let patch = read_patch_file(patch_path)
        .with_context(|| format!("Failed to read {}", patch_path.display()))?;

    let deck_path = match deck_path {
        Some(path) => path.to_path_buf(),
        None => {
            let (resolved, warnings) = resolve_path(
                Path::new(&patch.source_document),
                patch_path.parent(),
                false,
            )
            .with_context(|| format!("Failed to locate {}", patch.source_document))?;
            for warning in warnings {
                log::warn!("{}", warning);
            }
            resolved
        }
    };
    let mut deck = JsonDeckLoader
        .load(&deck_path)
        .with_context(|| format!("Failed to load {}", deck_path.display()))?;

    let options = ApplyOptions {
        force,
        boxes: BoxOptions {
            include_subtitle,
            include_footer,
        },
        ..Default::default()
    };
    let report = decksync_core::apply_patches(&mut deck, &patch, &options)?;
    for entry in &report.entries {
        if let Some(detail) = &entry.detail {
            eprintln!(
                "slide {} box {}: {}",
                entry.slide_index, entry.box_id, detail
            );
        }
    }

    // In-place with nothing actually changed leaves the file untouched.
    let target = output.unwrap_or(&deck_path);
    if output.is_some() || report.summary.updated > report.summary.unchanged {
        save_deck(target, &deck)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }
    println!("{}", report.summary);
    Ok(())
}

fn run_rebuild(
    input: &Path,
    template: &Path,
    output: &Path,
    strict: bool,
    fallback: Option<(String, LayoutKind)>,
) -> Result<()> {
    let loader = JsonDeckLoader;
    let options = PipelineOptions {
        strict,
        fallback_layout: fallback,
        anchor_dir: input.parent().map(|p| p.to_path_buf()),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(&loader, options);
    let mut renderer = JsonRenderer::new(output);
    let summary = pipeline
        .run(input, template, &mut renderer)
        .with_context(|| format!("Rebuild from {} failed", input.display()))?;

    for warning in &summary.warnings {
        eprintln!("WARNING: {}", warning);
    }
    for error in &summary.errors {
        eprintln!("ERROR: {}", error);
    }
    println!("{} -> {}", summary, output.display());
    if !summary.errors.is_empty() {
        bail!("{} rows failed to render", summary.errors.len());
    }
    Ok(())
}
