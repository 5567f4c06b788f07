//! casemix — French PMSI MCO grouper.
//!
//! Subcommands:
//!   classify   group, price and optionally dispense stay files
//!   dump       list loaded tables and indexes
//!   pack       convert stay files to the packed binary format
//!   show       look up diagnoses, procedures, GHM roots or GHS numbers

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use casemix_classifier::flags::{parse_flags, CLASSIFY_FLAG_OPTIONS, MONO};
use casemix_classifier::{
    classify_parallel, dispense, summarize, ClassifyResult, ClassifySettings, DispenseMode,
    Summary,
};
use casemix_core::{DiagnosisCode, GhmRootCode, GhsCode, ProcedureCode, Sector, SupplementKind};
use casemix_stays::{StaySetBuilder, StayTest};
use casemix_tables::{dump, AuthorizationSet, TableSet, TableSetBuilder};

#[derive(Parser)]
#[command(name = "casemix", version, about = "French PMSI MCO grouper — GHM/GHS classification and pricing")]
struct Cli {
    /// Show more details (cumulative).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Classify(ClassifyArgs),
    Dump(DumpArgs),
    Pack(PackArgs),
    Show(ShowArgs),
}

#[derive(Args)]
struct ClassifyArgs {
    /// Add a table directory (repeatable).
    #[arg(short = 'T', long = "table-dir")]
    table_dirs: Vec<PathBuf>,

    /// Authorization JSON file.
    #[arg(short = 'A', long = "auth-file")]
    auth_file: Option<PathBuf>,

    /// Classifier options, comma-separated (mono, ignore_confirm,
    /// ignore_proc_doc, ignore_proc_ext).
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,

    /// Run the dispensation algorithm (implies mono): e, ex, ex2, j, exj, exj2.
    #[arg(short = 'd', long = "dispense")]
    dispense: Option<DispenseMode>,

    /// Apply the sector GHS coefficient.
    #[arg(long)]
    coeff: bool,

    /// Tariff sector.
    #[arg(long, default_value = "public")]
    sector: String,

    /// Compare results against the expected values carried by GRP files.
    #[arg(long)]
    test: bool,

    /// Benchmark: run the classification loop N times.
    #[arg(long, value_name = "N")]
    torture: Option<u32>,

    /// Stay files (.dspak, .rss, .grp, .rsa, optionally .gz).
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct DumpArgs {
    #[arg(short = 'T', long = "table-dir")]
    table_dirs: Vec<PathBuf>,

    /// Dump the content of readable tables.
    #[arg(short = 'd', long)]
    dump: bool,

    /// Extra table files.
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct PackArgs {
    /// Destination file.
    #[arg(short = 'O', long = "output", required = true)]
    output: PathBuf,

    /// Stay files to convert.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct ShowArgs {
    #[arg(short = 'T', long = "table-dir")]
    table_dirs: Vec<PathBuf>,

    /// Use the tables valid on this date (default: most recent).
    #[arg(short = 'd', long)]
    date: Option<NaiveDate>,

    /// Diagnosis, procedure, GHM root or GHS numbers.
    #[arg(required = true)]
    names: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,casemix=debug".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify(args) => run_classify(args, cli.verbose),
        Command::Dump(args) => run_dump(args),
        Command::Pack(args) => run_pack(args),
        Command::Show(args) => run_show(args),
    }
}

// ── Table / authorization discovery ──────────────────────────────────────────

fn is_table_file(name: &str) -> bool {
    let stem = name.strip_suffix(".gz").unwrap_or(name);
    matches!(stem.rsplit('.').next(), Some("tab") | Some("json") | Some("dpri"))
}

fn load_table_set(table_dirs: &[PathBuf], extra_files: &[PathBuf]) -> anyhow::Result<TableSet> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in table_dirs {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading table directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && is_table_file(name) {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths.extend(extra_files.iter().cloned());
    if paths.is_empty() {
        bail!("no table specified or found");
    }

    let mut builder = TableSetBuilder::new();
    builder.load_files(&paths).context("loading tables")?;
    let set = builder.finish().context("indexing tables")?;
    if set.indexes.is_empty() {
        bail!("no usable table index (missing mandatory tables?)");
    }
    Ok(set)
}

fn load_authorizations(path: Option<&Path>) -> anyhow::Result<AuthorizationSet> {
    match path {
        Some(path) => AuthorizationSet::load(path)
            .with_context(|| format!("loading authorizations from {}", path.display())),
        None => {
            info!("no authorization file specified, supplements will not be counted");
            Ok(AuthorizationSet::default())
        }
    }
}

fn parse_sector(name: &str) -> anyhow::Result<Sector> {
    match name {
        "public" => Ok(Sector::Public),
        "private" => Ok(Sector::Private),
        _ => bail!("unknown sector '{name}' (expected public or private)"),
    }
}

// ── classify ─────────────────────────────────────────────────────────────────

fn run_classify(args: ClassifyArgs, verbosity: u8) -> anyhow::Result<()> {
    let mut flags = 0;
    for csv in &args.options {
        flags |= parse_flags(csv).map_err(|err| {
            let names: Vec<&str> = CLASSIFY_FLAG_OPTIONS.iter().map(|(n, _, _)| *n).collect();
            anyhow::anyhow!("{err} (known flags: {})", names.join(", "))
        })?;
    }
    if args.dispense.is_some() {
        flags |= MONO;
    }

    let settings = ClassifySettings {
        flags,
        sector: parse_sector(&args.sector)?,
        apply_coefficient: args.coeff,
    };

    let table_set = load_table_set(&args.table_dirs, &[])?;
    let authorizations = load_authorizations(args.auth_file.as_deref())?;

    let (stay_set, tests) = {
        let mut builder = StaySetBuilder::new();
        builder.load_files(&args.files, args.test).context("loading stays")?;
        builder.finish()
    };
    info!(stays = stay_set.stays.len(), "classify");

    let torture = args.torture.unwrap_or(0).max(1);
    let mut output = Default::default();
    let start_time = Instant::now();
    for _ in 0..torture {
        output = classify_parallel(&table_set, &authorizations, &stay_set.stays, &settings, None)
            .context("classification failed")?;
    }
    let elapsed = start_time.elapsed();

    let dues = args
        .dispense
        .map(|mode| dispense(&output.results, &output.mono_results, mode));

    let summary = summarize(&output.results);
    if verbosity >= 1 {
        println!("Results:");
        print_results(&output.results, &output.mono_results, verbosity);
    }
    println!("Summary:");
    print_summary(&summary);

    if let Some(dues) = dues {
        println!("Dispensation:");
        for due in &dues {
            println!(
                "  unit {}: {} € (GHS {} €, supplements {} €)",
                due.unit,
                cents(due.total_cents),
                cents(due.price_cents),
                cents(due.total_cents - due.price_cents),
            );
        }
        println!();
    }

    if args.test {
        println!("Tests:");
        print_tests(&output.results, &tests, verbosity);
    }

    println!("GHS coefficients have{} been applied!", if args.coeff { "" } else { " NOT" });

    if args.torture.is_some() {
        let per_second = summary.results_count as f64 * torture as f64 / elapsed.as_secs_f64();
        println!();
        println!("Performance ({torture} runs):");
        println!("  Results: {per_second:.0}/sec");
    }

    Ok(())
}

fn cents(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, (amount % 100).abs())
}

fn print_summary(summary: &Summary) {
    println!("  Results: {}", summary.results_count);
    println!("  Stays: {}", summary.stays_count);
    println!("  Failures: {}", summary.failures_count);
    println!();
    println!("  GHS-EXB+EXH: {} €", cents(summary.price_cents));
    println!("    GHS: {} €", cents(summary.ghs_cents));
    println!("  Supplements: {} €", cents(summary.total_cents - summary.price_cents));
    for kind in SupplementKind::ALL {
        println!(
            "    {}: {} € [{}]",
            kind,
            cents(summary.supplement_cents[kind]),
            summary.supplement_days[kind]
        );
    }
    println!("  Total: {} €", cents(summary.total_cents));
    println!();
}

fn print_results(results: &[ClassifyResult], mono_results: &[ClassifyResult], verbosity: u8) {
    let mut mono_offset = 0;
    for result in results {
        print_result(result, 0, verbosity);
        if !mono_results.is_empty() {
            if result.stays_len > 1 {
                for mono in &mono_results[mono_offset..mono_offset + result.stays_len] {
                    print_result(mono, 1, verbosity);
                }
            }
            mono_offset += result.stays_len;
        }
    }
    println!();
}

fn print_result(result: &ClassifyResult, depth: usize, verbosity: u8) {
    let pad = "  ".repeat(depth);
    println!(
        "  {}{} [{} -- {}] = GHM {} [{}] / GHS {}",
        pad,
        result.bill_id,
        result.duration,
        result.exit_date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()),
        result.ghm,
        result.main_error,
        result.ghs,
    );
    if verbosity >= 2 {
        println!("    {}GHS-EXB+EXH: {} € [{}]", pad, cents(result.price_cents), result.exb_exh);
        if result.total_cents > result.price_cents {
            println!(
                "    {}Supplements: {} €",
                pad,
                cents(result.total_cents - result.price_cents)
            );
        }
        println!("    {}Total: {} €", pad, cents(result.total_cents));
    }
}

fn print_tests(results: &[ClassifyResult], tests: &HashMap<i32, StayTest>, verbosity: u8) {
    let mut tested_clusters = 0usize;
    let mut failed_clusters = 0usize;
    let mut tested_ghm = 0usize;
    let mut failed_ghm = 0usize;
    let mut tested_ghs = 0usize;
    let mut failed_ghs = 0usize;

    for result in results {
        let Some(test) = tests.get(&result.bill_id) else { continue };

        if test.cluster_len > 0 {
            tested_clusters += 1;
            if result.stays_len != test.cluster_len as usize {
                failed_clusters += 1;
                if verbosity >= 1 {
                    println!(
                        "    {} has inadequate cluster {} != {}",
                        test.bill_id, result.stays_len, test.cluster_len
                    );
                }
            }
        }

        if test.ghm.is_valid() {
            tested_ghm += 1;
            if test.ghm != result.ghm || test.error != result.main_error {
                failed_ghm += 1;
                if verbosity >= 1 {
                    println!(
                        "    {} has inadequate GHM {} [{}] != {} [{}]",
                        test.bill_id, result.ghm, result.main_error, test.ghm, test.error
                    );
                }
            }
        }

        if test.ghs.is_valid() {
            tested_ghs += 1;
            if test.ghs != result.ghs {
                failed_ghs += 1;
                if verbosity >= 1 {
                    println!(
                        "    {} has inadequate GHS {} != {}",
                        test.bill_id, result.ghs, test.ghs
                    );
                }
            }
        }
    }

    println!(
        "    Failed cluster tests: {} / {} (missing {})",
        failed_clusters,
        tested_clusters,
        results.len() - tested_clusters
    );
    println!(
        "    Failed GHM tests: {} / {} (missing {})",
        failed_ghm,
        tested_ghm,
        results.len() - tested_ghm
    );
    println!(
        "    Failed GHS tests: {} / {} (missing {})",
        failed_ghs,
        tested_ghs,
        results.len() - tested_ghs
    );
    println!();
}

// ── dump ─────────────────────────────────────────────────────────────────────

fn run_dump(args: DumpArgs) -> anyhow::Result<()> {
    let table_set = load_table_set(&args.table_dirs, &args.files)?;
    let mut stdout = std::io::stdout().lock();
    dump::dump_headers(&table_set, &mut stdout)?;

    if args.dump {
        let index = table_set.find_index(None).context("no table index")?;
        println!("Diagnoses:");
        for diag in index.diagnoses.iter() {
            dump::dump_diagnosis(diag, &mut stdout)?;
        }
        println!("Procedures:");
        dump::dump_procedures(&index.procedures, &mut stdout)?;
        println!("GHM roots:");
        for root in index.ghm_roots.iter() {
            dump::dump_ghm_root(root, &mut stdout)?;
        }
        println!("GHS access:");
        dump::dump_ghs_access(&index.ghs, &mut stdout)?;
    }
    Ok(())
}

// ── pack ─────────────────────────────────────────────────────────────────────

fn run_pack(args: PackArgs) -> anyhow::Result<()> {
    let (stay_set, _) = {
        let mut builder = StaySetBuilder::new();
        builder.load_files(&args.files, false).context("loading stays")?;
        builder.finish()
    };
    info!(stays = stay_set.stays.len(), "packing stays");

    let mut file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    stay_set.save_pack(&mut file).context("writing pack")?;
    Ok(())
}

// ── show ─────────────────────────────────────────────────────────────────────

fn run_show(args: ShowArgs) -> anyhow::Result<()> {
    let table_set = load_table_set(&args.table_dirs, &[])?;
    let index = match args.date {
        Some(date) => table_set
            .find_index(Some(date))
            .with_context(|| format!("no table index available at {date}"))?,
        None => table_set.find_index(None).context("no table index")?,
    };

    let mut stdout = std::io::stdout().lock();
    for name in &args.names {
        if let Ok(diag) = name.parse::<DiagnosisCode>() {
            if let Some(info) = index.diagnosis(diag) {
                dump::dump_diagnosis(info, &mut stdout)?;
                continue;
            }
        }
        if let Ok(proc) = name.parse::<ProcedureCode>() {
            let procs = index.procedures(proc);
            if !procs.is_empty() {
                dump::dump_procedures(procs, &mut stdout)?;
                continue;
            }
        }
        if let Ok(root) = name.parse::<GhmRootCode>() {
            if let Some(info) = index.ghm_root(root) {
                dump::dump_ghm_root(info, &mut stdout)?;
                dump::dump_ghs_access(index.compatible_ghs(root), &mut stdout)?;
                continue;
            }
        }
        if let Ok(ghs) = name.parse::<GhsCode>() {
            let mut found = false;
            for sector in Sector::ALL {
                if let Some(price) = index.ghs_price(ghs, sector) {
                    println!("  {sector}:");
                    dump::dump_ghs_price(price, &mut stdout)?;
                    found = true;
                }
            }
            if found {
                continue;
            }
        }
        tracing::error!(name = %name, "unknown element");
    }
    Ok(())
}
