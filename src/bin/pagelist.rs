//! Command line tool for creating, inspecting and exercising a reuse list.
#![forbid(unsafe_code)]

#[path = "pagelist/config.rs"]
mod config;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use pagelist::{
    primitives::pager::PagerStats, reuse_list, CacheLimit, FreeListOptions, FreeListStats,
    GroupId, PageFlag, PageId, PageStore, Pager, PagerOptions, ReuseBag, ReuseList,
    ReuseListImpl, INDEX_PARTITION,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "pagelist",
    version,
    about = "Inspect and exercise page reuse lists",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "PAGELIST_CONFIG",
        value_name = "FILE",
        help = "Config file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, help = "Page size (bytes) override")]
    page_size: Option<u32>,

    #[arg(long, global = true, help = "Page group override")]
    group: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create an empty reuse list in a store directory")]
    Init {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    #[command(about = "Allocate fresh pages and park them in the reuse list")]
    Recycle {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[arg(long, default_value_t = 1, help = "Number of pages to recycle")]
        count: usize,
    },

    #[command(about = "Take pages out of the reuse list")]
    Take {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[arg(long, default_value_t = 1, help = "Number of pages to take")]
        count: usize,
    },

    #[command(about = "Print list and store statistics")]
    Stats {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    #[command(about = "Run concurrent put/take traffic and check page conservation")]
    Stress {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[arg(long, default_value_t = 4)]
        threads: usize,

        #[arg(long, default_value_t = 1000, help = "Operations per thread")]
        ops: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

struct Settings {
    pager: PagerOptions,
    list: FreeListOptions,
}

fn build_settings(cli: &Cli, config: &CliConfig) -> Settings {
    let mut pager = PagerOptions::default();
    if let Some(page_size) = cli.page_size.or(config.store().page_size) {
        pager.page_size = page_size;
    }
    if let Some(verify) = config.store().verify_checksums {
        pager.verify_checksums = verify;
    }

    let section = config.list();
    let group = GroupId(cli.group.or(section.group).unwrap_or(1));
    let mut list = FreeListOptions::named(
        section.name.clone().unwrap_or_else(|| "reuse".to_string()),
        group,
    );
    if let Some(cache) = section.cache_pages_per_bucket {
        list.cache_pages_per_bucket = cache;
    }
    if let Some(pages) = section.cache_limit_pages {
        list.cache_limit = Some(Arc::new(CacheLimit::new(pages)));
    }
    if let Some(max) = section.max_stripes_per_bucket {
        list.max_stripes_per_bucket = max;
    }
    if let Some(threshold) = section.stripe_contention_threshold {
        list.stripe_contention_threshold = threshold;
    }
    Settings { pager, list }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("PAGELIST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    let settings = build_settings(&cli, &config);
    debug!(config = ?config.path(), page_size = settings.pager.page_size, "cli.settings");

    match &cli.command {
        Command::Init { dir } => {
            let (pager, list) = open_list(dir, &settings, true)?;
            pager.checkpoint()?;
            let report = InitReport {
                dir: dir.clone(),
                page_size: pager.page_size(),
                meta_page: list.meta_page_id(),
            };
            emit(&cli.format, &report, |_| print_init_text(&report))?;
        }
        Command::Recycle { dir, count } => {
            let (pager, list) = open_list(dir, &settings, false)?;
            let mut bag = ReuseBag::new();
            for _ in 0..*count {
                bag.add_free_page(list.allocate_page_no_reuse()?);
            }
            let pages: Vec<PageId> = bag.iter().copied().collect();
            list.add_for_recycle(&mut bag)?;
            pager.checkpoint()?;
            let report = PagesReport {
                pages,
                recycled_pages: list.recycled_pages_count(),
            };
            emit(&cli.format, &report, |_| print_pages_text("recycled", &report))?;
        }
        Command::Take { dir, count } => {
            let (pager, list) = open_list(dir, &settings, false)?;
            let mut pages = Vec::with_capacity(*count);
            for _ in 0..*count {
                match list.take_recycled_page()? {
                    Some(page) => pages.push(page),
                    None => break,
                }
            }
            pager.checkpoint()?;
            let report = PagesReport {
                pages,
                recycled_pages: list.recycled_pages_count(),
            };
            emit(&cli.format, &report, |_| print_pages_text("taken", &report))?;
        }
        Command::Stats { dir } => {
            let (pager, list) = open_list(dir, &settings, false)?;
            let report = StatsReport {
                list: list.stats(),
                pager: pager.stats(),
            };
            emit(&cli.format, &report, |_| print_stats_text(&report))?;
        }
        Command::Stress {
            dir,
            threads,
            ops,
            seed,
        } => {
            let (pager, list) = open_list(dir, &settings, false)?;
            let report = run_stress(&list, *threads, *ops, *seed)?;
            pager.checkpoint()?;
            emit(&cli.format, &report, |_| print_stress_text(&report))?;
            if !report.conserved {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn meta_page_id() -> PageId {
    PageId::new(INDEX_PARTITION, PageFlag::Index, 0)
}

fn open_list(
    dir: &Path,
    settings: &Settings,
    create: bool,
) -> Result<(Arc<Pager>, Arc<ReuseListImpl<Pager>>), Box<dyn Error>> {
    let pager = Arc::new(Pager::open(dir, settings.pager.clone())?);
    let group = settings.list.group;
    let existing = pager.partition_len(group, INDEX_PARTITION)?;
    let meta = meta_page_id();
    if create {
        if existing != 0 {
            return Err(format!("{} already holds a reuse list", dir.display()).into());
        }
        let allocated = pager.allocate_page(group, INDEX_PARTITION, PageFlag::Index)?;
        debug_assert_eq!(allocated, meta);
    } else if existing == 0 {
        let message = format!(
            "{} holds no reuse list; run `pagelist init` first",
            dir.display()
        );
        return Err(message.into());
    }
    let list = Arc::new(reuse_list(
        Arc::clone(&pager),
        settings.list.clone(),
        meta,
        create,
    )?);
    list.register_with_checkpointer();
    info!(dir = %dir.display(), pages = list.recycled_pages_count(), "cli.open_list");
    Ok((pager, list))
}

#[derive(Serialize)]
struct InitReport {
    dir: PathBuf,
    page_size: u32,
    meta_page: PageId,
}

#[derive(Serialize)]
struct PagesReport {
    pages: Vec<PageId>,
    recycled_pages: u64,
}

#[derive(Serialize)]
struct StatsReport {
    list: FreeListStats,
    pager: PagerStats,
}

#[derive(Serialize)]
struct StressReport {
    threads: usize,
    ops_per_thread: usize,
    puts: u64,
    takes: u64,
    allocations: u64,
    recycled_before: u64,
    recycled_after: u64,
    conserved: bool,
}

#[derive(Default)]
struct WorkerTally {
    puts: u64,
    takes: u64,
    allocations: u64,
}

fn run_stress(
    list: &ReuseListImpl<Pager>,
    threads: usize,
    ops: usize,
    seed: u64,
) -> Result<StressReport, Box<dyn Error>> {
    let recycled_before = list.recycled_pages_count();
    let tallies = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads.max(1))
            .map(|worker| {
                scope.spawn(move || -> pagelist::Result<WorkerTally> {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker as u64));
                    let mut owned: Vec<PageId> = Vec::new();
                    let mut tally = WorkerTally::default();
                    for _ in 0..ops {
                        if !owned.is_empty() && rng.gen_bool(0.5) {
                            let idx = rng.gen_range(0..owned.len());
                            let page = owned.swap_remove(idx);
                            list.add_for_recycle(&mut ReuseBag::with_pages([page]))?;
                            tally.puts += 1;
                        } else if let Some(page) = list.take_recycled_page()? {
                            owned.push(page);
                            tally.takes += 1;
                        } else {
                            owned.push(list.allocate_page_no_reuse()?);
                            tally.allocations += 1;
                        }
                    }
                    Ok(tally)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(pagelist::PageListError::Invalid("stress worker panicked"))
                })
            })
            .collect::<pagelist::Result<Vec<_>>>()
    })?;

    let puts: u64 = tallies.iter().map(|t| t.puts).sum();
    let takes: u64 = tallies.iter().map(|t| t.takes).sum();
    let allocations: u64 = tallies.iter().map(|t| t.allocations).sum();
    let recycled_after = list.recycled_pages_count();
    Ok(StressReport {
        threads: threads.max(1),
        ops_per_thread: ops,
        puts,
        takes,
        allocations,
        recycled_before,
        recycled_after,
        conserved: recycled_before + puts == recycled_after + takes,
    })
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_init_text(report: &InitReport) {
    println!(
        "initialized reuse list in {} (page_size={} meta_page={})",
        report.dir.display(),
        report.page_size,
        report.meta_page
    );
}

fn print_pages_text(verb: &str, report: &PagesReport) {
    println!("{verb} {} page(s)", report.pages.len());
    for page in &report.pages {
        println!("  {page}");
    }
    println!("recycled_pages={}", report.recycled_pages);
}

fn print_stats_text(report: &StatsReport) {
    print!("{}", report.list);
    println!("Pager:");
    println!("  {}", report.pager);
}

fn print_stress_text(report: &StressReport) {
    println!(
        "threads={} ops_per_thread={} puts={} takes={} allocations={}",
        report.threads, report.ops_per_thread, report.puts, report.takes, report.allocations
    );
    println!(
        "recycled_before={} recycled_after={} conserved={}",
        report.recycled_before, report.recycled_after, report.conserved
    );
}
