//! Interactive driver for the page cache and learn dispatcher.
//!
//! ```bash
//! varnam-pages --languages ml,hi --page-size 2 --seed words.txt
//! ```
//!
//! Commands: `page <lang> <offset>`, `learn <lang> <word>`,
//! `train <lang> <pattern> <word>`, `stats <lang>`, `exit`.

use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use crossterm::style::Stylize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use varnam_pages::core::codec::{CONTENT_ENCODING, CONTENT_TYPE};
use varnam_pages::{
    decode_page, spawn_trainer, DispatchError, Language, LearnDispatcher, LocalPeer, MemoryCorpus, PageCache,
    PageError, PeerPool, ServedPage, ServiceConfig,
};

#[derive(Parser, Debug)]
#[command(name = "varnam-pages")]
#[command(version)]
#[command(about = "Word corpus page cache simulator", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Language codes, used when no configuration file is given
    #[arg(long, default_value = "ml", value_delimiter = ',')]
    languages: Vec<String>,

    /// Words per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Seed file with one `<lang> <word>` pair per line
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig { languages: args.languages.clone(), ..Default::default() },
    };
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    init_logging(&config.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let _guard = runtime.enter();

    let corpus = Arc::new(MemoryCorpus::new(config.language_set()));
    if let Some(path) = &args.seed {
        let seeded = seed_corpus(&corpus, path)?;
        info!("Seeded {} words from {}", seeded, path.display());
    }

    // Configured peers run in-process so forwarding can be observed.
    let mut pool = PeerPool::local(config.node_id.as_str());
    for peer_id in &config.peers {
        let peer_cache = PageCache::from_config(Arc::clone(&corpus), &config)
            .with_peers(PeerPool::local(peer_id.as_str()));
        pool = pool.with_peer(Arc::new(LocalPeer::new(peer_id.as_str(), Arc::new(peer_cache))));
    }
    let cache = PageCache::from_config(Arc::clone(&corpus), &config).with_peers(pool);

    let (dispatcher, receivers) =
        LearnDispatcher::new(config.language_set(), config.learn_queue_capacity, config.learn_overflow);
    let consumers = receivers
        .into_values()
        .map(|receiver| spawn_trainer(receiver, Arc::clone(&corpus)))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Languages: {}", config.languages.join(", "));
    info!("Page size: {}", config.page_size);
    info!("Node: {} ({} peers)", config.node_id, config.peers.len());

    println!("{}", "Varnam page cache simulator. Type 'help' for commands.".bold());
    prompt()?;

    for line in stdin().lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            ["exit"] => break,
            ["page", lang, offset] => match offset.parse::<i64>() {
                Ok(offset) => {
                    if let Ok(key) = cache.page_key(lang, offset) {
                        info!(page = %key, owner = cache.owner_of(&key), "serving page");
                    }
                    print_page(runtime.block_on(cache.get(lang, offset)))
                }
                Err(_) => println!("{}", "offset must be an integer".red()),
            },
            ["learn", lang, word] => print_dispatch(dispatcher.submit(lang, *word)),
            ["train", lang, pattern, word] => print_dispatch(dispatcher.submit_training(lang, *pattern, *word)),
            ["stats", lang] => match cache.stats(lang) {
                Some(stats) => println!(
                    "{} entries, {} bytes, {} hits, {} misses, {} bypasses, {} evictions (hit rate {:.2})",
                    stats.entries,
                    stats.bytes,
                    stats.hits,
                    stats.misses,
                    stats.bypasses,
                    stats.evictions,
                    stats.hit_rate()
                ),
                None => println!("no pages requested for {} yet", lang),
            },
            [] => {}
            _ => print_help(),
        }
        prompt()?;
    }

    println!("\nWaiting for pending training...");
    drop(dispatcher);
    let applied = runtime.block_on(async {
        let mut applied = 0;
        for consumer in consumers {
            applied += consumer.await.unwrap_or(0);
        }
        applied
    });
    println!("{} training requests applied", applied);
    for language in config.language_set() {
        println!("{}: {} words", language, corpus.len(&language));
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn seed_corpus(corpus: &MemoryCorpus, path: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut seeded = 0;
    for line in reader.lines() {
        let line = line?;
        if let Some((lang, word)) = line.trim().split_once(char::is_whitespace) {
            if corpus.learn(&Language::new(lang), word.trim())? {
                seeded += 1;
            }
        }
    }
    Ok(seeded)
}

fn print_page(result: Result<ServedPage, PageError>) {
    match result {
        Ok(page) => {
            let source = if page.cached { "cached".green() } else { "bypass".yellow() };
            println!(
                "[{}] {} bytes, Content-Encoding: {}, Content-Type: {}",
                source,
                page.body.len(),
                CONTENT_ENCODING,
                CONTENT_TYPE
            );
            match decode_page(&page.body) {
                Ok(response) => {
                    println!("count: {}  at: {}", response.count, response.standard.at);
                    for word in response.words {
                        println!("  {:>6}  {} (confidence {})", word.id, word.word, word.confidence);
                    }
                }
                Err(e) => println!("{}", format!("undecodable page: {}", e).red()),
            }
        }
        Err(e) => println!("{}", format!("error: {}", e).red()),
    }
}

fn print_dispatch(result: Result<(), DispatchError>) {
    match result {
        Ok(()) => println!("{}", "success".green()),
        Err(e) => println!("{}", format!("error: {}", e).red()),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  page <lang> <offset>");
    println!("  learn <lang> <word>");
    println!("  train <lang> <pattern> <word>");
    println!("  stats <lang>");
    println!("  exit");
}

fn prompt() -> std::io::Result<()> {
    print!("\n> ");
    stdout().flush()
}
