use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkidx::{Article, Engine, EngineConfig, IndexWriter};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and maintain the entity index", long_about = None)]
struct Cli {
    /// JSON engine config; --index overrides its index_dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Index directory
    #[arg(long, global = true)]
    index: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index articles from JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Delete every indexed document first
        #[arg(long, default_value_t = false)]
        clear: bool,
        /// Commit after this many articles (0: only at the end)
        #[arg(long, default_value_t = 0)]
        commit_every: usize,
    },
    /// Rebuild and store the external id -> internal id map
    IdMap,
    /// Print index statistics
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(index) = cli.index {
        config.index_dir = index;
    }
    let engine = Engine::open(config).context("opening the index")?;

    match cli.command {
        Commands::Build { input, clear, commit_every } => build_index(&engine, &input, clear, commit_every)?,
        Commands::IdMap => {
            let map = engine.rebuild_id_map()?;
            println!("identifier map: {} entries -> {}", map.len(), engine.id_map().path().display());
        }
        Commands::Stats => print_stats(&engine)?,
    }
    engine.close();
    Ok(())
}

fn build_index(engine: &Engine, input: &Path, clear: bool, commit_every: usize) -> Result<()> {
    let mut writer = engine.writer().context("acquiring the index writer")?;
    if clear {
        writer.delete_all()?;
    }

    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input.display());
    }

    let mut ingest = Ingest { engine, writer: &mut writer, added: 0, commit_every };
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(&file, &mut ingest)?;
        } else {
            index_json(&file, &mut ingest)?;
        }
    }
    let added = ingest.added;
    let generation = writer.commit()?;
    drop(writer);
    tracing::info!(added, generation, "ingested articles");

    // internal ids moved: the old map is stale
    let map = engine.rebuild_id_map()?;
    tracing::info!(entries = map.len(), index = %engine.config().index_dir.display(), "index build complete");
    Ok(())
}

struct Ingest<'a> {
    engine: &'a Engine,
    writer: &'a mut IndexWriter,
    added: usize,
    commit_every: usize,
}

impl Ingest<'_> {
    fn add(&mut self, article: Article) -> Result<()> {
        self.engine.add_article(self.writer, &article).with_context(|| format!("indexing article {}", article.wid))?;
        self.added += 1;
        if self.commit_every > 0 && self.added % self.commit_every == 0 {
            self.writer.commit()?;
        }
        Ok(())
    }
}

fn index_jsonl(file: &Path, ingest: &mut Ingest) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let article: Article = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: not an article", file.display(), lineno + 1))?;
        ingest.add(article)?;
    }
    Ok(())
}

fn index_json(file: &Path, ingest: &mut Ingest) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let article: Article = serde_json::from_value(v)?;
                ingest.add(article)?;
            }
        }
        serde_json::Value::Object(_) => {
            let article: Article = serde_json::from_value(json)?;
            ingest.add(article)?;
        }
        _ => tracing::warn!(file = %file.display(), "skipping file: neither an article nor a list of articles"),
    }
    Ok(())
}

fn print_stats(engine: &Engine) -> Result<()> {
    let manifest = engine.store().manifest()?;
    let view = engine.searcher().view();
    println!("index:      {}", engine.config().index_dir.display());
    println!("generation: {}", manifest.generation);
    println!("committed:  {}", manifest.created_at);
    println!("segments:   {}", manifest.segments.len());
    println!("documents:  {}", view.num_docs());
    println!("analyzer:   stem={} stopwords={}", manifest.analyzer.stem, manifest.analyzer.stopwords);
    match engine.id_map().try_load()? {
        Some(map) => println!("id map:     {} entries", map.len()),
        None => println!("id map:     not built"),
    }
    Ok(())
}
