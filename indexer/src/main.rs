use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use termweight_core::{annotate_record, CorpusIndex, CorpusReader, EngineConfig, LocalFrequencies, SledStore};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One document as delivered by the linguistic annotator.
#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    /// Lemmatized text, indexed in phase A.
    text: String,
    #[serde(default)]
    lemma_frequencies: HashMap<String, u32>,
    #[serde(default)]
    total_tokens: u64,
    /// Pre-built feature record the ranked terms are added to.
    #[serde(default)]
    record: Option<Map<String, Value>>,
}

#[derive(Parser)]
#[command(name = "termweight")]
#[command(about = "Index annotated documents and attach ranked corpus terms to their feature records", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, global = true, default_value = "./index")]
    index: PathBuf,
    /// JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Abort on the first failed document
    #[arg(long, global = true, default_value_t = false)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase A: add or replace the term vector of every input document
    Index {
        /// Input path (JSON/JSONL file or directory)
        #[arg(long)]
        input: PathBuf,
    },
    /// Phase B: emit feature records with ranked terms as JSONL
    Rank {
        #[arg(long)]
        input: PathBuf,
        /// Output file, stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Number of ranked terms per document
        #[arg(long)]
        max_terms: Option<usize>,
    },
    /// Dump indexed terms or documents as JSON lines
    Dump {
        #[arg(value_enum, default_value_t = DumpKind::Terms)]
        what: DumpKind,
    },
    /// Print document count and vocabulary size
    Stats,
    /// Remove every document from the index
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpKind {
    Terms,
    Docs,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    config.strict |= cli.strict;
    if let Commands::Rank { max_terms: Some(k), .. } = &cli.command {
        config.max_terms = *k;
    }
    config.validate()?;

    let index = CorpusIndex::open(&cli.index, &config)?;
    let stdout = io::stdout();

    match cli.command {
        Commands::Index { input } => {
            let docs = load_documents(&input)?;
            index_documents(&index, &docs, &config)?;
        }
        Commands::Rank { input, output, .. } => {
            let docs = load_documents(&input)?;
            match output {
                Some(path) => {
                    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                    rank_documents(&index, docs, &config, BufWriter::new(file))?;
                }
                None => rank_documents(&index, docs, &config, stdout.lock())?,
            }
        }
        Commands::Dump { what } => dump_index(&index, what, stdout.lock())?,
        Commands::Stats => print_stats(&index, stdout.lock())?,
        Commands::Reset => {
            index.reset()?;
            tracing::info!(index = %cli.index.display(), "index reset");
        }
    }
    Ok(())
}

fn load_documents(input: &Path) -> Result<Vec<InputDoc>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else {
        files.push(input.to_path_buf());
    }

    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    tracing::info!(input = %input.display(), documents = docs.len(), "loaded annotated documents");
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        docs.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<InputDoc>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let json: Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "ignoring JSON input that is neither object nor array"),
    }
    Ok(())
}

/// Phase A. A failed document is logged and skipped unless strict.
fn index_documents(index: &CorpusIndex<SledStore>, docs: &[InputDoc], config: &EngineConfig) -> Result<usize> {
    let mut indexed = 0;
    for doc in docs {
        match index.add_or_replace(&doc.id, &doc.text) {
            Ok(_) => indexed += 1,
            Err(e) if !config.strict => tracing::warn!(doc_id = doc.id.as_str(), error = %e, "skipping document"),
            Err(e) => return Err(e).with_context(|| format!("indexing {}", doc.id)),
        }
    }
    tracing::info!(indexed, skipped = docs.len() - indexed, "phase A complete");
    Ok(indexed)
}

/// Phase B. Every input document produces one output record.
fn rank_documents<W: Write>(index: &CorpusIndex<SledStore>, docs: Vec<InputDoc>, config: &EngineConfig, mut out: W) -> Result<()> {
    let snapshot = index.open_for_reading()?;
    let mut annotated = 0;
    let total = docs.len();
    for doc in docs {
        let mut record = doc.record.unwrap_or_default();
        record.entry("documentId").or_insert_with(|| Value::String(doc.id.clone()));
        let local = LocalFrequencies::new(doc.lemma_frequencies, doc.total_tokens);
        if annotate_record(&mut record, &doc.id, &local, &snapshot, config)?.is_some() {
            annotated += 1;
        }
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    tracing::info!(documents = total, annotated, "phase B complete");
    Ok(())
}

fn dump_index<W: Write>(index: &CorpusIndex<SledStore>, what: DumpKind, mut out: W) -> Result<()> {
    let snapshot = index.open_for_reading()?;
    match what {
        DumpKind::Terms => {
            for (term, df) in snapshot.terms() {
                writeln!(out, "{}", json!({ "term": term, "document_frequency": df }))?;
            }
        }
        DumpKind::Docs => {
            for (doc_id, terms) in snapshot.documents() {
                writeln!(out, "{}", json!({ "document_id": doc_id, "terms": terms }))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn print_stats<W: Write>(index: &CorpusIndex<SledStore>, mut out: W) -> Result<()> {
    let snapshot = index.open_for_reading()?;
    let generated_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    let stats = json!({
        "documents": snapshot.document_count()?,
        "vocabulary": snapshot.vocabulary_size(),
        "generated_at": generated_at,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use termweight_core::{RetryPolicy, TOP_TERMS_ATTRIBUTE};

    fn test_config() -> EngineConfig {
        EngineConfig { retry: RetryPolicy { max_attempts: 5, base_delay_ms: 1, factor: 4 }, ..EngineConfig::default() }
    }

    fn write_corpus(dir: &Path) {
        let mut lines = Vec::new();
        for i in 0..10 {
            let mut text = String::from("Ritter Burg");
            if i < 4 {
                text.push_str(" Drache");
            }
            let doc = json!({
                "id": format!("buch-{i}"),
                "text": text,
                "lemma_frequencies": { "ritter": 1, "burg": 1, "drache": 3 },
                "total_tokens": 9,
                "record": { "class": "fantasy" },
            });
            lines.push(doc.to_string());
        }
        fs::write(dir.join("part-1.jsonl"), lines[..5].join("\n")).unwrap();
        let rest: Vec<Value> = lines[5..].iter().map(|l| serde_json::from_str(l).unwrap()).collect();
        fs::write(dir.join("part-2.json"), Value::Array(rest).to_string()).unwrap();
    }

    #[test]
    fn loads_json_and_jsonl_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 10);
        assert_eq!(docs[0].id, "buch-0");
        assert_eq!(docs[9].total_tokens, 9);
    }

    #[test]
    fn rejects_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"id\": \"a\"}\n").unwrap();
        let err = load_documents(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:1"));
    }

    #[test]
    fn two_phases_produce_annotated_records() {
        let input = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_corpus(input.path());
        let config = test_config();
        let index = CorpusIndex::open(index_dir.path(), &config).unwrap();

        let docs = load_documents(input.path()).unwrap();
        assert_eq!(index_documents(&index, &docs, &config).unwrap(), 10);

        let mut out = Vec::new();
        rank_documents(&index, docs, &config, &mut out).unwrap();
        let records: Vec<Value> = String::from_utf8(out).unwrap().lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(records.len(), 10);

        let first = &records[0];
        assert_eq!(first["documentId"], "buch-0");
        assert_eq!(first["class"], "fantasy");
        let ranked = first[TOP_TERMS_ATTRIBUTE].as_str().unwrap();
        let lines: Vec<&str> = ranked.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("[0] drache - "));

        // buch-9 never mentions the dragon; everything else is too common.
        let last = records[9][TOP_TERMS_ATTRIBUTE].as_str().unwrap();
        assert_eq!(last.lines().count(), 1);
    }

    #[test]
    fn dump_lists_terms_with_document_frequency() {
        let input = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_corpus(input.path());
        let config = test_config();
        let index = CorpusIndex::open(index_dir.path(), &config).unwrap();
        index_documents(&index, &load_documents(input.path()).unwrap(), &config).unwrap();

        let mut out = Vec::new();
        dump_index(&index, DumpKind::Terms, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"{"document_frequency":4,"term":"drache"}"#));

        let mut out = Vec::new();
        print_stats(&index, &mut out).unwrap();
        let stats: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(stats["documents"], 10);
        assert_eq!(stats["vocabulary"], 3);
    }
}
