use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use walkdir::WalkDir;

use docqa_core::config::{FailureMode, Settings};
use docqa_core::loader::LoaderRegistry;
use docqa_core::traits::Embedder;
use docqa_core::types::{IngestRequest, Metadata};
use docqa_llm::OpenAiGenerator;
use docqa_pipeline::RagContext;

struct App {
    rag: RagContext,
    generator: Arc<OpenAiGenerator>,
}

async fn build(mut settings: Settings) -> Result<App> {
    if settings.generation.api_key.is_none() {
        settings.generation.api_key = std::env::var("OPENAI_API_KEY").ok();
    }
    let embedder = docqa_embed::from_settings(&settings.embedding, settings.index.dimension)?;
    let index = docqa_vector::from_settings(&settings.index).await?;
    let generator = Arc::new(OpenAiGenerator::from_settings(&settings.generation));
    let rag = RagContext::new(settings, LoaderRegistry::with_defaults(), embedder, index, generator.clone())?;
    Ok(App { rag, generator })
}

/// Files under `root` that some extractor accepts, judged the same way
/// ingestion will resolve them: the `--mime` hint first, then the extension.
fn collect_files(root: &Path, loaders: &LoaderRegistry, mime: Option<&str>) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| loaders.resolve(p, mime).is_ok())
        .collect();
    files.sort();
    files
}

pub async fn ingest(settings: Settings, path: &Path, mime: Option<String>, meta: Vec<(String, Value)>) -> Result<()> {
    let app = build(settings).await?;
    let pipeline = app.rag.ingestion();
    let files = collect_files(path, pipeline.loaders(), mime.as_deref());
    if files.is_empty() {
        println!("No supported documents under {}", path.display());
        return Ok(());
    }
    let metadata: Metadata = meta.into_iter().collect();

    println!("Ingesting {} document(s) into '{}'", files.len(), app.rag.index_spec().name);
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );

    let mut chunks = 0usize;
    let mut failed = 0usize;
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        let mut request = IngestRequest::new(file).with_metadata(metadata.clone());
        if let Some(m) = &mime {
            request = request.with_mime(m.clone());
        }
        match pipeline.ingest(request).await {
            Ok(result) => {
                chunks += result.chunk_count;
                pb.println(format!("  {} -> {} chunk(s)", file.display(), result.chunk_count));
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("❌ {}: {e}", file.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("📊 Indexed {chunks} chunk(s) from {} document(s)", files.len() - failed);
    if failed > 0 {
        bail!("{failed} document(s) failed to ingest");
    }
    Ok(())
}

pub async fn query(settings: Settings, question: &str, k: Option<usize>, strict: bool, json: bool) -> Result<()> {
    let app = build(settings).await?;
    let mut pipeline = app.rag.retrieval();
    if strict {
        pipeline = pipeline.with_failure_mode(FailureMode::Strict);
    }
    let result = pipeline.answer(question, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("{}\n", result.answer);
    if result.sources.is_empty() {
        return Ok(());
    }
    println!("Sources:");
    for (i, m) in result.sources.iter().enumerate() {
        let source = m.metadata.get("source").and_then(Value::as_str).unwrap_or("?");
        let page = m.metadata.get("page").and_then(Value::as_u64).map(|p| format!(" p.{p}")).unwrap_or_default();
        let preview: String = m.text.chars().take(120).collect::<String>().replace('\n', " ");
        println!("{:>2}. [{:.3}] {source}{page}\n    {preview}", i + 1, m.score);
    }
    Ok(())
}

pub async fn index_info(settings: Settings) -> Result<()> {
    let app = build(settings).await?;
    app.rag.prepare().await?;
    let d = app.rag.describe_index().await?;
    println!("Index details:");
    println!("Name: {}", d.name);
    println!("Dimension: {}", d.dimension);
    println!("Metric: {}", d.metric);
    println!("Records: {}", d.count);
    Ok(())
}

pub async fn check(settings: Settings) -> Result<()> {
    let app = build(settings).await?;
    let mut failures = 0;

    println!("Testing embedder...");
    match app.rag.embedder().embed_query("connection test").await {
        Ok(v) => println!("✅ Embedder ok, {} dims", v.len()),
        Err(e) => {
            failures += 1;
            println!("❌ Embedder failed: {e}");
        }
    }

    println!("\nTesting index...");
    let index_ok = match app.rag.prepare().await {
        Ok(()) => app.rag.describe_index().await,
        Err(e) => Err(e),
    };
    match index_ok {
        Ok(d) => println!("✅ Index '{}' ok, {} records", d.name, d.count),
        Err(e) => {
            failures += 1;
            println!("❌ Index failed: {e}");
        }
    }

    println!("\nTesting generation endpoint...");
    match app.generator.list_models().await {
        Ok(models) => {
            if !models.iter().any(|m| m == app.generator.model()) {
                warn!(model = app.generator.model(), "configured model not listed by endpoint");
            }
            let head: Vec<&str> = models.iter().take(3).map(String::as_str).collect();
            println!("✅ Generation endpoint ok. Models: {head:?}");
        }
        Err(e) => {
            failures += 1;
            println!("❌ Generation endpoint failed: {e}");
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}
