use anyhow::Result;
use console::style;

use ragstudio::catalog::cache::format_bytes;
use ragstudio::project::{PreviewChunk, PreviewRequest};

use super::Context;

const SNIPPET_CHARS: usize = 160;

fn snippet(chunk: &PreviewChunk) -> String {
    let flat: String = chunk.content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}…")
}

pub async fn run(ctx: &Context, database: &str, file_hash: &str, strategy: Option<&str>, chunks: usize) -> Result<()> {
    let request = PreviewRequest {
        file_hash: file_hash.to_string(),
        strategy: strategy.map(str::to_string),
    };
    let preview = ctx.session.preview(database, &request).await?;

    println!(
        "{} {}",
        style(&preview.filename).bold(),
        style(format!("({}, {})", preview.content_type, format_bytes(preview.size_bytes))).dim()
    );
    println!("  Parser:        {}", preview.parser_used);
    println!(
        "  Chunking:      {} (size {}, overlap {})",
        preview.chunk_strategy, preview.chunk_size, preview.chunk_overlap
    );
    println!(
        "  Chunks:        {} (avg {:.0} chars, avg overlap {:.0})",
        preview.total_chunks, preview.avg_chunk_size, preview.avg_overlap_size
    );
    println!(
        "  Indexed size:  {} chars for {} source chars",
        preview.total_size_with_overlaps,
        preview.original_text.chars().count()
    );
    for warning in &preview.warnings {
        println!("  {} {warning}", style("⚠").yellow());
    }
    println!();

    for chunk in preview.chunks.iter().take(chunks) {
        println!(
            "{} {}",
            style(format!("#{}", chunk.chunk_index)).cyan(),
            style(format!(
                "[{}..{}] {} chars, {} words",
                chunk.start_position, chunk.end_position, chunk.char_count, chunk.word_count
            ))
            .dim()
        );
        println!("  {}", snippet(chunk));
    }
    if preview.chunks.len() > chunks {
        println!("{}", style(format!("… {} more", preview.chunks.len() - chunks)).dim());
    }
    Ok(())
}
