use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use crate::classify::is_translatable;
use crate::document::{Document, TextBlock};

pub const DEFAULT_BATCH_SIZE: usize = 16;

pub type BatchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// Machine translation of a batch of strings.
///
/// Implementations return exactly one output per input, in input order, or a
/// single error for the whole batch.
pub trait TranslationEngine: Send + Sync {
    fn name(&self) -> &str;
    fn translate_batch<'a>(&'a self, texts: &'a [String]) -> BatchFuture<'a>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub translated: usize,
    pub passed_through: usize,
    /// Blocks that already carried a translation and were left alone.
    pub already_translated: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchCoordinator {
    batch_size: usize,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchCoordinator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Fills `translated` on every block of `blocks`, keeping block order.
    ///
    /// Non-translatable blocks get their source text copied through. Blocks
    /// that were translated earlier are neither resubmitted nor overwritten.
    pub async fn translate_blocks(
        &self,
        blocks: &mut [TextBlock],
        engine: &dyn TranslationEngine,
    ) -> Result<BatchStats> {
        let mut stats = BatchStats::default();
        let mut pending = Vec::new();
        for (index, block) in blocks.iter_mut().enumerate() {
            if block.is_translated() {
                stats.already_translated += 1;
            } else if is_translatable(&block.source_text) {
                pending.push(index);
            } else {
                let copy = block.source_text.clone();
                block.set_translation(copy);
                stats.passed_through += 1;
            }
        }

        let total_batches = pending.len().div_ceil(self.batch_size);
        for (batch_index, chunk) in pending.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = chunk
                .iter()
                .map(|index| blocks[*index].source_text.clone())
                .collect();
            debug!(
                "{}: batch {}/{}, size {}",
                engine.name(),
                batch_index + 1,
                total_batches,
                texts.len()
            );
            let outputs = engine
                .translate_batch(&texts)
                .await
                .with_context(|| {
                    format!(
                        "translation batch {}/{} failed ({})",
                        batch_index + 1,
                        total_batches,
                        engine.name()
                    )
                })?;
            if outputs.len() != texts.len() {
                return Err(anyhow!(
                    "{} returned {} translations for {} texts",
                    engine.name(),
                    outputs.len(),
                    texts.len()
                ));
            }
            for (index, output) in chunk.iter().zip(outputs) {
                blocks[*index].set_translation(output);
            }
            stats.translated += chunk.len();
            stats.batches += 1;
        }
        Ok(stats)
    }

    /// Translates every page of `document`; blocks from all pages share batches.
    pub async fn translate_document(
        &self,
        document: &mut Document,
        engine: &dyn TranslationEngine,
    ) -> Result<BatchStats> {
        let lengths: Vec<usize> = document.pages.iter().map(|page| page.blocks.len()).collect();
        let mut blocks: Vec<TextBlock> = document
            .pages
            .iter_mut()
            .flat_map(|page| std::mem::take(&mut page.blocks))
            .collect();
        let result = self.translate_blocks(&mut blocks, engine).await;

        let mut remaining = blocks.into_iter();
        for (page, len) in document.pages.iter_mut().zip(lengths) {
            page.blocks.extend(remaining.by_ref().take(len));
        }
        let stats = result?;
        info!(
            "translated {} block(s) in {} batch(es), {} passed through, {} already translated",
            stats.translated, stats.batches, stats.passed_through, stats.already_translated
        );
        Ok(stats)
    }
}
