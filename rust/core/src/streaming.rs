// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Async parsing surface.
//!
//! The core algorithms are single-threaded and synchronous; this module
//! only interleaves them with a host event loop. [`ScanStream`] yields
//! entity-reference batches with a voluntary suspension point between
//! batches, and [`parse_async`] adds the same yielding to the extract
//! phase. Dropping the stream or future abandons the parse — there is no
//! separate cancellation token.

use crate::decoder::EntityExtractor;
use crate::error::Result;
use crate::extractors::EntityMap;
use crate::index::EntityIndexBuilder;
use crate::parse::{finish_pipeline, ParseOptions, ParsePhase};
use crate::store::IfcDataStore;
use crate::tokenizer::{EntityRef, StepTokenizer};
use futures_core::Stream;
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Streaming configuration.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Entities per batch between suspension points.
    pub batch_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Event yielded by [`ScanStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent<'a> {
    /// A batch of scanned entity references.
    Batch(Vec<EntityRef<'a>>),
    /// Scan finished; total number of references yielded.
    Done { entity_count: usize },
}

/// Lazy scan over a buffer as a stream of entity-reference batches.
///
/// Between batches the stream returns `Pending` once (after waking
/// itself), handing control back to the host scheduler. Restart by
/// constructing a new stream over the same buffer.
pub struct ScanStream<'a> {
    tokenizer: StepTokenizer<'a>,
    batch_size: usize,
    count: usize,
    yielded: bool,
    done: bool,
}

impl<'a> ScanStream<'a> {
    pub fn new(content: &'a str, config: StreamConfig) -> Self {
        Self {
            tokenizer: StepTokenizer::new(content),
            batch_size: config.batch_size.max(1),
            count: 0,
            yielded: false,
            done: false,
        }
    }
}

impl<'a> Stream for ScanStream<'a> {
    type Item = ParseEvent<'a>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        // Voluntary yield between batches.
        if !this.yielded {
            this.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        this.yielded = false;

        let mut batch = Vec::with_capacity(this.batch_size);
        while batch.len() < this.batch_size {
            match this.tokenizer.next_entity() {
                Some(entity) => batch.push(entity),
                None => break,
            }
        }

        if batch.is_empty() {
            this.done = true;
            return Poll::Ready(Some(ParseEvent::Done {
                entity_count: this.count,
            }));
        }
        this.count += batch.len();
        Poll::Ready(Some(ParseEvent::Batch(batch)))
    }
}

/// One-shot cooperative yield, used at batch boundaries.
struct YieldNow {
    polled: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.polled {
            Poll::Ready(())
        } else {
            this.polled = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn yield_now() -> YieldNow {
    YieldNow { polled: false }
}

/// Asynchronous parse: same pipeline and result as
/// [`ColumnarParser::parse`](crate::parse::ColumnarParser::parse), with
/// suspension points at scan/extract batch boundaries.
pub async fn parse_async(
    content: &str,
    mut options: ParseOptions,
    config: StreamConfig,
) -> Result<IfcDataStore> {
    let mut report = move |phase: ParsePhase, percent: f32| {
        if let Some(cb) = options.on_progress.as_mut() {
            cb(phase, percent);
        }
    };

    // Phase 1: scan through the batch stream.
    report(ParsePhase::Scan, 0.0);
    let total_bytes = content.len().max(1) as f32;
    let mut index_builder = EntityIndexBuilder::with_capacity_for(content.len());
    let mut jobs: Vec<EntityRef<'_>> = Vec::new();
    let mut stream = ScanStream::new(content, config);
    while let Some(event) = stream.next().await {
        match event {
            ParseEvent::Batch(batch) => {
                for entity in &batch {
                    index_builder.add(entity);
                }
                if let Some(last) = batch.last() {
                    let percent = last.byte_offset as f32 / total_bytes * 100.0;
                    report(ParsePhase::Scan, percent.min(99.0));
                }
                jobs.extend(batch);
            }
            ParseEvent::Done { .. } => break,
        }
    }
    let index = index_builder.build();
    report(ParsePhase::Scan, 100.0);

    // Phase 2: extract in batches, yielding between them.
    report(ParsePhase::Extract, 0.0);
    let extractor = EntityExtractor::new(content);
    let mut entities = EntityMap::with_capacity_and_hasher(index.len(), Default::default());
    let total_jobs = jobs.len().max(1) as f32;
    for (chunk_idx, chunk) in jobs.chunks(config.batch_size.max(1)).enumerate() {
        for job in chunk {
            if entities.contains_key(&job.express_id) {
                continue;
            }
            if let Some(span) = index.get(job.express_id) {
                if let Ok(entity) = extractor.extract(span) {
                    entities.insert(entity.id, entity);
                }
            }
        }
        let processed = (chunk_idx + 1) * config.batch_size.max(1);
        report(
            ParsePhase::Extract,
            (processed as f32 / total_jobs * 100.0).min(99.0),
        );
        yield_now().await;
    }
    report(ParsePhase::Extract, 100.0);

    // Phases 3-4 run between two final suspension points.
    yield_now().await;
    let store = finish_pipeline(&jobs, &entities, content.len() as u64, &mut report);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#1=IFCPROJECT('PGUID',$,'Project',$,$,$,$,$,$);
#10=IFCWALL('GUID1',$,'Wall-01',$,$,$,$,$,$);
#11=IFCWALL('GUID2',$,'Wall-02',$,$,$,$,$,$);
#20=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCTEXT('A'),$);
#21=IFCPROPERTYSET('PSGUID',$,'Pset_WallCommon',$,(#20));
#22=IFCRELDEFINESBYPROPERTIES('RGUID',$,$,$,(#10),#21);
";

    #[tokio::test]
    async fn test_scan_stream_batches() {
        let mut stream = ScanStream::new(SAMPLE, StreamConfig { batch_size: 2 });
        let mut batches = 0;
        let mut total = 0;
        let mut done_count = None;
        while let Some(event) = stream.next().await {
            match event {
                ParseEvent::Batch(batch) => {
                    assert!(batch.len() <= 2);
                    batches += 1;
                    total += batch.len();
                }
                ParseEvent::Done { entity_count } => done_count = Some(entity_count),
            }
        }
        assert_eq!(total, 6);
        assert_eq!(batches, 3);
        assert_eq!(done_count, Some(6));
        // Stream is finished; polling again keeps returning None.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_parse_async_matches_sync() {
        let sync_store = crate::parse::parse(SAMPLE).unwrap();
        let async_store = parse_async(
            SAMPLE,
            ParseOptions::default(),
            StreamConfig { batch_size: 2 },
        )
        .await
        .unwrap();

        assert_eq!(async_store.entity_count, sync_store.entity_count);
        assert_eq!(async_store.entities.name(10), Some("Wall-01"));
        assert_eq!(
            async_store.entities.get_by_type("IfcWall"),
            sync_store.entities.get_by_type("IfcWall")
        );
        assert!(async_store
            .properties
            .get_value(10, "Pset_WallCommon", "FireRating")
            .is_some());
    }

    #[tokio::test]
    async fn test_parse_async_reports_phases() {
        use std::sync::{Arc, Mutex};
        let events: Arc<Mutex<Vec<(ParsePhase, f32)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let options = ParseOptions::default().with_progress(Box::new(move |phase, pct| {
            sink.lock().unwrap().push((phase, pct));
        }));
        parse_async(SAMPLE, options, StreamConfig::default())
            .await
            .unwrap();
        let events = events.lock().unwrap();
        assert!(events.iter().any(|(p, pct)| *p == ParsePhase::Scan && *pct == 100.0));
        assert_eq!(events.last().unwrap(), &(ParsePhase::Done, 100.0));
    }
}
