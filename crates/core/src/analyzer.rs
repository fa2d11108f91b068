use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    aggregator::{FragmentAggregator, Step},
    cache::{CacheStats, ResponseCache, cache_key},
    config::PageonConfig,
    error::{AnalysisError, GenerationError, StoreError, TranslationError},
    events::AnalysisEvent,
    extract::{Extracted, IncrementalExtractor, parse_document_text, reconcile},
    generation::{PromptPurpose, TextGenerator},
    prompts::{build_analysis_prompt, build_translation_prompt, thumbnail_url},
    sampler::sample_transcript,
    store::DocumentStore,
    types::{TranscriptLine, VideoAnalysisDocument},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub video_id: String,
    pub title: Option<String>,
    pub transcript: Vec<TranscriptLine>,
}

/// Runs transcript analysis end to end: sample, generate, extract while
/// streaming, reconcile, then cache and persist.
pub struct VideoAnalyzer<G: ?Sized> {
    generator: Arc<G>,
    cache: ResponseCache<VideoAnalysisDocument>,
    translations: ResponseCache<VideoAnalysisDocument>,
    store: Arc<dyn DocumentStore>,
    config: PageonConfig,
}

impl<G: TextGenerator + ?Sized> VideoAnalyzer<G> {
    pub fn new(generator: Arc<G>, store: Arc<dyn DocumentStore>, config: PageonConfig) -> Self {
        Self {
            generator,
            cache: ResponseCache::new(config.cache.clone()),
            translations: ResponseCache::new(config.cache.clone()),
            store,
            config,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        self.translations.clear();
    }

    /// Loads a previously reconciled document by the id it was analyzed
    /// under.
    pub async fn load_document(
        &self,
        video_id: &str,
    ) -> Result<Option<VideoAnalysisDocument>, StoreError> {
        self.store.load(video_id).await
    }

    /// Analyzes one transcript, sending progress to `events`.
    ///
    /// The last event sent is always `done`, `cached`, or `error`. When
    /// `cancel` fires, or the receiver goes away, fragment consumption
    /// stops and nothing is cached or persisted. A terminal event that
    /// cannot be delivered before `cancel` fires is dropped.
    ///
    /// Fallback documents are returned and announced but neither cached
    /// nor persisted, so the next identical request generates again.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        events: &mpsc::Sender<AnalysisEvent>,
        cancel: &CancellationToken,
    ) -> Result<VideoAnalysisDocument, AnalysisError> {
        let request_id = Uuid::new_v4();
        let video_id = request.video_id.as_str();
        info!(%request_id, video_id, lines = request.transcript.len(), "starting analysis");

        if request.transcript.is_empty() {
            let err = AnalysisError::EmptyTranscript {
                video_id: video_id.to_string(),
            };
            send_final(events, AnalysisEvent::error(err.to_string()), cancel).await;
            return Err(err);
        }

        let sampled = sample_transcript(&request.transcript, &self.config.sampling);
        let transcript_text = sampled.render();
        debug!(
            %request_id,
            segments = sampled.segments.len(),
            lines = sampled.line_count(),
            chars = transcript_text.chars().count(),
            verbatim = sampled.verbatim,
            "sampled transcript"
        );

        let key = cache_key(&json!({
            "videoId": video_id,
            "title": request.title,
            "transcript": transcript_text,
            "model": self.generator.model(PromptPurpose::Analysis),
        }));

        if let Some(document) = self.cache.get(&key) {
            return self.finish_cached(request_id, &key, document, events, cancel).await;
        }

        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(request_id, video_id, events)),
            gate = self.cache.lock_key(&key) => gate,
        };
        if let Some(document) = self.cache.peek(&key) {
            return self.finish_cached(request_id, &key, document, events, cancel).await;
        }

        let prompt = build_analysis_prompt(
            video_id,
            request.title.as_deref(),
            &transcript_text,
            self.config.generation.temperature,
        );
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(request_id, video_id, events)),
            opened = self.generator.stream(&prompt) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return Err(self.failed(request_id, video_id, err, events, cancel).await),
        };

        let mut aggregator = FragmentAggregator::new();
        let mut extractor = IncrementalExtractor::new();
        loop {
            match aggregator.next(&mut stream, cancel).await {
                Step::Appended => {
                    for extracted in extractor.feed(aggregator.buffer()) {
                        let event = match extracted {
                            Extracted::Summary(summary) => AnalysisEvent::Summary(summary),
                            Extracted::Section(section) => {
                                debug!(%request_id, section_id = %section.id, "section closed");
                                AnalysisEvent::Section(section)
                            }
                        };
                        let sent = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => false,
                            sent = events.send(event) => sent.is_ok(),
                        };
                        if !sent {
                            return Err(self.cancelled(request_id, video_id, events));
                        }
                    }
                }
                Step::Finished => break,
                Step::Failed(err) => {
                    return Err(self.failed(request_id, video_id, err, events, cancel).await);
                }
                Step::Cancelled => {
                    return Err(self.cancelled(request_id, video_id, events));
                }
            }
        }
        drop(stream);

        info!(
            %request_id,
            fragments = aggregator.fragment_count(),
            chars = aggregator.buffer().len(),
            sections = extractor.emitted_section_ids().len(),
            "generation stream finished"
        );

        let fallback_title = request.title.as_deref().unwrap_or(video_id);
        let reconciled = reconcile(aggregator.buffer(), fallback_title);
        if let Some(warning) = &reconciled.warning {
            warn!(%request_id, video_id, warning = %warning, "using fallback document");
        }
        let fallback = reconciled.is_fallback();
        let mut document = reconciled.document;
        if document.summary.video_id.is_empty() {
            document.summary.video_id = video_id.to_string();
        }
        if document.summary.thumbnail_url.is_empty() {
            document.summary.thumbnail_url = thumbnail_url(video_id);
        }

        if cancel.is_cancelled() {
            return Err(self.cancelled(request_id, video_id, events));
        }

        if !fallback {
            self.cache.put(key.as_str(), document.clone(), None);
            if let Err(err) = self.store.save(video_id, &document).await {
                warn!(%request_id, video_id, error = %err, "failed to persist document");
            }
        }

        info!(%request_id, video_id, sections = document.sections.len(), fallback, "analysis done");
        send_final(events, AnalysisEvent::Done(document.clone()), cancel).await;
        Ok(document)
    }

    /// Translates the text fields of `document` into `language` (an ISO
    /// 639-1 code). Ids, URLs and timestamps are kept from the source.
    /// Identical translations share one generation call.
    pub async fn translate(
        &self,
        document: &VideoAnalysisDocument,
        language: &str,
    ) -> Result<VideoAnalysisDocument, TranslationError> {
        let document_json = serde_json::to_string(document)?;
        let key = cache_key(&json!({
            "document": document_json,
            "language": language.trim().to_ascii_lowercase(),
            "model": self.generator.model(PromptPurpose::Translation),
        }));

        let document_json = document_json.as_str();
        self.translations
            .get_or_try_insert_with(&key, None, move || async move {
                info!(video_id = %document.summary.video_id, language, "translating document");
                let prompt = build_translation_prompt(
                    document_json,
                    language,
                    self.config.generation.temperature,
                );
                let reply = self.generator.complete(&prompt).await?;
                let translated = parse_document_text(&reply)
                    .map_err(|reason| TranslationError::InvalidResponse { reason })?;
                Ok::<_, TranslationError>(keep_identifiers(document, translated))
            })
            .await
    }

    async fn finish_cached(
        &self,
        request_id: Uuid,
        key: &str,
        document: VideoAnalysisDocument,
        events: &mpsc::Sender<AnalysisEvent>,
        cancel: &CancellationToken,
    ) -> Result<VideoAnalysisDocument, AnalysisError> {
        info!(%request_id, cache_key = key, "serving cached analysis");
        send_final(events, AnalysisEvent::Cached(document.clone()), cancel).await;
        Ok(document)
    }

    async fn failed(
        &self,
        request_id: Uuid,
        video_id: &str,
        source: GenerationError,
        events: &mpsc::Sender<AnalysisEvent>,
        cancel: &CancellationToken,
    ) -> AnalysisError {
        warn!(%request_id, video_id, error = %source, "generation failed");
        let err = AnalysisError::Generation {
            video_id: video_id.to_string(),
            source,
        };
        send_final(events, AnalysisEvent::error(err.to_string()), cancel).await;
        err
    }

    fn cancelled(
        &self,
        request_id: Uuid,
        video_id: &str,
        events: &mpsc::Sender<AnalysisEvent>,
    ) -> AnalysisError {
        info!(%request_id, video_id, "analysis cancelled");
        let err = AnalysisError::Cancelled {
            video_id: video_id.to_string(),
        };
        // The caller may already be gone; never wait on a full channel here.
        let _ = events.try_send(AnalysisEvent::error(err.to_string()));
        err
    }
}

/// Sends a terminal event, giving up once `cancel` fires while the channel
/// is full.
async fn send_final(
    events: &mpsc::Sender<AnalysisEvent>,
    event: AnalysisEvent,
    cancel: &CancellationToken,
) {
    if let Err(TrySendError::Full(event)) = events.try_send(event) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => debug!("dropping terminal event after cancellation"),
            _ = events.send(event) => {}
        }
    }
}

/// Restores fields a translation must not change. Sections are matched by
/// position.
fn keep_identifiers(
    source: &VideoAnalysisDocument,
    mut translated: VideoAnalysisDocument,
) -> VideoAnalysisDocument {
    translated.summary.video_id = source.summary.video_id.clone();
    translated.summary.thumbnail_url = source.summary.thumbnail_url.clone();
    for (section, original) in translated.sections.iter_mut().zip(&source.sections) {
        section.id = original.id.clone();
        for (point, original_point) in section.content.iter_mut().zip(&original.content) {
            point.timestamp = original_point.timestamp.clone();
        }
    }
    translated
}
