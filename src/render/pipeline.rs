//! Render pipeline - sequences page renders onto one surface

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::backend::SharedRasterizer;
use super::request::{CancelToken, RenderParams, RenderRequest, RenderResponse, RequestId};
use super::surface::Surface;
use super::worker::render_worker;
use crate::error::RasterFault;

pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_CACHE_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Attempts made after the first one while the surface is detached
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// What happened to a render request at submission time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTicket {
    /// Sent to the worker
    Queued(RequestId),
    /// Surface not attached; retry number `attempt` is scheduled
    Deferred { attempt: u32 },
    /// Retries exhausted, request dropped
    Abandoned,
}

/// Result of a request observed through [`RenderPipeline::poll`]
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    /// Pixels were committed to the surface
    Rendered {
        id: RequestId,
        page: usize,
        /// Pixels came from the worker's page cache
        cached: bool,
        scale: f32,
        width: u32,
        height: u32,
    },
    /// Superseded by a newer request; not an error
    Cancelled { id: RequestId },
    Failed {
        id: RequestId,
        page: usize,
        error: RasterFault,
    },
    /// Surface was detached at commit time; retry scheduled
    Deferred { page: usize, attempt: u32 },
}

#[derive(Clone, Copy, Debug)]
struct PendingRetry {
    id: RequestId,
    page: usize,
    params: RenderParams,
    attempt: u32,
    due: Instant,
}

/// Page rendering for one surface, backed by a worker thread
///
/// The newest request always wins: submitting a request supersedes every
/// earlier one, and a superseded result is never committed.
pub struct RenderPipeline {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    token: CancelToken,
    pending: HashMap<RequestId, (usize, RenderParams)>,
    retry: Option<PendingRetry>,
    config: PipelineConfig,
    page_count: usize,
    worker: Option<JoinHandle<()>>,
}

impl RenderPipeline {
    /// Start a worker that opens the document in `bytes`. Waits for the
    /// worker to report the page count, or the reason the open failed.
    pub fn open(rasterizer: SharedRasterizer, bytes: Arc<[u8]>, config: PipelineConfig) -> Result<Self, RasterFault> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let (opened_tx, opened_rx) = flume::bounded(1);

        let cache_size = config.cache_size;
        let worker = std::thread::Builder::new()
            .name("planmark-render".to_string())
            .spawn(move || render_worker(rasterizer, bytes, request_rx, response_tx, opened_tx, cache_size))
            .map_err(|e| RasterFault::Init(format!("failed to spawn render worker: {e}")))?;

        let page_count = match opened_rx.recv() {
            Ok(Ok(count)) => count,
            Ok(Err(fault)) => {
                let _ = worker.join();
                return Err(fault);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(RasterFault::engine("render worker stopped before opening the document"));
            }
        };

        Ok(Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            token: CancelToken::new(),
            pending: HashMap::new(),
            retry: None,
            config,
            page_count,
            worker: Some(worker),
        })
    }

    /// Pages in the document the worker holds
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Request `page`, superseding whatever is in flight for this surface
    pub fn render_page(&mut self, page: usize, params: RenderParams, surface: &Surface, now: Instant) -> RenderTicket {
        let id = self.next_id();
        self.token.supersede_with(id);
        self.retry = None;

        if surface.is_attached() {
            self.submit(id, page, params)
        } else {
            self.defer(id, page, params, 1, now)
        }
    }

    /// Drive a scheduled retry. Returns `None` when nothing was due.
    pub fn tick(&mut self, surface: &Surface, now: Instant) -> Option<RenderTicket> {
        let retry = self.retry?;
        if now < retry.due {
            return None;
        }
        self.retry = None;

        if self.token.is_cancelled(retry.id) {
            return None;
        }
        if surface.is_attached() {
            return Some(self.submit(retry.id, retry.page, retry.params));
        }
        Some(self.defer(retry.id, retry.page, retry.params, retry.attempt + 1, now))
    }

    /// Collect finished renders, committing the current one to `surface`
    pub fn poll(&mut self, surface: &mut Surface, now: Instant) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(outcome) = self.handle_response(response, surface, now) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Block until every queued request has answered or `timeout` elapses
    pub fn settle(&mut self, surface: &mut Surface, timeout: Duration) -> Vec<RenderOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = self.poll(surface, Instant::now());

        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(outcome) = self.handle_response(response, surface, Instant::now()) {
                        outcomes.push(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        outcomes
    }

    /// True when nothing is queued, in flight or waiting for a retry
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.retry.is_none()
    }

    #[must_use]
    pub fn has_scheduled_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Supersede everything in flight; their results will be ignored
    pub fn cancel_all(&mut self) {
        self.token.cancel_all();
        self.retry = None;
    }

    /// Cancel outstanding work, stop the worker and wait for it to release
    /// its document handle
    pub fn shutdown(&mut self) {
        self.cancel_all();
        let _ = self.request_tx.send(RenderRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Render worker panicked");
            }
        }
        self.pending.clear();
    }

    fn handle_response(&mut self, response: RenderResponse, surface: &mut Surface, now: Instant) -> Option<RenderOutcome> {
        let id = response.id();
        let pending = self.pending.remove(&id);

        match response {
            RenderResponse::Page { id, page, data, cached } => {
                if self.token.is_cancelled(id) {
                    debug!("Dropping superseded render of page {page}");
                    return Some(RenderOutcome::Cancelled { id });
                }
                if !surface.is_attached() {
                    let params = pending.map(|(_, params)| params)?;
                    return match self.defer(id, page, params, 1, now) {
                        RenderTicket::Deferred { attempt } => Some(RenderOutcome::Deferred { page, attempt }),
                        _ => None,
                    };
                }

                surface.resize(data.raster.width(), data.raster.height());
                surface.clear();
                surface.commit(&data.raster);
                debug!(
                    "Committed page {page} at scale {:.3} ({}x{})",
                    data.scale,
                    data.raster.width(),
                    data.raster.height()
                );
                Some(RenderOutcome::Rendered {
                    id,
                    page,
                    cached,
                    scale: data.scale,
                    width: data.raster.width(),
                    height: data.raster.height(),
                })
            }

            RenderResponse::Cancelled(id) => Some(RenderOutcome::Cancelled { id }),

            RenderResponse::Error { id, error } => {
                if error.is_superseded() || self.token.is_cancelled(id) {
                    return Some(RenderOutcome::Cancelled { id });
                }
                let page = pending.map_or(0, |(page, _)| page);
                warn!("Render of page {page} failed: {error}");
                Some(RenderOutcome::Failed { id, page, error })
            }
        }
    }

    fn submit(&mut self, id: RequestId, page: usize, params: RenderParams) -> RenderTicket {
        let request = RenderRequest::Page {
            id,
            page,
            params,
            token: self.token.clone(),
        };
        if self.request_tx.send(request).is_err() {
            warn!("Render worker is gone; page {page} not rendered");
            return RenderTicket::Abandoned;
        }
        self.pending.insert(id, (page, params));
        RenderTicket::Queued(id)
    }

    fn defer(&mut self, id: RequestId, page: usize, params: RenderParams, attempt: u32, now: Instant) -> RenderTicket {
        if attempt > self.config.retry_limit {
            warn!("Surface never attached; giving up on page {page} after {} retries", self.config.retry_limit);
            return RenderTicket::Abandoned;
        }
        debug!("Surface not attached; retry {attempt} for page {page} scheduled");
        self.retry = Some(PendingRetry {
            id,
            page,
            params,
            attempt,
            due: now + self.config.retry_delay,
        });
        RenderTicket::Deferred { attempt }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
