//! Render worker - runs in its own thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::backend::{DocumentHandle, SharedRasterizer};
use super::cache::PageCache;
use super::request::{CancelToken, RenderParams, RenderRequest, RenderResponse, RenderedPage, RequestId};
use crate::error::RasterFault;

/// Worker loop. Opens the document's only handle, reports its page count on
/// `opened`, serves requests until a `Shutdown` arrives or the pipeline goes
/// away, then destroys the handle.
pub fn render_worker(
    rasterizer: SharedRasterizer,
    bytes: Arc<[u8]>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    opened: Sender<Result<usize, RasterFault>>,
    cache_size: usize,
) {
    let mut doc = match rasterizer.open(&bytes) {
        Ok(doc) => doc,
        Err(fault) => {
            warn!("{} worker could not open document: {fault}", rasterizer.name());
            let _ = opened.send(Err(fault));
            return;
        }
    };
    if opened.send(Ok(doc.page_count())).is_err() {
        doc.destroy();
        return;
    }

    let mut cache = PageCache::new(cache_size);
    for request in requests {
        match request {
            RenderRequest::Page {
                id,
                page,
                params,
                token,
            } => {
                let response = render_response(doc.as_ref(), &mut cache, id, page, &params, &token);
                let _ = responses.send(response);
            }

            RenderRequest::Shutdown => break,
        }
    }

    doc.destroy();
    debug!("Render worker stopped");
}

fn render_response(
    doc: &dyn DocumentHandle,
    cache: &mut PageCache,
    id: RequestId,
    page: usize,
    params: &RenderParams,
    token: &CancelToken,
) -> RenderResponse {
    if token.is_cancelled(id) {
        return RenderResponse::Cancelled(id);
    }

    match render_page(doc, cache, page, params, token, id) {
        Ok((data, cached)) if token.is_current(id) => RenderResponse::Page {
            id,
            page,
            data,
            cached,
        },
        Ok(_) => RenderResponse::Cancelled(id),
        Err(fault) if fault.is_superseded() => RenderResponse::Cancelled(id),
        Err(error) => RenderResponse::Error { id, error },
    }
}

/// Resolve, scale and rasterize one page, serving from the cache when possible
fn render_page(
    doc: &dyn DocumentHandle,
    cache: &mut PageCache,
    page_num: usize,
    params: &RenderParams,
    token: &CancelToken,
    id: RequestId,
) -> Result<(Arc<RenderedPage>, bool), RasterFault> {
    let page = doc.page(page_num)?;
    let intrinsic = page.intrinsic_size();
    let scale = params.scale.resolve(intrinsic);

    if let Some(cached) = cache.get(page_num, scale) {
        debug!("Page {page_num} served from cache at scale {scale}");
        return Ok((cached, true));
    }

    if token.is_cancelled(id) {
        return Err(RasterFault::Superseded);
    }

    let raster = page.render(scale)?;
    let data = cache.insert(RenderedPage {
        raster,
        page: page_num,
        scale,
        intrinsic,
    });
    Ok((data, false))
}
