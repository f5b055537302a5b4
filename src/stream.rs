//! Async extraction.
//!
//! [`extract_async`] runs an extraction on Tokio's blocking pool and returns
//! an [`ExtractionFuture`]. Decoding and encoding are CPU and I/O heavy, so
//! they stay off the async workers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framegrab::{
//!     ExtractOptions, ExtractionEngine, ExtractionRequest, FfmpegSource, FrameGrabError,
//!     SamplingConfig, SourceDescriptor,
//! };
//!
//! # async fn example() -> Result<(), FrameGrabError> {
//! let engine = Arc::new(ExtractionEngine::new(FfmpegSource::new()));
//! let request = ExtractionRequest::new(
//!     SourceDescriptor::file("input.mp4"),
//!     "frames",
//!     SamplingConfig::by_count(12)?,
//! );
//!
//! let report = framegrab::extract_async(engine, request, ExtractOptions::new()).await?;
//! println!("{} frame(s) saved", report.frames_saved());
//! # Ok(())
//! # }
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::task::JoinHandle;

use crate::{
    configuration::ExtractOptions,
    engine::{ExtractionEngine, ExtractionReport, ExtractionRequest},
    error::FrameGrabError,
    media_source::MediaSource,
};

/// A future resolving to the report of a run on the blocking pool.
///
/// Dropping the future does not stop the run; cancel it through the
/// [`CancellationToken`](crate::CancellationToken) in its options.
pub struct ExtractionFuture {
    handle: JoinHandle<ExtractionReport>,
}

impl Future for ExtractionFuture {
    type Output = Result<ExtractionReport, FrameGrabError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.map_err(|_| FrameGrabError::WorkerPanicked))
    }
}

/// Run `request` on Tokio's blocking pool.
///
/// Must be called from within a Tokio runtime.
pub fn extract_async<S>(
    engine: Arc<ExtractionEngine<S>>,
    request: ExtractionRequest,
    options: ExtractOptions,
) -> ExtractionFuture
where
    S: MediaSource + 'static,
{
    let handle = tokio::task::spawn_blocking(move || engine.run(&request, &options));
    ExtractionFuture { handle }
}
