//! Cross-catalog star identification
//!
//! For each query star the reference source is opened on a field of view of
//! twice the larger of the two sources' maximum astrometric errors. Every
//! candidate in that field for which
//!
//! ```text
//! distance < query error  ||  distance < candidate error
//! ```
//!
//! holds is reported. Either side's stated precision is enough for a match,
//! and all matching candidates are reported, not only the nearest.
//!
//! Per-star errors are reported to the observer and the run carries on; only
//! I/O errors end it in [`RunState::Failed`].

use crate::core::batch::{RunState, StopHandle};
use crate::core::geom::ARCSEC_PER_DEGREE;
use crate::core::manager::MagnitudeDbManager;
use crate::core::observer::{ChannelObserver, ItemRef, Monitor, OperationEvent, OperationObserver};
use crate::core::reader::{CatalogReader, StarStream};
use crate::core::record::{CatalogStar, MagnitudeRecord, NegativeMode, Record};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// A query star and one reference star accepted as the same object
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub query: CatalogStar,
    pub reference: CatalogStar,
    pub distance_arcsec: f64,
}

/// Counters of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationSummary {
    pub state: RunState,
    /// Query stars taken from the stream, including failed ones
    pub processed: usize,
    pub identified: usize,
    pub unidentified: usize,
    pub failed: usize,
    /// Match results handed to the sink
    pub matches: usize,
}

impl IdentificationSummary {
    fn new() -> Self {
        IdentificationSummary {
            state: RunState::NotStarted,
            processed: 0,
            identified: 0,
            unidentified: 0,
            failed: 0,
            matches: 0,
        }
    }
}

/// Where accepted matches go
pub trait MatchSink: Send {
    fn record(&mut self, result: &MatchResult) -> Result<()>;
}

impl MatchSink for Vec<MatchResult> {
    fn record(&mut self, result: &MatchResult) -> Result<()> {
        self.push(result.clone());
        Ok(())
    }
}

/// Appends one magnitude record per match to the reference star's folder
///
/// The query star's magnitude (if any) and position are what was measured
/// on the image. Records are not flushed.
#[derive(Debug)]
pub struct MagnitudeWriter {
    manager: Arc<MagnitudeDbManager>,
    image: String,
    observed_at: DateTime<Utc>,
    band: String,
}

impl MagnitudeWriter {
    pub fn new(manager: Arc<MagnitudeDbManager>, image: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        MagnitudeWriter {
            manager,
            image: image.into(),
            observed_at,
            band: "V".to_string(),
        }
    }

    pub fn with_band(mut self, band: impl Into<String>) -> Self {
        self.band = band.into();
        self
    }
}

impl MatchSink for MagnitudeWriter {
    fn record(&mut self, result: &MatchResult) -> Result<()> {
        let mut record = MagnitudeRecord::new(&result.reference, self.observed_at, self.image.clone())
            .with_band(self.band.clone())
            .with_position(result.query.position)
            .with_detection(result.query.identity_key());
        if let Some(magnitude) = result.query.magnitude {
            record = record.with_magnitude(magnitude);
        }
        self.manager.add_record(&record)?;
        Ok(())
    }
}

/// Batch identification engine
///
/// An identifier runs once. Candidates are filtered with its negative mode:
/// [`accept_negative`](Self::accept_negative) for a quick existence check,
/// [`except_negative`](Self::except_negative) (the default) for the real
/// identification pass.
pub struct Identifier {
    mode: NegativeMode,
    stop: StopHandle,
    state: RunState,
    monitor: Option<Arc<dyn Monitor>>,
}

impl Identifier {
    pub const OPERATION: &'static str = "identify";

    pub fn new() -> Self {
        Identifier {
            mode: NegativeMode::Except,
            stop: StopHandle::new(),
            state: RunState::NotStarted,
            monitor: None,
        }
    }

    /// Include candidates without a magnitude
    pub fn accept_negative(mut self) -> Self {
        self.mode = NegativeMode::Accept;
        self
    }

    /// Skip candidates without a magnitude
    pub fn except_negative(mut self) -> Self {
        self.mode = NegativeMode::Except;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn mode(&self) -> NegativeMode {
        self.mode
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Field of view for a search, in degrees
    pub fn search_fov_deg(query_max_error_arcsec: f64, reference_max_error_arcsec: f64) -> f64 {
        query_max_error_arcsec.max(reference_max_error_arcsec) * 2.0 / ARCSEC_PER_DEGREE
    }

    /// Every reference star accepted for `star`, nearest first
    ///
    /// `query_error_arcsec` applies when the star carries no error of its
    /// own, and `fov_deg` is the field opened on the reader. The reader is
    /// closed again on every path out.
    pub fn identify_star(
        &self,
        star: &CatalogStar,
        query_error_arcsec: f64,
        reference: &mut dyn CatalogReader,
        fov_deg: f64,
    ) -> Result<Vec<MatchResult>> {
        let query_error = star.position_error_arcsec.unwrap_or(query_error_arcsec);
        let reference_error = reference.max_position_error_arcsec();

        reference.open(&star.position, fov_deg)?;
        let result = self.collect_matches(star, query_error, reference_error, reference);
        reference.close();

        let mut matches = result?;
        matches.sort_by(|a, b| a.distance_arcsec.total_cmp(&b.distance_arcsec));
        debug!("{} has {} counterparts", star.identity_key(), matches.len());
        Ok(matches)
    }

    fn collect_matches(
        &self,
        star: &CatalogStar,
        query_error: f64,
        reference_error: f64,
        reference: &mut dyn CatalogReader,
    ) -> Result<Vec<MatchResult>> {
        let mut matches = Vec::new();
        while let Some(candidate) = reference.read_next()? {
            if !self.mode.admits(&candidate) {
                continue;
            }
            let distance = star.position.distance_arcsec(&candidate.position);
            let candidate_error = candidate.position_error_arcsec.unwrap_or(reference_error);
            if distance < query_error || distance < candidate_error {
                matches.push(MatchResult {
                    query: star.clone(),
                    reference: candidate,
                    distance_arcsec: distance,
                });
            }
        }
        Ok(matches)
    }

    /// Identify every star of `query` against `reference`
    ///
    /// A stop request is honored between stars; matches already handed to
    /// the sink stay. Ends in `Completed` even when stars failed.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the identifier has already run, otherwise the I/O
    /// error that ended the run (state `Failed`).
    pub fn run(
        &mut self,
        query: &mut dyn StarStream,
        reference: &mut dyn CatalogReader,
        sink: &mut dyn MatchSink,
        observer: &mut dyn OperationObserver,
    ) -> Result<IdentificationSummary> {
        if self.state != RunState::NotStarted {
            return Err(StoreError::InvalidState(format!(
                "identifier is {}, expected not started",
                self.state
            )));
        }

        let query_error = query.max_position_error_arcsec();
        let fov_deg = Self::search_fov_deg(query_error, reference.max_position_error_arcsec());
        let mut summary = IdentificationSummary::new();

        self.state = RunState::Running;
        observer.notify_start(Self::OPERATION, None);
        info!(
            "Identification started ({:?} negative data, fov {:.2} arcsec)",
            self.mode,
            fov_deg * ARCSEC_PER_DEGREE
        );
        self.message(&format!("Identification started, search field {:.2}\"", fov_deg * ARCSEC_PER_DEGREE));

        let outcome = self.run_stars(query, reference, sink, observer, query_error, fov_deg, &mut summary);

        self.state = match &outcome {
            Ok(()) if self.state == RunState::Stopped => RunState::Stopped,
            Ok(()) => RunState::Completed,
            Err(_) => RunState::Failed,
        };
        summary.state = self.state;
        observer.notify_end(Self::OPERATION, self.state);
        info!(
            "Identification {}: {} processed, {} identified, {} unidentified, {} failed",
            self.state, summary.processed, summary.identified, summary.unidentified, summary.failed
        );
        self.message(&format!(
            "Identification {}: {} of {} stars identified",
            self.state, summary.identified, summary.processed
        ));

        outcome.map(|()| summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_stars(
        &mut self,
        query: &mut dyn StarStream,
        reference: &mut dyn CatalogReader,
        sink: &mut dyn MatchSink,
        observer: &mut dyn OperationObserver,
        query_error: f64,
        fov_deg: f64,
        summary: &mut IdentificationSummary,
    ) -> Result<()> {
        let mut index = 0usize;
        loop {
            if self.stop.is_stop_requested() {
                self.state = RunState::Stopped;
                info!("Identification stopped after {} stars", summary.processed);
                return Ok(());
            }

            let Some(next) = query.next_star() else {
                return Ok(());
            };
            summary.processed += 1;

            let star = match next {
                Ok(star) => star,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    summary.failed += 1;
                    warn!("Query star #{} unreadable: {}", index, e);
                    observer.notify_failed(&ItemRef::new(index, format!("query star #{}", index)), &e);
                    index += 1;
                    continue;
                }
            };

            let item = ItemRef::new(index, star.designation());
            match self.identify_and_record(&star, query_error, reference, fov_deg, sink) {
                Ok(0) => {
                    summary.unidentified += 1;
                    observer.notify_warned(&item, "no counterpart found");
                }
                Ok(count) => {
                    summary.identified += 1;
                    summary.matches += count;
                    observer.notify_succeeded(&item);
                }
                Err(e) if e.is_fatal() => {
                    observer.notify_failed(&item, &e);
                    return Err(e);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!("Identification of {} failed: {}", star.designation(), e);
                    observer.notify_failed(&item, &e);
                }
            }
            index += 1;
        }
    }

    fn identify_and_record(
        &self,
        star: &CatalogStar,
        query_error: f64,
        reference: &mut dyn CatalogReader,
        fov_deg: f64,
        sink: &mut dyn MatchSink,
    ) -> Result<usize> {
        let matches = self.identify_star(star, query_error, reference, fov_deg)?;
        for result in &matches {
            sink.record(result)?;
        }
        Ok(matches.len())
    }

    fn message(&self, line: &str) {
        if let Some(monitor) = &self.monitor {
            monitor.add_message(line);
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identifier")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("stop_requested", &self.stop.is_stop_requested())
            .finish()
    }
}

/// Identification running on a worker thread
pub struct IdentificationTask<S> {
    stop: StopHandle,
    handle: JoinHandle<Result<(IdentificationSummary, S)>>,
}

impl<S> IdentificationTask<S> {
    /// Ask the run to stop before its next star
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run; returns the summary and the sink
    pub fn join(self) -> Result<(IdentificationSummary, S)> {
        self.handle
            .join()
            .map_err(|_| StoreError::InvalidState("identification thread panicked".to_string()))?
    }
}

/// Run `identifier` on its own thread, reporting events over a channel
pub fn spawn_identification<Q, C, S>(
    mut identifier: Identifier,
    mut query: Q,
    mut reference: C,
    mut sink: S,
) -> (IdentificationTask<S>, Receiver<OperationEvent>)
where
    Q: StarStream + 'static,
    C: CatalogReader + 'static,
    S: MatchSink + 'static,
{
    let (mut observer, events) = ChannelObserver::new();
    let stop = identifier.stop_handle();

    let handle = thread::spawn(move || {
        let summary = identifier.run(&mut query, &mut reference, &mut sink, &mut observer)?;
        Ok((summary, sink))
    });

    (IdentificationTask { stop, handle }, events)
}
