//! One-shot pass per coordinate: resolve → fetch → aggregate → score.
//!
//! At most one pass is in flight. Coordinates that arrive meanwhile are
//! dropped, not queued.

use parking_lot::Mutex;
use std::{fmt, sync::Arc};
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{
    aggregate::aggregate,
    client::{HttpWeatherClient, WeatherSource},
    config::Config,
    error::{ErrorKind, PipelineError},
    locality::{LocalityResolver, NominatimResolver},
    model::{AggregateReading, ComfortScore, Coordinate, PassContext},
    score::ScoreCalculator,
};

/// Receiver of pipeline results.
pub trait Presenter: Send + Sync {
    fn present(&self, score: ComfortScore, reading: &AggregateReading);

    /// Called instead of [`Presenter::present`] when a stage fails. The
    /// previously presented state must stay as it is.
    fn report(&self, error: &PipelineError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resolving,
    Fetching,
    Scoring,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Resolving => "resolving",
            PipelineState::Fetching => "fetching",
            PipelineState::Scoring => "scoring",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`Pipeline::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Scored { score: ComfortScore, reading: AggregateReading },
    Failed(ErrorKind),
    /// Another pass was in flight; no callback was made.
    Dropped,
}

/// Exclusive claim on the pipeline for one pass. Returns the state to
/// [`PipelineState::Idle`] when dropped.
#[derive(Debug)]
pub struct Flight {
    state: Arc<Mutex<PipelineState>>,
}

impl Flight {
    fn belongs_to(&self, pipeline: &Pipeline) -> bool {
        Arc::ptr_eq(&self.state, &pipeline.state)
    }

    fn advance(&self, next: PipelineState) {
        let mut state = self.state.lock();
        let from = *state;
        debug!(%from, to = %next, "pipeline transition");
        *state = next;
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        *self.state.lock() = PipelineState::Idle;
    }
}

/// How [`run_updates`] treats the coordinate feed after a pass is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Close the feed after the first accepted coordinate.
    #[default]
    FirstFix,
    /// Keep listening; every later coordinate is a re-trigger.
    Continuous,
}

#[derive(Debug)]
pub struct Pipeline {
    resolver: Box<dyn LocalityResolver>,
    source: Box<dyn WeatherSource>,
    calculator: ScoreCalculator,
    state: Arc<Mutex<PipelineState>>,
}

impl Pipeline {
    pub fn new(
        resolver: Box<dyn LocalityResolver>,
        source: Box<dyn WeatherSource>,
        calculator: ScoreCalculator,
    ) -> Self {
        Self {
            resolver,
            source,
            calculator,
            state: Arc::new(Mutex::new(PipelineState::Idle)),
        }
    }

    /// Nominatim resolver + HTTP weather client, as configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let resolver = NominatimResolver::from_config(&config.geocoder)?;
        let source = HttpWeatherClient::from_config(&config.weather)?;
        let calculator = ScoreCalculator::with_clamping(config.scoring.clamp_components);
        Ok(Self::new(Box::new(resolver), Box::new(source), calculator))
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Claim the pipeline if it is idle.
    pub fn try_begin(&self) -> Option<Flight> {
        let mut state = self.state.lock();
        if *state != PipelineState::Idle {
            return None;
        }
        *state = PipelineState::Resolving;
        Some(Flight { state: Arc::clone(&self.state) })
    }

    /// Run one pass for `coordinate`, or drop it if a pass is in flight.
    pub async fn submit(&self, coordinate: Coordinate, presenter: &dyn Presenter) -> PassOutcome {
        match self.try_begin() {
            Some(flight) => self.run_pass(flight, coordinate, presenter).await,
            None => {
                debug!(%coordinate, state = %self.state(), "pass in flight; dropping coordinate");
                PassOutcome::Dropped
            }
        }
    }

    /// Run a pass under a flight claimed from this pipeline. A flight from
    /// another pipeline is refused without any callback.
    async fn run_pass(
        &self,
        flight: Flight,
        coordinate: Coordinate,
        presenter: &dyn Presenter,
    ) -> PassOutcome {
        if !flight.belongs_to(self) {
            warn!(%coordinate, "flight was claimed from another pipeline; dropping coordinate");
            return PassOutcome::Dropped;
        }

        let mut ctx = PassContext::new(coordinate);

        match self.evaluate(&flight, &mut ctx).await {
            Ok((score, reading)) => {
                info!(%coordinate, %score, label = %reading.label(), "comfort score computed");
                presenter.present(score, &reading);
                PassOutcome::Scored { score, reading }
            }
            Err(err) => {
                warn!(%coordinate, kind = %err.kind(), error = %err, "pipeline pass failed");
                presenter.report(&err);
                PassOutcome::Failed(err.kind())
            }
        }
    }

    async fn evaluate(
        &self,
        flight: &Flight,
        ctx: &mut PassContext,
    ) -> Result<(ComfortScore, AggregateReading), PipelineError> {
        let locality = self.resolver.resolve(ctx.coordinate).await?;
        let locality = ctx.locality.insert(locality);

        flight.advance(PipelineState::Fetching);
        let series = self.source.fetch(locality).await?;

        flight.advance(PipelineState::Scoring);
        let reading = aggregate(&series)?;
        let score = self.calculator.score(&reading);

        Ok((score, reading))
    }
}

/// Drive `pipeline` from a coordinate feed until the feed ends (or, with
/// [`UpdatePolicy::FirstFix`], until the first coordinate is accepted), then
/// wait for outstanding passes. Finished passes are reaped as they complete.
pub async fn run_updates(
    pipeline: Arc<Pipeline>,
    mut updates: mpsc::Receiver<Coordinate>,
    presenter: Arc<dyn Presenter>,
    policy: UpdatePolicy,
) {
    let mut passes = JoinSet::new();

    loop {
        tokio::select! {
            Some(joined) = passes.join_next(), if !passes.is_empty() => reap(joined),
            update = updates.recv() => {
                let Some(coordinate) = update else { break };

                let Some(flight) = pipeline.try_begin() else {
                    debug!(%coordinate, "pass in flight; dropping coordinate");
                    continue;
                };

                let pass_pipeline = Arc::clone(&pipeline);
                let presenter = Arc::clone(&presenter);
                passes.spawn(async move {
                    pass_pipeline.run_pass(flight, coordinate, presenter.as_ref()).await
                });

                if policy == UpdatePolicy::FirstFix {
                    debug!("first fix accepted; closing location feed");
                    updates.close();
                    break;
                }
            }
        }
    }

    while let Some(joined) = passes.join_next().await {
        reap(joined);
    }
}

fn reap(joined: Result<PassOutcome, JoinError>) {
    match joined {
        Ok(outcome) => debug!(?outcome, "pipeline pass finished"),
        Err(e) => warn!(error = %e, "pipeline pass task aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HourlyReading, HourlySeries, LocalityRef};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Fixed(Option<LocalityRef>);

    #[async_trait]
    impl LocalityResolver for Fixed {
        async fn resolve(&self, _: Coordinate) -> Result<LocalityRef, PipelineError> {
            self.0.clone().ok_or_else(|| PipelineError::NotFound("nothing here".into()))
        }
    }

    #[derive(Debug)]
    struct Canned(Vec<HourlyReading>);

    #[async_trait]
    impl WeatherSource for Canned {
        async fn fetch(&self, _: &LocalityRef) -> Result<HourlySeries, PipelineError> {
            Ok(HourlySeries::new(self.0.clone()))
        }
    }

    struct Silent;

    impl Presenter for Silent {
        fn present(&self, _: ComfortScore, _: &AggregateReading) {}
        fn report(&self, _: &PipelineError) {}
    }

    #[test]
    fn flight_is_exclusive_and_released_on_drop() {
        let pipeline = Pipeline::new(
            Box::new(Fixed(None)),
            Box::new(Canned(vec![])),
            ScoreCalculator::new(),
        );

        let flight = pipeline.try_begin().expect("idle pipeline accepts a pass");
        assert_eq!(pipeline.state(), PipelineState::Resolving);
        assert!(pipeline.try_begin().is_none());

        drop(flight);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.try_begin().is_some());
    }

    fn scoring_pipeline() -> Pipeline {
        Pipeline::new(
            Box::new(Fixed(Some(LocalityRef::new("a", "b")))),
            Box::new(Canned(vec![HourlyReading::new("30", "29", "晴")])),
            ScoreCalculator::new(),
        )
    }

    #[tokio::test]
    async fn flight_from_another_pipeline_is_refused() {
        let a = scoring_pipeline();
        let b = scoring_pipeline();

        let foreign = b.try_begin().expect("b is idle");
        let outcome = a.run_pass(foreign, Coordinate::new(0.0, 0.0), &Silent).await;

        assert_eq!(outcome, PassOutcome::Dropped);
        assert_eq!(a.state(), PipelineState::Idle);
        assert_eq!(b.state(), PipelineState::Idle);

        let own = a.try_begin().expect("a is idle");
        let outcome = a.run_pass(own, Coordinate::new(0.0, 0.0), &Silent).await;
        assert!(matches!(outcome, PassOutcome::Scored { score, .. } if score.value() == 100));
        assert_eq!(a.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn failed_pass_returns_to_idle() {
        let pipeline = Pipeline::new(
            Box::new(Fixed(None)),
            Box::new(Canned(vec![])),
            ScoreCalculator::new(),
        );

        let outcome = pipeline.submit(Coordinate::new(0.0, 0.0), &Silent).await;
        assert_eq!(outcome, PassOutcome::Failed(ErrorKind::NotFound));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn empty_series_fails_the_pass() {
        let pipeline = Pipeline::new(
            Box::new(Fixed(Some(LocalityRef::new("a", "b")))),
            Box::new(Canned(vec![])),
            ScoreCalculator::new(),
        );

        let outcome = pipeline.submit(Coordinate::new(0.0, 0.0), &Silent).await;
        assert_eq!(outcome, PassOutcome::Failed(ErrorKind::EmptySeries));
    }

    #[tokio::test]
    async fn clamping_calculator_is_used() {
        let pipeline = Pipeline::new(
            Box::new(Fixed(Some(LocalityRef::new("a", "b")))),
            Box::new(Canned(vec![HourlyReading::new("130", "-150", "雨")])),
            ScoreCalculator::clamped(),
        );

        match pipeline.submit(Coordinate::new(0.0, 0.0), &Silent).await {
            PassOutcome::Scored { score, .. } => assert_eq!(score.value(), 16),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
