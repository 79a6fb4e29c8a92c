//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{Actor, AggregateId};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStoreExt, Snapshot, Version,
};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// How many times a command is re-evaluated after losing an append race.
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// A request to change one aggregate.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates, runs commands against them and appends the resulting
/// events with the loaded version as the expected version.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, starting from its snapshot when there is one.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let version = snapshot.version;
                let mut restored: A = snapshot.into_state()?;
                restored.set_version(version);
                restored
            }
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command with no recorded actor.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, None, None, command_fn).await
    }

    /// Executes a command on behalf of `actor`, who is recorded in the
    /// metadata of every appended event.
    pub async fn execute_as<F>(
        &self,
        aggregate_id: AggregateId,
        actor: Actor,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, Some(actor), None, command_fn).await
    }

    /// Executes a command only if the aggregate is still at `expected`.
    ///
    /// Used when a decision was made on an earlier read; any write since then
    /// fails with `ConcurrencyConflict` instead of being re-evaluated.
    pub async fn execute_at<F>(
        &self,
        aggregate_id: AggregateId,
        expected: Version,
        actor: Actor,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, Some(actor), Some(expected), command_fn)
            .await
    }

    /// Executes a command, reloading and re-evaluating it when a concurrent
    /// writer appended first.
    ///
    /// The re-evaluation sees the winner's events, so a check such as
    /// "enough points" is made against the fresh balance. Gives up with the
    /// conflict after [`MAX_CONFLICT_RETRIES`] retries.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        actor: Option<Actor>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut retries = 0;
        loop {
            match self.run(aggregate_id, actor, None, &command_fn).await {
                Err(err) if err.is_retryable() && retries < MAX_CONFLICT_RETRIES => {
                    retries += 1;
                    metrics::counter!("command_conflict_retries_total", "aggregate" => A::aggregate_type())
                        .increment(1);
                    tracing::debug!(%aggregate_id, retries, "append conflict, re-evaluating command");
                }
                result => return result,
            }
        }
    }

    async fn run<F>(
        &self,
        aggregate_id: AggregateId,
        actor: Option<Actor>,
        expected: Option<Version>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();
        if let Some(expected) = expected
            && expected != current_version
        {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            }
            .into());
        }

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, actor, &events)?;
        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(current_version))
            .await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        actor: Option<Actor>,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(actor) = actor {
                builder = builder.actor(actor)?;
            }
            envelopes.push(builder.build()?);
        }

        Ok(envelopes)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Saves a snapshot of the command's resulting state when one is due.
    pub async fn snapshot_if_due(
        &self,
        aggregate_id: AggregateId,
        result: &CommandResult<A>,
    ) -> Result<(), DomainError> {
        if result.events.is_empty() || !result.aggregate.should_snapshot() {
            return Ok(());
        }
        let snapshot = Snapshot::from_state(
            aggregate_id,
            A::aggregate_type(),
            result.new_version,
            &result.aggregate,
        )?;
        self.store.save_snapshot(snapshot).await?;
        tracing::debug!(%aggregate_id, version = %result.new_version, "snapshot saved");
        Ok(())
    }
}
