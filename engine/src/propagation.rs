//! Dependency propagation.
//!
//! After a switch changes to `state`, every switch that lists it in the
//! matching dependency list (`depends_on` for ON, `depends_off` for OFF) is a
//! candidate. A candidate follows only if it is currently in the opposite
//! posture and every switch in its relevant list already agrees with
//! `state`. Following means a full apply: persist, reflect, and propagate
//! again from the candidate.
//!
//! Missing store values read as `false`, so a never-set dependency blocks an
//! ON cascade and counts as agreeing for an OFF cascade.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use toggle_store::StoreError;
use toggle_types::SwitchName;

use crate::engine::EngineInner;
use crate::switch::{SwitchCore, SwitchError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropagationError {
    /// A switch would be driven to a state it already reached in this cascade.
    #[error("dependency cycle detected: {}", format_path(path))]
    Cycle { path: Vec<SwitchName> },
    #[error("cascade exceeded {limit} levels: {}", format_path(path))]
    DepthExceeded {
        limit: usize,
        path: Vec<SwitchName>,
    },
}

impl PropagationError {
    #[must_use]
    pub fn path(&self) -> &[SwitchName] {
        match self {
            Self::Cycle { path } | Self::DepthExceeded { path, .. } => path,
        }
    }
}

fn format_path(path: &[SwitchName]) -> String {
    path.iter()
        .map(SwitchName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[must_use]
pub(crate) fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

/// Bookkeeping for one externally initiated transition and everything it causes.
#[derive(Debug)]
pub(crate) struct Cascade {
    visited: HashSet<(SwitchName, bool)>,
    path: Vec<SwitchName>,
    max_depth: usize,
}

impl Cascade {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            visited: HashSet::new(),
            path: Vec::new(),
            max_depth,
        }
    }

    /// Record that `name` is about to move to `state`.
    pub(crate) fn enter(
        &mut self,
        name: &SwitchName,
        state: bool,
    ) -> Result<(), PropagationError> {
        if !self.visited.insert((name.clone(), state)) {
            return Err(PropagationError::Cycle {
                path: self.path_with(name),
            });
        }
        if self.path.len() > self.max_depth {
            return Err(PropagationError::DepthExceeded {
                limit: self.max_depth,
                path: self.path_with(name),
            });
        }
        self.path.push(name.clone());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    fn path_with(&self, name: &SwitchName) -> Vec<SwitchName> {
        let mut path = self.path.clone();
        path.push(name.clone());
        path
    }
}

/// A dependency vector satisfies `state` when it is non-empty and no entry
/// disagrees with it.
#[must_use]
pub fn satisfied(vector: &[bool], state: bool) -> bool {
    !vector.is_empty() && !vector.contains(&!state)
}

impl EngineInner {
    /// Real transition: persist, update memory, reflect on the host, propagate.
    ///
    /// The store write comes first so a failed write leaves both the persisted
    /// and the in-memory state untouched.
    pub(crate) fn apply<'a>(
        &'a self,
        core: &'a Arc<SwitchCore>,
        state: bool,
        cascade: &'a mut Cascade,
    ) -> BoxFuture<'a, Result<(), SwitchError>> {
        async move {
            let name = core.name();
            cascade.enter(name, state)?;

            diag!(
                core.verbose(),
                switch = %name,
                previous = core.state(),
                "Setting switch to {}",
                on_off(state)
            );

            if let Err(source) = self.store.set(name, state).await {
                cascade.leave();
                return Err(SwitchError::Store {
                    name: name.clone(),
                    source,
                });
            }
            core.set_state(state);
            if let Some(kind) = self.scheduler.cancel(name) {
                tracing::debug!(switch = %name, ?kind, "Cancelled pending resync");
            }
            core.reflect(state);

            let result = self.propagate(name, core.verbose(), state, cascade).await;
            cascade.leave();
            result.map_err(SwitchError::from)
        }
        .boxed()
    }

    /// Evaluate every candidate of `name` changing to `state`.
    ///
    /// Store failures skip the affected candidate; a cycle aborts the rest of
    /// the cascade.
    pub(crate) fn propagate<'a>(
        &'a self,
        name: &'a SwitchName,
        verbose: bool,
        state: bool,
        cascade: &'a mut Cascade,
    ) -> BoxFuture<'a, Result<(), PropagationError>> {
        async move {
            diag!(
                verbose,
                switch = %name,
                "Checking for switches that depend on {name} for \"{}\"",
                on_off(state)
            );

            let candidates = self.registry.candidates(name.as_str(), state);
            if candidates.is_empty() {
                diag!(
                    verbose,
                    switch = %name,
                    "No \"{}\" dependencies",
                    on_off(state)
                );
                return Ok(());
            }
            let dependents = candidates
                .iter()
                .map(|c| c.name().as_str())
                .collect::<Vec<_>>()
                .join(", ");
            diag!(
                verbose,
                switch = %name,
                %dependents,
                "Found dependent switches"
            );

            for candidate in candidates {
                if !self.should_follow(name, &candidate, state).await {
                    continue;
                }
                diag!(
                    candidate.verbose(),
                    switch = %name,
                    candidate = %candidate.name(),
                    "Dependencies satisfied, updating to {}",
                    on_off(state)
                );
                match self.apply(&candidate, state, cascade).await {
                    Ok(()) => {}
                    Err(SwitchError::Store { name: failed, source }) => {
                        tracing::warn!(
                            switch = %name,
                            candidate = %failed,
                            "Skipping dependent after store failure: {source}"
                        );
                    }
                    Err(SwitchError::Propagation(e)) => return Err(e),
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Posture check plus satisfaction rule for one candidate.
    async fn should_follow(
        &self,
        source: &SwitchName,
        candidate: &SwitchCore,
        state: bool,
    ) -> bool {
        let current = match self.store.get(candidate.name()).await {
            Ok(stored) => stored.unwrap_or(false),
            Err(e) => {
                tracing::warn!(
                    switch = %source,
                    candidate = %candidate.name(),
                    "Skipping dependent, cannot read its state: {e}"
                );
                return false;
            }
        };
        diag!(
            candidate.verbose(),
            switch = %source,
            candidate = %candidate.name(),
            current,
            "Dependent state"
        );

        // Only a switch sitting in the opposite posture can follow.
        if current == state {
            return false;
        }
        let deps = candidate.config().dependencies_for(state);

        let vector = match self.dependency_vector(deps).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(
                    switch = %source,
                    candidate = %candidate.name(),
                    "Skipping dependent, cannot read its dependencies: {e}"
                );
                return false;
            }
        };
        diag!(
            candidate.verbose(),
            switch = %source,
            candidate = %candidate.name(),
            dependencies = ?vector,
            "Dependency states"
        );
        satisfied(&vector, state)
    }

    async fn dependency_vector(&self, deps: &[SwitchName]) -> Result<Vec<bool>, StoreError> {
        let mut vector = Vec::with_capacity(deps.len());
        for dep in deps {
            vector.push(self.store.get(dep).await?.unwrap_or(false));
        }
        Ok(vector)
    }
}
