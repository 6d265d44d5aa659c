//! Pipeline execution.
//!
//! Runs one component at a time. After each run the scheduler re-evaluates
//! every component and picks the first ready one in topological order, so
//! the same graph and inputs always produce the same run sequence.

use super::graph::{ComponentNode, Pipeline};
use crate::component::{ComponentInputs, ComponentOutputs, InputSocket};
use crate::core::{ComponentState, EdgeKind};
use crate::errors::{ComponentError, PipelineError, RunawayLoopError};
use crate::events::{
    COMPONENT_COMPLETED, COMPONENT_FAILED, COMPONENT_STARTED, PIPELINE_COMPLETED, PIPELINE_STARTED,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outputs of a pipeline run, keyed by component then socket.
pub type PipelineOutputs = HashMap<String, ComponentOutputs>;

/// Caller-provided values, keyed by component then socket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineInputs {
    values: HashMap<String, HashMap<String, Value>>,
}

impl PipelineInputs {
    /// Creates an empty input set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for `component.socket`.
    #[must_use]
    pub fn with(mut self, component: impl Into<String>, socket: impl Into<String>, value: Value) -> Self {
        self.insert(component, socket, value);
        self
    }

    /// Inserts a value for `component.socket`.
    pub fn insert(&mut self, component: impl Into<String>, socket: impl Into<String>, value: Value) {
        self.values
            .entry(component.into())
            .or_default()
            .insert(socket.into(), value);
    }

    /// Returns the values addressed to `component`.
    #[must_use]
    pub fn component(&self, component: &str) -> Option<&HashMap<String, Value>> {
        self.values.get(component)
    }

    /// Returns true if no values were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.values().all(HashMap::is_empty)
    }
}

impl From<HashMap<String, HashMap<String, Value>>> for PipelineInputs {
    fn from(values: HashMap<String, HashMap<String, Value>>) -> Self {
        Self { values }
    }
}

/// Detailed result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Aggregated outputs.
    pub outputs: PipelineOutputs,
    /// How many times each component ran.
    pub visits: HashMap<String, usize>,
    /// Final state of each component.
    pub states: HashMap<String, ComponentState>,
    /// Component names in the order they ran, one entry per run.
    pub trace: Vec<String>,
}

/// Mutable bookkeeping for one run.
struct RunState {
    /// Values delivered by other components and not yet consumed.
    pending: Vec<HashMap<String, Vec<Value>>>,
    /// Values supplied by the caller. Kept for the whole run, except on
    /// greedy sockets where the first run consumes them.
    user: Vec<HashMap<String, Value>>,
    visits: Vec<usize>,
    fresh: Vec<bool>,
    states: Vec<ComponentState>,
    /// Latest outputs per component, filtered for aggregation.
    outputs: Vec<Option<ComponentOutputs>>,
    trace: Vec<String>,
}

impl RunState {
    fn new(n: usize) -> Self {
        Self {
            pending: vec![HashMap::new(); n],
            user: vec![HashMap::new(); n],
            visits: vec![0; n],
            fresh: vec![false; n],
            states: vec![ComponentState::Waiting; n],
            outputs: vec![None; n],
            trace: Vec::new(),
        }
    }

    fn has_value(&self, i: usize, socket: &str) -> bool {
        self.pending[i].get(socket).is_some_and(|v| !v.is_empty()) || self.user[i].contains_key(socket)
    }

    /// Never run, or received component output since the last run.
    fn has_work(&self, i: usize) -> bool {
        self.visits[i] == 0 || self.fresh[i]
    }

    fn mandatory_satisfied(&self, i: usize, node: &ComponentNode) -> bool {
        node.inputs
            .iter()
            .filter(|s| s.is_mandatory())
            .all(|s| self.has_value(i, &s.name))
    }

    fn runnable(&self, i: usize, node: &ComponentNode) -> bool {
        self.has_work(i) && self.mandatory_satisfied(i, node)
    }
}

impl Pipeline {
    /// Warms up every component in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first warm-up failure.
    pub async fn warm_up(&self) -> Result<(), PipelineError> {
        for node in &self.nodes {
            node.instance
                .warm_up()
                .await
                .map_err(|source| PipelineError::ComponentFailed {
                    component: node.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Runs the pipeline and returns the outputs nobody consumed.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid inputs, a failing component, or a
    /// component that exceeds `max_runs_per_component`.
    pub async fn run(&self, inputs: PipelineInputs) -> Result<PipelineOutputs, PipelineError> {
        Ok(self.run_with_report(inputs, &[]).await?.outputs)
    }

    /// Runs the pipeline, additionally returning every output of the
    /// components named in `include_outputs_from`.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub async fn run_including(
        &self,
        inputs: PipelineInputs,
        include_outputs_from: &[&str],
    ) -> Result<PipelineOutputs, PipelineError> {
        Ok(self.run_with_report(inputs, include_outputs_from).await?.outputs)
    }

    /// Runs the pipeline and returns a detailed report.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub async fn run_with_report(
        &self,
        inputs: PipelineInputs,
        include_outputs_from: &[&str],
    ) -> Result<PipelineRunResult, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline.run", run_id = %run_id, components = self.nodes.len());
        self.execute(run_id, inputs, include_outputs_from)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        inputs: PipelineInputs,
        include_outputs_from: &[&str],
    ) -> Result<PipelineRunResult, PipelineError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut state = RunState::new(self.nodes.len());
        self.seed_inputs(&mut state, inputs)?;
        let include = self.resolve_includes(include_outputs_from)?;

        if self.settings.warm_up_on_run {
            self.warm_up().await?;
        }

        self.event_sink
            .emit(
                PIPELINE_STARTED,
                Some(json!({"run_id": run_id.to_string(), "components": self.component_names()})),
            )
            .await;
        info!(components = self.nodes.len(), "Pipeline run started");

        while let Some(i) = self.next_component(&mut state) {
            let node = &self.nodes[i];
            if state.visits[i] >= self.settings.max_runs_per_component {
                let err = RunawayLoopError::new(&node.name, state.visits[i], self.settings.max_runs_per_component);
                warn!(component = %node.name, visits = state.visits[i], "Runaway loop detected");
                self.emit_failure(run_id, &node.name, &err.to_string()).await;
                return Err(err.into());
            }

            let component_inputs = Self::collect_inputs(&mut state, i, node);
            state.states[i] = ComponentState::Running;
            state.visits[i] += 1;
            state.trace.push(node.name.clone());

            self.event_sink
                .emit(
                    COMPONENT_STARTED,
                    Some(json!({
                        "run_id": run_id.to_string(),
                        "component": node.name,
                        "visit": state.visits[i],
                    })),
                )
                .await;
            debug!(component = %node.name, visit = state.visits[i], "Running component");

            let component_start = Instant::now();
            let outputs = match node.instance.run(component_inputs).await {
                Ok(outputs) => outputs,
                Err(source) => {
                    warn!(component = %node.name, error = %source, "Component failed");
                    self.emit_failure(run_id, &node.name, &source.to_string()).await;
                    return Err(PipelineError::ComponentFailed {
                        component: node.name.clone(),
                        source,
                    });
                }
            };
            let elapsed_ms = component_start.elapsed().as_secs_f64() * 1000.0;

            if let Some(undeclared) = outputs.keys().find(|k| node.output(k).is_none()) {
                let source = ComponentError::UndeclaredOutput(undeclared.clone());
                self.emit_failure(run_id, &node.name, &source.to_string()).await;
                return Err(PipelineError::ComponentFailed {
                    component: node.name.clone(),
                    source,
                });
            }

            state.states[i] = ComponentState::Completed;
            self.event_sink
                .emit(
                    COMPONENT_COMPLETED,
                    Some(json!({
                        "run_id": run_id.to_string(),
                        "component": node.name,
                        "visit": state.visits[i],
                        "duration_ms": elapsed_ms,
                        "outputs": outputs.keys().collect::<Vec<_>>(),
                    })),
                )
                .await;
            debug!(
                component = %node.name,
                duration_ms = elapsed_ms,
                outputs = outputs.len(),
                "Component completed"
            );

            self.distribute(&mut state, i, &outputs);
            state.outputs[i] = Some(self.aggregate(i, outputs, include.contains(&i)));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if state.states[i] == ComponentState::Waiting {
                debug!(component = %node.name, "Component never became ready");
            }
        }

        let outputs: PipelineOutputs = self
            .nodes
            .iter()
            .zip(state.outputs)
            .filter_map(|(node, outputs)| outputs.filter(|o| !o.is_empty()).map(|o| (node.name.clone(), o)))
            .collect();
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.event_sink
            .emit(
                PIPELINE_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "duration_ms": duration_ms,
                    "runs": state.trace.len(),
                })),
            )
            .await;
        info!(duration_ms, runs = state.trace.len(), "Pipeline run completed");

        let names = || self.nodes.iter().map(|n| n.name.clone());
        Ok(PipelineRunResult {
            run_id,
            started_at,
            duration_ms,
            outputs,
            visits: names().zip(state.visits).collect(),
            states: names().zip(state.states).collect(),
            trace: state.trace,
        })
    }

    async fn emit_failure(&self, run_id: Uuid, component: &str, error: &str) {
        self.event_sink
            .emit(
                COMPONENT_FAILED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "component": component,
                    "error": error,
                })),
            )
            .await;
    }

    /// Validates caller inputs and stores them in the run state.
    fn seed_inputs(&self, state: &mut RunState, inputs: PipelineInputs) -> Result<(), PipelineError> {
        for (component, values) in inputs.values {
            let i = self.index_of(&component).ok_or_else(|| {
                PipelineError::invalid_input(&component, "no component with this name in the pipeline")
            })?;
            let node = &self.nodes[i];
            for (socket, value) in values {
                let Some(input) = node.input(&socket) else {
                    return Err(PipelineError::invalid_input(
                        &component,
                        format!("'{socket}' is not an input socket of this component"),
                    ));
                };
                if !input.is_variadic() {
                    if let Some(existing) = self.senders_of(&component, &socket).first() {
                        return Err(PipelineError::invalid_input(
                            &component,
                            format!("'{socket}' already receives from '{}'", existing.sender_path()),
                        ));
                    }
                }
                state.user[i].insert(socket, value);
            }
        }
        Ok(())
    }

    fn resolve_includes(&self, names: &[&str]) -> Result<HashSet<usize>, PipelineError> {
        names
            .iter()
            .map(|name| {
                self.index_of(name).ok_or_else(|| {
                    PipelineError::invalid_input(*name, "cannot include outputs of an unknown component")
                })
            })
            .collect()
    }

    /// Picks the next component to run, updating Waiting/Ready states.
    fn next_component(&self, state: &mut RunState) -> Option<usize> {
        let mut first_ready = None;
        let mut first_runnable = None;

        for &i in &self.order {
            let node = &self.nodes[i];
            if !state.runnable(i, node) {
                if state.visits[i] == 0 {
                    state.states[i] = ComponentState::Waiting;
                }
                continue;
            }
            first_runnable.get_or_insert(i);

            if Self::greedy_satisfied(state, i, node) || !self.blocked(state, i) {
                state.states[i] = ComponentState::Ready;
                first_ready.get_or_insert(i);
            } else {
                state.states[i] = ComponentState::Waiting;
            }
        }

        if first_ready.is_none() {
            if let Some(i) = first_runnable {
                debug!(component = %self.nodes[i].name, "No unblocked component; running first runnable one");
            }
        }
        first_ready.or(first_runnable)
    }

    /// True if some greedy variadic socket already holds a value.
    fn greedy_satisfied(state: &RunState, i: usize, node: &ComponentNode) -> bool {
        node.inputs
            .iter()
            .filter(|s| s.is_greedy())
            .any(|s| state.has_value(i, &s.name))
    }

    /// True if a forward-edge sender of `i` may still produce output.
    fn blocked(&self, state: &RunState, i: usize) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        visited[i] = true;
        let name = &self.nodes[i].name;
        self.connections
            .iter()
            .filter(|c| c.kind == EdgeKind::Forward && &c.receiver == name)
            .filter_map(|c| self.index_of(&c.sender))
            .any(|sender| self.may_run(state, sender, &mut visited))
    }

    /// True if `i` can run now or after some upstream component runs.
    fn may_run(&self, state: &RunState, i: usize, visited: &mut [bool]) -> bool {
        if visited[i] {
            return false;
        }
        visited[i] = true;

        if state.runnable(i, &self.nodes[i]) {
            return true;
        }
        let name = &self.nodes[i].name;
        let senders: Vec<usize> = self
            .connections
            .iter()
            .filter(|c| &c.receiver == name)
            .filter_map(|c| self.index_of(&c.sender))
            .collect();
        senders.into_iter().any(|s| self.may_run(state, s, visited))
    }

    /// Builds the inputs of `i` and consumes its delivered values, plus
    /// caller values on greedy sockets.
    fn collect_inputs(state: &mut RunState, i: usize, node: &ComponentNode) -> ComponentInputs {
        let mut delivered = std::mem::take(&mut state.pending[i]);
        state.fresh[i] = false;

        let mut inputs = ComponentInputs::new();
        for socket in &node.inputs {
            let user = if socket.is_greedy() {
                state.user[i].remove(&socket.name)
            } else {
                state.user[i].get(&socket.name).cloned()
            };
            let received = delivered.remove(&socket.name).unwrap_or_default();
            if let Some(value) = resolve_input(socket, user.as_ref(), received) {
                inputs.insert(socket.name.clone(), value);
            }
        }
        inputs
    }

    /// Deposits outputs into receivers, in declared output order then
    /// connection order.
    fn distribute(&self, state: &mut RunState, i: usize, outputs: &ComponentOutputs) {
        let node = &self.nodes[i];
        for socket in &node.outputs {
            let Some(value) = outputs.get(&socket.name) else {
                continue;
            };
            for connection in self
                .connections
                .iter()
                .filter(|c| c.sender == node.name && c.sender_socket == socket.name)
            {
                let Some(r) = self.index_of(&connection.receiver) else {
                    continue;
                };
                let variadic = self.nodes[r]
                    .input(&connection.receiver_socket)
                    .is_some_and(InputSocket::is_variadic);
                let slot = state.pending[r]
                    .entry(connection.receiver_socket.clone())
                    .or_default();
                if !variadic && !slot.is_empty() {
                    warn!(
                        receiver = %connection.receiver_path(),
                        "Overwriting an input value that was never consumed"
                    );
                    slot.clear();
                }
                slot.push(value.clone());
                state.fresh[r] = true;
            }
        }
    }

    /// Keeps outputs without receivers, or all of them when `include_all`.
    fn aggregate(&self, i: usize, outputs: ComponentOutputs, include_all: bool) -> ComponentOutputs {
        if include_all {
            return outputs;
        }
        let name = &self.nodes[i].name;
        outputs
            .into_iter()
            .filter(|(socket, _)| !self.has_receivers(name, socket))
            .collect()
    }
}

/// Resolves the value of one input socket for a run.
fn resolve_input(socket: &InputSocket, user: Option<&Value>, received: Vec<Value>) -> Option<Value> {
    if socket.is_variadic() {
        if user.is_none() && received.is_empty() {
            return socket.default.clone();
        }
        let values: Vec<Value> = user.cloned().into_iter().chain(received).collect();
        return Some(Value::Array(values));
    }
    received
        .into_iter()
        .last()
        .or_else(|| user.cloned())
        .or_else(|| socket.default.clone())
}
