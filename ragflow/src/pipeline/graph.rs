//! The component graph.
//!
//! [`Pipeline`] owns named component instances and the typed connections
//! between their sockets. Every structural change re-derives the edge
//! classification (forward or loop) and the topological order the scheduler
//! uses, so the graph is always valid between calls.

use super::settings::PipelineSettings;
use crate::component::{Component, InputSocket, OutputSocket};
use crate::core::EdgeKind;
use crate::errors::ConnectionError;
use crate::events::{EventSink, NoOpEventSink};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A connection between an output socket and an input socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Sending component.
    pub sender: String,
    /// Output socket on the sender.
    pub sender_socket: String,
    /// Receiving component.
    pub receiver: String,
    /// Input socket on the receiver.
    pub receiver_socket: String,
    /// Whether the edge closes a loop.
    pub kind: EdgeKind,
}

impl Connection {
    /// `"sender.socket"`.
    #[must_use]
    pub fn sender_path(&self) -> String {
        format!("{}.{}", self.sender, self.sender_socket)
    }

    /// `"receiver.socket"`.
    #[must_use]
    pub fn receiver_path(&self) -> String {
        format!("{}.{}", self.receiver, self.receiver_socket)
    }

    /// Returns true for loop edges.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        self.kind == EdgeKind::Loop
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sender_path(), self.receiver_path())
    }
}

/// A registered component with its sockets captured at registration time.
#[derive(Debug, Clone)]
pub(crate) struct ComponentNode {
    pub(crate) name: String,
    pub(crate) instance: Arc<dyn Component>,
    pub(crate) inputs: Vec<InputSocket>,
    pub(crate) outputs: Vec<OutputSocket>,
}

impl ComponentNode {
    pub(crate) fn input(&self, socket: &str) -> Option<&InputSocket> {
        self.inputs.iter().find(|s| s.name == socket)
    }

    pub(crate) fn output(&self, socket: &str) -> Option<&OutputSocket> {
        self.outputs.iter().find(|s| s.name == socket)
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|s| s.name.clone()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|s| s.name.clone()).collect()
    }
}

/// A graph of components connected through typed sockets.
pub struct Pipeline {
    pub(crate) nodes: Vec<ComponentNode>,
    index: HashMap<String, usize>,
    pub(crate) connections: Vec<Connection>,
    /// Node indices in topological order of the forward edges.
    pub(crate) order: Vec<usize>,
    pub(crate) settings: PipelineSettings,
    pub(crate) event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("components", &self.component_names())
            .field("connections", &self.connections)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Creates an empty pipeline with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    /// Creates an empty pipeline.
    #[must_use]
    pub fn with_settings(settings: PipelineSettings) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            order: Vec::new(),
            settings,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink receiving run events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Replaces the sink receiving run events.
    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.event_sink = sink;
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns the settings for modification.
    pub fn settings_mut(&mut self) -> &mut PipelineSettings {
        &mut self.settings
    }

    /// Adds a component under a unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains a `.`, or is taken.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        instance: Arc<dyn Component>,
    ) -> Result<(), ConnectionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConnectionError::invalid_component_name(&name, "names cannot be empty"));
        }
        if name.contains('.') {
            return Err(ConnectionError::invalid_component_name(
                &name,
                "names cannot contain '.', which separates component and socket",
            ));
        }
        if self.index.contains_key(&name) {
            return Err(ConnectionError::duplicate_component(&name));
        }

        let node = ComponentNode {
            inputs: instance.input_sockets(),
            outputs: instance.output_sockets(),
            name: name.clone(),
            instance,
        };
        debug!(
            component = %name,
            component_type = %node.instance.type_name(),
            inputs = node.inputs.len(),
            outputs = node.outputs.len(),
            "Added component"
        );

        self.index.insert(name, self.nodes.len());
        self.nodes.push(node);
        self.refresh_topology();
        Ok(())
    }

    /// Connects an output socket to an input socket.
    ///
    /// Paths have the form `"component.socket"`. The socket part may be left
    /// out on either side when exactly one compatible socket pair exists.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown components or sockets, incompatible
    /// types, a second sender into a non-variadic input, an ambiguous socket
    /// pair, or a cycle that cannot run. The graph is unchanged on error.
    pub fn connect(&mut self, sender: &str, receiver: &str) -> Result<(), ConnectionError> {
        let result = self.try_connect(sender, receiver);
        if let Err(err) = &result {
            warn!(
                sender,
                receiver,
                code = err.code().unwrap_or_default(),
                suggestion = err.suggestion().unwrap_or_default(),
                "Rejected connection: {err}"
            );
        }
        result
    }

    fn try_connect(&mut self, sender: &str, receiver: &str) -> Result<(), ConnectionError> {
        let (sender_name, sender_socket) = split_path(sender);
        let (receiver_name, receiver_socket) = split_path(receiver);

        let sender_idx = self.node_index(sender_name)?;
        let receiver_idx = self.node_index(receiver_name)?;

        let (out_socket, in_socket) =
            self.resolve_sockets(sender_idx, sender_socket, receiver_idx, receiver_socket)?;

        let connection = Connection {
            sender: sender_name.to_string(),
            sender_socket: out_socket,
            receiver: receiver_name.to_string(),
            receiver_socket: in_socket,
            kind: EdgeKind::Forward,
        };
        self.check_duplicate(receiver_idx, &connection)?;

        self.connections.push(connection);
        self.refresh_topology();

        if let Err(err) = self.check_cycles() {
            self.connections.pop();
            self.refresh_topology();
            return Err(err);
        }

        if let Some(added) = self.connections.last() {
            info!(
                sender = %added.sender_path(),
                receiver = %added.receiver_path(),
                kind = %added.kind,
                "Connected components"
            );
        }
        Ok(())
    }

    /// Returns the component registered under `name`.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Arc<dyn Component>> {
        self.index.get(name).map(|&i| &self.nodes[i].instance)
    }

    /// Component names in registration order.
    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the pipeline has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Connections in insertion order.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections classified as loop edges.
    #[must_use]
    pub fn loop_connections(&self) -> Vec<&Connection> {
        self.connections.iter().filter(|c| c.is_loop()).collect()
    }

    /// Component names in the order the scheduler prefers them.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.nodes[i].name.as_str()).collect()
    }

    /// Input sockets that no connection feeds, per component.
    ///
    /// These are the sockets a caller can fill through `run`, plus variadic
    /// sockets which accept caller values alongside connections.
    #[must_use]
    pub fn inputs(&self) -> HashMap<String, Vec<InputSocket>> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let open: Vec<InputSocket> = node
                    .inputs
                    .iter()
                    .filter(|s| s.is_variadic() || self.senders_of(&node.name, &s.name).is_empty())
                    .cloned()
                    .collect();
                (!open.is_empty()).then(|| (node.name.clone(), open))
            })
            .collect()
    }

    /// Output sockets with no receivers, per component.
    #[must_use]
    pub fn outputs(&self) -> HashMap<String, Vec<OutputSocket>> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let open: Vec<OutputSocket> = node
                    .outputs
                    .iter()
                    .filter(|s| !self.has_receivers(&node.name, &s.name))
                    .cloned()
                    .collect();
                (!open.is_empty()).then(|| (node.name.clone(), open))
            })
            .collect()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn senders_of(&self, receiver: &str, socket: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.receiver == receiver && c.receiver_socket == socket)
            .collect()
    }

    pub(crate) fn has_receivers(&self, sender: &str, socket: &str) -> bool {
        self.connections
            .iter()
            .any(|c| c.sender == sender && c.sender_socket == socket)
    }

    fn node_index(&self, name: &str) -> Result<usize, ConnectionError> {
        self.index_of(name).ok_or_else(|| {
            let available: Vec<String> = self.nodes.iter().map(|n| n.name.clone()).collect();
            ConnectionError::unknown_component(name, &available)
        })
    }

    fn resolve_sockets(
        &self,
        sender_idx: usize,
        sender_socket: Option<&str>,
        receiver_idx: usize,
        receiver_socket: Option<&str>,
    ) -> Result<(String, String), ConnectionError> {
        let sender = &self.nodes[sender_idx];
        let receiver = &self.nodes[receiver_idx];

        let explicit_out = sender_socket
            .map(|socket| {
                sender.output(socket).ok_or_else(|| {
                    ConnectionError::unknown_socket(&sender.name, socket, "output", &sender.output_names())
                })
            })
            .transpose()?;
        let explicit_in = receiver_socket
            .map(|socket| {
                receiver.input(socket).ok_or_else(|| {
                    ConnectionError::unknown_socket(&receiver.name, socket, "input", &receiver.input_names())
                })
            })
            .transpose()?;

        if let (Some(out), Some(input)) = (explicit_out, explicit_in) {
            if !out.socket_type.is_compatible_with(&input.socket_type) {
                return Err(ConnectionError::type_mismatch(
                    &format!("{}.{}", sender.name, out.name),
                    &out.socket_type.to_string(),
                    &format!("{}.{}", receiver.name, input.name),
                    &input.socket_type.to_string(),
                ));
            }
            return Ok((out.name.clone(), input.name.clone()));
        }

        let outputs: Vec<&OutputSocket> = sender
            .outputs
            .iter()
            .filter(|s| sender_socket.map_or(true, |name| s.name == name))
            .collect();
        let inputs: Vec<&InputSocket> = receiver
            .inputs
            .iter()
            .filter(|s| receiver_socket.map_or(true, |name| s.name == name))
            .filter(|s| s.is_variadic() || self.senders_of(&receiver.name, &s.name).is_empty())
            .collect();

        let candidates: Vec<(&OutputSocket, &InputSocket)> = outputs
            .iter()
            .flat_map(|out| inputs.iter().map(move |input| (*out, *input)))
            .filter(|(out, input)| out.socket_type.is_compatible_with(&input.socket_type))
            .collect();

        match candidates.as_slice() {
            [(out, input)] => Ok((out.name.clone(), input.name.clone())),
            [] => {
                if let ([out], [input]) = (outputs.as_slice(), inputs.as_slice()) {
                    return Err(ConnectionError::type_mismatch(
                        &format!("{}.{}", sender.name, out.name),
                        &out.socket_type.to_string(),
                        &format!("{}.{}", receiver.name, input.name),
                        &input.socket_type.to_string(),
                    ));
                }
                Err(ConnectionError::ambiguous_connection(&sender.name, &receiver.name, &[]))
            }
            many => {
                let pairs: Vec<String> = many
                    .iter()
                    .map(|(out, input)| {
                        format!("{}.{} -> {}.{}", sender.name, out.name, receiver.name, input.name)
                    })
                    .collect();
                Err(ConnectionError::ambiguous_connection(&sender.name, &receiver.name, &pairs))
            }
        }
    }

    fn check_duplicate(&self, receiver_idx: usize, connection: &Connection) -> Result<(), ConnectionError> {
        if self.connections.iter().any(|c| {
            c.sender == connection.sender
                && c.sender_socket == connection.sender_socket
                && c.receiver == connection.receiver
                && c.receiver_socket == connection.receiver_socket
        }) {
            return Err(ConnectionError::duplicate_connection(
                &connection.receiver_path(),
                &connection.sender_path(),
            ));
        }

        let variadic = self.nodes[receiver_idx]
            .input(&connection.receiver_socket)
            .is_some_and(InputSocket::is_variadic);
        if !variadic {
            if let Some(existing) = self
                .senders_of(&connection.receiver, &connection.receiver_socket)
                .first()
            {
                return Err(ConnectionError::duplicate_connection(
                    &connection.receiver_path(),
                    &existing.sender_path(),
                ));
            }
        }
        Ok(())
    }

    /// Reclassifies edges and recomputes the scheduling order.
    ///
    /// A depth-first walk from each component in registration order, following
    /// edges in insertion order, marks every edge that reaches a component on
    /// the current path as a loop edge. The remaining forward edges form a DAG.
    fn refresh_topology(&mut self) {
        let n = self.nodes.len();
        let mut outgoing: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for (edge, c) in self.connections.iter().enumerate() {
            if let (Some(s), Some(r)) = (self.index_of(&c.sender), self.index_of(&c.receiver)) {
                outgoing[s].push((edge, r));
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::New; n];
        let mut kinds = vec![EdgeKind::Forward; self.connections.len()];

        for root in 0..n {
            if marks[root] != Mark::New {
                continue;
            }
            marks[root] = Mark::OnPath;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if let Some(&(edge, target)) = outgoing[node].get(top.1) {
                    top.1 += 1;
                    match marks[target] {
                        Mark::OnPath => kinds[edge] = EdgeKind::Loop,
                        Mark::New => {
                            marks[target] = Mark::OnPath;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        for (connection, kind) in self.connections.iter_mut().zip(kinds) {
            if connection.kind != kind && kind == EdgeKind::Loop {
                debug!(connection = %connection, "Classified connection as loop edge");
            }
            connection.kind = kind;
        }

        self.order = self.topological_order();
    }

    /// Kahn's algorithm over forward edges, preferring the earliest registered
    /// component among those with no remaining predecessors.
    fn topological_order(&self) -> Vec<usize> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for c in self.connections.iter().filter(|c| !c.is_loop()) {
            if let (Some(s), Some(r)) = (self.index_of(&c.sender), self.index_of(&c.receiver)) {
                in_degree[r] += 1;
                successors[s].push(r);
            }
        }

        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let Some(next) = (0..n).find(|&i| !placed[i] && in_degree[i] == 0) else {
                break;
            };
            placed[next] = true;
            order.push(next);
            for &succ in &successors[next] {
                in_degree[succ] -= 1;
            }
        }
        order
    }

    /// Rejects strongly connected components that contain a member with only
    /// mandatory inputs: such a member can never run before its loop input
    /// has arrived.
    fn check_cycles(&self) -> Result<(), ConnectionError> {
        for scc in self.strongly_connected_components() {
            let is_cycle = scc.len() > 1
                || self.connections.iter().any(|c| c.sender == self.nodes[scc[0]].name && c.receiver == c.sender);
            if !is_cycle {
                continue;
            }

            let blocking: Vec<String> = scc
                .iter()
                .map(|&i| &self.nodes[i])
                .filter(|node| node.inputs.iter().all(InputSocket::is_mandatory))
                .map(|node| node.name.clone())
                .collect();
            if !blocking.is_empty() {
                let mut cycle: Vec<usize> = scc.clone();
                cycle.sort_unstable();
                let names = cycle.iter().map(|&i| self.nodes[i].name.clone()).collect();
                return Err(ConnectionError::illegal_cycle(names, &blocking));
            }
        }
        Ok(())
    }

    /// Tarjan's algorithm over all edges.
    fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        struct Tarjan<'a> {
            successors: &'a [Vec<usize>],
            index: Vec<Option<usize>>,
            low: Vec<usize>,
            on_stack: Vec<bool>,
            stack: Vec<usize>,
            counter: usize,
            result: Vec<Vec<usize>>,
        }

        impl Tarjan<'_> {
            fn visit(&mut self, v: usize) {
                self.index[v] = Some(self.counter);
                self.low[v] = self.counter;
                self.counter += 1;
                self.stack.push(v);
                self.on_stack[v] = true;

                let successors = self.successors;
                for &w in &successors[v] {
                    match self.index[w] {
                        None => {
                            self.visit(w);
                            self.low[v] = self.low[v].min(self.low[w]);
                        }
                        Some(w_index) if self.on_stack[w] => {
                            self.low[v] = self.low[v].min(w_index);
                        }
                        Some(_) => {}
                    }
                }

                if Some(self.low[v]) == self.index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = self.stack.pop() {
                        self.on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    self.result.push(component);
                }
            }
        }

        let n = self.nodes.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for c in &self.connections {
            if let (Some(s), Some(r)) = (self.index_of(&c.sender), self.index_of(&c.receiver)) {
                successors[s].push(r);
            }
        }

        let mut tarjan = Tarjan {
            successors: &successors,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            counter: 0,
            result: Vec::new(),
        };
        for v in 0..n {
            if tarjan.index[v].is_none() {
                tarjan.visit(v);
            }
        }
        tarjan.result
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((component, socket)) => (component, Some(socket)),
        None => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{AddFixedValue, Double, FirstOf, Hello, SumComponent, Threshold};
    use pretty_assertions::assert_eq;

    fn add(n: i64) -> Arc<dyn Component> {
        Arc::new(AddFixedValue::new(n))
    }

    #[test]
    fn test_add_component_rejects_bad_names() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", add(1)).unwrap();

        let dup = pipeline.add_component("a", add(2)).unwrap_err();
        assert_eq!(dup.code(), Some("PIPELINE-005-DUPLICATE_COMPONENT"));

        assert!(pipeline.add_component("", add(1)).is_err());
        let dotted = pipeline.add_component("a.b", add(1)).unwrap_err();
        assert_eq!(dotted.code(), Some("PIPELINE-005-INVALID_NAME"));
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_connect_explicit_sockets() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("first", add(1)).unwrap();
        pipeline.add_component("second", add(2)).unwrap();

        pipeline.connect("first.result", "second.value").unwrap();

        let conn = &pipeline.connections()[0];
        assert_eq!(conn.to_string(), "first.result -> second.value");
        assert_eq!(conn.kind, EdgeKind::Forward);
        assert_eq!(pipeline.execution_order(), vec!["first", "second"]);
    }

    #[test]
    fn test_connect_infers_sockets() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("double", Arc::new(Double)).unwrap();
        pipeline.add_component("add", add(1)).unwrap();

        // Double.value (int) fits add.value and add.add; the latter is Optional[int].
        let err = pipeline.connect("double", "add").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-002-AMBIGUOUS_CONNECTION"));

        pipeline.connect("double", "add.value").unwrap();
        assert_eq!(pipeline.connections()[0].receiver_socket, "value");
    }

    #[test]
    fn test_unknown_component_and_socket() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", add(1)).unwrap();

        let err = pipeline.connect("a.result", "missing.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-001-UNKNOWN_COMPONENT"));

        pipeline.add_component("b", add(1)).unwrap();
        let err = pipeline.connect("a.nope", "b.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-001-UNKNOWN_SOCKET"));
        assert!(err.to_string().contains("result"));

        let err = pipeline.connect("a.result", "b.nope").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-001-UNKNOWN_SOCKET"));
        assert!(pipeline.connections().is_empty());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("hello", Arc::new(Hello)).unwrap();
        pipeline.add_component("add", add(1)).unwrap();

        let err = pipeline.connect("hello.greeting", "add.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-002-TYPE_MISMATCH"));
        assert!(err.to_string().contains("str"));
        assert!(err.to_string().contains("int"));
    }

    #[test]
    fn test_second_sender_into_single_input_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", add(1)).unwrap();
        pipeline.add_component("b", add(1)).unwrap();
        pipeline.add_component("c", add(1)).unwrap();
        pipeline.connect("a.result", "c.value").unwrap();

        let err = pipeline.connect("b.result", "c.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-003-DUPLICATE_CONNECTION"));
        assert!(err.to_string().contains("a.result"));
    }

    #[test]
    fn test_variadic_accepts_many_senders_but_not_the_same_edge_twice() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", add(1)).unwrap();
        pipeline.add_component("b", add(1)).unwrap();
        pipeline.add_component("sum", Arc::new(SumComponent)).unwrap();

        pipeline.connect("a.result", "sum.values").unwrap();
        pipeline.connect("b.result", "sum.values").unwrap();
        assert_eq!(pipeline.connections().len(), 2);

        let err = pipeline.connect("a.result", "sum.values").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-003-DUPLICATE_CONNECTION"));
    }

    #[test]
    fn test_loop_edge_classified() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("first_of", Arc::new(FirstOf)).unwrap();
        pipeline.add_component("add", add(1)).unwrap();
        pipeline.add_component("threshold", Arc::new(Threshold::new(5))).unwrap();

        pipeline.connect("first_of.value", "add.value").unwrap();
        pipeline.connect("add.result", "threshold.value").unwrap();
        pipeline.connect("threshold.below", "first_of.feedback").unwrap();

        let loops = pipeline.loop_connections();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].to_string(), "threshold.below -> first_of.feedback");
        assert_eq!(pipeline.execution_order(), vec!["first_of", "add", "threshold"]);
    }

    #[test]
    fn test_cycle_of_mandatory_inputs_rolled_back() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("double", Arc::new(Double)).unwrap();
        pipeline.add_component("again", Arc::new(Double)).unwrap();
        pipeline.connect("double.value", "again.value").unwrap();

        let err = pipeline.connect("again.value", "double.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-004-CYCLE"));
        assert_eq!(pipeline.connections().len(), 1);
        assert!(pipeline.loop_connections().is_empty());
    }

    #[test]
    fn test_self_loop_needs_optional_input() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("double", Arc::new(Double)).unwrap();
        let err = pipeline.connect("double.value", "double.value").unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-004-CYCLE"));

        pipeline.add_component("first_of", Arc::new(FirstOf)).unwrap();
        pipeline.connect("first_of.value", "first_of.feedback").unwrap();
        assert_eq!(pipeline.loop_connections().len(), 1);
    }

    #[test]
    fn test_open_inputs_and_outputs() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", add(1)).unwrap();
        pipeline.add_component("b", add(2)).unwrap();
        pipeline.connect("a.result", "b.value").unwrap();

        let inputs = pipeline.inputs();
        let a_inputs: Vec<&str> = inputs["a"].iter().map(|s| s.name.as_str()).collect();
        let b_inputs: Vec<&str> = inputs["b"].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(a_inputs, vec!["value", "add"]);
        assert_eq!(b_inputs, vec!["add"]);

        let outputs = pipeline.outputs();
        assert!(!outputs.contains_key("a"));
        assert_eq!(outputs["b"][0].name, "result");
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("z", add(1)).unwrap();
        pipeline.add_component("y", add(1)).unwrap();
        pipeline.add_component("x", add(1)).unwrap();
        pipeline.connect("x.result", "z.value").unwrap();

        assert_eq!(pipeline.execution_order(), vec!["y", "x", "z"]);
    }
}
