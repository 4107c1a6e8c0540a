use super::transition::Annotated;
use crate::AgentId;
use crate::domain::LocalState;
use crate::domain::Reward;
use crate::error::Result;
use crate::error::SolveError;
use crate::model::bound::Bound;
use petgraph::Direction::Outgoing;
use petgraph::graph::DiGraph;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Per-state cache of the conditional return graph.
#[derive(Clone, Debug)]
pub struct Vertex<S> {
    pub state: LocalState<S>,
    pub terminal: bool,
    pub independent: bool,
    pub bound: Option<Bound>,
}

/// One agent's conditional return graph: local states in an arena keyed by
/// their content, annotated transitions as parallel edges between them.
/// Transitions reference node indices, never pointers. Also holds the
/// rewards the agent owns and the full set of rewards that read it (the
/// latter drives local-independence tests).
pub struct Crg<S: Ord, A: Ord> {
    agent: AgentId,
    graph: DiGraph<Vertex<S>, Annotated<S, A>>,
    index: BTreeMap<LocalState<S>, NodeIndex>,
    root: Option<NodeIndex>,
    assigned: Vec<Rc<dyn Reward<S, A>>>,
    involved: Vec<Rc<dyn Reward<S, A>>>,
}

impl<S, A> Crg<S, A>
where
    S: Clone + Ord + std::fmt::Debug,
    A: Clone + Ord + std::fmt::Debug,
{
    pub fn new(
        agent: AgentId,
        assigned: Vec<Rc<dyn Reward<S, A>>>,
        involved: Vec<Rc<dyn Reward<S, A>>>,
    ) -> Self {
        Self {
            agent,
            graph: DiGraph::new(),
            index: BTreeMap::new(),
            root: None,
            assigned,
            involved,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }
    pub fn root(&self) -> NodeIndex {
        self.root.expect("graph built from its initial state")
    }
    pub fn assigned(&self) -> &[Rc<dyn Reward<S, A>>] {
        &self.assigned
    }
    pub fn involved(&self) -> &[Rc<dyn Reward<S, A>>] {
        &self.involved
    }

    pub fn lookup(&self, state: &LocalState<S>) -> Option<NodeIndex> {
        self.index.get(state).copied()
    }

    /// Arena insertion; the first inserted state becomes the root.
    pub fn insert(&mut self, state: LocalState<S>) -> NodeIndex {
        debug_assert!(state.agent == self.agent);
        debug_assert!(!self.index.contains_key(&state));
        let ix = self.graph.add_node(Vertex {
            state: state.clone(),
            terminal: false,
            independent: false,
            bound: None,
        });
        self.index.insert(state, ix);
        self.root.get_or_insert(ix);
        ix
    }

    pub fn vertex(&self, ix: NodeIndex) -> &Vertex<S> {
        self.graph.node_weight(ix).expect("valid node index")
    }
    pub fn set_terminal(&mut self, ix: NodeIndex) {
        self.graph.node_weight_mut(ix).expect("valid node index").terminal = true;
    }
    pub fn set_independent(&mut self, ix: NodeIndex) {
        self.graph.node_weight_mut(ix).expect("valid node index").independent = true;
    }

    /// Bounds are written exactly once per state.
    pub fn set_bound(&mut self, ix: NodeIndex, bound: Bound) -> Result<()> {
        let vertex = self.graph.node_weight_mut(ix).expect("valid node index");
        match vertex.bound {
            Some(_) => Err(SolveError::Cache(format!(
                "return bound written twice for {:?}",
                vertex.state
            ))),
            None => {
                vertex.bound = Some(bound);
                Ok(())
            }
        }
    }

    /// The stored bound; reading it before it is set is a cache violation.
    pub fn bound(&self, ix: NodeIndex) -> Result<&Bound> {
        let vertex = self.vertex(ix);
        vertex.bound.as_ref().ok_or_else(|| {
            SolveError::Cache(format!("return bound read before set for {:?}", vertex.state))
        })
    }

    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex, annotated: Annotated<S, A>) -> EdgeIndex {
        self.graph.add_edge(from, to, annotated)
    }

    /// Distinct local actions available from this state. Empty at terminal
    /// states; restricted to the retained optimum below independent states.
    pub fn actions(&self, ix: NodeIndex) -> BTreeSet<A> {
        self.graph
            .edges_directed(ix, Outgoing)
            .map(|edge| edge.weight().action.clone())
            .collect()
    }

    /// Distinct successor states under one local action.
    pub fn successors(&self, ix: NodeIndex, action: &A) -> BTreeSet<NodeIndex> {
        self.graph
            .edges_directed(ix, Outgoing)
            .filter(|edge| &edge.weight().action == action)
            .map(|edge| edge.target())
            .collect()
    }

    /// The unique annotated transition matching a joint context: same local
    /// action and successor, dependency collection matching every present
    /// agent's joint action, influence collection matching every present
    /// agent's move, and no explicit annotation on any absent agent.
    pub fn matching(
        &self,
        ix: NodeIndex,
        action: &A,
        to: NodeIndex,
        actions: &BTreeMap<AgentId, A>,
        moves: &BTreeMap<AgentId, (S, S)>,
    ) -> Result<&Annotated<S, A>> {
        let mut found = None;
        for edge in self.graph.edges_directed(ix, Outgoing) {
            if edge.target() != to {
                continue;
            }
            let annotated = edge.weight();
            if &annotated.action != action {
                continue;
            }
            if !compatible(&annotated.depends, actions) {
                continue;
            }
            if !compatible(&annotated.influence, moves) {
                continue;
            }
            debug_assert!(found.is_none(), "ambiguous annotated transition match");
            found = Some(annotated);
        }
        found.ok_or_else(|| {
            SolveError::Adapter(format!(
                "no annotated transition of agent {} matches the joint context for {:?}",
                self.agent, action
            ))
        })
    }

    pub fn states(&self) -> usize {
        self.graph.node_count()
    }
    pub fn transitions(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every arena entry in content order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocalState<S>, NodeIndex)> {
        self.index.iter().map(|(state, ix)| (state, *ix))
    }

    /// Every outgoing annotated transition with its target.
    pub fn outgoing(&self, ix: NodeIndex) -> impl Iterator<Item = (NodeIndex, &Annotated<S, A>)> {
        self.graph
            .edges_directed(ix, Outgoing)
            .map(|edge| (edge.target(), edge.weight()))
    }
}

/// Does the factored collection accept the given per-agent context? Agents
/// present in the context must match where constrained; agents absent from
/// the (decoupled) context must carry no explicit annotation.
fn compatible<T: Ord + Clone>(
    others: &super::others::Others<T>,
    context: &BTreeMap<AgentId, T>,
) -> bool {
    others.agents().iter().all(|g| match context.get(g) {
        Some(item) => others.matches(*g, item),
        None => others.explicit(*g).is_none(),
    })
}

impl<S, A> std::fmt::Display for Crg<S, A>
where
    S: Clone + Ord + std::fmt::Debug,
    A: Clone + Ord + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CRG of agent {}", self.agent)?;
        for (state, ix) in &self.index {
            let vertex = self.vertex(*ix);
            let kind = match (vertex.terminal, vertex.independent) {
                (true, _) => " terminal",
                (_, true) => " independent",
                _ => "",
            };
            let bound = match &vertex.bound {
                Some(bound) => format!("{}", bound),
                None => "unset".to_string(),
            };
            writeln!(f, "  t{} {:?}{} {}", state.time, state.state, kind, bound)?;
            for edge in self.graph.edges_directed(*ix, Outgoing) {
                let to = self.vertex(edge.target());
                writeln!(f, "    -> {:?} via {}", to.state.state, edge.weight())?;
            }
        }
        Ok(())
    }
}
