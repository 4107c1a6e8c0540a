use super::joint::JointState;
use crate::AgentId;
use crate::domain::Reward;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::graph::UnGraph;
use std::collections::BTreeSet;
use std::rc::Rc;

/// One coupling between two agents: a reward of scope >= 2, flaggable as
/// conditionally reward-independent.
#[derive(Clone, Debug)]
struct Link {
    reward: usize,
    cri: bool,
}

/// The coordination graph: agents as nodes, one edge per reward of scope
/// >= 2 per scope pair. Edges flagged CRI are treated as absent when
/// computing connected components; flags mutate in lockstep with the search
/// recursion under strict stack discipline.
pub struct Coordination<S: Ord, A: Ord> {
    graph: UnGraph<AgentId, Link>,
    nodes: Vec<NodeIndex>,
    rewards: Vec<Rc<dyn Reward<S, A>>>,
}

impl<S: Clone + Ord, A: Clone + Ord> Coordination<S, A> {
    pub fn new(agents: usize, rewards: &[Rc<dyn Reward<S, A>>]) -> Self {
        let mut graph = UnGraph::new_undirected();
        let nodes = (0..agents)
            .map(|agent| graph.add_node(agent))
            .collect::<Vec<NodeIndex>>();
        for (index, reward) in rewards.iter().enumerate() {
            let scope = reward.scope().iter().copied().collect::<Vec<AgentId>>();
            for (i, a) in scope.iter().enumerate() {
                for b in scope.iter().skip(i + 1) {
                    graph.add_edge(
                        nodes[*a],
                        nodes[*b],
                        Link {
                            reward: index,
                            cri: false,
                        },
                    );
                }
            }
        }
        Self {
            graph,
            nodes,
            rewards: rewards.to_vec(),
        }
    }

    /// Test every not-yet-independent edge among the state's agents and flag
    /// those whose endpoints became independent through the edge's reward.
    /// Returns the newly flagged edges for stack-disciplined restoration.
    pub fn update(&mut self, joint: &JointState<S>) -> Vec<EdgeIndex> {
        let agents = joint.agents();
        let mut flagged = Vec::new();
        for edge in self.graph.edge_indices() {
            let (x, y) = self.graph.edge_endpoints(edge).expect("valid edge");
            let a = *self.graph.node_weight(x).expect("valid node");
            let b = *self.graph.node_weight(y).expect("valid node");
            if !agents.contains(&a) || !agents.contains(&b) {
                continue;
            }
            let link = self.graph.edge_weight(edge).expect("valid edge");
            if link.cri {
                continue;
            }
            if self.rewards[link.reward].cri(a, b, joint) {
                self.graph.edge_weight_mut(edge).expect("valid edge").cri = true;
                flagged.push(edge);
            }
        }
        flagged
    }

    /// Unflag edges recorded by the matching `update` call.
    pub fn restore(&mut self, flagged: Vec<EdgeIndex>) {
        for edge in flagged {
            let link = self.graph.edge_weight_mut(edge).expect("valid edge");
            debug_assert!(link.cri, "restoring an unflagged edge");
            link.cri = false;
        }
    }

    /// Connected components over the given agents, walking only edges not
    /// yet flagged independent.
    pub fn components(&self, agents: &BTreeSet<AgentId>) -> Vec<BTreeSet<AgentId>> {
        let mut components = Vec::new();
        let mut seen = BTreeSet::new();
        for start in agents {
            if seen.contains(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut frontier = vec![*start];
            while let Some(agent) = frontier.pop() {
                if !component.insert(agent) {
                    continue;
                }
                seen.insert(agent);
                for edge in self.graph.edges(self.nodes[agent]) {
                    use petgraph::visit::EdgeRef;
                    if edge.weight().cri {
                        continue;
                    }
                    let neighbor = *self
                        .graph
                        .node_weight(match edge.source() == self.nodes[agent] {
                            true => edge.target(),
                            false => edge.source(),
                        })
                        .expect("valid node");
                    if agents.contains(&neighbor) && !component.contains(&neighbor) {
                        frontier.push(neighbor);
                    }
                }
            }
            components.push(component);
        }
        components
    }
}
