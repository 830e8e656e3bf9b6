use crate::conflicts::Score;
use crate::model::EventId;
use crate::timetable::{Placement, Timetable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// The decision that created a node: one lecture in one room and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub event: EventId,
    pub placement: Placement,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Number of committed assignments from the root to this node.
    pub depth: usize,
    pub visits: u32,
    pub score_hard: f64,
    pub score_soft: f64,
    /// Lowest penalties of any rollout run from this node.
    pub best_hard_penalty: Option<u32>,
    pub best_soft_penalty: Option<u32>,
    /// Number of distinct children this node can have; zero marks a dead branch.
    pub expansion_limit: usize,
    pub assignment: Option<Assignment>,
}

impl Node {
    fn new(parent: Option<NodeId>, depth: usize, expansion_limit: usize, assignment: Option<Assignment>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            depth,
            visits: 0,
            score_hard: 0.0,
            score_soft: 0.0,
            best_hard_penalty: None,
            best_soft_penalty: None,
            expansion_limit,
            assignment,
        }
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.expansion_limit == 0 || self.children.len() == self.expansion_limit
    }

    pub fn is_terminal(&self, total_events: usize) -> bool {
        self.expansion_limit == 0 || self.depth == total_events
    }

    pub fn is_dead(&self) -> bool {
        self.expansion_limit == 0
    }

    pub fn mark_dead(&mut self) {
        self.expansion_limit = 0;
    }

    pub fn record_hard(&mut self, hard: u32) {
        self.best_hard_penalty = Some(self.best_hard_penalty.map_or(hard, |best| best.min(hard)));
    }

    pub fn record_soft(&mut self, soft: u32) {
        self.best_soft_penalty = Some(self.best_soft_penalty.map_or(soft, |best| best.min(soft)));
    }

    pub fn record(&mut self, score: Score) {
        self.record_hard(score.hard);
        self.record_soft(score.soft);
    }

    fn uct(score: f64, visits: u32, log_parent: f64, coefficient: f64) -> f64 {
        let visits = f64::from(visits);
        score / visits + coefficient * (2.0 * log_parent / visits).sqrt()
    }
}

/// Arena of nodes addressed by [`NodeId`]. Nodes are never removed; a pruned
/// branch has `expansion_limit == 0`.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root_expansion_limit: usize) -> Self {
        Self {
            nodes: vec![Node::new(None, 0, root_expansion_limit, None)],
        }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> &Node {
        self.get(NodeId::ROOT)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_child(&mut self, parent: NodeId, assignment: Assignment, expansion_limit: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = self.get(parent).depth + 1;
        self.nodes
            .push(Node::new(Some(parent), depth, expansion_limit, Some(assignment)));
        self.get_mut(parent).children.push(id);
        id
    }

    /// Children that are not dead branches.
    pub fn live_children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .filter(|&child| !self.get(child).is_dead())
            .collect()
    }

    /// Dual-objective UCT: keep the candidates with the highest hard score
    /// (exploration coefficient `2c`), then pick the highest soft score
    /// (coefficient `c`). Unvisited candidates are never chosen.
    pub fn best_child(&self, parent: NodeId, candidates: &[NodeId], c: f64) -> Option<NodeId> {
        let log_parent = f64::from(self.get(parent).visits.max(1)).ln();
        let visited: Vec<NodeId> = candidates
            .iter()
            .copied()
            .filter(|&child| self.get(child).visits > 0)
            .collect();

        let hard: Vec<f64> = visited
            .iter()
            .map(|&child| {
                let node = self.get(child);
                Node::uct(node.score_hard, node.visits, log_parent, 2.0 * c)
            })
            .collect();
        let max_hard = hard.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut best: Option<(NodeId, f64)> = None;
        for (&child, &weight) in visited.iter().zip(&hard) {
            if weight != max_hard {
                continue;
            }
            let node = self.get(child);
            let soft = Node::uct(node.score_soft, node.visits, log_parent, c);
            if best.is_none_or(|(_, best_soft)| soft > best_soft) {
                best = Some((child, soft));
            }
        }
        best.map(|(child, _)| child)
    }

    /// Adds one visit and the rewards to `id` and every ancestor.
    pub fn backpropagate(&mut self, id: NodeId, reward_hard: f64, reward_soft: f64) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get_mut(node_id);
            node.visits += 1;
            node.score_hard += reward_hard;
            node.score_soft += reward_soft;
            current = node.parent;
        }
    }

    /// Assignments from the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<Assignment> {
        let mut path = Vec::with_capacity(self.get(id).depth);
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id);
            if let Some(assignment) = node.assignment {
                path.push(assignment);
            }
            current = node.parent;
        }
        path.reverse();
        path
    }

    pub fn path_timetable(&self, id: NodeId, num_events: usize) -> Timetable {
        let mut timetable = Timetable::new(num_events);
        for assignment in self.path(id) {
            timetable.insert(assignment.event, assignment.placement);
        }
        timetable
    }

    /// Follows the child with the greatest (`score_hard`, `score_soft`) until a
    /// childless node is reached.
    pub fn best_terminal(&self) -> NodeId {
        let mut current = NodeId::ROOT;
        while let Some(&next) = self.get(current).children.iter().max_by(|&&a, &&b| {
            let (a, b) = (self.get(a), self.get(b));
            a.score_hard
                .total_cmp(&b.score_hard)
                .then_with(|| a.score_soft.total_cmp(&b.score_soft))
        }) {
            current = next;
        }
        current
    }
}
