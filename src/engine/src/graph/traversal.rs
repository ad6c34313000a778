//! Lazy traversals over directed graphs that may contain cycles

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::vec;

use serde::{Deserialize, Serialize};

/// A directed graph with ordered successors
pub trait Graph {
    type Node: Clone;
    type Id: Eq + Hash;

    /// Identity used to detect revisits
    fn id(&self, node: &Self::Node) -> Self::Id;

    /// Direct successors of `node`, in visiting order
    fn successors(&self, node: &Self::Node) -> Vec<Self::Node>;
}

/// Order in which a graph is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalAlgorithm {
    /// Level by level
    BreadthFirst,
    /// Each node before its successors
    #[default]
    DepthFirstPreOrder,
    /// Each node after all of its successors
    DepthFirstPostOrder,
}

impl TraversalAlgorithm {
    /// Walks `graph` from `start`
    ///
    /// Every reachable node is yielded exactly once, even when the graph
    /// contains cycles. Nodes are produced lazily, so callers that stop
    /// early never pay for the rest of the walk.
    pub fn traverse<G: Graph>(self, graph: &G, start: G::Node) -> Traversal<'_, G> {
        let mut visited = HashSet::new();
        match self {
            TraversalAlgorithm::BreadthFirst => {
                visited.insert(graph.id(&start));
                Traversal::BreadthFirst {
                    graph,
                    visited,
                    queue: VecDeque::from([start]),
                }
            }
            TraversalAlgorithm::DepthFirstPreOrder => Traversal::PreOrder {
                graph,
                visited,
                stack: vec![vec![start].into_iter()],
            },
            TraversalAlgorithm::DepthFirstPostOrder => {
                visited.insert(graph.id(&start));
                let successors = graph.successors(&start).into_iter();
                Traversal::PostOrder {
                    graph,
                    visited,
                    stack: vec![(start, successors)],
                }
            }
        }
    }
}

/// Iterator returned by [`TraversalAlgorithm::traverse`]
pub enum Traversal<'g, G: Graph> {
    BreadthFirst {
        graph: &'g G,
        visited: HashSet<G::Id>,
        queue: VecDeque<G::Node>,
    },
    PreOrder {
        graph: &'g G,
        visited: HashSet<G::Id>,
        stack: Vec<vec::IntoIter<G::Node>>,
    },
    PostOrder {
        graph: &'g G,
        visited: HashSet<G::Id>,
        stack: Vec<(G::Node, vec::IntoIter<G::Node>)>,
    },
}

impl<'g, G: Graph> Iterator for Traversal<'g, G> {
    type Item = G::Node;

    fn next(&mut self) -> Option<G::Node> {
        match self {
            Traversal::BreadthFirst {
                graph,
                visited,
                queue,
            } => {
                let node = queue.pop_front()?;
                for successor in graph.successors(&node) {
                    if visited.insert(graph.id(&successor)) {
                        queue.push_back(successor);
                    }
                }
                Some(node)
            }
            Traversal::PreOrder {
                graph,
                visited,
                stack,
            } => loop {
                let frame = stack.last_mut()?;
                match frame.next() {
                    Some(node) => {
                        if !visited.insert(graph.id(&node)) {
                            continue;
                        }
                        stack.push(graph.successors(&node).into_iter());
                        return Some(node);
                    }
                    None => {
                        stack.pop();
                    }
                }
            },
            Traversal::PostOrder {
                graph,
                visited,
                stack,
            } => loop {
                let (_, successors) = stack.last_mut()?;
                match successors.next() {
                    Some(node) => {
                        if visited.insert(graph.id(&node)) {
                            let next = graph.successors(&node).into_iter();
                            stack.push((node, next));
                        }
                    }
                    None => {
                        let (node, _) = stack.pop()?;
                        return Some(node);
                    }
                }
            },
        }
    }
}
