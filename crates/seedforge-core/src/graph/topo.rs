use petgraph::Direction;
use tracing::warn;

use crate::graph::dag::DependencyGraph;
use crate::schema::types::TableRef;

/// Kahn-style topological order over the dependency graph: parents first.
/// Nodes left over by cycles are appended in stable insertion order so
/// generation can proceed; inter-table cycles cannot be satisfied by FK
/// resolution and are warned about.
pub fn topological_order(graph: &DependencyGraph) -> Vec<TableRef> {
    let g = &graph.graph;
    let mut in_degree: Vec<usize> = g
        .node_indices()
        .map(|idx| g.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let mut queue: Vec<_> = g
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(g.node_count());
    let mut visited = vec![false; g.node_count()];

    let mut head = 0;
    while head < queue.len() {
        let node = queue[head];
        head += 1;
        visited[node.index()] = true;
        order.push(graph.table(node).clone());
        for next in g.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 && !visited[next.index()] {
                queue.push(next);
            }
        }
    }

    if order.len() != g.node_count() {
        let remaining: Vec<TableRef> = g
            .node_indices()
            .filter(|idx| !visited[idx.index()])
            .map(|idx| graph.table(idx).clone())
            .collect();
        warn!(
            "dependency cycle among tables {:?}; they are appended to the generation order, \
             but their FK columns cannot be satisfied unless nullable",
            remaining.iter().map(|t| t.to_string()).collect::<Vec<_>>()
        );
        order.extend(remaining);
    }

    order
}
