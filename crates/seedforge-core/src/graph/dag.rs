use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::schema::types::{CompositeFk, ForeignKey, TableRef};

/// Directed graph of table dependencies. Edges point parent → child so a
/// topological walk visits parents before the rows that reference them.
pub struct DependencyGraph {
    pub graph: DiGraph<TableRef, ()>,
    node_indices: HashMap<TableRef, NodeIndex>,
}

impl DependencyGraph {
    /// One node per configured table; one edge per declared or logical FK
    /// (single or composite) whose parent and child are both configured.
    pub fn from_parts(
        tables: &[TableRef],
        fks: &[ForeignKey],
        composite_fks: &[CompositeFk],
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for table in tables {
            if !node_indices.contains_key(table) {
                let idx = graph.add_node(table.clone());
                node_indices.insert(table.clone(), idx);
            }
        }

        let mut add_edge = |parent: &TableRef, child: &TableRef| {
            if let (Some(&p), Some(&c)) = (node_indices.get(parent), node_indices.get(child)) {
                if !graph.contains_edge(p, c) {
                    graph.add_edge(p, c, ());
                }
            }
        };
        for fk in fks {
            add_edge(&fk.parent, &fk.child);
        }
        for comp in composite_fks {
            add_edge(&comp.parent, &comp.child);
        }

        Self {
            graph,
            node_indices,
        }
    }

    pub fn table(&self, idx: NodeIndex) -> &TableRef {
        &self.graph[idx]
    }

    pub fn node_index(&self, table: &TableRef) -> Option<NodeIndex> {
        self.node_indices.get(table).copied()
    }

    pub fn table_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
