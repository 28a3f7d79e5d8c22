//! Graph derivation
//!
//! [`VisualizationService`] turns an [`Integration`] into a [`FlowGraph`].
//! The output depends only on the document, the layout mode and the
//! flow-grouping flag.
//!
//! # Node identifiers
//! - `node_<uuid>` for steps
//! - `placeholder_start` in front of a flow without a START step
//! - `placeholder_<parent uuid>_branch-<i>` for an empty branch
//! - `placeholder_<parent uuid>_slot-<k>` for a branch still required by
//!   `minBranches`
//!
//! In multi-flow mode every id is prefixed with `<integration id>:`.

use crate::types::{
    BranchTarget, EdgeKind, FlowGraph, GridPosition, LayoutMode, NodeKind, VizEdge, VizNode,
};
use stepflow_model::{Integration, Step, StepPath, StepSequence};
use stepflow_store::InsertLocus;

/// Derives the renderable graph from a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualizationService {
    layout: LayoutMode,
    multiple_flows: bool,
}

impl VisualizationService {
    /// Create with layout and grouping mode
    #[inline]
    #[must_use]
    pub const fn new(layout: LayoutMode, multiple_flows: bool) -> Self {
        Self {
            layout,
            multiple_flows,
        }
    }

    /// Current layout
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// Whether flows are wrapped in group nodes
    #[inline]
    #[must_use]
    pub const fn multiple_flows(&self) -> bool {
        self.multiple_flows
    }

    /// Derive the graph for one document
    #[must_use]
    pub fn derive(&self, integration: &Integration) -> FlowGraph {
        let mut builder = Builder::new(self, integration);
        builder.flow(integration);
        builder.graph
    }

    /// Derive one graph for several documents, side by side
    #[must_use]
    pub fn derive_flows(&self, integrations: &[Integration]) -> FlowGraph {
        let mut graph = FlowGraph::default();
        let mut lane_base = 0;
        for integration in integrations {
            let mut part = self.derive(integration);
            let lanes = part.nodes.iter().map(|n| n.position.lane + 1).max().unwrap_or(0);
            for node in &mut part.nodes {
                node.position.lane += lane_base;
            }
            lane_base += lanes;
            graph.nodes.extend(part.nodes);
            graph.edges.extend(part.edges);
        }
        graph
    }
}

/// Where a sequence ends: the node ids later steps connect from
struct Exits {
    ids: Vec<String>,
    /// True when the single exit is a real step (next edge is an insert edge)
    from_step: bool,
}

struct Builder {
    layout: LayoutMode,
    prefix: String,
    group: Option<String>,
    next_lane: usize,
    graph: FlowGraph,
}

impl Builder {
    fn new(service: &VisualizationService, integration: &Integration) -> Self {
        let (prefix, group) = if service.multiple_flows {
            let prefix = format!("{}:", integration.id);
            let group = format!("{prefix}group");
            (prefix, Some(group))
        } else {
            (String::new(), None)
        };
        Self {
            layout: service.layout,
            prefix,
            group,
            next_lane: 1,
            graph: FlowGraph::default(),
        }
    }

    fn flow(&mut self, integration: &Integration) {
        if let Some(group) = self.group.clone() {
            self.graph.nodes.push(VizNode {
                id: group,
                kind: NodeKind::Group,
                label: integration.metadata.name.clone(),
                step: None,
                path: None,
                locus: None,
                position: GridPosition::default(),
                handles: self.layout.handles(),
                parent_id: None,
                offset: None,
                selected: false,
            });
        }

        let mut rank = 0;
        let mut exits = None;
        if !integration.starts_with_source() {
            let id = self.placeholder("placeholder_start", InsertLocus::Start, rank, 0);
            exits = Some(Exits {
                ids: vec![id],
                from_step: false,
            });
            rank += 1;
        }
        self.sequence(&integration.steps, None, exits, rank, 0);
    }

    /// Lay out a step sequence; `base` is the path of the first step's
    /// sequence owner (None for the root). Returns the exits.
    fn sequence(
        &mut self,
        steps: &StepSequence,
        base: Option<(&StepPath, usize)>,
        mut incoming: Option<Exits>,
        mut rank: usize,
        lane: usize,
    ) -> (Option<String>, Option<Exits>, usize) {
        let mut entry = None;
        for (position, step) in steps.iter().enumerate() {
            let path = match base {
                None => StepPath::top_level(position),
                Some((parent, branch)) => parent.child(branch, position),
            };
            let id = self.step_node(step, &path, rank, lane);
            if entry.is_none() {
                entry = Some(id.clone());
            }
            if let Some(prev) = incoming.take() {
                self.connect(&prev, &id, &path);
            }
            let (exits, next_rank) = self.branches(step, &path, &id, rank, lane);
            incoming = Some(exits);
            rank = next_rank;
        }
        (entry, incoming, rank)
    }

    fn connect(&mut self, prev: &Exits, target: &str, target_path: &StepPath) {
        if prev.from_step {
            if let [source] = prev.ids.as_slice() {
                let source = source.clone();
                self.edge(
                    &source,
                    target,
                    EdgeKind::Insert,
                    None,
                    Some(InsertLocus::Before {
                        path: target_path.clone(),
                    }),
                    None,
                );
                return;
            }
        }
        for source in &prev.ids {
            self.edge(source, target, EdgeKind::Default, None, None, None);
        }
    }

    /// Lay out the branches of `step`; returns its exits and the next rank
    fn branches(
        &mut self,
        step: &Step,
        path: &StepPath,
        id: &str,
        rank: usize,
        lane: usize,
    ) -> (Exits, usize) {
        let missing = step.missing_branches();
        if step.branch_count() == 0 && missing == 0 {
            return (
                Exits {
                    ids: vec![id.to_string()],
                    from_step: true,
                },
                rank + 1,
            );
        }

        let removable = step.can_remove_branch();
        let mut exits = Vec::new();
        let mut next_rank = rank + 2;
        let mut slot_lane = lane;

        for (index, branch) in step.branches().enumerate() {
            if index > 0 {
                slot_lane = self.fresh_lane();
            }
            let (kind, target) = if removable {
                (
                    EdgeKind::Delete,
                    Some(BranchTarget {
                        parent_uuid: step.uuid.clone(),
                        branch_index: index,
                    }),
                )
            } else {
                (EdgeKind::Default, None)
            };
            let label = Some(branch.identifier.clone()).filter(|l| !l.is_empty());

            if branch.is_empty() {
                let placeholder = self.placeholder(
                    &format!("placeholder_{}_branch-{index}", step.uuid),
                    InsertLocus::EmptyBranch {
                        parent_uuid: step.uuid.clone(),
                        branch_index: index,
                    },
                    rank + 1,
                    slot_lane,
                );
                self.edge(id, &placeholder, kind, label, None, target);
                exits.push(placeholder);
                continue;
            }

            let (entry, branch_exits, end_rank) =
                self.sequence(&branch.steps, Some((path, index)), None, rank + 1, slot_lane);
            if let Some(entry) = entry {
                self.edge(id, &entry, kind, label, None, target);
            }
            if let Some(branch_exits) = branch_exits {
                exits.extend(branch_exits.ids);
            }
            next_rank = next_rank.max(end_rank);
        }

        for slot in 0..missing {
            if step.branch_count() > 0 || slot > 0 {
                slot_lane = self.fresh_lane();
            }
            let placeholder = self.placeholder(
                &format!("placeholder_{}_slot-{slot}", step.uuid),
                InsertLocus::MissingBranch {
                    parent_uuid: step.uuid.clone(),
                },
                rank + 1,
                slot_lane,
            );
            self.edge(id, &placeholder, EdgeKind::Default, None, None, None);
            exits.push(placeholder);
        }

        (
            Exits {
                ids: exits,
                from_step: false,
            },
            next_rank,
        )
    }

    fn fresh_lane(&mut self) -> usize {
        let lane = self.next_lane;
        self.next_lane += 1;
        lane
    }

    fn step_node(&mut self, step: &Step, path: &StepPath, rank: usize, lane: usize) -> String {
        let id = format!("{}node_{}", self.prefix, step.uuid);
        self.graph.nodes.push(VizNode {
            id: id.clone(),
            kind: NodeKind::Step,
            label: step.title.clone().unwrap_or_else(|| step.name.clone()),
            step: Some(step.clone()),
            path: Some(path.clone()),
            locus: None,
            position: GridPosition { rank, lane },
            handles: self.layout.handles(),
            parent_id: self.group.clone(),
            offset: None,
            selected: false,
        });
        id
    }

    fn placeholder(&mut self, name: &str, locus: InsertLocus, rank: usize, lane: usize) -> String {
        let id = format!("{}{name}", self.prefix);
        self.graph.nodes.push(VizNode {
            id: id.clone(),
            kind: NodeKind::Placeholder,
            label: "ADD A STEP".to_string(),
            step: None,
            path: None,
            locus: Some(locus),
            position: GridPosition { rank, lane },
            handles: self.layout.handles(),
            parent_id: self.group.clone(),
            offset: None,
            selected: false,
        });
        id
    }

    fn edge(
        &mut self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        label: Option<String>,
        locus: Option<InsertLocus>,
        branch: Option<BranchTarget>,
    ) {
        self.graph.edges.push(VizEdge {
            id: format!("e-{source}>{target}"),
            source: source.to_string(),
            target: target.to_string(),
            kind,
            label,
            locus,
            branch,
            selected: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepflow_model::{regenerate_uuids, Branch, StepKind};

    fn document(steps: Vec<Step>) -> Integration {
        let mut doc = Integration::empty("KameletBinding", "integration", "default");
        doc.steps = regenerate_uuids(&steps.into_iter().collect(), "");
        doc
    }

    #[test]
    fn empty_document_single_placeholder() {
        let graph = VisualizationService::default().derive(&document(vec![]));
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes[0].id, "placeholder_start");
        assert_eq!(graph.nodes[0].locus, Some(InsertLocus::Start));
    }

    #[test]
    fn linear_flow_has_insert_edges() {
        let doc = document(vec![
            Step::new("timer-source", StepKind::Start),
            Step::new("log", StepKind::Middle),
            Step::new("kafka-sink", StepKind::End),
        ]);
        let graph = VisualizationService::default().derive(&doc);

        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["node_timer-source-0", "node_log-1", "node_kafka-sink-2"]
        );
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| e.kind == EdgeKind::Insert));
        assert_eq!(
            graph.edges[1].locus,
            Some(InsertLocus::Before {
                path: StepPath::top_level(2)
            })
        );
        let ranks: Vec<_> = graph.nodes.iter().map(|n| n.position.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn missing_source_gets_start_placeholder() {
        let doc = document(vec![Step::new("log", StepKind::Middle)]);
        let graph = VisualizationService::default().derive(&doc);
        assert_eq!(graph.nodes[0].id, "placeholder_start");
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].kind, EdgeKind::Default);
        assert_eq!(graph.edges[0].target, "node_log-0");
    }

    #[test]
    fn branches_emit_placeholders_and_delete_edges() {
        let choice = Step::new("choice", StepKind::Branch)
            .with_arity(3, -1)
            .with_branches([
                Branch::new("when").with_steps([Step::new("log", StepKind::Middle)]),
                Branch::new("otherwise"),
            ]);
        let doc = document(vec![
            Step::new("timer-source", StepKind::Start),
            choice,
            Step::new("kafka-sink", StepKind::End),
        ]);
        let graph = VisualizationService::default().derive(&doc);

        let placeholders: Vec<_> = graph.placeholders().map(|n| n.id.as_str()).collect();
        assert_eq!(
            placeholders,
            vec![
                "placeholder_choice-1_branch-1",
                "placeholder_choice-1_slot-0"
            ]
        );
        // 2 branches with min 3: not removable
        assert_eq!(graph.edges_of(EdgeKind::Delete).count(), 0);

        // join: every branch exit connects to the sink
        let into_sink: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.target == "node_kafka-sink-2")
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(
            into_sink,
            vec![
                "node_log-3",
                "placeholder_choice-1_branch-1",
                "placeholder_choice-1_slot-0"
            ]
        );
    }

    #[test]
    fn removable_branches_get_delete_edges() {
        let choice = Step::new("choice", StepKind::Branch)
            .with_arity(1, -1)
            .with_branches([
                Branch::new("when").with_steps([Step::new("log", StepKind::Middle)]),
                Branch::new("otherwise"),
            ]);
        let doc = document(vec![Step::new("timer-source", StepKind::Start), choice]);
        let graph = VisualizationService::default().derive(&doc);

        let deletes: Vec<_> = graph.edges_of(EdgeKind::Delete).collect();
        assert_eq!(deletes.len(), 2);
        assert_eq!(
            deletes[1].branch,
            Some(BranchTarget {
                parent_uuid: "choice-1".into(),
                branch_index: 1
            })
        );
        assert_eq!(deletes[0].label.as_deref(), Some("when"));
    }

    #[test]
    fn multiple_flows_namespaces_ids() {
        let doc = document(vec![Step::new("timer-source", StepKind::Start)]);
        let graph = VisualizationService::new(LayoutMode::Vertical, true).derive(&doc);
        assert_eq!(graph.nodes[0].kind, NodeKind::Group);
        assert_eq!(graph.nodes[0].id, "KameletBinding-1:group");
        assert_eq!(graph.nodes[1].id, "KameletBinding-1:node_timer-source-0");
        assert_eq!(graph.nodes[1].parent_id.as_deref(), Some("KameletBinding-1:group"));
        assert_eq!(graph.nodes[1].handles, LayoutMode::Vertical.handles());
    }

    #[test]
    fn derive_flows_stacks_lanes() {
        let a = document(vec![Step::new("timer-source", StepKind::Start)]);
        let mut b = a.clone();
        b.id = "KameletBinding-2".into();
        let graph = VisualizationService::new(LayoutMode::Horizontal, true).derive_flows(&[a, b]);
        let lanes: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Step)
            .map(|n| n.position.lane)
            .collect();
        assert_eq!(lanes, vec![0, 1]);
    }
}
