//! Layered graph layout of a call forest
//!
//! Rank is depth from the root. Along the cross axis every subtree is given a
//! band wide enough for its children plus gaps; siblings take consecutive
//! bands in hierarchy order and each parent is centered over its children.
//! Bands never overlap, so neither do sibling boxes.

use serde::{Deserialize, Serialize};

use crate::config::{Direction, GraphLayoutConfig};
use crate::models::{CallKind, CallTree};

/// A call placed on the graph canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    /// Call id
    pub id: String,
    /// Call kind
    pub kind: CallKind,
    /// Call name
    pub name: String,
    /// Display label
    pub label: String,
    /// Parent call id, `None` for roots
    pub parent_id: Option<String>,
    /// Left edge in pixels
    pub x: f64,
    /// Top edge in pixels
    pub y: f64,
    /// Node width in pixels
    pub width: f64,
    /// Node height in pixels
    pub height: f64,
    /// Depth from the root (roots are 0)
    pub depth: usize,
}

impl LayoutNode {
    /// Horizontal center
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Vertical center
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Whether two node rectangles intersect
    pub fn overlaps(&self, other: &LayoutNode) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// A parent to child edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id (`source->target`)
    pub id: String,
    /// Parent call id
    pub source: String,
    /// Child call id
    pub target: String,
}

/// Canvas size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Canvas width in pixels
    pub width: f64,
    /// Canvas height in pixels
    pub height: f64,
}

/// Result of laying out a forest as a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLayout {
    /// Direction the layout was computed for
    pub direction: Direction,
    /// Nodes in pre-order (hierarchy order)
    pub nodes: Vec<LayoutNode>,
    /// Edges in pre-order of their target
    pub edges: Vec<Edge>,
    /// Canvas bounds, including padding
    pub bounds: Bounds,
}

impl GraphLayout {
    /// Look up a node by call id
    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Direct children of a node, in hierarchy order
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a LayoutNode> + 'a {
        self.nodes
            .iter()
            .filter(move |node| node.parent_id.as_deref() == Some(id))
    }
}

/// Position on the abstract (cross, rank) grid before orientation
struct Placement {
    cross: f64,
    rank: f64,
}

struct Placer<'a> {
    config: &'a GraphLayoutConfig,
    cross_extent: f64,
    rank_extent: f64,
    nodes: Vec<LayoutNode>,
    placements: Vec<Placement>,
    edges: Vec<Edge>,
}

impl Placer<'_> {
    /// Place a subtree whose band starts at `start`; returns (band width, node center)
    fn place(
        &mut self,
        tree: &CallTree,
        parent: Option<&str>,
        depth: usize,
        start: f64,
    ) -> (f64, f64) {
        let call = &tree.call;
        let slot = self.nodes.len();
        self.nodes.push(LayoutNode {
            id: call.id.clone(),
            kind: call.kind(),
            name: call.name.clone(),
            label: call.label(),
            parent_id: parent.map(str::to_string),
            x: 0.0,
            y: 0.0,
            width: self.config.node_width,
            height: self.config.node_height,
            depth,
        });
        self.placements.push(Placement {
            cross: 0.0,
            rank: depth as f64 * (self.rank_extent + self.config.rank_gap),
        });
        if let Some(parent) = parent {
            self.edges.push(Edge {
                id: format!("{parent}->{}", call.id),
                source: parent.to_string(),
                target: call.id.clone(),
            });
        }

        let mut cursor = start;
        let mut child_centers: Option<(f64, f64)> = None;
        for (i, child) in tree.children.iter().enumerate() {
            if i > 0 {
                cursor += self.config.sibling_gap;
            }
            let (span, center) = self.place(child, Some(&call.id), depth + 1, cursor);
            cursor += span;
            child_centers =
                Some(child_centers.map_or((center, center), |(first, _)| (first, center)));
        }

        // Every child band is at least one node wide, so a parent with
        // children never needs more room than they take.
        let span = (cursor - start).max(self.cross_extent);
        let center = match child_centers {
            Some((first, last)) => (first + last) / 2.0,
            None => start + span / 2.0,
        };
        self.placements[slot].cross = center - self.cross_extent / 2.0;

        (span, center)
    }
}

/// Lay out a forest as a layered graph
pub fn layout_as_graph(forest: &[CallTree], config: &GraphLayoutConfig) -> GraphLayout {
    let (cross_extent, rank_extent) = match config.direction {
        Direction::TopToBottom => (config.node_width, config.node_height),
        Direction::LeftToRight => (config.node_height, config.node_width),
    };

    let mut placer = Placer {
        config,
        cross_extent,
        rank_extent,
        nodes: Vec::new(),
        placements: Vec::new(),
        edges: Vec::new(),
    };

    let mut cursor = 0.0;
    for (i, tree) in forest.iter().enumerate() {
        if i > 0 {
            cursor += config.sibling_gap;
        }
        let (span, _) = placer.place(tree, None, 0, cursor);
        cursor += span;
    }

    let Placer {
        mut nodes,
        placements,
        edges,
        ..
    } = placer;

    for (node, placement) in nodes.iter_mut().zip(&placements) {
        let (x, y) = match config.direction {
            Direction::TopToBottom => (placement.cross, placement.rank),
            Direction::LeftToRight => (placement.rank, placement.cross),
        };
        node.x = x;
        node.y = y;
    }

    let bounds = fit_to_padding(&mut nodes, config.padding);

    GraphLayout {
        direction: config.direction,
        nodes,
        edges,
        bounds,
    }
}

/// Shift nodes so the top-left-most edge sits at `padding`; returns the canvas size
fn fit_to_padding(nodes: &mut [LayoutNode], padding: f64) -> Bounds {
    if nodes.is_empty() {
        return Bounds::default();
    }

    let min_x = nodes.iter().map(|n| n.x).fold(f64::INFINITY, f64::min);
    let min_y = nodes.iter().map(|n| n.y).fold(f64::INFINITY, f64::min);
    let (dx, dy) = (padding - min_x, padding - min_y);

    let mut bounds = Bounds::default();
    for node in nodes.iter_mut() {
        node.x += dx;
        node.y += dy;
        bounds.width = bounds.width.max(node.x + node.width + padding);
        bounds.height = bounds.height.max(node.y + node.height + padding);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Call, CallDetail};
    use pretty_assertions::assert_eq;

    fn tree(id: &str, children: Vec<CallTree>) -> CallTree {
        CallTree {
            call: Call {
                id: id.to_string(),
                source_id: id.to_string(),
                name: id.to_string(),
                start_time: None,
                end_time: None,
                duration: None,
                parent_id: None,
                child_ids: vec![],
                detail: CallDetail::Agent,
            },
            children,
        }
    }

    fn config(direction: Direction) -> GraphLayoutConfig {
        GraphLayoutConfig {
            direction,
            node_width: 100.0,
            node_height: 40.0,
            sibling_gap: 20.0,
            rank_gap: 50.0,
            padding: 10.0,
        }
    }

    #[test]
    fn test_parent_centered_over_children_top_to_bottom() {
        let forest = vec![tree("a", vec![tree("b", vec![]), tree("c", vec![])])];
        let layout = layout_as_graph(&forest, &config(Direction::TopToBottom));

        let a = layout.node("a").unwrap();
        let b = layout.node("b").unwrap();
        let c = layout.node("c").unwrap();

        assert_eq!((b.x, b.y), (10.0, 100.0));
        assert_eq!((c.x, c.y), (130.0, 100.0));
        assert_eq!((a.x, a.y), (70.0, 10.0));
        assert_eq!(a.center_x(), (b.center_x() + c.center_x()) / 2.0);
        assert_eq!(layout.bounds, Bounds { width: 240.0, height: 150.0 });
        assert_eq!(layout.edges.len(), 2);
        assert_eq!(layout.edges[0].id, "a->b");
    }

    #[test]
    fn test_left_to_right_swaps_axes() {
        let forest = vec![tree("a", vec![tree("b", vec![]), tree("c", vec![])])];
        let layout = layout_as_graph(&forest, &config(Direction::LeftToRight));

        let a = layout.node("a").unwrap();
        let b = layout.node("b").unwrap();
        let c = layout.node("c").unwrap();

        assert_eq!((b.x, b.y), (160.0, 10.0));
        assert_eq!((c.x, c.y), (160.0, 70.0));
        assert_eq!((a.x, a.y), (10.0, 40.0));
        assert_eq!(layout.bounds, Bounds { width: 270.0, height: 120.0 });
    }

    #[test]
    fn test_roots_do_not_overlap() {
        let forest = vec![
            tree("a", vec![tree("a1", vec![]), tree("a2", vec![]), tree("a3", vec![])]),
            tree("b", vec![tree("b1", vec![])]),
        ];
        let layout = layout_as_graph(&forest, &config(Direction::TopToBottom));

        for (i, n) in layout.nodes.iter().enumerate() {
            for m in &layout.nodes[i + 1..] {
                assert!(!n.overlaps(m), "{} overlaps {}", n.id, m.id);
            }
        }
        let children: Vec<_> = layout.children_of("a").map(|n| n.id.as_str()).collect();
        assert_eq!(children, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_empty_forest() {
        let layout = layout_as_graph(&[], &config(Direction::TopToBottom));
        assert!(layout.nodes.is_empty());
        assert!(layout.edges.is_empty());
        assert_eq!(layout.bounds, Bounds::default());
    }
}
