//! Label search and viewport centering

use serde::{Deserialize, Serialize};

use crate::layout::{GraphLayout, LayoutNode};
use crate::models::{walk, Call, CallTree};

/// Lowercased needle; a blank or whitespace-only term yields nothing
fn normalized_term(term: &str) -> Option<String> {
    (!term.trim().is_empty()).then(|| term.to_lowercase())
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// First graph node whose name or label contains `term`, case-insensitively.
///
/// Nodes are scanned in hierarchy order. A blank term matches nothing.
pub fn search<'a>(layout: &'a GraphLayout, term: &str) -> Option<&'a LayoutNode> {
    let needle = normalized_term(term)?;
    layout
        .nodes
        .iter()
        .find(|node| contains(&node.name, &needle) || contains(&node.label, &needle))
}

/// Same rule as [`search`], applied to the forest directly
pub fn search_forest<'a>(forest: &'a [CallTree], term: &str) -> Option<&'a Call> {
    let needle = normalized_term(term)?;
    walk(forest)
        .map(|node| &node.call)
        .find(|call| contains(&call.name, &needle) || contains(&call.label(), &needle))
}

/// Size of the visible area of the graph view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Visible width in pixels
    pub width: f64,
    /// Visible height in pixels
    pub height: f64,
}

/// Pan and zoom to apply to the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    /// Horizontal translation in screen pixels
    pub x: f64,
    /// Vertical translation in screen pixels
    pub y: f64,
    /// Zoom factor
    pub zoom: f64,
}

impl Viewport {
    /// Transform that puts the center of `node` in the middle of the viewport
    pub fn center_on(&self, node: &LayoutNode, zoom: f64) -> ViewportTransform {
        ViewportTransform {
            x: self.width / 2.0 - node.center_x() * zoom,
            y: self.height / 2.0 - node.center_y() * zoom,
            zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphLayoutConfig;
    use crate::layout::layout_as_graph;
    use crate::models::{CallDetail, LlmDetail};
    use pretty_assertions::assert_eq;

    fn leaf(id: &str, name: &str, detail: CallDetail) -> CallTree {
        CallTree::leaf(Call {
            id: id.to_string(),
            source_id: id.to_string(),
            name: name.to_string(),
            start_time: None,
            end_time: None,
            duration: None,
            parent_id: None,
            child_ids: vec![],
            detail,
        })
    }

    fn forest() -> Vec<CallTree> {
        let mut agent = leaf("agent-1", "Research Agent", CallDetail::Agent);
        agent.children = vec![
            leaf("tool-1", "web_search", CallDetail::Tool(Default::default())),
            leaf(
                "llm-1",
                "summarize",
                CallDetail::Llm(LlmDetail {
                    model: Some("claude-3-5-sonnet".to_string()),
                    ..LlmDetail::default()
                }),
            ),
        ];
        vec![agent, leaf("tool-2", "web_fetch", CallDetail::Tool(Default::default()))]
    }

    #[test]
    fn test_first_match_in_hierarchy_order() {
        let forest = forest();
        let layout = layout_as_graph(&forest, &GraphLayoutConfig::default());

        assert_eq!(search(&layout, "WEB").map(|n| n.id.as_str()), Some("tool-1"));
        assert_eq!(search(&layout, "sonnet").map(|n| n.id.as_str()), Some("llm-1"));
        assert_eq!(search_forest(&forest, "fetch").map(|c| c.id.as_str()), Some("tool-2"));
    }

    #[test]
    fn test_blank_and_missing_terms() {
        let forest = forest();
        let layout = layout_as_graph(&forest, &GraphLayoutConfig::default());

        assert!(search(&layout, "").is_none());
        assert!(search(&layout, "   ").is_none());
        assert!(search(&layout, "nothing like this").is_none());
        assert!(search_forest(&forest, "").is_none());
    }

    #[test]
    fn test_surrounding_whitespace_is_part_of_the_term() {
        let forest = forest();
        let layout = layout_as_graph(&forest, &GraphLayoutConfig::default());

        assert!(search(&layout, "agent ").is_none());
        assert!(search_forest(&forest, " web_search").is_none());
        assert_eq!(search(&layout, "research agent").map(|n| n.id.as_str()), Some("agent-1"));
    }

    #[test]
    fn test_center_on_node() {
        let forest = forest();
        let layout = layout_as_graph(&forest, &GraphLayoutConfig::default());
        let node = search(&layout, "research").unwrap();

        let viewport = Viewport {
            width: 800.0,
            height: 600.0,
        };
        let t = viewport.center_on(node, 1.5);
        assert_eq!(t.x + node.center_x() * 1.5, 400.0);
        assert_eq!(t.y + node.center_y() * 1.5, 300.0);
        assert_eq!(t.zoom, 1.5);
    }
}
