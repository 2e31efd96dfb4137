use serde::{Deserialize, Serialize};
use taffy::prelude::*;
use tracing::warn;

/// Gap between the preview pane and the tree pane.
const PANE_GAP: f32 = 16.0;

/// Drawing area of a visualization surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Measured size floored at `min`, so hidden or collapsed containers
    /// still get a usable layout.
    pub fn floored(width: f64, height: f64, min: Canvas) -> Self {
        let floor = |v: f64, m: f64| if v.is_finite() { v.max(m) } else { m };
        Self {
            width: floor(width, min.width),
            height: floor(height, min.height),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Box sizes of the two surfaces of an editor instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaneSizes {
    pub preview: Canvas,
    pub tree: Canvas,
}

/// Lay out the preview and tree panes side by side inside `panel`.
///
/// Both panes share the width equally; a hidden tree pane takes no space
/// and measures 0×0.
pub fn measure_panes(panel: Canvas, tree_visible: bool) -> PaneSizes {
    match layout_panes(panel, tree_visible) {
        Ok(sizes) => sizes,
        Err(e) => {
            warn!(error = %e, "pane layout failed, giving the preview the whole panel");
            PaneSizes {
                preview: panel,
                tree: Canvas::new(0.0, 0.0),
            }
        }
    }
}

fn layout_panes(panel: Canvas, tree_visible: bool) -> Result<PaneSizes, taffy::TaffyError> {
    let mut tree: TaffyTree<()> = TaffyTree::new();

    let pane = |visible: bool| Style {
        display: if visible { Display::Flex } else { Display::None },
        flex_grow: 1.0,
        flex_basis: Dimension::Length(0.0),
        ..Default::default()
    };
    let preview = tree.new_leaf(pane(true))?;
    let tree_pane = tree.new_leaf(pane(tree_visible))?;

    let (width, height) = (panel.width.max(0.0) as f32, panel.height.max(0.0) as f32);
    let root = tree.new_with_children(
        Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Row,
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(height),
            },
            gap: Size {
                width: LengthPercentage::Length(PANE_GAP),
                height: LengthPercentage::Length(0.0),
            },
            ..Default::default()
        },
        &[preview, tree_pane],
    )?;

    tree.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(width),
            height: AvailableSpace::Definite(height),
        },
    )?;

    let size_of = |node: NodeId| -> Result<Canvas, taffy::TaffyError> {
        let layout = tree.layout(node)?;
        Ok(Canvas::new(
            layout.size.width as f64,
            layout.size.height as f64,
        ))
    };

    Ok(PaneSizes {
        preview: size_of(preview)?,
        tree: size_of(tree_pane)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Canvas = Canvas {
        width: 400.0,
        height: 300.0,
    };

    #[test]
    fn floors_small_and_zero_sizes() {
        assert_eq!(Canvas::floored(0.0, 0.0, MIN), MIN);
        assert_eq!(Canvas::floored(1200.0, 100.0, MIN), Canvas::new(1200.0, 300.0));
        assert_eq!(Canvas::floored(f64::NAN, 500.0, MIN), Canvas::new(400.0, 500.0));
    }

    #[test]
    fn visible_panes_split_the_panel() {
        let sizes = measure_panes(Canvas::new(1016.0, 480.0), true);
        assert_eq!(sizes.preview, Canvas::new(500.0, 480.0));
        assert_eq!(sizes.tree, Canvas::new(500.0, 480.0));
    }

    #[test]
    fn hidden_tree_pane_measures_zero() {
        let sizes = measure_panes(Canvas::new(1016.0, 480.0), false);
        assert_eq!(sizes.tree, Canvas::new(0.0, 0.0));
        assert_eq!(sizes.preview.height, 480.0);
        assert!(sizes.preview.width >= 1000.0);
    }
}
