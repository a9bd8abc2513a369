use super::DrawableUnit;

/// A node of the scene tree.
///
/// A shape is either a parent (children, no geometry) or a leaf (a unit
/// chain, no children). Invisible shapes hide their whole subtree.
#[derive(Debug, Clone)]
pub struct Shape {
    pub visible: bool,
    pub kind: ShapeKind,
}

#[derive(Debug, Clone)]
pub enum ShapeKind {
    Parent(Vec<Shape>),
    /// Head of the unit chain; `None` for a leaf without geometry.
    Leaf(Option<DrawableUnit>),
}

// Flattens the subtree onto a heap stack so deep trees drop without recursion.
impl Drop for Shape {
    fn drop(&mut self) {
        let ShapeKind::Parent(children) = &mut self.kind else {
            return;
        };
        let mut pending = std::mem::take(children);
        while let Some(mut shape) = pending.pop() {
            if let ShapeKind::Parent(children) = &mut shape.kind {
                pending.append(children);
            }
        }
    }
}

impl Shape {
    pub fn parent(children: Vec<Shape>) -> Self {
        Self {
            visible: true,
            kind: ShapeKind::Parent(children),
        }
    }

    pub fn leaf(unit: DrawableUnit) -> Self {
        Self {
            visible: true,
            kind: ShapeKind::Leaf(Some(unit)),
        }
    }

    pub fn empty_leaf() -> Self {
        Self {
            visible: true,
            kind: ShapeKind::Leaf(None),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}
