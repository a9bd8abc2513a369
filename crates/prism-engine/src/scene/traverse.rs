use super::{DrawableUnit, Shape, ShapeKind};

/// Visits every drawable unit of the visible part of `root`.
///
/// Depth-first, pre-order. An invisible shape hides its whole subtree.
/// Children are visited in list order and each leaf's units in link order,
/// which is the order draws reach the GPU.
///
/// Uses an explicit stack so very deep trees cannot overflow the call stack.
pub fn traverse<'a, F>(root: &'a Shape, mut visit: F)
where
    F: FnMut(&'a DrawableUnit),
{
    let mut stack: Vec<&'a Shape> = vec![root];

    while let Some(shape) = stack.pop() {
        if !shape.visible {
            continue;
        }
        match &shape.kind {
            ShapeKind::Parent(children) => {
                // Reversed so the first child is popped first.
                stack.extend(children.iter().rev());
            }
            ShapeKind::Leaf(Some(head)) => head.chain().for_each(&mut visit),
            ShapeKind::Leaf(None) => {}
        }
    }
}
