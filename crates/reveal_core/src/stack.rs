//! Slot arena and the geometry that collapses laid-out card slots into a
//! single face-down pile before they are dealt back out.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub usize);

/// Rendered bounding box of one card slot, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SlotBounds {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackAnchor {
    pub x: f64,
    pub y: f64,
}

impl StackAnchor {
    /// Horizontal center of the viewport, `bottom_margin` above its bottom edge.
    pub fn bottom_center(viewport_width: f64, viewport_height: f64, bottom_margin: f64) -> Self {
        Self {
            x: viewport_width / 2.0,
            y: (viewport_height - bottom_margin).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackStyle {
    pub scale: f64,
    pub max_rotation_deg: f64,
}

/// Transform that moves a slot onto the stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPlacement {
    pub dx: f64,
    pub dy: f64,
    pub rotation_deg: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotState {
    pub bounds: Option<SlotBounds>,
    pub placement: Option<SlotPlacement>,
    pub face_down: bool,
    pub dealt: bool,
}

/// Fixed-size slot storage keyed by display position. Slot identity is the
/// index; entries are never reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotArena {
    slots: Vec<SlotState>,
}

impl SlotArena {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![SlotState::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: SlotIndex) -> Option<&SlotState> {
        self.slots.get(index.0)
    }

    /// Records the measured bounds of a slot. Returns false for an index
    /// outside the arena.
    pub fn register(&mut self, index: SlotIndex, bounds: SlotBounds) -> bool {
        match self.slots.get_mut(index.0) {
            Some(slot) => {
                slot.bounds = Some(bounds);
                true
            }
            None => false,
        }
    }

    pub fn is_laid_out(&self) -> bool {
        self.slots.iter().all(|slot| slot.bounds.is_some())
    }

    /// Turns every slot face down and, when a plan is given, pins its placement.
    pub fn stack(&mut self, plan: Option<&[SlotPlacement]>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.face_down = !slot.dealt;
            if let Some(placement) = plan.and_then(|plan| plan.get(index)) {
                slot.placement = Some(*placement);
            }
        }
    }

    /// Flips one slot face up and releases it from the stack.
    pub fn deal(&mut self, index: SlotIndex) -> Option<&SlotState> {
        let slot = self.slots.get_mut(index.0)?;
        slot.face_down = false;
        slot.dealt = true;
        slot.placement = None;
        Some(slot)
    }

    pub fn dealt_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.dealt).count()
    }
}

/// Translation from each slot center onto the anchor, in slot order. `None`
/// until every slot has been measured.
pub fn stack_offsets(arena: &SlotArena, anchor: StackAnchor) -> Option<Vec<(f64, f64)>> {
    arena
        .slots
        .iter()
        .map(|slot| {
            slot.bounds.map(|bounds| {
                let (cx, cy) = bounds.center();
                (anchor.x - cx, anchor.y - cy)
            })
        })
        .collect()
}

pub fn plan_stack<R: Rng + ?Sized>(
    arena: &SlotArena,
    anchor: StackAnchor,
    style: StackStyle,
    rng: &mut R,
) -> Option<Vec<SlotPlacement>> {
    let offsets = stack_offsets(arena, anchor)?;
    let max_rotation = style.max_rotation_deg.abs();
    Some(
        offsets
            .into_iter()
            .map(|(dx, dy)| SlotPlacement {
                dx,
                dy,
                rotation_deg: if max_rotation > 0.0 {
                    rng.gen_range(-max_rotation..=max_rotation)
                } else {
                    0.0
                },
                scale: style.scale,
            })
            .collect(),
    )
}

#[cfg(test)]
#[path = "tests/stack_tests.rs"]
mod tests;
