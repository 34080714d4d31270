use parking_lot::Mutex;

use crate::models::Rect;

/// Where a boid is registered: which grid, and which cell inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellHandle {
    pub(crate) grid: u64,
    pub(crate) index: usize,
}

impl CellHandle {
    pub fn grid_id(&self) -> u64 {
        self.grid
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// One square of the grid. Holds the population indices of its members.
///
/// Workers integrating different ranges can move boids into the same cell at
/// the same time, so the member list sits behind its own mutex.
#[derive(Debug)]
pub struct Cell {
    area: Rect,
    members: Mutex<Vec<usize>>,
}

impl Cell {
    pub(crate) fn new(area: Rect) -> Self {
        Cell {
            area,
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn len(&self) -> usize {
        self.with_members(|members| members.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the member indices.
    pub fn members(&self) -> Vec<usize> {
        self.with_members(|members| members.to_vec())
    }

    pub(crate) fn with_members<R>(&self, f: impl FnOnce(&[usize]) -> R) -> R {
        let members = self.members.lock();
        f(&members)
    }

    pub(crate) fn push(&self, index: usize) {
        self.members.lock().push(index);
    }

    /// Removes one occurrence of `index`. Returns whether it was present.
    pub(crate) fn take(&self, index: usize) -> bool {
        let mut members = self.members.lock();
        match members.iter().position(|&member| member == index) {
            Some(slot) => {
                members.swap_remove(slot);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        self.members.lock().clear();
    }
}
