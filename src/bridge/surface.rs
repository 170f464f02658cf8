//! Host surface bookkeeping

use std::collections::HashMap;

use crate::protocol::ObjectId;
use crate::server::WindowId;

/// Bidirectional map between host surfaces and the windows they show.
#[derive(Debug, Default)]
pub struct SurfaceTable {
    by_surface: HashMap<ObjectId, WindowId>,
    by_window: HashMap<WindowId, ObjectId>,
}

impl SurfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pairing. Returns false, leaving the table untouched, if
    /// either side is already paired.
    pub fn insert(&mut self, surface: ObjectId, window: WindowId) -> bool {
        if self.by_surface.contains_key(&surface) || self.by_window.contains_key(&window) {
            return false;
        }
        self.by_surface.insert(surface, window);
        self.by_window.insert(window, surface);
        true
    }

    pub fn window(&self, surface: ObjectId) -> Option<WindowId> {
        self.by_surface.get(&surface).copied()
    }

    pub fn surface(&self, window: WindowId) -> Option<ObjectId> {
        self.by_window.get(&window).copied()
    }

    pub fn remove_window(&mut self, window: WindowId) -> Option<ObjectId> {
        let surface = self.by_window.remove(&window)?;
        self.by_surface.remove(&surface);
        Some(surface)
    }

    pub fn len(&self) -> usize {
        self.by_surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_surface.is_empty()
    }
}

/// Damaged region of a window, as corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl DamageBox {
    pub fn width(&self) -> i32 {
        self.x2.wrapping_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.wrapping_sub(self.y1)
    }
}
