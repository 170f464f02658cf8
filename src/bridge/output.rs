//! Host output tracking

use crate::protocol::ObjectId;

/// A host output as seen by the bridge.
///
/// Outputs are always placed at the origin; only their size follows the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub id: ObjectId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Output {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }

    pub fn set_geometry(&mut self, width: i32, height: i32) {
        self.x = 0;
        self.y = 0;
        self.width = width;
        self.height = height;
    }
}
