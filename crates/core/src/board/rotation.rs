//! Subboard rotations
//!
//! A rotation index selects one of the four 3x3 quadrants and a direction:
//!
//! | index | quadrant     | direction         |
//! |-------|--------------|-------------------|
//! | 0     | top left     | counter-clockwise |
//! | 1     | top left     | clockwise         |
//! | 2     | top right    | counter-clockwise |
//! | 3     | top right    | clockwise         |
//! | 4     | bottom left  | counter-clockwise |
//! | 5     | bottom left  | clockwise         |
//! | 6     | bottom right | counter-clockwise |
//! | 7     | bottom right | clockwise         |

/// Number of distinct rotation indexes
pub const ROTATIONS: usize = 8;

/// Decoded rotation index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub top: bool,
    pub left: bool,
    pub clockwise: bool,
}

impl Rotation {
    /// Decode a rotation index. Returns `None` outside 0..8.
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= ROTATIONS {
            return None;
        }
        Some(Self {
            top: index < 4,
            left: matches!(index, 0 | 1 | 4 | 5),
            clockwise: index % 2 == 1,
        })
    }

    /// Inverse of [`Rotation::from_index`]
    pub fn index(self) -> usize {
        let quadrant = match (self.top, self.left) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        quadrant * 2 + usize::from(self.clockwise)
    }

    /// The same quadrant turned the other way
    pub fn inverse(self) -> Self {
        Self {
            clockwise: !self.clockwise,
            ..self
        }
    }
}
