use crate::types::{Color, Pt};

/// One path segment in milli-points relative to the path anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOp {
    MoveTo(i32, i32),
    LineTo(i32, i32),
    CubicTo(i32, i32, i32, i32, i32, i32),
    Close,
}

/// Anchor-relative filled vector shape. Coordinates grow right and down,
/// matching the page flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorPath {
    pub ops: &'static [PathOp],
    pub fill: Color,
    pub width_milli: i32,
    pub height_milli: i32,
}

impl VectorPath {
    pub fn width(&self) -> Pt {
        Pt::from_milli_i64(self.width_milli as i64)
    }

    pub fn height(&self) -> Pt {
        Pt::from_milli_i64(self.height_milli as i64)
    }

    /// Resolves every op against an absolute anchor.
    pub fn placed(&self, x: Pt, y: Pt) -> impl Iterator<Item = PlacedOp> + '_ {
        let at = move |dx: i32, dy: i32| {
            (
                x + Pt::from_milli_i64(dx as i64),
                y + Pt::from_milli_i64(dy as i64),
            )
        };
        self.ops.iter().map(move |op| match *op {
            PathOp::MoveTo(dx, dy) => PlacedOp::MoveTo(at(dx, dy)),
            PathOp::LineTo(dx, dy) => PlacedOp::LineTo(at(dx, dy)),
            PathOp::CubicTo(x1, y1, x2, y2, x3, y3) => {
                PlacedOp::CubicTo(at(x1, y1), at(x2, y2), at(x3, y3))
            }
            PathOp::Close => PlacedOp::Close,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacedOp {
    MoveTo((Pt, Pt)),
    LineTo((Pt, Pt)),
    CubicTo((Pt, Pt), (Pt, Pt), (Pt, Pt)),
    Close,
}

// Two interlocking rounded chevrons, 22 x 14pt.
const BRAND_MARK_OPS: &[PathOp] = &[
    PathOp::MoveTo(0, 7_000),
    PathOp::CubicTo(0, 3_134, 3_134, 0, 7_000, 0),
    PathOp::LineTo(9_500, 0),
    PathOp::CubicTo(7_600, 1_900, 6_500, 4_300, 6_500, 7_000),
    PathOp::CubicTo(6_500, 9_700, 7_600, 12_100, 9_500, 14_000),
    PathOp::LineTo(7_000, 14_000),
    PathOp::CubicTo(3_134, 14_000, 0, 10_866, 0, 7_000),
    PathOp::Close,
    PathOp::MoveTo(12_500, 0),
    PathOp::LineTo(15_000, 0),
    PathOp::CubicTo(18_866, 0, 22_000, 3_134, 22_000, 7_000),
    PathOp::CubicTo(22_000, 10_866, 18_866, 14_000, 15_000, 14_000),
    PathOp::LineTo(12_500, 14_000),
    PathOp::CubicTo(14_400, 12_100, 15_500, 9_700, 15_500, 7_000),
    PathOp::CubicTo(15_500, 4_300, 14_400, 1_900, 12_500, 0),
    PathOp::Close,
];

pub const BRAND_MARK: VectorPath = VectorPath {
    ops: BRAND_MARK_OPS,
    fill: Color {
        r: 1.0,
        g: 69.0 / 255.0,
        b: 0.0,
    },
    width_milli: 22_000,
    height_milli: 14_000,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_uses_the_accent_colour() {
        assert_eq!(BRAND_MARK.fill, crate::style::accent());
    }

    #[test]
    fn placement_offsets_every_point() {
        let placed: Vec<_> = BRAND_MARK.placed(Pt::from_i32(32), Pt::from_i32(24)).collect();
        assert_eq!(placed.len(), BRAND_MARK.ops.len());
        assert_eq!(
            placed[0],
            PlacedOp::MoveTo((Pt::from_i32(32), Pt::from_i32(31)))
        );
        assert_eq!(placed.last(), Some(&PlacedOp::Close));
    }

    #[test]
    fn mark_stays_inside_its_box() {
        let inside = |x: i32, y: i32| {
            (0..=BRAND_MARK.width_milli).contains(&x) && (0..=BRAND_MARK.height_milli).contains(&y)
        };
        for op in BRAND_MARK.ops {
            match *op {
                PathOp::MoveTo(x, y) | PathOp::LineTo(x, y) => assert!(inside(x, y)),
                PathOp::CubicTo(x1, y1, x2, y2, x3, y3) => {
                    assert!(inside(x1, y1) && inside(x2, y2) && inside(x3, y3))
                }
                PathOp::Close => {}
            }
        }
    }
}
