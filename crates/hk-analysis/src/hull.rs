//! 2-D convex hull (Quickhull) and point-in-hull tests.

use hk_core::Real;

pub type Point = [Real; 2];

/// `> 0` when `p` lies left of the directed line `a -> b`.
fn cross(a: Point, b: Point, p: Point) -> Real {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn dist(a: Point, b: Point) -> Real {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Convex hull vertices in counter-clockwise order.
///
/// Collinear and duplicate points are dropped, so a degenerate input yields
/// one or two vertices.
pub fn quickhull(points: &[Point]) -> Vec<Point> {
    let finite: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();
    let Some(&first) = finite.first() else {
        return Vec::new();
    };
    let lex = |a: &Point, b: &Point| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1]));
    let left = finite.iter().copied().min_by(lex).unwrap_or(first);
    let right = finite.iter().copied().max_by(lex).unwrap_or(first);
    if left == right {
        return vec![left];
    }

    let above: Vec<Point> = finite
        .iter()
        .copied()
        .filter(|p| cross(left, right, *p) > 0.0)
        .collect();
    let below: Vec<Point> = finite
        .iter()
        .copied()
        .filter(|p| cross(right, left, *p) > 0.0)
        .collect();

    // Counter-clockwise: left, lower chain, right, upper chain.
    let mut hull = vec![left];
    hull_side(right, left, &below, &mut hull);
    hull.push(right);
    hull_side(left, right, &above, &mut hull);
    hull
}

/// Push the hull vertices strictly left of `a -> b`, ordered from `b` back
/// to `a`.
fn hull_side(a: Point, b: Point, candidates: &[Point], out: &mut Vec<Point>) {
    let Some(far) = candidates
        .iter()
        .copied()
        .max_by(|p, q| cross(a, b, *p).total_cmp(&cross(a, b, *q)))
    else {
        return;
    };
    let right_of_far: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|p| cross(far, b, *p) > 0.0)
        .collect();
    let left_of_far: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|p| cross(a, far, *p) > 0.0)
        .collect();
    hull_side(far, b, &right_of_far, out);
    out.push(far);
    hull_side(a, far, &left_of_far, out);
}

/// For each point, whether it lies inside (or on) the hull.
pub fn points_inside_hull(hull: &[Point], points: &[Point]) -> Vec<bool> {
    points.iter().map(|p| inside(hull, *p)).collect()
}

fn inside(hull: &[Point], p: Point) -> bool {
    const REL_TOL: Real = 1e-9;
    match hull {
        [] => false,
        [a] => *a == p,
        [a, b] => {
            let len = dist(*a, *b);
            cross(*a, *b, p).abs() <= REL_TOL * len * dist(*a, p).max(len)
                && dist(*a, p) <= len * (1.0 + REL_TOL)
                && dist(*b, p) <= len * (1.0 + REL_TOL)
        }
        _ => (0..hull.len()).all(|i| {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            cross(a, b, p) >= -REL_TOL * dist(a, b) * dist(a, p)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_with_interior_points() {
        let pts = [
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.5, 0.5],
            [0.2, 0.7],
        ];
        let hull = quickhull(&pts);
        assert_eq!(hull.len(), 4);
        for corner in &pts[..4] {
            assert!(hull.contains(corner));
        }
        // counter-clockwise: signed area positive
        let area: Real = (0..hull.len())
            .map(|i| {
                let a = hull[i];
                let b = hull[(i + 1) % hull.len()];
                a[0] * b[1] - b[0] * a[1]
            })
            .sum();
        assert!(area > 0.0);
    }

    #[test]
    fn inside_outside() {
        let hull = quickhull(&[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]);
        let flags = points_inside_hull(&hull, &[[1.0, 1.0], [3.0, 1.0], [2.0, 1.0]]);
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn tiny_units_work() {
        let hull = quickhull(&[[0.0, 0.0], [3e-8, 0.0], [3e-8, 2e-10], [0.0, 1e-10]]);
        let flags = points_inside_hull(&hull, &[[1e-8, 5e-11], [1e-8, 3e-10]]);
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn collinear_input_degenerates() {
        let hull = quickhull(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(hull.len(), 2);
        assert_eq!(points_inside_hull(&hull, &[[1.5, 1.5], [3.0, 3.0]]), vec![true, false]);
    }
}
