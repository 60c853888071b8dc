//! Small vector helpers for vertex lookup and quad ordering.
//!
//! Positions of either dimension are lifted to `[f64; 3]` (z = 0 in 2D) so
//! the same code serves both.

const EPS: f64 = 1e-12;

pub(crate) fn lift(position: &[f64]) -> [f64; 3] {
    let mut p = [0.0; 3];
    for (dst, src) in p.iter_mut().zip(position) {
        *dst = *src;
    }
    p
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Squared Euclidean distance between two positions of equal length.
pub(crate) fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Returns the permutation of `corners` that walks them around their
/// centroid, or `None` if all corners are collinear.
///
/// The quad's plane normal is taken from the first non-degenerate corner
/// triple; angles are measured in that plane.
pub(crate) fn ring_order(corners: &[[f64; 3]; 4]) -> Option<[usize; 4]> {
    let mut centroid = [0.0; 3];
    for c in corners {
        for k in 0..3 {
            centroid[k] += c[k] / 4.0;
        }
    }

    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    let normal = TRIPLES.iter().find_map(|&(a, b, c)| {
        let n = cross(sub(corners[b], corners[a]), sub(corners[c], corners[a]));
        let len = norm(n);
        (len > EPS).then(|| [n[0] / len, n[1] / len, n[2] / len])
    })?;

    let r0 = sub(corners[0], centroid);
    let r0_len = norm(r0);
    if r0_len <= EPS {
        return None;
    }
    let u = [r0[0] / r0_len, r0[1] / r0_len, r0[2] / r0_len];
    let w = cross(normal, u);

    let mut order = [0usize, 1, 2, 3];
    let angle = |i: usize| {
        let d = sub(corners[i], centroid);
        dot(d, w).atan2(dot(d, u))
    };
    order.sort_by(|&a, &b| angle(a).total_cmp(&angle(b)));
    Some(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_order_untangles_a_bowtie() {
        // Input order 0,1,2,3 = (0,0) (1,1) (1,0) (0,1) is self-intersecting.
        let corners = [
            lift(&[0.0, 0.0]),
            lift(&[1.0, 1.0]),
            lift(&[1.0, 0.0]),
            lift(&[0.0, 1.0]),
        ];
        let order = ring_order(&corners).unwrap();
        // Consecutive corners in the ring must never be diagonal partners.
        for k in 0..4 {
            let (a, b) = (order[k], order[(k + 1) % 4]);
            let pair = (a.min(b), a.max(b));
            assert!(pair != (0, 1) && pair != (2, 3), "diagonal {pair:?} in {order:?}");
        }
    }

    #[test]
    fn ring_order_rejects_collinear() {
        let corners = [
            lift(&[0.0, 0.0, 0.0]),
            lift(&[1.0, 0.0, 0.0]),
            lift(&[2.0, 0.0, 0.0]),
            lift(&[3.0, 0.0, 0.0]),
        ];
        assert!(ring_order(&corners).is_none());
    }

    #[test]
    fn distance_matches_components() {
        assert_eq!(distance_squared(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }
}
