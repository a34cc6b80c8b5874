/// COCO bone pairs joined by a drawn line.
pub const SKELETON_CONNECTIONS: [(usize, usize); 16] = [
    // head
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    // arms
    (5, 6),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    // torso
    (5, 11),
    (6, 12),
    (11, 12),
    // legs
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

/// Connections whose endpoints both exist in a set of `len` keypoints.
pub fn connections_within(len: usize) -> impl Iterator<Item = (usize, usize)> {
    SKELETON_CONNECTIONS
        .iter()
        .copied()
        .filter(move |&(a, b)| a < len && b < len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pose_keeps_every_connection() {
        assert_eq!(connections_within(17).count(), SKELETON_CONNECTIONS.len());
    }

    #[test]
    fn short_pose_drops_out_of_bounds_pairs() {
        let pairs: Vec<_> = connections_within(5).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 3), (2, 4)]);
        assert_eq!(connections_within(0).count(), 0);
    }
}
