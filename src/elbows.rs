// src/elbows.rs - Elbow selection from a full pose
use crate::landmarks::{Landmark, LandmarkSet, LEFT_ELBOW, RIGHT_ELBOW};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElbowPositions {
    pub left_elbow: Option<Landmark>,
    pub right_elbow: Option<Landmark>,
}

impl ElbowPositions {
    pub fn is_empty(&self) -> bool {
        self.left_elbow.is_none() && self.right_elbow.is_none()
    }
}

/// Picks the elbows out of a landmark set.
///
/// A set too short to hold both elbows yields nothing rather than an error;
/// missing elbows are an ordinary per-frame outcome. Landmarks with
/// non-finite coordinates are dropped on their own side only.
pub fn extract(landmarks: &LandmarkSet) -> ElbowPositions {
    if landmarks.len() <= RIGHT_ELBOW {
        return ElbowPositions::default();
    }

    let valid = |index: usize| landmarks.get(index).copied().filter(Landmark::is_finite);

    ElbowPositions {
        left_elbow: valid(LEFT_ELBOW),
        right_elbow: valid(RIGHT_ELBOW),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::POSE_LANDMARK_COUNT;
    use proptest::prelude::*;

    fn full_pose() -> Vec<Landmark> {
        (0..POSE_LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f64 / 100.0, 0.5, 0.0))
            .collect()
    }

    #[test]
    fn test_picks_indices_13_and_14() {
        let elbows = extract(&LandmarkSet::new(full_pose()));
        assert_eq!(elbows.left_elbow.map(|l| l.x), Some(0.13));
        assert_eq!(elbows.right_elbow.map(|l| l.x), Some(0.14));
    }

    #[test]
    fn test_empty_set() {
        let elbows = extract(&LandmarkSet::default());
        assert!(elbows.is_empty());
    }

    #[test]
    fn test_exactly_fifteen_entries_is_enough() {
        let mut pose = full_pose();
        pose.truncate(15);
        let elbows = extract(&LandmarkSet::new(pose));
        assert!(elbows.left_elbow.is_some());
        assert!(elbows.right_elbow.is_some());
    }

    #[test]
    fn test_non_finite_side_is_dropped() {
        let mut pose = full_pose();
        pose[LEFT_ELBOW] = Landmark::new(f64::NAN, 0.5, 0.0);
        let elbows = extract(&LandmarkSet::new(pose));
        assert!(elbows.left_elbow.is_none());
        assert!(elbows.right_elbow.is_some());
    }

    proptest! {
        #[test]
        fn short_sets_yield_no_elbows(len in 0usize..15) {
            let pose: Vec<Landmark> = (0..len).map(|_| Landmark::new(0.5, 0.5, 0.0)).collect();
            prop_assert!(extract(&LandmarkSet::new(pose)).is_empty());
        }
    }
}
