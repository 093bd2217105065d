//! Connected component detection
//!
//! A connected component is a maximal set of live points reachable from each
//! other through live springs. Components are recomputed from scratch with a
//! flood fill whenever the structure changes. Rather than clearing a visited
//! flag on every point before each pass, every pass gets a fresh visit
//! sequence number and a point counts as visited when it carries it.

use std::collections::VecDeque;

use super::points::Points;
use super::springs::Springs;
use super::types::{
    ConnectedComponentId, NONE_CONNECTED_COMPONENT_ID, NONE_VISIT_SEQUENCE_NUMBER,
    VisitSequenceNumber,
};

/// Process-wide visit sequence, shared by every ship of a world
#[derive(Debug, Clone)]
pub struct VisitSequence {
    current: VisitSequenceNumber,
}

impl Default for VisitSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitSequence {
    pub fn new() -> Self {
        Self {
            current: NONE_VISIT_SEQUENCE_NUMBER,
        }
    }

    /// Start a new pass and return its number (never the NONE sentinel)
    pub fn next(&mut self) -> VisitSequenceNumber {
        self.current += 1;
        if self.current == NONE_VISIT_SEQUENCE_NUMBER {
            self.current += 1;
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> VisitSequenceNumber {
        self.current
    }
}

/// Stamp every live point with its component id; returns the component count
///
/// Ids start at 1 in every pass. Deleted points get the NONE id.
pub fn detect_connected_components(
    points: &mut Points,
    springs: &Springs,
    visit_sequence: &mut VisitSequence,
) -> u32 {
    let visit_sequence_number = visit_sequence.next();

    let mut next_connected_component_id: ConnectedComponentId = NONE_CONNECTED_COMPONENT_ID + 1;
    let mut points_to_visit = VecDeque::new();

    for start in points.iter() {
        if points.is_deleted(start) {
            points.set_connected_component_id(start, NONE_CONNECTED_COMPONENT_ID);
            continue;
        }

        if points.current_connected_component_detection_visit_sequence_number(start)
            == visit_sequence_number
        {
            continue;
        }

        let connected_component_id = next_connected_component_id;
        next_connected_component_id += 1;

        points.set_current_connected_component_detection_visit_sequence_number(
            start,
            visit_sequence_number,
        );
        points.set_connected_component_id(start, connected_component_id);
        points_to_visit.push_back(start);

        while let Some(point_index) = points_to_visit.pop_front() {
            for i in 0..points.connected_springs(point_index).len() {
                let spring_index = points.connected_springs(point_index)[i];
                if springs.is_deleted(spring_index) {
                    continue;
                }

                let other = springs.other_endpoint(spring_index, point_index);
                if points.is_deleted(other)
                    || points.current_connected_component_detection_visit_sequence_number(other)
                        == visit_sequence_number
                {
                    continue;
                }

                points.set_current_connected_component_detection_visit_sequence_number(
                    other,
                    visit_sequence_number,
                );
                points.set_connected_component_id(other, connected_component_id);
                points_to_visit.push_back(other);
            }
        }
    }

    let count = next_connected_component_id - 1;
    log::debug!("Detected {count} connected components (pass {visit_sequence_number})");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::parameters::GameParameters;
    use crate::sim::types::{ElementIndex, NONE_ELEMENT_INDEX};
    use glam::{Vec2, Vec3};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn material() -> Arc<Material> {
        Arc::new(Material {
            name: "Test".to_string(),
            mass: 1.0,
            strength: 1.0,
            stiffness: 1.0,
            structural_colour: [0, 0, 0],
            render_colour: Vec3::ONE,
            is_hull: false,
            is_rope: false,
            electrical_properties: None,
            sound_properties: None,
        })
    }

    /// A chain of `count` points linked by the given springs
    fn build(count: u32, links: &[(ElementIndex, ElementIndex)]) -> (Points, Springs) {
        let mut points = Points::new(count);
        for i in 0..count {
            points.add(
                Vec2::new(i as f32, 0.0),
                material(),
                false,
                false,
                NONE_ELEMENT_INDEX,
                1.0,
                Vec3::ONE,
                Vec2::ZERO,
            );
        }
        let mut springs = Springs::new(links.len() as u32);
        let parameters = GameParameters::default();
        for &(a, b) in links {
            springs.add(a, b, material(), &mut points, &parameters);
        }
        (points, springs)
    }

    #[test]
    fn test_two_islands() {
        let (mut points, springs) = build(5, &[(0, 1), (1, 2), (3, 4)]);
        let mut sequence = VisitSequence::new();

        let count = detect_connected_components(&mut points, &springs, &mut sequence);

        assert_eq!(count, 2);
        assert_eq!(points.connected_component_id(0), 1);
        assert_eq!(points.connected_component_id(2), 1);
        assert_eq!(points.connected_component_id(3), 2);
        assert_eq!(points.connected_component_id(4), 2);
    }

    #[test]
    fn test_breaking_a_spring_splits_component() {
        let (mut points, mut springs) = build(4, &[(0, 1), (1, 2), (2, 3)]);
        let mut sequence = VisitSequence::new();
        assert_eq!(detect_connected_components(&mut points, &springs, &mut sequence), 1);

        springs.destroy(1, &mut points);
        assert_eq!(detect_connected_components(&mut points, &springs, &mut sequence), 2);
        assert_ne!(points.connected_component_id(1), points.connected_component_id(2));
    }

    #[test]
    fn test_deleted_points_get_no_component() {
        let (mut points, mut springs) = build(3, &[(0, 1), (1, 2)]);
        for s in points.connected_springs(2).to_vec() {
            springs.destroy(s, &mut points);
        }
        points.destroy(2);

        let mut sequence = VisitSequence::new();
        assert_eq!(detect_connected_components(&mut points, &springs, &mut sequence), 1);
        assert_eq!(points.connected_component_id(2), NONE_CONNECTED_COMPONENT_ID);
    }

    #[test]
    fn test_every_pass_stamps_a_fresh_sequence_number() {
        let (mut points, springs) = build(2, &[(0, 1)]);
        let mut sequence = VisitSequence::new();

        detect_connected_components(&mut points, &springs, &mut sequence);
        let first = points.current_connected_component_detection_visit_sequence_number(0);
        detect_connected_components(&mut points, &springs, &mut sequence);
        let second = points.current_connected_component_detection_visit_sequence_number(0);

        assert_ne!(first, NONE_VISIT_SEQUENCE_NUMBER);
        assert!(second > first);
        assert_eq!(points.connected_component_id(0), 1);
    }

    #[test]
    fn test_same_component_means_reachable() {
        let links = [(0, 1), (2, 3), (3, 4), (5, 6), (6, 7), (7, 5)];
        let (mut points, springs) = build(9, &links);
        let mut sequence = VisitSequence::new();
        let count = detect_connected_components(&mut points, &springs, &mut sequence);

        // 8 is isolated
        assert_eq!(count, 4);

        // Reachability via a naive closure over the link list
        let reachable = |from: u32| -> HashSet<u32> {
            let mut seen = HashSet::from([from]);
            loop {
                let before = seen.len();
                for &(a, b) in &links {
                    if seen.contains(&a) {
                        seen.insert(b);
                    }
                    if seen.contains(&b) {
                        seen.insert(a);
                    }
                }
                if seen.len() == before {
                    return seen;
                }
            }
        };

        for p in 0..9 {
            let closure = reachable(p);
            for q in 0..9 {
                let same = points.connected_component_id(p) == points.connected_component_id(q);
                assert_eq!(same, closure.contains(&q), "points {p} and {q}");
            }
        }
    }
}
