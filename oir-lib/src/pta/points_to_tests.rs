use proptest::prelude::*;

use super::points_to::PointsToSet;
use crate::heap::ObjId;

fn set(indices: &[usize]) -> PointsToSet<ObjId> {
    indices.iter().map(|&i| ObjId(i)).collect()
}

#[test]
fn delta_holds_only_new_objects() {
    let mut pts = set(&[1, 3]);
    let diff = pts.add_all_diff(&set(&[0, 3, 70]));
    assert_eq!(diff, set(&[0, 70]));
    assert_eq!(pts, set(&[0, 1, 3, 70]));
    assert_eq!(pts.len(), 4);
    assert!(pts.add_all_diff(&set(&[70])).is_empty());
}

#[test]
fn equality_ignores_capacity() {
    let mut grown = set(&[2, 100]);
    grown.add_all_diff(&set(&[]));
    let mut small = set(&[2]);
    small.insert(ObjId(100));
    assert_eq!(grown, small);
    assert!(grown.intersects(&set(&[100])));
    assert!(!grown.intersects(&set(&[3, 99])));
}

proptest! {
    #[test]
    fn propagation_is_monotone_and_idempotent(
        start in prop::collection::vec(0usize..200, 0..20),
        incoming in prop::collection::vec(0usize..200, 0..20),
    ) {
        let before = set(&start);
        let mut pts = before.clone();
        let incoming = set(&incoming);
        let diff = pts.add_all_diff(&incoming);

        for obj in before.iter().chain(incoming.iter()) {
            prop_assert!(pts.contains(obj));
        }
        for obj in diff.iter() {
            prop_assert!(!before.contains(obj));
        }
        prop_assert_eq!(pts.len(), before.len() + diff.len());
        prop_assert!(pts.add_all_diff(&incoming).is_empty());
    }
}
