use crate::drone::ScanReport;
use rstar::{RTree, RTreeObject, AABB};

impl RTreeObject for ScanReport {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Build an R*-tree over scan reports via bulk_load (O(n log n)).
pub fn build_index(reports: &[ScanReport]) -> RTree<ScanReport> {
    RTree::bulk_load(reports.to_vec())
}

/// Reports within `radius` of `center`. Uses an AABB envelope query then
/// filters by Euclidean distance.
pub fn reports_within(
    tree: &RTree<ScanReport>,
    center: [f64; 2],
    radius: f64,
) -> Vec<ScanReport> {
    let envelope = AABB::from_corners(
        [center[0] - radius, center[1] - radius],
        [center[0] + radius, center[1] + radius],
    );
    let r_sq = radius * radius;

    tree.locate_in_envelope(&envelope)
        .filter(|report| {
            let dx = report.position[0] - center[0];
            let dy = report.position[1] - center[1];
            dx * dx + dy * dy <= r_sq
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: u32, x: f64, y: f64) -> ScanReport {
        ScanReport {
            drone_id: id,
            position: [x, y],
            density: 0.5,
        }
    }

    #[test]
    fn envelope_query_filters_by_euclidean_distance() {
        let reports = vec![
            report(0, 0.0, 0.0),
            report(1, 3.0, 0.0),
            // Inside the 5x5 envelope corner but outside the radius.
            report(2, 4.5, 4.5),
            report(3, 20.0, 20.0),
        ];
        let tree = build_index(&reports);
        let hits = reports_within(&tree, [0.0, 0.0], 5.0);
        let mut ids: Vec<u32> = hits.iter().map(|r| r.drone_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
    }
}
