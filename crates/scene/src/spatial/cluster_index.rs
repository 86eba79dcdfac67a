use std::collections::BTreeMap;

use foundation::math::{Vec2, pixel_span, project, stable_total_cmp_f64, unproject};
use foundation::{DeviceId, LatLng};

use super::{Aggregate, ClusterId, ClusterNode, ClusterParams, Clusterer};
use crate::device::DevicePoint;

/// In-process hierarchical clustering.
///
/// Points are projected into the web-mercator unit square and sorted into a
/// canonical order (device id, then coordinates). Level `max_zoom + 1` holds
/// one node per point; every coarser level is built from the next finer one by
/// greedy radius merging, so a node at zoom `z` is always the union of its
/// children at `z + 1`. That nesting is what makes expansion zoom
/// well-defined.
///
/// The hierarchy depends only on ids and coordinates and is rebuilt only when
/// those change. Rating or status updates just refresh the stored records.
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    params: ClusterParams,
    points: Vec<DevicePoint>,
    levels: Vec<Level>,
    last_zoom: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct Level {
    nodes: Vec<LevelNode>,
}

#[derive(Debug, Clone)]
struct LevelNode {
    pos: Vec2,
    /// Indices into `points`, ascending.
    members: Vec<usize>,
    /// Indices into the next finer level, ascending.
    children: Vec<usize>,
}

impl Default for ClusterIndex {
    fn default() -> Self {
        Self::new(ClusterParams::default())
    }
}

impl ClusterIndex {
    pub fn new(params: ClusterParams) -> Self {
        Self {
            params,
            points: Vec::new(),
            levels: Vec::new(),
            last_zoom: None,
        }
    }

    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    fn load(&mut self, devices: &[DevicePoint]) {
        let mut points = devices.to_vec();
        points.sort_by(canonical_cmp);

        let same_geometry = !self.levels.is_empty()
            && points.len() == self.points.len()
            && points
                .iter()
                .zip(&self.points)
                .all(|(a, b)| a.id == b.id && a.location == b.location);
        self.points = points;
        if same_geometry {
            return;
        }

        let leaf_zoom = self.params.leaf_zoom() as usize;
        let mut levels = vec![Level::default(); leaf_zoom + 1];
        levels[leaf_zoom].nodes = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| LevelNode {
                pos: project(p.location),
                members: vec![i],
                children: Vec::new(),
            })
            .collect();

        for z in (0..leaf_zoom).rev() {
            levels[z] = cluster_level(&levels[z + 1], z, &self.params);
        }

        tracing::debug!(
            points = self.points.len(),
            top_level_nodes = levels[0].nodes.len(),
            "cluster hierarchy rebuilt"
        );
        self.levels = levels;
    }

    fn level_for(&self, zoom: f64) -> usize {
        let leaf_zoom = self.params.leaf_zoom() as usize;
        if zoom.is_nan() || zoom <= 0.0 {
            return 0;
        }
        let z = zoom.floor();
        if z >= leaf_zoom as f64 {
            leaf_zoom
        } else {
            z as usize
        }
    }

    fn to_cluster_node(&self, zoom: usize, slot: usize) -> ClusterNode {
        let node = &self.levels[zoom].nodes[slot];
        if let [only] = node.members.as_slice() {
            return ClusterNode::Leaf(self.points[*only].clone());
        }
        ClusterNode::Aggregate(Aggregate {
            id: ClusterId::new(zoom as u8, slot as u32),
            centroid: unproject(node.pos),
            count: node.members.len(),
            expansion_zoom: self.expansion_from(zoom, slot),
            members: node
                .members
                .iter()
                .map(|&i| self.points[i].id.clone())
                .collect(),
        })
    }

    fn expansion_from(&self, mut zoom: usize, mut slot: usize) -> u8 {
        loop {
            match self.levels[zoom].nodes[slot].children.as_slice() {
                [only] => {
                    zoom += 1;
                    slot = *only;
                }
                [] => return zoom as u8,
                _ => return (zoom + 1) as u8,
            }
        }
    }
}

impl Clusterer for ClusterIndex {
    fn build(&mut self, devices: &[DevicePoint], zoom: f64) -> Vec<ClusterNode> {
        self.load(devices);
        let z = self.level_for(zoom);
        self.last_zoom = Some(z);
        if self.levels.is_empty() {
            return Vec::new();
        }
        (0..self.levels[z].nodes.len())
            .map(|slot| self.to_cluster_node(z, slot))
            .collect()
    }

    fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        let zoom = id.zoom as usize;
        let slot = id.slot as usize;
        let node = self.levels.get(zoom)?.nodes.get(slot)?;
        if node.members.len() < 2 {
            return None;
        }
        Some(self.expansion_from(zoom, slot))
    }

    fn locate(&self, device: &DeviceId, at: LatLng) -> Option<ClusterNode> {
        let zoom = self.last_zoom?;
        let idx = self
            .points
            .iter()
            .position(|p| &p.id == device && p.location == at)?;
        let slot = self
            .levels
            .get(zoom)?
            .nodes
            .iter()
            .position(|n| n.members.binary_search(&idx).is_ok())?;
        Some(self.to_cluster_node(zoom, slot))
    }
}

fn canonical_cmp(a: &DevicePoint, b: &DevicePoint) -> std::cmp::Ordering {
    a.id.cmp(&b.id)
        .then_with(|| stable_total_cmp_f64(a.location.lat(), b.location.lat()))
        .then_with(|| stable_total_cmp_f64(a.location.lng(), b.location.lng()))
}

/// Builds level `zoom` by merging nodes of the finer level.
///
/// Nodes are visited in slot order; each unvisited node absorbs every still
/// unvisited node within the pixel radius. Merged positions are
/// member-weighted centroids in projected space.
fn cluster_level(finer: &Level, zoom: usize, params: &ClusterParams) -> Level {
    let radius = params.radius_px * pixel_span(zoom as f64, params.extent_px);
    let n = finer.nodes.len();
    let mut out = Level {
        nodes: Vec::with_capacity(n),
    };

    if radius.is_nan() || radius <= 0.0 {
        out.nodes = (0..n).map(|i| carry(finer, i)).collect();
        return out;
    }

    let grid = Grid::new(&finer.nodes, radius);
    let mut visited = vec![false; n];

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let node = &finer.nodes[i];

        let neighbors: Vec<usize> = grid
            .within(&finer.nodes, node.pos, radius)
            .into_iter()
            .filter(|&j| !visited[j])
            .collect();
        let weight = node.members.len()
            + neighbors
                .iter()
                .map(|&j| finer.nodes[j].members.len())
                .sum::<usize>();

        if neighbors.is_empty() || weight < params.min_points {
            out.nodes.push(carry(finer, i));
            continue;
        }

        let mut children = Vec::with_capacity(neighbors.len() + 1);
        children.push(i);
        children.extend(neighbors);

        let mut weighted = Vec2::new(0.0, 0.0);
        let mut members = Vec::with_capacity(weight);
        for &c in &children {
            visited[c] = true;
            let child = &finer.nodes[c];
            weighted = weighted + child.pos.scale(child.members.len() as f64);
            members.extend_from_slice(&child.members);
        }
        members.sort_unstable();

        out.nodes.push(LevelNode {
            pos: weighted.scale(1.0 / weight as f64),
            members,
            children,
        });
    }

    out
}

fn carry(finer: &Level, i: usize) -> LevelNode {
    let node = &finer.nodes[i];
    LevelNode {
        pos: node.pos,
        members: node.members.clone(),
        children: vec![i],
    }
}

/// Uniform bucket grid with cell size equal to the query radius, so a radius
/// query only has to inspect the 3x3 cells around the center.
struct Grid {
    cell: f64,
    cells: BTreeMap<(i64, i64), Vec<usize>>,
}

impl Grid {
    fn new(nodes: &[LevelNode], cell: f64) -> Self {
        let mut cells: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            cells.entry(cell_key(node.pos, cell)).or_default().push(i);
        }
        Self { cell, cells }
    }

    /// Indices of nodes within `radius` of `center`, ascending.
    fn within(&self, nodes: &[LevelNode], center: Vec2, radius: f64) -> Vec<usize> {
        let (cx, cy) = cell_key(center, self.cell);
        let r2 = radius * radius;
        let mut hits = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                hits.extend(
                    bucket
                        .iter()
                        .copied()
                        .filter(|&j| nodes[j].pos.distance_squared(center) <= r2),
                );
            }
        }
        hits.sort_unstable();
        hits
    }
}

fn cell_key(p: Vec2, cell: f64) -> (i64, i64) {
    ((p.x / cell).floor() as i64, (p.y / cell).floor() as i64)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::ClusterIndex;
    use crate::device::DevicePoint;
    use crate::spatial::{ClusterNode, ClusterParams, Clusterer};
    use foundation::{DeviceId, LatLng};
    use pretty_assertions::assert_eq;

    fn dev(id: &str, lat: f64, lng: f64) -> DevicePoint {
        DevicePoint::new(id, id.to_uppercase(), LatLng::new(lat, lng).unwrap())
    }

    /// Three devices in Vienna a few hundred meters apart, one in Graz.
    fn sample() -> Vec<DevicePoint> {
        vec![
            dev("dev1", 48.1857, 16.3717),
            dev("dev2", 48.1927, 16.3577),
            dev("dev3", 48.1747, 16.3847),
            dev("graz", 47.0707, 15.4395),
        ]
    }

    fn membership(nodes: &[ClusterNode]) -> BTreeSet<Vec<String>> {
        nodes
            .iter()
            .map(|n| {
                let mut ids: Vec<String> =
                    n.member_ids().iter().map(|id| id.to_string()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    fn assert_exact_partition(devices: &[DevicePoint], nodes: &[ClusterNode]) {
        let mut seen: Vec<String> = nodes
            .iter()
            .flat_map(|n| n.member_ids().into_iter().map(|id| id.to_string()))
            .collect();
        seen.sort();
        let mut expected: Vec<String> = devices.iter().map(|d| d.id.to_string()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn every_zoom_is_an_exact_partition() {
        let devices = sample();
        let mut index = ClusterIndex::default();
        for z in 0..=18 {
            let nodes = index.build(&devices, z as f64);
            assert_exact_partition(&devices, &nodes);
        }
    }

    #[test]
    fn build_is_idempotent() {
        let devices = sample();
        let mut index = ClusterIndex::default();
        let a = index.build(&devices, 11.0);
        let b = index.build(&devices, 11.0);
        assert_eq!(a, b);

        let mut fresh = ClusterIndex::default();
        assert_eq!(membership(&fresh.build(&devices, 11.0)), membership(&a));
    }

    #[test]
    fn membership_does_not_depend_on_input_order() {
        let devices = sample();
        let mut reversed = devices.clone();
        reversed.reverse();

        let mut index = ClusterIndex::default();
        for z in [3.0, 9.0, 12.5, 15.0] {
            let a = membership(&index.build(&devices, z));
            let b = membership(&ClusterIndex::default().build(&reversed, z));
            assert_eq!(a, b, "zoom {z}");
        }
    }

    #[test]
    fn nearby_points_merge_at_low_zoom_and_split_when_zoomed_in() {
        let devices = sample();
        let mut index = ClusterIndex::default();

        let city = index.build(&devices, 10.0);
        assert_eq!(
            membership(&city),
            BTreeSet::from([
                vec!["dev1".to_string(), "dev2".to_string(), "dev3".to_string()],
                vec!["graz".to_string()],
            ])
        );

        let street = index.build(&devices, 17.0);
        assert_eq!(street.len(), 4);
        assert!(street.iter().all(|n| !n.is_aggregate()));
    }

    #[test]
    fn expansion_zoom_is_first_zoom_that_splits() {
        let devices = sample();
        let mut index = ClusterIndex::default();
        let nodes = index.build(&devices, 10.0);
        let agg = nodes
            .iter()
            .find_map(|n| match n {
                ClusterNode::Aggregate(a) => Some(a.clone()),
                _ => None,
            })
            .expect("vienna cluster");

        let ez = index.expansion_zoom(agg.id).unwrap();
        assert_eq!(ez, agg.expansion_zoom);
        assert!(ez > 10);

        let at_ez = index.build(&devices, ez as f64);
        let vienna: Vec<DeviceId> = ["dev1", "dev2", "dev3"].map(DeviceId::from).to_vec();
        let vienna_nodes = at_ez
            .iter()
            .filter(|n| vienna.iter().any(|id| n.contains(id)))
            .count();
        assert!(vienna_nodes >= 2);

        let before = index.build(&devices, (ez - 1) as f64);
        let together = before
            .iter()
            .any(|n| n.member_count() == 3 && n.contains(&DeviceId::new("dev1")));
        assert!(together);
    }

    #[test]
    fn identical_coordinates_split_only_at_leaf_zoom() {
        let devices = vec![dev("a", 48.2, 16.4), dev("b", 48.2, 16.4)];
        let params = ClusterParams::default();
        let mut index = ClusterIndex::new(params);
        let nodes = index.build(&devices, params.max_zoom as f64);
        assert_eq!(nodes.len(), 1);
        let ClusterNode::Aggregate(a) = &nodes[0] else {
            panic!("expected aggregate");
        };
        assert_eq!(a.expansion_zoom, params.leaf_zoom());
        assert_eq!(index.build(&devices, 40.0).len(), 2);
    }

    #[test]
    fn locate_reports_leaf_or_enclosing_aggregate() {
        let devices = sample();
        let mut index = ClusterIndex::default();
        let dev1 = devices[0].clone();

        index.build(&devices, 17.0);
        assert!(matches!(
            index.locate(&dev1.id, dev1.location),
            Some(ClusterNode::Leaf(_))
        ));

        index.build(&devices, 8.0);
        let found = index.locate(&dev1.id, dev1.location).unwrap();
        assert!(found.is_aggregate());
        assert!(found.contains(&dev1.id));

        let elsewhere = LatLng::new(0.0, 0.0).unwrap();
        assert!(index.locate(&dev1.id, elsewhere).is_none());
        assert!(index.locate(&DeviceId::new("gone"), dev1.location).is_none());
    }

    #[test]
    fn rating_changes_refresh_leaves_without_reclustering() {
        let mut devices = sample();
        let mut index = ClusterIndex::default();
        index.build(&devices, 17.0);

        devices[0] = devices[0].clone().with_rating(3.0, 9);
        let nodes = index.build(&devices, 17.0);
        let leaf = nodes
            .iter()
            .find_map(|n| match n {
                ClusterNode::Leaf(d) if d.id.as_str() == "dev1" => Some(d),
                _ => None,
            })
            .unwrap();
        assert_eq!(leaf.rating_count, 9);
    }

    #[test]
    fn empty_input_builds_nothing() {
        let mut index = ClusterIndex::default();
        assert!(index.build(&[], 5.0).is_empty());
        assert!(index.locate(&DeviceId::new("x"), LatLng::new(0.0, 0.0).unwrap()).is_none());
    }

    #[test]
    fn out_of_range_zoom_is_clamped() {
        let devices = sample();
        let mut index = ClusterIndex::default();
        assert_eq!(
            membership(&index.build(&devices, -3.0)),
            membership(&index.build(&devices, 0.0))
        );
        assert_eq!(index.build(&devices, f64::INFINITY).len(), devices.len());
        assert_exact_partition(&devices, &index.build(&devices, f64::NAN));
    }
}
