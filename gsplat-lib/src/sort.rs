use crate::structures::SplatInstance;

/// Bucket count of the counting sort. Depths collapse onto this many
/// quantization steps, so ordering is exact only between buckets.
pub const DEPTH_BUCKETS: usize = 65536;

/// Draw order produced by a sort. Alpha blending wants back to front;
/// additive passes keep front to back cheaper on overdraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    BackToFront,
    FrontToBack,
}

/// Counting sort over view-space depth.
///
/// All scratch is owned and reused across calls, so a sorter that lives as
/// long as the render loop allocates only when the splat count grows.
#[derive(Debug)]
pub struct DepthSorter {
    depths: Vec<f32>,
    buckets: Vec<u32>,
    counts: Vec<u32>,
    starts: Vec<u32>,
    indices: Vec<u32>,
}

impl Default for DepthSorter {
    fn default() -> DepthSorter {
        DepthSorter::new()
    }
}

impl DepthSorter {
    pub fn new() -> DepthSorter {
        DepthSorter {
            depths: Vec::new(),
            buckets: Vec::new(),
            counts: vec![0; DEPTH_BUCKETS],
            starts: vec![0; DEPTH_BUCKETS],
            indices: Vec::new(),
        }
    }

    /// Sorts a packed `[x0, y0, z0, x1, ...]` position array.
    pub fn sort_positions(
        &mut self,
        positions: &[f32],
        z_axis: [f32; 3],
        order: SortOrder,
    ) -> &[u32] {
        let n = positions.len() / 3;
        self.sort_by(
            n,
            |i| [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]],
            z_axis,
            order,
        );
        &self.indices
    }

    /// Sorts instance records by their center points.
    pub fn sort_instances(
        &mut self,
        instances: &[SplatInstance],
        z_axis: [f32; 3],
        order: SortOrder,
    ) -> &[u32] {
        self.sort_by(
            instances.len(),
            |i| {
                let c = instances[i].center;
                [c[0], c[1], c[2]]
            },
            z_axis,
            order,
        );
        &self.indices
    }

    /// The permutation produced by the last sort.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Gathers `src` through the last permutation: `dst[j] = src[indices[j]]`.
    pub fn permute_into<T: Copy>(&self, src: &[T], dst: &mut [T]) {
        for (slot, &i) in dst.iter_mut().zip(&self.indices) {
            *slot = src[i as usize];
        }
    }

    fn sort_by<F: Fn(usize) -> [f32; 3]>(
        &mut self,
        n: usize,
        position: F,
        z_axis: [f32; 3],
        order: SortOrder,
    ) {
        self.depths.clear();
        self.depths.reserve(n);
        self.buckets.clear();
        self.buckets.reserve(n);
        self.indices.clear();
        if n == 0 {
            return;
        }

        // Depth and its range in one pass
        let mut min_depth = f32::INFINITY;
        let mut max_depth = f32::NEG_INFINITY;
        for i in 0..n {
            let [x, y, z] = position(i);
            let depth = x * z_axis[0] + y * z_axis[1] + z * z_axis[2];
            min_depth = min_depth.min(depth);
            max_depth = max_depth.max(depth);
            self.depths.push(depth);
        }

        self.indices.resize(n, 0);
        let range = max_depth - min_depth;
        if !(range > 0.0 && range.is_finite()) {
            // Degenerate depth field, keep source order
            for (i, slot) in self.indices.iter_mut().enumerate() {
                *slot = i as u32;
            }
            return;
        }

        let depth_inv = DEPTH_BUCKETS as f32 / range;
        for &depth in &self.depths {
            let bucket = (((depth - min_depth) * depth_inv) as u32).min(DEPTH_BUCKETS as u32 - 1);
            self.buckets.push(bucket);
        }

        self.counts.fill(0);
        for &bucket in &self.buckets {
            self.counts[bucket as usize] += 1;
        }

        // Exclusive prefix sum of bucket occupancy
        let mut total = 0u32;
        for (start, &count) in self.starts.iter_mut().zip(&self.counts) {
            *start = total;
            total += count;
        }

        // Stable scatter, source order preserved inside a bucket
        for (i, &bucket) in self.buckets.iter().enumerate() {
            let slot = self.starts[bucket as usize];
            self.indices[slot as usize] = i as u32;
            self.starts[bucket as usize] += 1;
        }

        if order == SortOrder::BackToFront {
            self.indices.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_positions(n: usize) -> Vec<f32> {
        let mut rng = rand::thread_rng();
        (0..n * 3).map(|_| rng.gen_range(-100.0..100.0)).collect()
    }

    fn depth(positions: &[f32], i: usize, axis: [f32; 3]) -> f32 {
        positions[i * 3] * axis[0] + positions[i * 3 + 1] * axis[1] + positions[i * 3 + 2] * axis[2]
    }

    #[test]
    fn test_indices_form_a_permutation() {
        let positions = random_positions(1000);
        let mut sorter = DepthSorter::new();
        let indices = sorter.sort_positions(&positions, [0.3, -0.5, 0.8], SortOrder::BackToFront);

        let mut seen = vec![false; 1000];
        for &i in indices {
            assert!(!seen[i as usize], "index {} emitted twice", i);
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_front_to_back_is_nearly_sorted() {
        let positions = random_positions(2000);
        let axis = [0.0, 0.0, 1.0];
        let mut sorter = DepthSorter::new();
        let indices = sorter.sort_positions(&positions, axis, SortOrder::FrontToBack);

        // Quantization permits inversions only within one bucket's width
        let mut min_depth = f32::INFINITY;
        let mut max_depth = f32::NEG_INFINITY;
        for i in 0..2000 {
            let d = depth(&positions, i, axis);
            min_depth = min_depth.min(d);
            max_depth = max_depth.max(d);
        }
        let tolerance = (max_depth - min_depth) / DEPTH_BUCKETS as f32 * 1.001;

        for pair in indices.windows(2) {
            let a = depth(&positions, pair[0] as usize, axis);
            let b = depth(&positions, pair[1] as usize, axis);
            assert!(b >= a - tolerance, "inversion beyond bucket width: {} then {}", a, b);
        }
    }

    #[test]
    fn test_back_to_front_reverses_front_to_back() {
        let positions = random_positions(500);
        let axis = [1.0, 0.0, 0.0];
        let mut sorter = DepthSorter::new();

        let ftb: Vec<u32> = sorter
            .sort_positions(&positions, axis, SortOrder::FrontToBack)
            .to_vec();
        let btf: Vec<u32> = sorter
            .sort_positions(&positions, axis, SortOrder::BackToFront)
            .to_vec();

        let reversed: Vec<u32> = ftb.into_iter().rev().collect();
        assert_eq!(btf, reversed);
    }

    #[test]
    fn test_identical_depths_keep_source_order() {
        // Every point on the same depth plane
        let positions = vec![5.0f32; 30];
        let mut sorter = DepthSorter::new();
        let indices = sorter.sort_positions(&positions, [0.0, 0.0, 1.0], SortOrder::BackToFront);

        let identity: Vec<u32> = (0..10).collect();
        assert_eq!(indices, identity.as_slice());
    }

    #[test]
    fn test_nonfinite_depths_keep_source_order() {
        #[rustfmt::skip]
        let positions = vec![
            0.0f32, 0.0, f32::NAN,
            0.0, 0.0, 1.0,
            0.0, 0.0, f32::INFINITY,
        ];
        let mut sorter = DepthSorter::new();
        let indices = sorter.sort_positions(&positions, [0.0, 0.0, 1.0], SortOrder::FrontToBack);
        assert_eq!(indices, &[0, 1, 2]);
    }

    #[test]
    fn test_empty_and_single() {
        let mut sorter = DepthSorter::new();
        assert!(sorter.sort_positions(&[], [0.0, 0.0, 1.0], SortOrder::BackToFront).is_empty());

        let indices = sorter.sort_positions(&[1.0, 2.0, 3.0], [0.0, 0.0, 1.0], SortOrder::BackToFront);
        assert_eq!(indices, &[0]);
    }

    #[test]
    fn test_ties_inside_a_bucket_are_stable() {
        // Two depth planes, several points each; front-to-back keeps the
        // source order inside each plane
        #[rustfmt::skip]
        let positions = vec![
            0.0f32, 0.0, 10.0,
            1.0, 0.0, 0.0,
            2.0, 0.0, 10.0,
            3.0, 0.0, 0.0,
            4.0, 0.0, 10.0,
        ];
        let mut sorter = DepthSorter::new();
        let indices = sorter.sort_positions(&positions, [0.0, 0.0, 1.0], SortOrder::FrontToBack);
        assert_eq!(indices, &[1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_sort_instances_matches_positions() {
        let positions = random_positions(64);
        let instances: Vec<SplatInstance> = (0..64)
            .map(|i| SplatInstance {
                color: [1.0; 4],
                center: [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2], 1.0],
                cov_a: [0.0; 4],
                cov_b: [0.0; 4],
            })
            .collect();
        let axis = [0.6, 0.0, 0.8];

        let mut sorter = DepthSorter::new();
        let from_positions: Vec<u32> = sorter
            .sort_positions(&positions, axis, SortOrder::BackToFront)
            .to_vec();
        let from_instances: Vec<u32> = sorter
            .sort_instances(&instances, axis, SortOrder::BackToFront)
            .to_vec();
        assert_eq!(from_positions, from_instances);
    }

    #[test]
    fn test_permute_into_applies_last_sort() {
        #[rustfmt::skip]
        let positions = vec![
            0.0f32, 0.0, 3.0,
            0.0, 0.0, 1.0,
            0.0, 0.0, 2.0,
        ];
        let mut sorter = DepthSorter::new();
        sorter.sort_positions(&positions, [0.0, 0.0, 1.0], SortOrder::FrontToBack);

        let labels = [30u32, 10, 20];
        let mut out = [0u32; 3];
        sorter.permute_into(&labels, &mut out);
        assert_eq!(out, [10, 20, 30]);
    }

    #[test]
    fn test_scratch_survives_shrinking_input() {
        let mut sorter = DepthSorter::new();
        sorter.sort_positions(&random_positions(512), [0.0, 1.0, 0.0], SortOrder::BackToFront);
        assert_eq!(sorter.indices().len(), 512);

        let indices = sorter.sort_positions(&[9.0, 9.0, 9.0], [0.0, 1.0, 0.0], SortOrder::BackToFront);
        assert_eq!(indices, &[0]);
        assert_eq!(sorter.indices().len(), 1);
    }
}
