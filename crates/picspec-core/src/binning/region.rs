//! Mapping a box in physical space onto the MPI ranks that hold it.
//!
//! The simulation domain spans `x ∈ [0, lx]`, `y ∈ [-ly/2, ly/2]` and
//! `z ∈ [-lz/2, lz/2]` (di), split evenly into `topology_x × topology_y ×
//! topology_z` rank domains.

use serde::{Deserialize, Serialize};

use crate::types::{Corners, SimulationDescriptor};

/// Inclusive block of rank-domain indices along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankBlock {
    pub x: [usize; 2],
    pub y: [usize; 2],
    pub z: [usize; 2],
}

impl RankBlock {
    /// Rank ids of every domain in the block, `x` varying slowest.
    pub fn ranks(&self, descriptor: &SimulationDescriptor) -> Vec<usize> {
        let mut ranks = Vec::with_capacity(self.len());
        for ix in self.x[0]..=self.x[1] {
            for iy in self.y[0]..=self.y[1] {
                for iz in self.z[0]..=self.z[1] {
                    ranks.push(descriptor.rank_id(ix, iy, iz));
                }
            }
        }
        ranks
    }

    pub fn len(&self) -> usize {
        let span = |r: [usize; 2]| (r[1] + 1).saturating_sub(r[0]);
        span(self.x) * span(self.y) * span(self.z)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A box clamped to the simulation domain and the ranks that cover it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSelection {
    /// Box corners in di.
    pub corners: Corners,
    pub ranks: RankBlock,
}

impl RegionSelection {
    /// Corners converted to de, the unit particle positions are binned in.
    pub fn corners_de(&self, descriptor: &SimulationDescriptor) -> Corners {
        self.corners.scaled(1.0 / descriptor.smime())
    }
}

/// Select the box centred at `center_di` spanning `sizes_cells` grid cells.
pub fn select_region(
    descriptor: &SimulationDescriptor,
    center_di: [f64; 3],
    sizes_cells: [f64; 3],
) -> RegionSelection {
    let cell = [descriptor.dx_di, descriptor.dy_di, descriptor.dz_di];
    let length = [descriptor.lx_di, descriptor.ly_di, descriptor.lz_di];
    let topology = [
        descriptor.topology_x,
        descriptor.topology_y,
        descriptor.topology_z,
    ];
    // x starts at 0, y and z are centred on 0.
    let domain_start = [0.0, -0.5 * length[1], -0.5 * length[2]];

    let mut bounds = [[0.0; 2]; 3];
    let mut blocks = [[0usize; 2]; 3];
    for a in 0..3 {
        let lo_lim = domain_start[a];
        let hi_lim = domain_start[a] + length[a];
        let half = 0.5 * sizes_cells[a] * cell[a];
        let lo = (center_di[a] - half).max(lo_lim).min(hi_lim);
        let hi = (center_di[a] + half).max(lo_lim).min(hi_lim);
        bounds[a] = [lo, hi];

        let domain = length[a] / topology[a] as f64;
        let last = topology[a].saturating_sub(1);
        let index = |v: f64| (((v - lo_lim) / domain).floor().max(0.0) as usize).min(last);
        blocks[a] = [index(lo), index(hi)];
    }

    let selection = RegionSelection {
        corners: Corners::new(bounds),
        ranks: RankBlock {
            x: blocks[0],
            y: blocks[1],
            z: blocks[2],
        },
    };
    log::debug!(
        "Region {:?} di covers ranks x {:?}, y {:?}, z {:?}",
        selection.corners.bounds,
        selection.ranks.x,
        selection.ranks.y,
        selection.ranks.z
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::descriptor;
    use approx::assert_relative_eq;

    #[test]
    fn test_centre_box() {
        // lx = 100 over 4 ranks, lz = 50 over 2 ranks.
        let d = descriptor();
        let sel = select_region(&d, [30.0, 0.0, 10.0], [16.0, 1.0, 8.0]);
        let hx = 8.0 * d.dx_di;
        assert_relative_eq!(sel.corners.bounds[0][0], 30.0 - hx);
        assert_relative_eq!(sel.corners.bounds[0][1], 30.0 + hx);
        assert_eq!(sel.ranks.x, [0, 1]);
        assert_eq!(sel.ranks.y, [0, 0]);
        assert_eq!(sel.ranks.z, [1, 1]);
        assert_eq!(sel.ranks.ranks(&d), vec![4, 5]);
    }

    #[test]
    fn test_clamped_to_domain() {
        let d = descriptor();
        let sel = select_region(&d, [99.0, 0.0, -24.0], [400.0, 400.0, 400.0]);
        assert_eq!(sel.corners.bounds[0], [0.0, 100.0]);
        assert_eq!(sel.corners.bounds[1], [-0.5, 0.5]);
        assert_eq!(sel.corners.bounds[2], [-25.0, 25.0]);
        // Upper indices land on the domain edge and are clamped.
        assert_eq!(sel.ranks.x, [0, 3]);
        assert_eq!(sel.ranks.z, [0, 1]);
        assert_eq!(sel.ranks.len(), 8);
        let mut ranks = sel.ranks.ranks(&d);
        ranks.sort_unstable();
        assert_eq!(ranks, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_rank_order_x_slowest() {
        let mut d = descriptor();
        d.topology_y = 2;
        let block = RankBlock {
            x: [1, 2],
            y: [0, 1],
            z: [0, 0],
        };
        assert_eq!(block.ranks(&d), vec![1, 5, 2, 6]);
    }

    #[test]
    fn test_corners_de() {
        let d = descriptor();
        let sel = select_region(&d, [50.0, 0.0, 0.0], [64.0, 1.0, 32.0]);
        let de = sel.corners_de(&d);
        assert_relative_eq!(de.bounds[0][0], sel.corners.bounds[0][0] / 5.0);
        assert_relative_eq!(de.bounds[2][1], sel.corners.bounds[2][1] / 5.0);
    }
}
