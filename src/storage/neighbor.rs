//! Neighbor lists in CSR (Compressed Sparse Row) layout
//!
//! Rows are indexed by particle index `i` (not by position in the active
//! list), so the host kernel and every accelerator backend read the same
//! structure the same way.
//!
//! # Layout
//!
//! ```text
//! Active list: ilist = [0, 1, 2]
//!
//! CSR:
//!   row_offsets: [0, 2, 3, 4]       // particle 0: entries [0..2), 1: [2..3), 2: [3..4)
//!   entries:     [1, 2, 0, 0/s1]    // neighbor index plus special-bond code
//! ```
//!
//! Engines that bit-pack the special code into the neighbor index use the top
//! two bits; [`NeighborEntry::pack`] and [`NeighborEntry::unpack`] convert.

use super::particles::{Domain, ParticleSnapshot, SpecialBonds};
use crate::error::PairError;

/// Bit position of the special-bond code in a packed neighbor index
pub const SBBITS: u32 = 30;

/// Mask selecting the particle index from a packed neighbor index
pub const NEIGHMASK: u32 = (1 << SBBITS) - 1;

/// One neighbor of a particle: particle index plus special-bond code
///
/// `special` indexes the special-bond scale factors: 0 for non-bonded pairs,
/// 1/2/3 for 1-2, 1-3, 1-4 partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborEntry {
    /// Particle index into the snapshot
    pub index: u32,

    /// Special-bond code (0..=3)
    pub special: u8,
}

impl NeighborEntry {
    /// Entry with explicit special code
    #[must_use]
    pub const fn new(index: u32, special: u8) -> Self {
        Self { index, special }
    }

    /// Non-bonded entry
    #[must_use]
    pub const fn plain(index: u32) -> Self {
        Self { index, special: 0 }
    }

    /// Packed 32-bit form (code in the top two bits)
    #[must_use]
    pub const fn pack(self) -> u32 {
        (self.index & NEIGHMASK) | ((self.special as u32 & 3) << SBBITS)
    }

    /// Decode a packed neighbor index
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn unpack(packed: u32) -> Self {
        Self {
            index: packed & NEIGHMASK,
            special: (packed >> SBBITS) as u8,
        }
    }
}

/// Whether each pair appears once (half) or from both sides (full)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Each pair stored once
    Half,
    /// Each pair stored from both sides
    Full,
}

/// Neighbor list: active list plus CSR neighbor rows
///
/// # Example
///
/// ```
/// use yukawa_colloid::{NeighborEntry, NeighborList};
///
/// let list = NeighborList::from_rows(
///     vec![0, 1],
///     vec![vec![NeighborEntry::plain(1)], vec![NeighborEntry::plain(0)]],
/// )
/// .unwrap();
///
/// assert_eq!(list.inum(), 2);
/// assert_eq!(list.num_neighbors(0), 1);
/// ```
#[derive(Debug, Clone)]
pub struct NeighborList {
    /// Active particle indices, length `inum`
    ilist: Vec<u32>,

    /// Row offsets, length `num_rows + 1`
    row_offsets: Vec<u32>,

    /// Neighbor entries, length `row_offsets[num_rows]`
    entries: Vec<NeighborEntry>,

    /// Full or half list
    kind: ListKind,
}

impl NeighborList {
    /// Create empty full list
    #[must_use]
    pub fn new() -> Self {
        Self {
            ilist: Vec::new(),
            row_offsets: vec![0],
            entries: Vec::new(),
            kind: ListKind::Full,
        }
    }

    /// Create full list from per-particle rows
    ///
    /// `rows[i]` holds the neighbors of particle `i`.
    ///
    /// # Errors
    ///
    /// Returns error if an active particle has no row
    pub fn from_rows(ilist: Vec<u32>, rows: Vec<Vec<NeighborEntry>>) -> Result<Self, PairError> {
        if let Some(&missing) = ilist.iter().find(|&&i| i as usize >= rows.len()) {
            return Err(PairError::InvalidParameter(format!(
                "active particle {missing} has no neighbor row ({} rows)",
                rows.len()
            )));
        }

        let total: usize = rows.iter().map(Vec::len).sum();
        let mut row_offsets = Vec::with_capacity(rows.len() + 1);
        let mut entries = Vec::with_capacity(total);

        let mut offset = 0_u32;
        row_offsets.push(offset);
        for row in rows {
            #[allow(clippy::cast_possible_truncation)] // lists >4B entries not supported
            let len_u32 = row.len() as u32;
            offset += len_u32;
            row_offsets.push(offset);
            entries.extend(row);
        }

        Ok(Self {
            ilist,
            row_offsets,
            entries,
            kind: ListKind::Full,
        })
    }

    /// Create full list from bit-packed rows
    ///
    /// # Errors
    ///
    /// Returns error if an active particle has no row
    pub fn from_packed_rows(ilist: Vec<u32>, rows: &[Vec<u32>]) -> Result<Self, PairError> {
        let rows = rows
            .iter()
            .map(|row| row.iter().copied().map(NeighborEntry::unpack).collect())
            .collect();
        Self::from_rows(ilist, rows)
    }

    /// Mark the list as half or full
    #[must_use]
    pub const fn with_kind(mut self, kind: ListKind) -> Self {
        self.kind = kind;
        self
    }

    /// Build a full list of every local particle against local and ghost particles
    ///
    /// Particles are binned into cells no smaller than `cutoff` over the union
    /// of the domain (expanded by one cutoff) and the particle bounding box;
    /// each local particle scans its 27 surrounding cells. Pairs with
    /// `rsq < cutoff²` are kept, a particle is never its own neighbor, and
    /// bonded partners (matched by tag) carry their special code. Rows are
    /// sorted by neighbor index.
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot is inconsistent or `cutoff` is not positive
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn build_full(
        snapshot: &ParticleSnapshot,
        domain: &Domain,
        cutoff: f64,
        special: Option<&SpecialBonds>,
    ) -> Result<Self, PairError> {
        snapshot.validate()?;
        if !(cutoff > 0.0 && cutoff.is_finite()) {
            return Err(PairError::InvalidParameter(format!(
                "neighbor cutoff must be positive, got {cutoff}"
            )));
        }

        let nlocal = snapshot.nlocal;
        let positions = &snapshot.positions;
        let cutoff_sq = cutoff * cutoff;

        let bbox = Domain::enclosing(positions);
        let mut lo = [0.0; 3];
        let mut bin_size = [0.0; 3];
        let mut nbins = [1_usize; 3];
        for k in 0..3 {
            lo[k] = (domain.sublo[k] - cutoff).min(bbox.sublo[k]);
            let hi = (domain.subhi[k] + cutoff).max(bbox.subhi[k]);
            let extent = (hi - lo[k]).max(cutoff);
            nbins[k] = ((extent / cutoff).floor() as usize).max(1);
            bin_size[k] = extent / nbins[k] as f64;
        }

        let bin_coord = |p: &[f64; 3]| -> [usize; 3] {
            let mut c = [0; 3];
            for k in 0..3 {
                let b = ((p[k] - lo[k]) / bin_size[k]).floor().max(0.0) as usize;
                c[k] = b.min(nbins[k] - 1);
            }
            c
        };
        let linear = |c: [usize; 3]| c[0] + nbins[0] * (c[1] + nbins[1] * c[2]);

        // Counting sort of particles into bins
        let total_bins = nbins[0] * nbins[1] * nbins[2];
        let mut bin_starts = vec![0_usize; total_bins + 1];
        let bins: Vec<usize> = positions.iter().map(|p| linear(bin_coord(p))).collect();
        for &b in &bins {
            bin_starts[b + 1] += 1;
        }
        for b in 0..total_bins {
            bin_starts[b + 1] += bin_starts[b];
        }
        let mut fill = bin_starts.clone();
        let mut binned = vec![0_usize; positions.len()];
        for (idx, &b) in bins.iter().enumerate() {
            binned[fill[b]] = idx;
            fill[b] += 1;
        }

        let mut rows: Vec<Vec<NeighborEntry>> = Vec::with_capacity(nlocal);
        for i in 0..nlocal {
            let xi = positions[i];
            let ci = bin_coord(&xi);
            let mut row = Vec::new();

            for dz in -1_i64..=1 {
                for dy in -1_i64..=1 {
                    for dx in -1_i64..=1 {
                        let Some(c) = offset_bin(ci, [dx, dy, dz], nbins) else {
                            continue;
                        };
                        let b = linear(c);
                        for &j in &binned[bin_starts[b]..bin_starts[b + 1]] {
                            if j == i {
                                continue;
                            }
                            let xj = positions[j];
                            let del = [xi[0] - xj[0], xi[1] - xj[1], xi[2] - xj[2]];
                            let rsq = del[0] * del[0] + del[1] * del[1] + del[2] * del[2];
                            if rsq < cutoff_sq {
                                let code = special.map_or(0, |s| s.code(i, snapshot.tags[j]));
                                row.push(NeighborEntry::new(j as u32, code));
                            }
                        }
                    }
                }
            }

            row.sort_unstable();
            rows.push(row);
        }

        Self::from_rows((0..nlocal as u32).collect(), rows)
    }

    /// Number of active particles
    #[must_use]
    pub fn inum(&self) -> usize {
        self.ilist.len()
    }

    /// Active particle indices
    #[must_use]
    pub fn ilist(&self) -> &[u32] {
        &self.ilist
    }

    /// Full or half list
    #[must_use]
    pub const fn kind(&self) -> ListKind {
        self.kind
    }

    /// Number of rows (particles with a neighbor row)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Neighbors of particle `i`
    ///
    /// # Errors
    ///
    /// Returns error if `i` has no row
    pub fn neighbors(&self, i: usize) -> Result<&[NeighborEntry], PairError> {
        if i >= self.num_rows() {
            return Err(PairError::InvalidParameter(format!(
                "particle {i} has no neighbor row ({} rows)",
                self.num_rows()
            )));
        }
        Ok(self.row(i))
    }

    /// Row of particle `i`; `i` must be below `num_rows()`
    pub(crate) fn row(&self, i: usize) -> &[NeighborEntry] {
        let start = self.row_offsets[i] as usize;
        let end = self.row_offsets[i + 1] as usize;
        &self.entries[start..end]
    }

    /// Neighbor count of particle `i` (0 when `i` has no row)
    #[must_use]
    pub fn num_neighbors(&self, i: usize) -> usize {
        if i >= self.num_rows() {
            return 0;
        }
        (self.row_offsets[i + 1] - self.row_offsets[i]) as usize
    }

    /// Largest neighbor count over active particles
    #[must_use]
    pub fn max_neighbors(&self) -> usize {
        self.ilist
            .iter()
            .map(|&i| self.num_neighbors(i as usize))
            .max()
            .unwrap_or(0)
    }

    /// Total number of stored entries
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Check active and neighbor indices against the snapshot size, and
    /// special codes against the four scale factors
    ///
    /// # Errors
    ///
    /// Returns error naming the first out-of-range index or code
    pub fn validate(&self, nall: usize) -> Result<(), PairError> {
        if let Some(&bad) = self.ilist.iter().find(|&&i| i as usize >= nall) {
            return Err(PairError::InvalidParameter(format!(
                "active particle {bad} out of range (nall = {nall})"
            )));
        }
        if let Some(bad) = self.entries.iter().find(|e| e.index as usize >= nall) {
            return Err(PairError::InvalidParameter(format!(
                "neighbor index {} out of range (nall = {nall})",
                bad.index
            )));
        }
        if let Some(bad) = self.entries.iter().find(|e| e.special > 3) {
            return Err(PairError::InvalidParameter(format!(
                "special code {} out of range",
                bad.special
            )));
        }
        Ok(())
    }

    /// Host memory held by the list, in bytes
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.ilist.len() * std::mem::size_of::<u32>()
            + self.row_offsets.len() * std::mem::size_of::<u32>()
            + self.entries.len() * std::mem::size_of::<NeighborEntry>()
    }

    /// CSR components (row offsets, packed neighbor indices) for device upload
    #[must_use]
    pub fn packed_components(&self) -> (&[u32], Vec<u32>) {
        let packed = self.entries.iter().map(|e| e.pack()).collect();
        (&self.row_offsets, packed)
    }
}

impl Default for NeighborList {
    fn default() -> Self {
        Self::new()
    }
}

/// Neighboring bin coordinate, `None` when it falls off the grid
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn offset_bin(c: [usize; 3], d: [i64; 3], nbins: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0; 3];
    for k in 0..3 {
        let v = c[k] as i64 + d[k];
        if v < 0 || v >= nbins[k] as i64 {
            return None;
        }
        out[k] = v as usize;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list() {
        let list = NeighborList::new();
        assert_eq!(list.inum(), 0);
        assert_eq!(list.num_rows(), 0);
        assert_eq!(list.max_neighbors(), 0);
    }

    #[test]
    fn test_from_rows_csr_structure() {
        let list = NeighborList::from_rows(
            vec![0, 1, 2],
            vec![
                vec![NeighborEntry::plain(1), NeighborEntry::plain(2)],
                vec![NeighborEntry::plain(0)],
                vec![NeighborEntry::new(0, 1)],
            ],
        )
        .unwrap();

        assert_eq!(list.row_offsets, vec![0, 2, 3, 4]);
        assert_eq!(list.num_entries(), 4);
        assert_eq!(list.num_neighbors(0), 2);
        assert_eq!(list.neighbors(2).unwrap(), &[NeighborEntry::new(0, 1)]);
        assert_eq!(list.max_neighbors(), 2);
        assert_eq!(list.kind(), ListKind::Full);
    }

    #[test]
    fn test_from_rows_missing_row() {
        let result = NeighborList::from_rows(vec![0, 3], vec![Vec::new(), Vec::new()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pack_unpack() {
        let entry = NeighborEntry::new(12345, 2);
        let packed = entry.pack();
        assert_eq!(packed & NEIGHMASK, 12345);
        assert_eq!(packed >> SBBITS, 2);
        assert_eq!(NeighborEntry::unpack(packed), entry);
        assert_eq!(NeighborEntry::plain(7).pack(), 7);
    }

    #[test]
    fn test_from_packed_rows() {
        let rows = vec![vec![1 | (3 << SBBITS)], vec![0]];
        let list = NeighborList::from_packed_rows(vec![0, 1], &rows).unwrap();
        assert_eq!(list.neighbors(0).unwrap(), &[NeighborEntry::new(1, 3)]);
        assert_eq!(list.neighbors(1).unwrap(), &[NeighborEntry::plain(0)]);
    }

    #[test]
    fn test_validate_indices() {
        let list =
            NeighborList::from_rows(vec![0], vec![vec![NeighborEntry::plain(5)]]).unwrap();
        assert!(list.validate(6).is_ok());
        assert!(list.validate(5).is_err());

        let active = NeighborList::from_rows(vec![0, 1], vec![Vec::new(); 2]).unwrap();
        assert!(active.validate(2).is_ok());
        assert!(active.validate(1).is_err());

        let coded =
            NeighborList::from_rows(vec![0], vec![vec![NeighborEntry::new(1, 4)]]).unwrap();
        assert!(coded.validate(2).is_err());
    }

    #[test]
    fn test_build_full_matches_brute_force() {
        // 4 x 4 x 4 lattice, spacing 1.1, cutoff 1.6 picks up edges and face diagonals
        let mut positions = Vec::new();
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    positions.push([f64::from(x) * 1.1, f64::from(y) * 1.1, f64::from(z) * 1.1]);
                }
            }
        }
        let n = positions.len();
        let snap = ParticleSnapshot::new(positions.clone(), vec![1; n], vec![0.5; n]);
        let domain = Domain::enclosing(&positions);
        let list = NeighborList::build_full(&snap, &domain, 1.6, None).unwrap();

        assert_eq!(list.inum(), n);
        for i in 0..n {
            let expected: Vec<u32> = (0..n)
                .filter(|&j| {
                    let d: f64 = (0..3).map(|k| (positions[i][k] - positions[j][k]).powi(2)).sum();
                    j != i && d < 1.6 * 1.6
                })
                .map(|j| j as u32)
                .collect();
            let got: Vec<u32> = list.neighbors(i).unwrap().iter().map(|e| e.index).collect();
            assert_eq!(got, expected, "row {i}");
        }
    }

    #[test]
    fn test_build_full_includes_ghosts_and_special() {
        let mut snap = ParticleSnapshot::new(
            vec![[0.5, 0.5, 0.5], [1.5, 0.5, 0.5]],
            vec![1, 1],
            vec![0.5, 0.5],
        );
        // periodic image of particle 1 on the other side of a box of length 2
        let ghost = snap.push_ghost(1, [-2.0, 0.0, 0.0]).unwrap();

        let mut bonds = SpecialBonds::new(2);
        bonds.add_bond(&snap, 0, 1).unwrap();

        let domain = Domain::new([0.0; 3], [2.0; 3]);
        let list = NeighborList::build_full(&snap, &domain, 1.2, Some(&bonds)).unwrap();

        // particle 0 sees particle 1 and its ghost, both bonded by tag
        assert_eq!(
            list.neighbors(0).unwrap(),
            &[NeighborEntry::new(1, 1), NeighborEntry::new(ghost as u32, 1)]
        );
        // ghosts get no row of their own
        assert_eq!(list.inum(), 2);
        assert_eq!(list.num_rows(), 2);
    }

    #[test]
    fn test_build_full_rejects_bad_cutoff() {
        let snap = ParticleSnapshot::new(vec![[0.0; 3]], vec![1], vec![1.0]);
        let domain = Domain::new([0.0; 3], [1.0; 3]);
        assert!(NeighborList::build_full(&snap, &domain, 0.0, None).is_err());
    }
}
