//! Per-step particle snapshot supplied by the simulation engine
//!
//! Local particles occupy indices `0..nlocal`, ghost copies of particles owned
//! by neighboring sub-domains follow at `nlocal..nlocal + nghost`. Periodic
//! images are explicit ghosts, so pair distances never need minimum-image
//! wrapping.

use crate::error::PairError;

/// Read-only view of positions, types, radii, and tags for one force evaluation
#[derive(Debug, Clone, Default)]
pub struct ParticleSnapshot {
    /// Positions, length `nall`
    pub positions: Vec<[f64; 3]>,

    /// 1-based type ids, length `nall`
    pub types: Vec<usize>,

    /// Per-particle radius, `None` when the atom style carries no radius
    pub radius: Option<Vec<f64>>,

    /// Globally unique tags, length `nall`
    pub tags: Vec<i64>,

    /// Number of locally owned particles
    pub nlocal: usize,

    /// Number of ghost particles
    pub nghost: usize,
}

impl ParticleSnapshot {
    /// Snapshot of local particles only (no ghosts)
    ///
    /// Tags are assigned `1..=n` in index order.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, types: Vec<usize>, radius: Vec<f64>) -> Self {
        let nlocal = positions.len();
        #[allow(clippy::cast_possible_wrap)]
        let tags = (1..=nlocal as i64).collect();
        Self {
            positions,
            types,
            radius: Some(radius),
            tags,
            nlocal,
            nghost: 0,
        }
    }

    /// Append a ghost copy of local particle `owner` displaced by `shift`
    ///
    /// The ghost keeps the owner's tag, type, and radius.
    ///
    /// # Errors
    ///
    /// Returns error if `owner` is not a local particle
    pub fn push_ghost(&mut self, owner: usize, shift: [f64; 3]) -> Result<usize, PairError> {
        if owner >= self.nlocal {
            return Err(PairError::InvalidParameter(format!(
                "ghost owner {owner} is not a local particle (nlocal = {})",
                self.nlocal
            )));
        }

        let [x, y, z] = self.positions[owner];
        self.positions
            .push([x + shift[0], y + shift[1], z + shift[2]]);
        self.types.push(self.types[owner]);
        self.tags.push(self.tags[owner]);
        if let Some(radius) = self.radius.as_mut() {
            let r = radius[owner];
            radius.push(r);
        }
        self.nghost += 1;

        Ok(self.nall() - 1)
    }

    /// Local plus ghost particle count
    #[must_use]
    pub const fn nall(&self) -> usize {
        self.nlocal + self.nghost
    }

    /// Whether the atom style carries a per-particle radius
    #[must_use]
    pub const fn has_radius(&self) -> bool {
        self.radius.is_some()
    }

    /// Radius slice
    ///
    /// # Errors
    ///
    /// Returns `PairError::MissingRadius` when the snapshot has no radii
    pub fn radius_slice(&self) -> Result<&[f64], PairError> {
        self.radius.as_deref().ok_or(PairError::MissingRadius)
    }

    /// Check array lengths against `nall`
    ///
    /// # Errors
    ///
    /// Returns `PairError::InvalidParameter` naming the first mismatched array
    pub fn validate(&self) -> Result<(), PairError> {
        let nall = self.nall();
        let mismatch = |name: &str, len: usize| {
            PairError::InvalidParameter(format!("{name} has {len} entries, expected {nall}"))
        };

        if self.positions.len() != nall {
            return Err(mismatch("positions", self.positions.len()));
        }
        if self.types.len() != nall {
            return Err(mismatch("types", self.types.len()));
        }
        if self.tags.len() != nall {
            return Err(mismatch("tags", self.tags.len()));
        }
        if let Some(radius) = &self.radius {
            if radius.len() != nall {
                return Err(mismatch("radius", radius.len()));
            }
        }
        Ok(())
    }

    /// Per-type radius, requiring every particle of a type to share it
    ///
    /// Index 0 is unused; types with no particles get radius 0.
    ///
    /// # Errors
    ///
    /// Returns error if radii are missing, a type is out of range, or two
    /// particles of one type have different radii
    #[allow(clippy::float_cmp)]
    pub fn uniform_type_radii(&self, ntypes: usize) -> Result<Vec<f64>, PairError> {
        let radius = self.radius_slice()?;
        let mut per_type: Vec<Option<f64>> = vec![None; ntypes + 1];

        for (&itype, &r) in self.types.iter().zip(radius).take(self.nlocal) {
            if itype == 0 || itype > ntypes {
                return Err(PairError::InvalidType { itype, ntypes });
            }
            match per_type[itype] {
                None => per_type[itype] = Some(r),
                Some(seen) if seen != r => return Err(PairError::NonUniformRadius { itype }),
                Some(_) => {}
            }
        }

        Ok(per_type.into_iter().map(|r| r.unwrap_or(0.0)).collect())
    }
}

/// Sub-domain bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    /// Lower corner
    pub sublo: [f64; 3],

    /// Upper corner
    pub subhi: [f64; 3],
}

impl Domain {
    /// Create bounding box
    #[must_use]
    pub const fn new(sublo: [f64; 3], subhi: [f64; 3]) -> Self {
        Self { sublo, subhi }
    }

    /// Smallest box containing every position
    ///
    /// Empty input gives a degenerate box at the origin.
    #[must_use]
    pub fn enclosing(positions: &[[f64; 3]]) -> Self {
        if positions.is_empty() {
            return Self::new([0.0; 3], [0.0; 3]);
        }
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in positions {
            for k in 0..3 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
        }
        Self::new(lo, hi)
    }
}

/// Bonded-topology partners of each local particle
///
/// `nspecial[i]` holds cumulative counts `[n12, n12 + n13, n12 + n13 + n14]`;
/// `special[i]` lists partner tags, 1-2 partners first.
#[derive(Debug, Clone, Default)]
pub struct SpecialBonds {
    /// Cumulative 1-2 / 1-3 / 1-4 counts per local particle
    pub nspecial: Vec<[usize; 3]>,

    /// Partner tags per local particle
    pub special: Vec<Vec<i64>>,
}

impl SpecialBonds {
    /// Empty topology for `nlocal` particles
    #[must_use]
    pub fn new(nlocal: usize) -> Self {
        Self {
            nspecial: vec![[0; 3]; nlocal],
            special: vec![Vec::new(); nlocal],
        }
    }

    /// Add a 1-2 bond between two local particles, keeping both sides sorted by kind
    ///
    /// Only 1-2 partners are inserted here; higher-order partners come from
    /// the engine's topology build.
    ///
    /// # Errors
    ///
    /// Returns error if either index is out of range
    pub fn add_bond(&mut self, snapshot: &ParticleSnapshot, i: usize, j: usize) -> Result<(), PairError> {
        if i >= self.special.len() || j >= self.special.len() {
            return Err(PairError::InvalidParameter(format!(
                "bond ({i}, {j}) references a non-local particle"
            )));
        }
        for (a, b) in [(i, j), (j, i)] {
            let n12 = self.nspecial[a][0];
            self.special[a].insert(n12, snapshot.tags[b]);
            for count in &mut self.nspecial[a] {
                *count += 1;
            }
        }
        Ok(())
    }

    /// Largest partner count over all particles
    #[must_use]
    pub fn max_special(&self) -> usize {
        self.special.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Special code (1 = 1-2, 2 = 1-3, 3 = 1-4) of partner `tag` for particle `i`
    #[must_use]
    pub fn code(&self, i: usize, tag: i64) -> u8 {
        let Some(partners) = self.special.get(i) else {
            return 0;
        };
        let counts = self.nspecial[i];
        partners
            .iter()
            .position(|&t| t == tag)
            .map_or(0, |k| match k {
                k if k < counts[0] => 1,
                k if k < counts[1] => 2,
                _ => 3,
            })
    }
}
