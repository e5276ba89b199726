//! Energy and virial accumulators
//!
//! Full-list convention: every ordered pair `(i, j)` is visited from `i` and
//! attributes half of its energy and virial to `i` alone. Summed over a full
//! list this counts each physical pair exactly once.

/// Which energy/virial quantities to accumulate this evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvFlags {
    /// Global energy sum
    pub energy: bool,
    /// Global virial sum
    pub virial: bool,
    /// Per-atom energy
    pub energy_atom: bool,
    /// Per-atom virial
    pub virial_atom: bool,
}

impl EvFlags {
    /// Forces only
    #[must_use]
    pub const fn none() -> Self {
        Self {
            energy: false,
            virial: false,
            energy_atom: false,
            virial_atom: false,
        }
    }

    /// Global energy and virial
    #[must_use]
    pub const fn global() -> Self {
        Self {
            energy: true,
            virial: true,
            energy_atom: false,
            virial_atom: false,
        }
    }

    /// Everything, global and per-atom
    #[must_use]
    pub const fn all() -> Self {
        Self {
            energy: true,
            virial: true,
            energy_atom: true,
            virial_atom: true,
        }
    }

    /// Any energy requested
    #[must_use]
    pub const fn eflag(self) -> bool {
        self.energy || self.energy_atom
    }

    /// Any virial requested
    #[must_use]
    pub const fn vflag(self) -> bool {
        self.virial || self.virial_atom
    }

    /// Any tally requested
    #[must_use]
    pub const fn evflag(self) -> bool {
        self.eflag() || self.vflag()
    }
}

/// Everything one active particle contributes in a single evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AtomContribution {
    /// Particle index
    pub i: usize,
    /// Force on `i`
    pub force: [f64; 3],
    /// Half-counted pair energy attributed to `i`
    pub energy: f64,
    /// Half-counted virial attributed to `i` (xx, yy, zz, xy, xz, yz)
    pub virial: [f64; 6],
}

impl AtomContribution {
    /// Empty contribution of particle `i`
    #[must_use]
    pub const fn new(i: usize) -> Self {
        Self {
            i,
            force: [0.0; 3],
            energy: 0.0,
            virial: [0.0; 6],
        }
    }

    /// Tally one ordered pair seen from `i`
    #[inline]
    pub fn tally_pair(&mut self, flags: EvFlags, evdwl: f64, fpair: f64, del: [f64; 3]) {
        if flags.eflag() {
            self.energy += 0.5 * evdwl;
        }
        if flags.vflag() {
            let [dx, dy, dz] = del;
            let half = 0.5 * fpair;
            self.virial[0] += half * dx * dx;
            self.virial[1] += half * dy * dy;
            self.virial[2] += half * dz * dz;
            self.virial[3] += half * dx * dy;
            self.virial[4] += half * dx * dz;
            self.virial[5] += half * dy * dz;
        }
    }
}

/// Energy/virial accumulators owned by the pair style
#[derive(Debug, Clone, Default)]
pub struct EvTally {
    flags: EvFlags,
    /// Global pair energy
    pub eng_vdwl: f64,
    /// Global virial (xx, yy, zz, xy, xz, yz)
    pub virial: [f64; 6],
    eatom: Vec<f64>,
    vatom: Vec<[f64; 6]>,
}

impl EvTally {
    /// Zeroed accumulators for `nall` particles
    #[must_use]
    pub fn new(flags: EvFlags, nall: usize) -> Self {
        let mut tally = Self::default();
        tally.reset(flags, nall);
        tally
    }

    /// Zero everything and size per-atom arrays for `nall` particles
    pub fn reset(&mut self, flags: EvFlags, nall: usize) {
        self.flags = flags;
        self.eng_vdwl = 0.0;
        self.virial = [0.0; 6];

        self.eatom.clear();
        if flags.energy_atom {
            self.eatom.resize(nall, 0.0);
        }
        self.vatom.clear();
        if flags.virial_atom {
            self.vatom.resize(nall, [0.0; 6]);
        }
    }

    /// Flags of the current evaluation
    #[must_use]
    pub const fn flags(&self) -> EvFlags {
        self.flags
    }

    /// Per-atom energies (empty unless requested)
    #[must_use]
    pub fn eatom(&self) -> &[f64] {
        &self.eatom
    }

    /// Per-atom virials (empty unless requested)
    #[must_use]
    pub fn vatom(&self) -> &[[f64; 6]] {
        &self.vatom
    }

    /// Add one particle's force and tallies
    ///
    /// Forces always land in `forces[c.i]`; energy and virial only when the
    /// matching flag is set.
    pub fn accumulate(&mut self, forces: &mut [[f64; 3]], c: &AtomContribution) {
        let f = &mut forces[c.i];
        f[0] += c.force[0];
        f[1] += c.force[1];
        f[2] += c.force[2];

        if self.flags.energy {
            self.eng_vdwl += c.energy;
        }
        if self.flags.energy_atom {
            self.eatom[c.i] += c.energy;
        }
        if self.flags.virial {
            for (v, cv) in self.virial.iter_mut().zip(c.virial) {
                *v += cv;
            }
        }
        if self.flags.virial_atom {
            for (v, cv) in self.vatom[c.i].iter_mut().zip(c.virial) {
                *v += cv;
            }
        }
    }

    /// Heap memory held by per-atom arrays, in bytes
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.eatom.capacity() * std::mem::size_of::<f64>()
            + self.vatom.capacity() * std::mem::size_of::<[f64; 6]>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert!(!EvFlags::none().evflag());
        assert!(EvFlags::global().eflag());
        assert!(EvFlags::global().vflag());
        let atom_only = EvFlags {
            energy_atom: true,
            ..EvFlags::none()
        };
        assert!(atom_only.eflag());
        assert!(!atom_only.vflag());
    }

    #[test]
    fn test_tally_pair_half_counts() {
        let mut c = AtomContribution::new(0);
        c.tally_pair(EvFlags::all(), 4.0, 2.0, [1.0, 2.0, 3.0]);

        assert_eq!(c.energy, 2.0);
        assert_eq!(c.virial, [1.0, 4.0, 9.0, 2.0, 3.0, 6.0]);
    }

    #[test]
    fn test_tally_pair_respects_flags() {
        let mut c = AtomContribution::new(0);
        c.tally_pair(EvFlags::none(), 4.0, 2.0, [1.0, 2.0, 3.0]);
        assert_eq!(c, AtomContribution::new(0));
    }

    #[test]
    fn test_accumulate_global_and_per_atom() {
        let mut tally = EvTally::new(EvFlags::all(), 3);
        let mut forces = vec![[0.0; 3]; 3];
        let mut c = AtomContribution::new(1);
        c.force = [1.0, -1.0, 0.5];
        c.energy = 0.25;
        c.virial = [1.0; 6];

        tally.accumulate(&mut forces, &c);
        tally.accumulate(&mut forces, &c);

        assert_eq!(forces[1], [2.0, -2.0, 1.0]);
        assert_eq!(forces[0], [0.0; 3]);
        assert_eq!(tally.eng_vdwl, 0.5);
        assert_eq!(tally.eatom(), &[0.0, 0.5, 0.0]);
        assert_eq!(tally.virial, [2.0; 6]);
        assert_eq!(tally.vatom()[1], [2.0; 6]);
    }

    #[test]
    fn test_reset_sizes_per_atom_arrays() {
        let mut tally = EvTally::new(EvFlags::all(), 4);
        tally.eng_vdwl = 3.0;
        tally.reset(EvFlags::global(), 4);

        assert_eq!(tally.eng_vdwl, 0.0);
        assert!(tally.eatom().is_empty());
        assert!(tally.vatom().is_empty());
    }
}
