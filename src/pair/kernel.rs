//! Host Yukawa colloid kernel
//!
//! Scalar f64 evaluation over a full neighbor list. Only the owning particle
//! `i` is updated for each pair; its partner picks up the opposite force when
//! its own row is processed.

use std::ops::Range;

use super::tally::{AtomContribution, EvFlags, EvTally};
use crate::error::PairError;
use crate::params::{PairCoeffs, TypeTable};
use crate::storage::{NeighborEntry, NeighborList, ParticleSnapshot};

/// Per-type tables, screening, and special-bond scale factors
#[derive(Debug, Clone, Copy)]
pub struct KernelParams<'a> {
    /// Squared cutoffs
    pub cutsq: &'a TypeTable,
    /// Strength coefficients
    pub a: &'a TypeTable,
    /// Energy offsets
    pub offset: &'a TypeTable,
    /// Screening parameter
    pub kappa: f64,
    /// Scale factor per special code (index 0 = non-bonded)
    pub special_lj: [f64; 4],
}

impl<'a> KernelParams<'a> {
    /// Parameters from finalized coefficients
    #[must_use]
    pub const fn from_coeffs(coeffs: &'a PairCoeffs, special_lj: [f64; 4]) -> Self {
        Self {
            cutsq: coeffs.cutsq(),
            a: coeffs.a(),
            offset: coeffs.offset(),
            kappa: coeffs.kappa(),
            special_lj,
        }
    }
}

/// Borrowed particle arrays with the radius guaranteed present
#[derive(Debug, Clone, Copy)]
pub struct ParticleView<'a> {
    /// Positions
    pub positions: &'a [[f64; 3]],
    /// 1-based types
    pub types: &'a [usize],
    /// Radii
    pub radius: &'a [f64],
}

impl<'a> ParticleView<'a> {
    /// View of a snapshot
    ///
    /// # Errors
    ///
    /// Returns `PairError::MissingRadius` if the snapshot has no radii
    pub fn new(snapshot: &'a ParticleSnapshot) -> Result<Self, PairError> {
        Ok(Self {
            positions: &snapshot.positions,
            types: &snapshot.types,
            radius: snapshot.radius_slice()?,
        })
    }
}

/// Screening factor `exp(-kappa (r - (rad_i + rad_j)))`
#[inline]
#[must_use]
pub fn screening(kappa: f64, r: f64, radsum: f64) -> f64 {
    (-kappa * (r - radsum)).exp()
}

/// Force-over-distance and energy of one pair inside the cutoff
///
/// Returns `(fpair, evdwl)`; `evdwl` is 0 when `eflag` is false.
#[inline]
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn pair_terms(
    rsq: f64,
    radsum: f64,
    a: f64,
    offset: f64,
    kappa: f64,
    factor: f64,
    eflag: bool,
) -> (f64, f64) {
    let r = rsq.sqrt();
    let rinv = 1.0 / r;
    let screening = screening(kappa, r, radsum);
    let forceyukawa = a * screening;
    let fpair = factor * forceyukawa * rinv;

    let evdwl = if eflag {
        factor * (a / kappa * screening - offset)
    } else {
        0.0
    };
    (fpair, evdwl)
}

/// Force and tallies of particle `i` against its neighbor row
#[must_use]
pub fn atom_contribution(
    params: &KernelParams<'_>,
    view: &ParticleView<'_>,
    row: &[NeighborEntry],
    i: usize,
    flags: EvFlags,
) -> AtomContribution {
    let (cutsq, a, offset) = (params.cutsq, params.a, params.offset);
    let kappa = params.kappa;
    let eflag = flags.eflag();
    let evflag = flags.evflag();

    let [xtmp, ytmp, ztmp] = view.positions[i];
    let itype = view.types[i];
    let radi = view.radius[i];
    let mut c = AtomContribution::new(i);

    for entry in row {
        let j = entry.index as usize;
        let factor = params.special_lj[usize::from(entry.special)];

        let [xj, yj, zj] = view.positions[j];
        let del = [xtmp - xj, ytmp - yj, ztmp - zj];
        let rsq = del[0] * del[0] + del[1] * del[1] + del[2] * del[2];
        let jtype = view.types[j];

        if rsq < cutsq.get(itype, jtype) {
            let (fpair, evdwl) = pair_terms(
                rsq,
                radi + view.radius[j],
                a.get(itype, jtype),
                offset.get(itype, jtype),
                kappa,
                factor,
                eflag,
            );

            c.force[0] += del[0] * fpair;
            c.force[1] += del[1] * fpair;
            c.force[2] += del[2] * fpair;

            if evflag {
                c.tally_pair(flags, evdwl, fpair, del);
            }
        }
    }
    c
}

/// Host kernel over active-list positions `range`
///
/// Forces go to `forces[i]` for each active `i = ilist[ii]`; energy and
/// virial to `tally` according to its flags.
///
/// # Errors
///
/// Returns error if `range` extends past the active list
pub fn compute_range(
    params: &KernelParams<'_>,
    view: &ParticleView<'_>,
    list: &NeighborList,
    range: Range<usize>,
    forces: &mut [[f64; 3]],
    tally: &mut EvTally,
) -> Result<(), PairError> {
    if range.end > list.inum() || range.start > range.end {
        return Err(PairError::InvalidParameter(format!(
            "host range {}..{} outside active list of {}",
            range.start,
            range.end,
            list.inum()
        )));
    }

    let flags = tally.flags();
    for &i in &list.ilist()[range] {
        let i = i as usize;
        let c = atom_contribution(params, view, list.row(i), i, flags);
        tally.accumulate(forces, &c);
    }
    Ok(())
}
