//! Per-type-pair coefficient tables
//!
//! Types are 1-based to match engine type ids: tables are
//! `(ntypes + 1) x (ntypes + 1)` with row and column 0 unused. Every setter
//! writes both `[i][j]` and `[j][i]`, so the tables stay symmetric.

use crate::error::PairError;

/// Square symmetric table indexed by `(type, type)`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTable {
    n: usize,
    data: Vec<f64>,
}

impl TypeTable {
    /// Zero-filled table for types `1..=ntypes`
    #[must_use]
    pub fn new(ntypes: usize) -> Self {
        let n = ntypes + 1;
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Row/column count including the unused index 0
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.n
    }

    /// Value at `(i, j)`
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Set `(i, j)` and `(j, i)`
    pub fn set_sym(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
        self.data[j * self.n + i] = value;
    }

    /// Row-major contents, `dim() * dim()` values
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Mixing rule for cutoffs of unset type pairs
///
/// The strength coefficient always mixes geometrically, matching the energy
/// mixing of all three rules with unit length scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixRule {
    /// `sqrt(c_i * c_j)`
    #[default]
    Geometric,
    /// `(c_i + c_j) / 2`
    Arithmetic,
    /// `((c_i^6 + c_j^6) / 2)^(1/6)`
    SixthPower,
}

impl MixRule {
    /// Mixed distance
    #[must_use]
    pub fn distance(self, ci: f64, cj: f64) -> f64 {
        match self {
            Self::Geometric => (ci * cj).sqrt(),
            Self::Arithmetic => 0.5 * (ci + cj),
            Self::SixthPower => (0.5 * (ci.powi(6) + cj.powi(6))).powf(1.0 / 6.0),
        }
    }

    /// Mixed energy coefficient
    #[must_use]
    pub fn energy(self, ai: f64, aj: f64) -> f64 {
        (ai * aj).sqrt()
    }
}

/// Yukawa colloid coefficients
///
/// Pair energy `E = a/kappa * exp(-kappa (r - (rad_i + rad_j))) - offset`,
/// force `F = a * exp(-kappa (r - (rad_i + rad_j)))` along the separation.
///
/// # Example
///
/// ```
/// use yukawa_colloid::PairCoeffs;
///
/// let mut coeffs = PairCoeffs::new(2, 1.0, 5.0).unwrap();
/// coeffs.set_coeff(1, 1, 2.0, None).unwrap();
/// coeffs.set_coeff(2, 2, 8.0, Some(4.0)).unwrap();
///
/// // 1-2 mixes from the self pairs
/// assert!((coeffs.init_one(1, 2).unwrap() - 20.0_f64.sqrt()).abs() < 1e-12);
/// assert!((coeffs.a().get(1, 2) - 4.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct PairCoeffs {
    ntypes: usize,
    kappa: f64,
    cut_global: f64,
    offset_flag: bool,
    mix: MixRule,
    setflag: Vec<bool>,
    a: TypeTable,
    cut: TypeTable,
    cutsq: TypeTable,
    offset: TypeTable,
    type_radius: Vec<f64>,
}

impl PairCoeffs {
    /// Tables for `ntypes` types with screening `kappa` and default cutoff `cut_global`
    ///
    /// # Errors
    ///
    /// Returns error if `ntypes == 0`, `kappa` is zero or non-finite, or
    /// `cut_global` is not positive
    pub fn new(ntypes: usize, kappa: f64, cut_global: f64) -> Result<Self, PairError> {
        if ntypes == 0 {
            return Err(PairError::InvalidParameter("ntypes must be at least 1".into()));
        }
        if kappa == 0.0 || !kappa.is_finite() {
            return Err(PairError::InvalidParameter(format!(
                "kappa must be finite and non-zero, got {kappa}"
            )));
        }
        if !(cut_global > 0.0 && cut_global.is_finite()) {
            return Err(PairError::InvalidParameter(format!(
                "global cutoff must be positive, got {cut_global}"
            )));
        }

        let n = ntypes + 1;
        Ok(Self {
            ntypes,
            kappa,
            cut_global,
            offset_flag: false,
            mix: MixRule::default(),
            setflag: vec![false; n * n],
            a: TypeTable::new(ntypes),
            cut: TypeTable::new(ntypes),
            cutsq: TypeTable::new(ntypes),
            offset: TypeTable::new(ntypes),
            type_radius: vec![0.0; n],
        })
    }

    /// Shift energies to zero at the cutoff
    #[must_use]
    pub const fn with_offset(mut self, offset_flag: bool) -> Self {
        self.offset_flag = offset_flag;
        self
    }

    /// Cutoff mixing rule for unset pairs
    #[must_use]
    pub const fn with_mix(mut self, mix: MixRule) -> Self {
        self.mix = mix;
        self
    }

    /// Set coefficients for one type pair; `cut = None` uses the global cutoff
    ///
    /// # Errors
    ///
    /// Returns error if a type is out of range or the cutoff is not positive
    pub fn set_coeff(
        &mut self,
        itype: usize,
        jtype: usize,
        a: f64,
        cut: Option<f64>,
    ) -> Result<(), PairError> {
        self.check_type(itype)?;
        self.check_type(jtype)?;
        let cut = cut.unwrap_or(self.cut_global);
        if !(cut > 0.0 && cut.is_finite()) {
            return Err(PairError::InvalidParameter(format!(
                "cutoff must be positive, got {cut}"
            )));
        }

        let (i, j) = (itype.min(jtype), itype.max(jtype));
        self.a.set_sym(i, j, a);
        self.cut.set_sym(i, j, cut);
        self.setflag[i * (self.ntypes + 1) + j] = true;
        Ok(())
    }

    /// Per-type radii used for energy offsets (index 0 unused)
    ///
    /// # Errors
    ///
    /// Returns error if the slice length is not `ntypes + 1`
    pub fn set_type_radii(&mut self, radii: &[f64]) -> Result<(), PairError> {
        if radii.len() != self.ntypes + 1 {
            return Err(PairError::InvalidParameter(format!(
                "expected {} type radii, got {}",
                self.ntypes + 1,
                radii.len()
            )));
        }
        self.type_radius.copy_from_slice(radii);
        Ok(())
    }

    /// Whether coefficients were set explicitly for `(i, j)`
    #[must_use]
    pub fn is_set(&self, itype: usize, jtype: usize) -> bool {
        let (i, j) = (itype.min(jtype), itype.max(jtype));
        self.setflag[i * (self.ntypes + 1) + j]
    }

    /// Whether `(i, j)` takes part in the cutoff table: set, or mixable from both self pairs
    #[must_use]
    pub fn is_active(&self, itype: usize, jtype: usize) -> bool {
        self.is_set(itype, jtype) || (self.is_set(itype, itype) && self.is_set(jtype, jtype))
    }

    /// Finalize one type pair and return its cutoff
    ///
    /// Unset pairs mix from their self pairs. The energy offset is
    /// `a/kappa * exp(-kappa (cut - (rad_i + rad_j)))` when offsets are on,
    /// else 0. Both `[i][j]` and `[j][i]` are written.
    ///
    /// # Errors
    ///
    /// Returns `PairError::CoeffsNotSet` if the pair cannot be mixed
    pub fn init_one(&mut self, itype: usize, jtype: usize) -> Result<f64, PairError> {
        self.check_type(itype)?;
        self.check_type(jtype)?;

        if !self.is_set(itype, jtype) {
            if !(self.is_set(itype, itype) && self.is_set(jtype, jtype)) {
                return Err(PairError::CoeffsNotSet { itype, jtype });
            }
            let a = self
                .mix
                .energy(self.a.get(itype, itype), self.a.get(jtype, jtype));
            let cut = self
                .mix
                .distance(self.cut.get(itype, itype), self.cut.get(jtype, jtype));
            self.a.set_sym(itype, jtype, a);
            self.cut.set_sym(itype, jtype, cut);
        }

        let cut = self.cut.get(itype, jtype);
        let offset = if self.offset_flag {
            let contact = self.type_radius[itype] + self.type_radius[jtype];
            let screening = (-self.kappa * (cut - contact)).exp();
            self.a.get(itype, jtype) / self.kappa * screening
        } else {
            0.0
        };
        self.offset.set_sym(itype, jtype, offset);

        Ok(cut)
    }

    /// Recompute the full squared-cutoff table; returns the largest squared cutoff
    ///
    /// Inactive pairs get `cutsq = 0`. With no active pair the result is -1.
    ///
    /// # Errors
    ///
    /// Propagates `init_one` failures
    pub fn init_cutsq(&mut self) -> Result<f64, PairError> {
        let mut maxcut = -1.0_f64;
        for i in 1..=self.ntypes {
            for j in i..=self.ntypes {
                if self.is_active(i, j) {
                    let cut = self.init_one(i, j)?;
                    let cutsq = cut * cut;
                    maxcut = maxcut.max(cutsq);
                    self.cutsq.set_sym(i, j, cutsq);
                } else {
                    self.cutsq.set_sym(i, j, 0.0);
                }
            }
        }
        Ok(maxcut)
    }

    /// Validate a type id
    ///
    /// # Errors
    ///
    /// Returns `PairError::InvalidType` outside `1..=ntypes`
    pub fn check_type(&self, itype: usize) -> Result<(), PairError> {
        if itype == 0 || itype > self.ntypes {
            return Err(PairError::InvalidType {
                itype,
                ntypes: self.ntypes,
            });
        }
        Ok(())
    }

    /// Number of types
    #[must_use]
    pub const fn ntypes(&self) -> usize {
        self.ntypes
    }

    /// Screening parameter
    #[must_use]
    pub const fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Strength coefficients
    #[must_use]
    pub const fn a(&self) -> &TypeTable {
        &self.a
    }

    /// Cutoffs
    #[must_use]
    pub const fn cut(&self) -> &TypeTable {
        &self.cut
    }

    /// Squared cutoffs (valid after `init_cutsq`)
    #[must_use]
    pub const fn cutsq(&self) -> &TypeTable {
        &self.cutsq
    }

    /// Energy offsets (valid after `init_cutsq`)
    #[must_use]
    pub const fn offset(&self) -> &TypeTable {
        &self.offset
    }

    /// Host memory held by the tables, in bytes
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        4 * self.a.as_slice().len() * std::mem::size_of::<f64>()
            + self.setflag.len() * std::mem::size_of::<bool>()
            + self.type_radius.len() * std::mem::size_of::<f64>()
    }
}
