//! Accelerator and style configuration
//!
//! Plain typed settings with defaults; the engine fills these from its own
//! input handling.

/// How work is divided between host and accelerator for neighbor lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelMode {
    /// Host builds the neighbor list, accelerator computes forces only
    #[default]
    Force,
    /// Accelerator builds and owns the neighbor list
    Neigh,
    /// Accelerator owns the list, binning shared with the host
    HybridNeigh,
}

impl AccelMode {
    /// Whether the accelerator builds the neighbor list itself
    #[must_use]
    pub const fn builds_neighbors(self) -> bool {
        matches!(self, Self::Neigh | Self::HybridNeigh)
    }
}

/// Neighbor-capacity hint passed to accelerator initialisation
pub const DEFAULT_NEIGHBOR_CAPACITY: usize = 300;

/// Calls between dynamic load-balance updates
pub const DEFAULT_BALANCE_EVERY: usize = 25;

/// Accelerator backend settings
///
/// # Example
///
/// ```
/// use yukawa_colloid::{AccelConfig, AccelMode};
///
/// let config = AccelConfig::default()
///     .with_mode(AccelMode::Neigh)
///     .with_split(0.75);
/// assert!(config.mode.builds_neighbors());
/// assert!(!config.dynamic_split());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct AccelConfig {
    /// Neighbor-list ownership mode
    pub mode: AccelMode,

    /// Fraction of the active list handled by the accelerator, in `[0, 1]`;
    /// negative selects dynamic balancing
    pub split: f64,

    /// Device memory budget in bytes (`None` = unlimited)
    pub memory_limit: Option<usize>,

    /// Calls between dynamic split updates
    pub balance_every: usize,
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            mode: AccelMode::Force,
            split: 1.0,
            memory_limit: None,
            balance_every: DEFAULT_BALANCE_EVERY,
        }
    }
}

impl AccelConfig {
    /// Neighbor-list mode
    pub const fn with_mode(mut self, mode: AccelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Accelerator share (negative = dynamic)
    pub const fn with_split(mut self, split: f64) -> Self {
        self.split = split;
        self
    }

    /// Device memory budget
    pub const fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Dynamic balance interval
    pub const fn with_balance_every(mut self, calls: usize) -> Self {
        self.balance_every = calls;
        self
    }

    /// Whether the split is rebalanced at run time
    #[must_use]
    pub fn dynamic_split(&self) -> bool {
        self.split < 0.0
    }
}

/// Engine settings consumed by style validation
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StyleContext {
    /// Atom style carries a per-particle radius
    pub has_radius: bool,

    /// Newton's third law across pairs enabled
    pub newton_pair: bool,

    /// Locally owned particles
    pub nlocal: usize,

    /// Ghost particles
    pub nghost: usize,

    /// Largest special-partner count (0 for non-molecular systems)
    pub max_special: usize,

    /// Neighbor-list skin distance
    pub skin: f64,

    /// Scale factor per special code (index 0 = non-bonded)
    pub special_lj: [f64; 4],

    /// Per-type radii for energy offsets (index 0 unused; empty = all zero)
    pub type_radii: Vec<f64>,
}

impl Default for StyleContext {
    fn default() -> Self {
        Self {
            has_radius: true,
            newton_pair: false,
            nlocal: 0,
            nghost: 0,
            max_special: 0,
            skin: 0.3,
            special_lj: [1.0, 0.0, 0.0, 0.0],
            type_radii: Vec::new(),
        }
    }
}

impl StyleContext {
    /// Particle counts
    pub const fn with_counts(mut self, nlocal: usize, nghost: usize) -> Self {
        self.nlocal = nlocal;
        self.nghost = nghost;
        self
    }

    /// Neighbor skin
    pub const fn with_skin(mut self, skin: f64) -> Self {
        self.skin = skin;
        self
    }

    /// Special-bond scale factors
    pub const fn with_special_lj(mut self, special_lj: [f64; 4]) -> Self {
        self.special_lj = special_lj;
        self
    }

    /// Newton pair setting
    pub const fn with_newton_pair(mut self, newton_pair: bool) -> Self {
        self.newton_pair = newton_pair;
        self
    }

    /// Per-particle radius availability
    pub const fn with_radius(mut self, has_radius: bool) -> Self {
        self.has_radius = has_radius;
        self
    }

    /// Special-partner capacity
    pub const fn with_max_special(mut self, max_special: usize) -> Self {
        self.max_special = max_special;
        self
    }

    /// Per-type radii
    pub fn with_type_radii(mut self, type_radii: Vec<f64>) -> Self {
        self.type_radii = type_radii;
        self
    }
}
