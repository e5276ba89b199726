//! Backend Story Integration Tests
//!
//! Every accelerator backend, at every split and neighbor mode, must reproduce
//! the pure host kernel. A backend that only works for one split or one mode
//! does not ship.

use yukawa_colloid::pair::kernel::{compute_range, KernelParams, ParticleView};
use yukawa_colloid::{
    AccelConfig, AccelMode, AcceleratorService, CpuAccelerator, Domain, EvFlags, EvTally, ListKind,
    NeighborList, PairCoeffs, PairYukawaColloidAccel, ParticleSnapshot, SpecialBonds, StepInput,
    StyleContext,
};

// ============================================================================
// HELPER: Build test systems
// ============================================================================

const SPECIAL_LJ: [f64; 4] = [1.0, 0.25, 0.5, 0.75];
const BOX: f64 = 9.0;

/// Simple cubic lattice of two alternating colloid types, jittered off-lattice,
/// with periodic ghost images along x
#[allow(clippy::cast_precision_loss)]
fn build_lattice(per_side: usize) -> (ParticleSnapshot, Domain, SpecialBonds) {
    let spacing = BOX / per_side as f64;
    let mut positions = Vec::new();
    let mut types = Vec::new();
    let mut radius = Vec::new();
    for ix in 0..per_side {
        for iy in 0..per_side {
            for iz in 0..per_side {
                let n = positions.len();
                let jitter = 0.05 * ((n * 7919 % 13) as f64 / 13.0 - 0.5);
                positions.push([
                    (ix as f64 + 0.5) * spacing + jitter,
                    (iy as f64 + 0.5) * spacing - jitter,
                    (iz as f64 + 0.5) * spacing + 0.5 * jitter,
                ]);
                let t = 1 + n % 2;
                types.push(t);
                radius.push(if t == 1 { 0.3 } else { 0.45 });
            }
        }
    }

    let mut snap = ParticleSnapshot::new(positions, types, radius);
    for owner in 0..snap.nlocal {
        let x = snap.positions[owner][0];
        if x < 2.5 {
            snap.push_ghost(owner, [BOX, 0.0, 0.0]).unwrap();
        } else if x > BOX - 2.5 {
            snap.push_ghost(owner, [-BOX, 0.0, 0.0]).unwrap();
        }
    }

    // chain bonds along the first row give 1-2 partners
    let mut special = SpecialBonds::new(snap.nlocal);
    for i in 0..per_side - 1 {
        special.add_bond(&snap, i, i + 1).unwrap();
    }

    (snap, Domain::new([0.0; 3], [BOX; 3]), special)
}

fn build_coeffs() -> PairCoeffs {
    let mut coeffs = PairCoeffs::new(2, 1.5, 2.5).unwrap().with_offset(true);
    coeffs.set_coeff(1, 1, 2.0, None).unwrap();
    coeffs.set_coeff(2, 2, 4.0, Some(2.2)).unwrap();
    coeffs
}

fn style(snap: &ParticleSnapshot, special: &SpecialBonds) -> StyleContext {
    StyleContext::default()
        .with_counts(snap.nlocal, snap.nghost)
        .with_special_lj(SPECIAL_LJ)
        .with_max_special(special.max_special())
        .with_type_radii(vec![0.0, 0.3, 0.45])
}

/// Pure host result over a list built at `cutoff`
fn host_reference(
    snap: &ParticleSnapshot,
    domain: &Domain,
    special: &SpecialBonds,
    cutoff: f64,
) -> (NeighborList, Vec<[f64; 3]>, EvTally) {
    let mut coeffs = build_coeffs();
    coeffs.set_type_radii(&[0.0, 0.3, 0.45]).unwrap();
    coeffs.init_cutsq().unwrap();

    let list = NeighborList::build_full(snap, domain, cutoff, Some(special)).unwrap();
    let params = KernelParams::from_coeffs(&coeffs, SPECIAL_LJ);
    let view = ParticleView::new(snap).unwrap();
    let mut forces = vec![[0.0; 3]; snap.nall()];
    let mut tally = EvTally::new(EvFlags::all(), snap.nall());
    compute_range(&params, &view, &list, 0..list.inum(), &mut forces, &mut tally).unwrap();
    (list, forces, tally)
}

fn assert_matches(
    label: &str,
    forces: &[[f64; 3]],
    pair_energy: f64,
    pair_virial: [f64; 6],
    expected: &(NeighborList, Vec<[f64; 3]>, EvTally),
    rel: f64,
) {
    let (_, expected_forces, expected_tally) = expected;
    let close = |a: f64, b: f64| (a - b).abs() <= rel * a.abs().max(b.abs()).max(1.0);

    for (i, (f, e)) in forces.iter().zip(expected_forces).enumerate() {
        for k in 0..3 {
            assert!(close(f[k], e[k]), "{label}: particle {i} force {f:?} vs {e:?}");
        }
    }
    assert!(
        close(pair_energy, expected_tally.eng_vdwl),
        "{label}: energy {pair_energy} vs {}",
        expected_tally.eng_vdwl
    );
    for k in 0..6 {
        assert!(close(pair_virial[k], expected_tally.virial[k]), "{label}: virial[{k}]");
    }
}

/// Drive one backend through several steps and compare each step
fn run_backend<A: AcceleratorService>(label: &str, accel: A, rel: f64) {
    let (snap, domain, special) = build_lattice(5);
    let mut pair = PairYukawaColloidAccel::new(accel, build_coeffs()).unwrap();
    let mut requests: Vec<ListKind> = Vec::new();
    let mode = pair.init_style(&style(&snap, &special), &mut requests).unwrap();

    let expected = host_reference(&snap, &domain, &special, pair.cell_size());
    assert!(expected.2.eng_vdwl.abs() > 0.0, "{label}: test system has no interactions");

    for ago in 0..4_u64 {
        let mut forces = vec![[0.0; 3]; snap.nall()];
        let mut step = StepInput::new(&snap, &domain)
            .with_ago(ago)
            .with_special(&special);
        if mode == AccelMode::Force {
            assert_eq!(requests, vec![ListKind::Full]);
            step = step.with_list(&expected.0);
        }

        let report = pair.compute(&step, &mut forces, EvFlags::all()).unwrap();
        assert_eq!(report.inum, snap.nlocal, "{label}");
        assert!(report.host_start <= report.inum, "{label}");
        assert_matches(label, &forces, pair.energy(), pair.virial(), &expected, rel);
    }
}

// ============================================================================
// SOFTWARE ACCELERATOR
// ============================================================================

/// Test every fixed split with a host-built list
#[test]
fn test_cpu_backend_force_mode_all_splits() {
    for split in [0.0, 0.25, 0.5, 0.9, 1.0] {
        let accel = CpuAccelerator::new(AccelConfig::default().with_split(split));
        run_backend(&format!("cpu force split={split}"), accel, 1e-10);
    }
}

/// Test accelerator-owned lists in both list-owning modes
#[test]
fn test_cpu_backend_neighbor_modes() {
    for mode in [AccelMode::Neigh, AccelMode::HybridNeigh] {
        for split in [0.0, 0.6, 1.0] {
            let accel = CpuAccelerator::new(AccelConfig::default().with_mode(mode).with_split(split));
            run_backend(&format!("cpu {mode:?} split={split}"), accel, 1e-10);
        }
    }
}

/// Test dynamic balancing keeps results exact while the split moves
#[test]
fn test_cpu_backend_dynamic_split() {
    let config = AccelConfig::default()
        .with_mode(AccelMode::Neigh)
        .with_split(-1.0)
        .with_balance_every(1);
    run_backend("cpu dynamic", CpuAccelerator::new(config), 1e-10);
}

/// Test a boxed backend behind a trait object
#[test]
fn test_boxed_backend() {
    let accel: Box<dyn AcceleratorService> =
        Box::new(CpuAccelerator::new(AccelConfig::default().with_split(0.5)));
    run_backend("boxed cpu", accel, 1e-10);
}

// ============================================================================
// GPU ACCELERATOR
// ============================================================================

#[cfg(feature = "gpu")]
mod gpu {
    use super::*;
    use yukawa_colloid::WgpuAccelerator;

    /// f32 kernel: compare at single-precision tolerance
    const GPU_REL: f64 = 1e-4;

    #[test]
    fn test_gpu_backend_modes_and_splits() {
        for (mode, split) in [
            (AccelMode::Force, 1.0),
            (AccelMode::Force, 0.5),
            (AccelMode::Neigh, 1.0),
            (AccelMode::HybridNeigh, 0.3),
        ] {
            let config = AccelConfig::default().with_mode(mode).with_split(split);
            let accel = match WgpuAccelerator::new(config) {
                Ok(accel) => accel,
                Err(err) => {
                    eprintln!("⚠️  Skipping test_gpu_backend_modes_and_splits: {err}");
                    return;
                }
            };
            run_backend(&format!("gpu {mode:?} split={split}"), accel, GPU_REL);
        }
    }
}
