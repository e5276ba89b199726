//! Property-based tests for yukawa-colloid
//!
//! Verifies split, tally, and kernel invariants hold for arbitrary particle sets

use proptest::prelude::*;
use yukawa_colloid::pair::kernel::{compute_range, KernelParams, ParticleView};
use yukawa_colloid::{
    split_watermark, AccelConfig, AccelMode, CpuAccelerator, Domain, EvFlags, EvTally, ListKind,
    NeighborEntry, NeighborList, PairCoeffs, PairYukawaColloidAccel, ParticleSnapshot, StepInput,
    StyleContext, NEIGHMASK,
};

/// Random colloids in a 12-wide box with two types of distinct radius
fn prop_colloids(max: usize) -> impl Strategy<Value = ParticleSnapshot> {
    prop::collection::vec(
        ((0.0..12.0_f64, 0.0..12.0_f64, 0.0..12.0_f64), 1usize..=2),
        2..max,
    )
    .prop_map(|particles| {
        let positions = particles.iter().map(|&((x, y, z), _)| [x, y, z]).collect();
        let types: Vec<usize> = particles.iter().map(|&(_, t)| t).collect();
        let radius = types.iter().map(|&t| if t == 1 { 0.4 } else { 0.7 }).collect();
        ParticleSnapshot::new(positions, types, radius)
    })
}

fn coeffs() -> PairCoeffs {
    let mut coeffs = PairCoeffs::new(2, 1.2, 3.0).unwrap().with_offset(true);
    coeffs.set_coeff(1, 1, 1.5, None).unwrap();
    coeffs.set_coeff(2, 2, 3.0, Some(3.5)).unwrap();
    coeffs
}

fn style(nlocal: usize) -> StyleContext {
    StyleContext::default()
        .with_counts(nlocal, 0)
        .with_type_radii(vec![0.0, 0.4, 0.7])
}

/// Pure host evaluation of the whole list
fn host_reference(snap: &ParticleSnapshot, list: &NeighborList, flags: EvFlags) -> (Vec<[f64; 3]>, EvTally) {
    let mut coeffs = coeffs();
    coeffs.set_type_radii(&[0.0, 0.4, 0.7]).unwrap();
    coeffs.init_cutsq().unwrap();
    let params = KernelParams::from_coeffs(&coeffs, [1.0, 0.0, 0.0, 0.0]);
    let view = ParticleView::new(snap).unwrap();
    let mut forces = vec![[0.0; 3]; snap.nall()];
    let mut tally = EvTally::new(flags, snap.nall());
    compute_range(&params, &view, list, 0..list.inum(), &mut forces, &mut tally).unwrap();
    (forces, tally)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-10 * a.abs().max(b.abs()).max(1.0)
}

// Property: any split of work reproduces the pure host result
proptest! {
    #[test]
    fn prop_split_matches_host(snap in prop_colloids(40), split in 0.0..=1.0_f64) {
        let domain = Domain::new([0.0; 3], [12.0; 3]);
        let list = NeighborList::build_full(&snap, &domain, 3.8, None).unwrap();
        let (expected, expected_tally) = host_reference(&snap, &list, EvFlags::all());

        let accel = CpuAccelerator::new(AccelConfig::default().with_split(split));
        let mut pair = PairYukawaColloidAccel::new(accel, coeffs()).unwrap();
        pair.init_style(&style(snap.nlocal), &mut Vec::<ListKind>::new()).unwrap();

        let mut forces = vec![[0.0; 3]; snap.nall()];
        let step = StepInput::new(&snap, &domain).with_list(&list);
        let report = pair.compute(&step, &mut forces, EvFlags::all()).unwrap();

        prop_assert!(report.host_start <= report.inum);
        prop_assert_eq!(report.host_start, split_watermark(report.inum, split));
        for (f, e) in forces.iter().zip(&expected) {
            for k in 0..3 {
                prop_assert!(close(f[k], e[k]), "{:?} vs {:?}", f, e);
            }
        }
        prop_assert!(close(pair.energy(), expected_tally.eng_vdwl));
        for k in 0..6 {
            prop_assert!(close(pair.virial()[k], expected_tally.virial[k]));
        }
        for (a, b) in pair.eatom().iter().zip(expected_tally.eatom()) {
            prop_assert!(close(*a, *b));
        }
    }
}

// Property: host and accelerator ranges are complementary and disjoint
proptest! {
    #[test]
    fn prop_watermark_partitions_active_list(inum in 0usize..10_000, split in -1.0..2.0_f64) {
        let host_start = split_watermark(inum, split);
        prop_assert!(host_start <= inum);

        let accel: Vec<usize> = (0..host_start).collect();
        let host: Vec<usize> = (host_start..inum).collect();
        prop_assert_eq!(accel.len() + host.len(), inum);
        prop_assert!(accel.last().map_or(true, |&a| host.first().map_or(true, |&h| a < h)));
    }
}

/// Two type-1 colloids `r` apart along x with the given radii
fn colloid_pair(r: f64, radius: [f64; 2], kappa: f64) -> (Vec<[f64; 3]>, f64) {
    let snap = ParticleSnapshot::new(vec![[0.0; 3], [r, 0.0, 0.0]], vec![1, 1], radius.to_vec());
    let list = NeighborList::from_rows(
        vec![0, 1],
        vec![vec![NeighborEntry::plain(1)], vec![NeighborEntry::plain(0)]],
    )
    .unwrap();

    let mut coeffs = PairCoeffs::new(1, kappa, 12.0).unwrap();
    coeffs.set_coeff(1, 1, 2.0, None).unwrap();
    coeffs.init_cutsq().unwrap();
    let params = KernelParams::from_coeffs(&coeffs, [1.0, 0.0, 0.0, 0.0]);
    let view = ParticleView::new(&snap).unwrap();
    let mut forces = vec![[0.0; 3]; 2];
    let mut tally = EvTally::new(EvFlags::all(), 2);
    compute_range(&params, &view, &list, 0..2, &mut forces, &mut tally).unwrap();
    (forces, tally.eng_vdwl)
}

// Property: exchanging the radii of two colloids leaves forces and energy unchanged,
// and the radii do enter the interaction
proptest! {
    #[test]
    fn prop_radius_swap_symmetry(
        r in 0.5..10.0_f64,
        radi in 0.05..3.0_f64,
        radj in 0.05..3.0_f64,
        kappa in 0.1..5.0_f64,
    ) {
        let (forces, energy) = colloid_pair(r, [radi, radj], kappa);
        let (swapped, swapped_energy) = colloid_pair(r, [radj, radi], kappa);
        let (point, point_energy) = colloid_pair(r, [0.0, 0.0], kappa);

        for (f, g) in forces.iter().zip(&swapped) {
            for k in 0..3 {
                prop_assert!(close(f[k], g[k]), "{:?} vs {:?}", f, g);
            }
        }
        prop_assert!(close(energy, swapped_energy));

        // contact shift scales everything by exp(kappa (radi + radj)) > 1
        let scale = (kappa * (radi + radj)).exp();
        prop_assert!(close(forces[1][0], point[1][0] * scale));
        prop_assert!(close(energy, point_energy * scale));
        prop_assert!(forces[1][0] > point[1][0]);
    }
}

// Property: repeated evaluation with fresh accumulators is idempotent
proptest! {
    #[test]
    fn prop_compute_idempotent(snap in prop_colloids(30), ago in 0u64..3) {
        let domain = Domain::new([0.0; 3], [12.0; 3]);
        let accel = CpuAccelerator::new(AccelConfig::default().with_mode(AccelMode::Neigh).with_split(0.3));
        let mut pair = PairYukawaColloidAccel::new(accel, coeffs()).unwrap();
        pair.init_style(&style(snap.nlocal), &mut Vec::<ListKind>::new()).unwrap();

        let mut first = vec![[0.0; 3]; snap.nall()];
        pair.compute(&StepInput::new(&snap, &domain), &mut first, EvFlags::global()).unwrap();
        let energy = pair.energy();

        let mut second = vec![[0.0; 3]; snap.nall()];
        pair.compute(&StepInput::new(&snap, &domain).with_ago(ago), &mut second, EvFlags::global()).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(energy, pair.energy());
    }
}

// Property: Newton's third law holds in total even though only f_i is written
proptest! {
    #[test]
    fn prop_total_force_vanishes(snap in prop_colloids(40)) {
        let domain = Domain::new([0.0; 3], [12.0; 3]);
        let list = NeighborList::build_full(&snap, &domain, 3.8, None).unwrap();
        let (forces, _) = host_reference(&snap, &list, EvFlags::none());

        let scale: f64 = forces.iter().flatten().map(|f| f.abs()).sum::<f64>().max(1.0);
        for k in 0..3 {
            let total: f64 = forces.iter().map(|f| f[k]).sum();
            prop_assert!(total.abs() <= 1e-10 * scale);
        }
    }
}

// Property: packed form keeps index and special code
proptest! {
    #[test]
    fn prop_pack_unpack(index in 0u32..=NEIGHMASK, special in 0u8..4) {
        let entry = NeighborEntry::new(index, special);
        prop_assert_eq!(NeighborEntry::unpack(entry.pack()), entry);
    }
}
