//! Host/accelerator load split
//!
//! A fixed split hands the same fraction of the active list to the accelerator
//! every call. A dynamic split starts at [`INITIAL_DYNAMIC_SPLIT`] and, every
//! `balance_every` calls, moves to the fraction that equalises accelerator and
//! host time given the per-particle costs measured since the last update.

use super::split_watermark;
use crate::config::AccelConfig;

/// Starting accelerator share under dynamic balancing
///
/// Leaves the host some work so its per-particle cost can be measured.
pub const INITIAL_DYNAMIC_SPLIT: f64 = 0.9;

/// Split controller owned by an accelerator backend
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    split: f64,
    dynamic: bool,
    every: usize,
    calls: usize,
    accel_seconds: f64,
    accel_particles: usize,
    host_seconds: f64,
    host_particles: usize,
    pending_host_particles: usize,
}

impl LoadBalancer {
    /// Balancer for a backend configuration
    #[must_use]
    pub fn new(config: &AccelConfig) -> Self {
        let dynamic = config.dynamic_split();
        Self {
            split: if dynamic {
                INITIAL_DYNAMIC_SPLIT
            } else {
                config.split.clamp(0.0, 1.0)
            },
            dynamic,
            every: config.balance_every.max(1),
            calls: 0,
            accel_seconds: 0.0,
            accel_particles: 0,
            host_seconds: 0.0,
            host_particles: 0,
            pending_host_particles: 0,
        }
    }

    /// Current accelerator share
    #[must_use]
    pub const fn split(&self) -> f64 {
        self.split
    }

    /// Whether the split adapts at run time
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Watermark for this call
    ///
    /// `prev_host_seconds` is the host time of the previous call's tail; it is
    /// matched with the tail size remembered from that call.
    pub fn start_call(&mut self, inum: usize, prev_host_seconds: f64) -> usize {
        if self.dynamic && self.pending_host_particles > 0 && prev_host_seconds > 0.0 {
            self.host_seconds += prev_host_seconds;
            self.host_particles += self.pending_host_particles;
        }
        split_watermark(inum, self.split)
    }

    /// Record the accelerator share of this call and maybe rebalance
    #[allow(clippy::cast_precision_loss)]
    pub fn finish_call(&mut self, inum: usize, host_start: usize, accel_seconds: f64) {
        self.pending_host_particles = inum - host_start;
        if !self.dynamic {
            return;
        }

        self.accel_seconds += accel_seconds;
        self.accel_particles += host_start;
        self.calls += 1;
        if self.calls < self.every {
            return;
        }

        if self.accel_particles > 0 && self.host_particles > 0 {
            let accel_rate = self.accel_seconds / self.accel_particles as f64;
            let host_rate = self.host_seconds / self.host_particles as f64;
            let total = accel_rate + host_rate;
            if total > 0.0 && total.is_finite() {
                let previous = self.split;
                self.split = (host_rate / total).clamp(0.0, 1.0);
                tracing::debug!(previous, split = self.split, accel_rate, host_rate, "rebalanced accelerator split");
            }
        }

        self.calls = 0;
        self.accel_seconds = 0.0;
        self.accel_particles = 0;
        self.host_seconds = 0.0;
        self.host_particles = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_split_never_moves() {
        let mut balancer = LoadBalancer::new(&AccelConfig::default().with_split(0.5));
        assert!(!balancer.is_dynamic());

        for _ in 0..100 {
            let host_start = balancer.start_call(10, 1.0);
            assert_eq!(host_start, 5);
            balancer.finish_call(10, host_start, 1.0);
        }
        assert_eq!(balancer.split(), 0.5);
    }

    #[test]
    fn test_fixed_split_clamped() {
        let balancer = LoadBalancer::new(&AccelConfig::default().with_split(1.5));
        assert_eq!(balancer.split(), 1.0);
    }

    #[test]
    fn test_dynamic_split_moves_towards_faster_side() {
        let config = AccelConfig::default()
            .with_split(-1.0)
            .with_balance_every(4);
        let mut balancer = LoadBalancer::new(&config);
        assert_eq!(balancer.split(), INITIAL_DYNAMIC_SPLIT);

        // accelerator 1 us/particle, host 3 us/particle
        let inum = 1000;
        let mut prev_host = 0.0;
        for _ in 0..5 {
            let host_start = balancer.start_call(inum, prev_host);
            balancer.finish_call(inum, host_start, host_start as f64 * 1e-6);
            prev_host = (inum - host_start) as f64 * 3e-6;
        }

        assert!((balancer.split() - 0.75).abs() < 1e-9, "split = {}", balancer.split());
    }

    #[test]
    fn test_dynamic_split_waits_for_host_measurement() {
        let config = AccelConfig::default()
            .with_split(-1.0)
            .with_balance_every(1);
        let mut balancer = LoadBalancer::new(&config);

        let host_start = balancer.start_call(100, 0.0);
        balancer.finish_call(100, host_start, 1.0);

        assert_eq!(balancer.split(), INITIAL_DYNAMIC_SPLIT);
    }
}
