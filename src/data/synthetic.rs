//! Deterministic pseudo-proxy networks.
//!
//! A known "true" temperature history is sampled from an AR(1) process with
//! volcanic dips and late warming; proxies are noisy linear responses to it.
//! Used to exercise the reconstruction end to end without the NOAA archives.

use std::collections::BTreeMap;

use super::model::{MetadataValue, ProxySeries, TemperatureSeries};

/// Proxy codes assigned round-robin to synthetic sites.
const CODES: [i64; 8] = [9000, 7500, 8000, 7000, 6000, 5000, 4000, 2000];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub start: i32,
    pub end: i32,
    /// First year of the instrumental target.
    pub instrumental_start: i32,
    pub n_proxies: usize,
    /// Proxy noise standard deviation, in units of the proxy response.
    pub noise: f64,
    pub target_noise: f64,
    /// Start years are staggered by this many years across proxies.
    pub stagger: i32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start: 1000,
            end: 2000,
            instrumental_start: 1850,
            n_proxies: 24,
            noise: 0.5,
            target_noise: 0.05,
            stagger: 250,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticNetwork {
    pub series: Vec<ProxySeries>,
    /// The temperature the proxies respond to.
    pub truth: TemperatureSeries,
    /// Truth plus measurement noise over the instrumental era.
    pub instrumental: TemperatureSeries,
}

pub fn generate(cfg: &SyntheticConfig) -> SyntheticNetwork {
    let mut rng = SimpleRng::new(cfg.seed);
    let years: Vec<i32> = (cfg.start..=cfg.end).collect();

    let mut anomaly = 0.0;
    let mut volcanic = 0.0;
    let truth_values: Vec<f64> = years
        .iter()
        .map(|&y| {
            anomaly = 0.7 * anomaly + rng.gauss(0.0, 0.12);
            if rng.next_f64() < 0.02 {
                volcanic -= 0.5;
            }
            volcanic *= 0.6;
            let phase = 2.0 * std::f64::consts::PI * f64::from(y - cfg.start) / 300.0;
            let warming = 0.006 * f64::from((y - cfg.instrumental_start).max(0));
            anomaly + volcanic + 0.2 * phase.sin() + warming - 0.2
        })
        .collect();

    let series = (0..cfg.n_proxies)
        .map(|i| {
            let first = cfg.start + (i as i32 % 4) * cfg.stagger;
            let sign = if i % 5 == 4 { -1.0 } else { 1.0 };
            let scale = sign * (0.5 + rng.next_f64());
            let offset = rng.gauss(0.0, 2.0);
            let code = CODES[i % CODES.len()];

            let (time, value): (Vec<f64>, Vec<f64>) = years
                .iter()
                .zip(&truth_values)
                .filter(|&(&y, _)| y >= first)
                .map(|(&y, &t)| {
                    let v = offset + scale * (t + rng.gauss(0.0, cfg.noise));
                    (f64::from(y), v)
                })
                .unzip();

            let mut metadata = BTreeMap::new();
            metadata.insert("synthetic".to_string(), MetadataValue::Bool(true));
            ProxySeries {
                name: format!("pseudo-{i:02}"),
                lat: -60.0 + 140.0 * rng.next_f64(),
                lon: -180.0 + 360.0 * rng.next_f64(),
                code,
                time,
                value,
                metadata,
            }
        })
        .collect();

    let instrumental = TemperatureSeries::new(
        years
            .iter()
            .zip(&truth_values)
            .filter(|&(&y, _)| y >= cfg.instrumental_start)
            .map(|(&y, &t)| (y, t + rng.gauss(0.0, cfg.target_noise)))
            .collect::<Vec<_>>(),
    );

    SyntheticNetwork {
        series,
        truth: TemperatureSeries {
            years,
            values: truth_values,
        },
        instrumental,
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
