use crate::config::TerrainProfileConfig;
use std::time::{SystemTime, UNIX_EPOCH};

const LATTICE_CELL_MIX: u64 = 0x9e37_79b9_7f4a_7c15;
const HILL_OCTAVE_SALT: u64 = 0x517c_c1b7_2722_0a95;
const DETAIL_OCTAVE_SALT: u64 = 0x2545_f491_4f6c_dd1d;

/// Deterministic rolling-hill profile sampled as `y = f(x)`.
///
/// Two lattice-noise octaves (broad hills plus surface detail) are summed on
/// top of `base_height`. Every sample is a pure function of the seed and the
/// profile numbers, so any two fields built from the same inputs agree
/// bit-for-bit at every `x`.
#[derive(Debug, Clone)]
pub struct HeightField {
    seed: u64,
    base_height: f32,
    hill_amplitude: f32,
    hill_wavelength: f32,
    detail_amplitude: f32,
    detail_wavelength: f32,
    quantize_step: f32,
}

impl HeightField {
    pub fn from_profile(profile: &TerrainProfileConfig, seed: u64) -> Self {
        Self {
            seed,
            base_height: profile.base_height,
            hill_amplitude: profile.hill_amplitude,
            hill_wavelength: profile.hill_wavelength,
            detail_amplitude: profile.detail_amplitude,
            detail_wavelength: profile.detail_wavelength,
            quantize_step: profile.quantize_step,
        }
    }

    /// Surface height at world `x`, quantized to `quantize_step` when the
    /// profile asks for terraced ground (step > 0).
    pub fn height_at(&self, x: f32) -> f32 {
        let hills = self.octave_at(x, self.hill_wavelength, HILL_OCTAVE_SALT) * self.hill_amplitude;
        let detail =
            self.octave_at(x, self.detail_wavelength, DETAIL_OCTAVE_SALT) * self.detail_amplitude;
        let height = self.base_height + hills + detail;

        if self.quantize_step > 0.0 {
            (height / self.quantize_step).floor() * self.quantize_step
        } else {
            height
        }
    }

    fn octave_at(&self, x: f32, wavelength: f32, octave_salt: u64) -> f32 {
        let t = x / wavelength.max(f32::EPSILON);
        let cell = t.floor();
        let left = self.lattice_value(cell as i64, octave_salt);
        let right = self.lattice_value(cell as i64 + 1, octave_salt);
        let blend = smoothstep(t - cell);
        left + ((right - left) * blend)
    }

    fn lattice_value(&self, cell: i64, octave_salt: u64) -> f32 {
        let mut state = self
            .seed
            .wrapping_add(octave_salt)
            .wrapping_add((cell as u64).wrapping_mul(LATTICE_CELL_MIX));
        (next_unit_random(&mut state) * 2.0) - 1.0
    }
}

/// Cubic ease with zero slope at both ends, so neighbouring lattice spans
/// join with a continuous first derivative.
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - (2.0 * t))
}

fn next_unit_random(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*seed >> 32) as u32) as f32 / u32::MAX as f32
}

/// A configured seed of zero means "roll a fresh run from the clock". The
/// resolved seed is pinned for the whole session so restarts replay the same
/// hills.
pub fn resolve_terrain_seed(configured: u64) -> u64 {
    if configured != 0 {
        configured
    } else {
        unix_timestamp_seconds().max(1)
    }
}

fn unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hilly_profile() -> TerrainProfileConfig {
        TerrainProfileConfig {
            seed: 0,
            base_height: -320.0,
            hill_amplitude: 150.0,
            hill_wavelength: 900.0,
            detail_amplitude: 40.0,
            detail_wavelength: 220.0,
            quantize_step: 0.0,
        }
    }

    #[test]
    fn same_seed_reproduces_identical_heights() {
        let first = HeightField::from_profile(&hilly_profile(), 1234);
        let second = HeightField::from_profile(&hilly_profile(), 1234);

        for step in 0..400 {
            let x = (step as f32 * 37.5) - 1500.0;
            assert_eq!(
                first.height_at(x).to_bits(),
                second.height_at(x).to_bits(),
                "fields built from the same seed diverged at x = {x}"
            );
        }
    }

    #[test]
    fn different_seeds_produce_different_hills() {
        let first = HeightField::from_profile(&hilly_profile(), 1234);
        let second = HeightField::from_profile(&hilly_profile(), 4321);

        let differing = (0..100)
            .map(|step| step as f32 * 53.0)
            .filter(|&x| (first.height_at(x) - second.height_at(x)).abs() > 0.5)
            .count();
        assert!(differing > 50, "only {differing} of 100 samples differed");
    }

    #[test]
    fn surface_has_no_steps_or_spikes() {
        let field = HeightField::from_profile(&hilly_profile(), 99);

        // Slope is bounded by 1.5 * amplitude / wavelength per octave, well
        // under 1.1 height units per world unit for this profile.
        for step in 0..4000 {
            let x = step as f32 * 0.2;
            let delta = (field.height_at(x + 0.05) - field.height_at(x)).abs();
            assert!(delta < 0.1, "jump of {delta} near x = {x}");
        }
    }

    #[test]
    fn tiny_steps_produce_tiny_height_changes() {
        let field = HeightField::from_profile(&hilly_profile(), 31);

        // Keep x small enough that 0.001 stays well above f32 resolution.
        for step in 0..2000 {
            let x = step as f32;
            let delta = (field.height_at(x + 0.001) - field.height_at(x)).abs();
            assert!(delta < 0.01, "jump of {delta} at x = {x}");
        }
    }

    #[test]
    fn heights_join_smoothly_at_lattice_boundaries() {
        let profile = hilly_profile();
        let field = HeightField::from_profile(&profile, 7);

        for cell in 1..8 {
            for wavelength in [profile.hill_wavelength, profile.detail_wavelength] {
                let boundary = cell as f32 * wavelength;
                let delta =
                    (field.height_at(boundary + 0.01) - field.height_at(boundary - 0.01)).abs();
                assert!(delta < 0.1, "seam of {delta} at x = {boundary}");
            }
        }
    }

    #[test]
    fn heights_stay_inside_the_configured_envelope() {
        let profile = hilly_profile();
        let field = HeightField::from_profile(&profile, 2026);
        let reach = profile.hill_amplitude + profile.detail_amplitude;

        for step in 0..2000 {
            let x = (step as f32 * 17.0) - 5000.0;
            let offset = (field.height_at(x) - profile.base_height).abs();
            assert!(offset <= reach + 0.001, "height escaped envelope at x = {x}");
        }
    }

    #[test]
    fn quantize_step_snaps_heights_to_multiples() {
        let mut profile = hilly_profile();
        profile.quantize_step = 25.0;
        let terraced = HeightField::from_profile(&profile, 55);
        let smooth = HeightField::from_profile(&hilly_profile(), 55);

        let mut snapped_away = 0;
        for step in 0..200 {
            let x = step as f32 * 31.0;
            let height = terraced.height_at(x);
            assert_eq!(height, (height / 25.0).floor() * 25.0);
            if (height - smooth.height_at(x)).abs() > 0.001 {
                snapped_away += 1;
            }
        }
        assert!(snapped_away > 100, "quantization left most samples untouched");
    }

    #[test]
    fn zero_seed_resolves_to_a_fresh_nonzero_seed() {
        assert_eq!(resolve_terrain_seed(7), 7);
        assert_ne!(resolve_terrain_seed(0), 0);
    }
}
