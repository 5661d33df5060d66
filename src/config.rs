//! Runtime settings.
//!
//! Everything tunable lives here with defaults matching the instrument setup
//! the tool was built for. Values can be overridden from the environment (a
//! `.env` file is honored), and per invocation from CLI flags.
//!
//! | variable                      | default   |
//! |-------------------------------|-----------|
//! | `OPTOFIT_WIDTH_RATIO`         | 0.5       |
//! | `OPTOFIT_MAX_ITERATIONS`      | 1000      |
//! | `OPTOFIT_FTOL`                | 1.49012e-8|
//! | `OPTOFIT_XTOL`                | 1.49012e-8|
//! | `OPTOFIT_OVERLAY_POINTS`      | 1000      |
//! | `OPTOFIT_TEMPERATURE_K`       | 294.15    |
//! | `OPTOFIT_LOAD_IMPEDANCE_OHM`  | 50        |
//! | `OPTOFIT_POWER_LOSS`          | 1/1.34    |

use std::str::FromStr;

use log::warn;

use crate::coupling::PhysicalConstants;
use crate::fit::FitOptions;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settings {
    pub fit: FitOptions,
    pub constants: PhysicalConstants,
}

impl Settings {
    /// Defaults overridden by `OPTOFIT_*` variables (after loading `.env`).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        let positive = |v: &f64| v.is_finite() && *v > 0.0;

        override_with(&lookup, "OPTOFIT_WIDTH_RATIO", positive, &mut s.fit.default_width_ratio);
        override_with(
            &lookup,
            "OPTOFIT_MAX_ITERATIONS",
            |v: &usize| *v > 0,
            &mut s.fit.solver.max_iterations,
        );
        override_with(&lookup, "OPTOFIT_FTOL", positive, &mut s.fit.solver.ftol);
        override_with(&lookup, "OPTOFIT_XTOL", positive, &mut s.fit.solver.xtol);
        override_with(
            &lookup,
            "OPTOFIT_OVERLAY_POINTS",
            |v: &usize| *v >= 2,
            &mut s.fit.overlay_points,
        );
        override_with(&lookup, "OPTOFIT_TEMPERATURE_K", positive, &mut s.constants.temperature_k);
        override_with(
            &lookup,
            "OPTOFIT_LOAD_IMPEDANCE_OHM",
            positive,
            &mut s.constants.load_impedance_ohm,
        );
        override_with(
            &lookup,
            "OPTOFIT_POWER_LOSS",
            positive,
            &mut s.constants.default_power_loss,
        );
        s
    }
}

fn override_with<T, F, V>(lookup: &F, key: &str, valid: V, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => *slot = v,
        _ => warn!("ignoring {key}={raw:?}; keeping {slot}"),
    }
}
