//! Optomechanical coupling rate `g0` from a mechanical fit and a calibration tone.
//!
//! The mechanical resonance is fitted with a Lorentzian and the phase
//! modulation tone with a Gaussian; together with the instrument settings
//! stored in the dataset metadata they give the vacuum coupling rate through
//! the frequency-noise calibration method:
//!
//! ```text
//! P    = 10^(dBm/10) · 1e-3                    (W)
//! V    = sqrt(power_loss · P · R) · sqrt(2)    (peak volts)
//! β    = V / Vπ · π
//! nth  = 1 / (exp(h·Ωm / (kB·T)) − 1)
//! g0   = sqrt( 0.5/nth · β² · |Ωmod|² / 2 · |Sm| · |Γ| · 2π / 4 / (|Smod| · ENBW) )
//! ```
//!
//! The result is in rad/s; `g0 / 2π` is what gets displayed.

use std::f64::consts::PI;

use crate::domain::Metadata;
use crate::error::CouplingError;

/// Lorentz-fit keys plus instrument keys required for `g0`.
pub const REQUIRED_KEYS: [&str; 8] = [
    "Lorentz_eigenfrequency",
    "Lorentz_amplitude",
    "Lorentz_linewidth",
    "mod_frequency",
    "Gauss_amplitude",
    "ENBW",
    "Vpi",
    "mod_power_dBm",
];

/// Optional metadata key overriding the default power loss.
pub const POWER_LOSS_KEY: &str = "power_loss";

/// Physical constants and fixed instrument assumptions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalConstants {
    /// Planck constant (J·s).
    pub planck: f64,
    /// Boltzmann constant (J/K).
    pub boltzmann: f64,
    /// Bath temperature (K).
    pub temperature_k: f64,
    /// Load impedance of the modulation source (Ω).
    pub load_impedance_ohm: f64,
    /// Power loss between source and modulator, used when the dataset has none.
    pub default_power_loss: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            planck: 6.626_070_15e-34,
            boltzmann: 1.380_649e-23,
            temperature_k: 273.15 + 21.0,
            load_impedance_ohm: 50.0,
            default_power_loss: 1.0 / 1.34,
        }
    }
}

/// Inputs of the `g0` estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingInputs {
    pub mech_freq: f64,
    pub mech_height: f64,
    pub mech_linewidth: f64,
    pub mod_freq: f64,
    pub mod_height: f64,
    pub enbw: f64,
    pub vpi: f64,
    pub mod_power_dbm: f64,
    pub power_loss: f64,
}

/// Compute `g0` (rad/s).
pub fn estimate_g0(
    inputs: &CouplingInputs,
    constants: &PhysicalConstants,
) -> Result<f64, CouplingError> {
    let CouplingInputs {
        mech_freq,
        mech_height,
        mech_linewidth,
        mod_freq,
        mod_height,
        enbw,
        vpi,
        mod_power_dbm,
        power_loss,
    } = *inputs;

    if !(mech_freq > 0.0) {
        return Err(CouplingError::DomainError(format!(
            "mechanical frequency must be positive, got {mech_freq}"
        )));
    }
    if mod_height == 0.0 {
        return Err(CouplingError::DomainError(
            "calibration tone amplitude is zero".to_string(),
        ));
    }
    if !(enbw > 0.0) {
        return Err(CouplingError::DomainError(format!(
            "ENBW must be positive, got {enbw}"
        )));
    }
    if vpi == 0.0 {
        return Err(CouplingError::DomainError("Vpi is zero".to_string()));
    }

    let power_w = 10f64.powf(mod_power_dbm / 10.0) * 1e-3;
    let volts = (power_loss * power_w * constants.load_impedance_ohm).sqrt() * 2f64.sqrt();
    let beta = volts / vpi * PI;
    finite("modulation depth", beta)?;

    let exponent = constants.planck * mech_freq / (constants.boltzmann * constants.temperature_k);
    let nth = 1.0 / (exponent.exp() - 1.0);
    if !(nth.is_finite() && nth > 0.0) {
        return Err(CouplingError::DomainError(format!(
            "thermal occupation is {nth} at {mech_freq} Hz"
        )));
    }

    let radicand = 0.5 / nth * beta.powi(2) * mod_freq.abs().powi(2) / 2.0
        * mech_height.abs()
        * mech_linewidth.abs()
        * 2.0
        * PI
        / 4.0
        / (mod_height.abs() * enbw);
    let g0 = finite("g0", radicand.sqrt())?;
    Ok(g0)
}

/// Collect the inputs from dataset metadata.
///
/// Every key in [`REQUIRED_KEYS`] must be present and numeric; all missing
/// ones are reported together.
pub fn inputs_from_metadata(
    metadata: &Metadata,
    constants: &PhysicalConstants,
) -> Result<CouplingInputs, CouplingError> {
    let mut values = [0.0; REQUIRED_KEYS.len()];
    let mut missing = Vec::new();
    for (slot, key) in values.iter_mut().zip(REQUIRED_KEYS) {
        match metadata.get(key).and_then(|v| v.as_f64()) {
            Some(v) => *slot = v,
            None => missing.push(key.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(CouplingError::MissingMetadata(missing));
    }

    let power_loss = metadata
        .get(POWER_LOSS_KEY)
        .and_then(|v| v.as_f64())
        .unwrap_or(constants.default_power_loss);

    let [mech_freq, mech_height, mech_linewidth, mod_freq, mod_height, enbw, vpi, mod_power_dbm] =
        values;
    Ok(CouplingInputs {
        mech_freq,
        mech_height,
        mech_linewidth,
        mod_freq,
        mod_height,
        enbw,
        vpi,
        mod_power_dbm,
        power_loss,
    })
}

pub fn g0_from_metadata(
    metadata: &Metadata,
    constants: &PhysicalConstants,
) -> Result<f64, CouplingError> {
    let inputs = inputs_from_metadata(metadata, constants)?;
    estimate_g0(&inputs, constants)
}

/// `g0 / 2π` in kHz, the unit used for display.
pub fn g0_over_2pi_khz(g0: f64) -> f64 {
    g0 / (2.0 * PI) * 1e-3
}

fn finite(what: &str, value: f64) -> Result<f64, CouplingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CouplingError::DomainError(format!("{what} is not finite")))
    }
}
