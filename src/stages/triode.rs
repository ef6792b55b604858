//! Common-cathode triode preamp as a wave digital filter.
//!
//! Topology: the input reaches the grid through the coupling capacitor `Ci`
//! (with `Ri` to ground) and the grid stopper `Rg`. The cathode is biased by
//! `Rk` bypassed with `Ck`. The plate is fed from the supply `E` through `Rp`
//! and drives the load `Ro` through the coupling capacitor `Co`; the output
//! is the voltage across `Ro`.
//!
//! The linear network is a tree of series/parallel adaptors whose reflection
//! coefficients collapse into the constants below. The tube is the root: its
//! three-port scattering has a closed-form solution for the quadratic tube
//! law of [`TriodeModel`](crate::devices::TriodeModel), so no iteration is
//! needed. The three capacitors carry the history.

use crate::error::{require_positive, require_sample_rate, OverdriveError, Result};

use super::{branch_sign, Stage};

const STAGE: &str = "triode";

/// Port resistance of the ideal input source.
const SOURCE_RESISTANCE: f64 = 1e-6;

/// Tube calibration and circuit values for [`TriodeWaveStage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriodeParams {
    /// Tube law constant term
    pub kp: f64,
    /// Tube law plate coefficient
    pub kp2: f64,
    /// Tube law grid coefficient
    pub kpg: f64,
    /// Plate supply voltage E
    pub supply: f64,
    /// Input coupling capacitor
    pub ci: f64,
    /// Output coupling capacitor
    pub co: f64,
    /// Cathode bypass capacitor
    pub ck: f64,
    /// Input shunt resistor
    pub ri: f64,
    /// Output load resistor
    pub ro: f64,
    /// Plate resistor
    pub rp: f64,
    /// Cathode resistor
    pub rk: f64,
    /// Grid stopper
    pub rg: f64,
}

impl Default for TriodeParams {
    fn default() -> Self {
        Self {
            kp: 1.014e-5,
            kp2: 5.498e-8,
            kpg: 1.076e-5,
            supply: 250.0,
            ci: 100e-9,
            co: 10e-9,
            ck: 10e-6,
            ri: 1e6,
            ro: 1e6,
            rp: 100e3,
            rk: 1e3,
            rg: 100e3,
        }
    }
}

impl TriodeParams {
    /// Same as [`TriodeParams::default`]: a 250 V plate supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tube law coefficients.
    pub fn with_tube(mut self, kp: f64, kp2: f64, kpg: f64) -> Self {
        self.kp = kp;
        self.kp2 = kp2;
        self.kpg = kpg;
        self
    }

    /// Set the plate supply voltage E.
    pub fn with_supply(mut self, supply: f64) -> Self {
        self.supply = supply;
        self
    }

    /// Set the plate resistor Rp.
    pub fn with_plate_resistor(mut self, rp: f64) -> Self {
        self.rp = rp;
        self
    }

    /// Set the cathode resistor and its bypass capacitor.
    pub fn with_cathode(mut self, rk: f64, ck: f64) -> Self {
        self.rk = rk;
        self.ck = ck;
        self
    }

    fn validate(&self) -> Result<()> {
        let values = [
            ("kp", self.kp),
            ("kp2", self.kp2),
            ("kpg", self.kpg),
            ("supply", self.supply),
            ("ci", self.ci),
            ("co", self.co),
            ("ck", self.ck),
            ("ri", self.ri),
            ("ro", self.ro),
            ("rp", self.rp),
            ("rk", self.rk),
            ("rg", self.rg),
        ];
        for (name, value) in values {
            require_positive(STAGE, name, value)?;
        }
        Ok(())
    }
}

/// DC cathode and plate voltages of the idle tube.
///
/// With every value positive `k3 > 1`, so the discriminant is always
/// positive for validated parameters. The check guards parameter sets that
/// have not been through [`TriodeParams::validate`].
fn operating_point(p: &TriodeParams) -> Result<(f64, f64)> {
    let k1 = p.kpg / (2.0 * p.kp2) + p.rp / p.rk + 1.0;
    let k2 = k1 * (p.kp / p.kp2 + 2.0 * p.supply) * p.kp2;
    let k3 = p.rk * k2 + 1.0;

    let discriminant = 2.0 * k3 - 1.0;
    if !(discriminant >= 0.0) {
        log::warn!("{STAGE}: operating point discriminant {discriminant} is negative");
        return Err(OverdriveError::operating_point(format!(
            "triode bias has no real solution (2*k3 - 1 = {discriminant})"
        )));
    }

    let vk0 = (k3 - branch_sign(k1) * discriminant.sqrt()) / (2.0 * p.rk * k1 * k1 * p.kp2);
    let vp0 = p.supply - p.rp / p.rk * vk0;
    Ok((vk0, vp0))
}

/// Adaptor coefficients, fixed at construction.
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    kp: f64,
    kp2: f64,
    kpg: f64,

    wpk_kt: f64,
    wsp_kl: f64,

    k_t_x_ci: f64,
    k_t_ck: f64,
    k_t_co: f64,
    k_t0: f64,

    k_y_t: f64,
    k_y_co: f64,
    k_y0: f64,

    k_ci_t: f64,
    k_ci_x_ci: f64,
    k_co_co: f64,
    k_co0: f64,

    bk_bp: f64,
    k_eta: f64,
    k_delta: f64,
    k_bp_s: f64,
    bp_ap_0: f64,
    bp_ak_0: f64,
}

impl Coefficients {
    fn derive(sample_rate: f64, p: &TriodeParams) -> Self {
        let e = p.supply;

        // Capacitor port resistances under the bilinear transform
        let ci_r = 1.0 / (2.0 * sample_rate * p.ci);
        let ck_r = 1.0 / (2.0 * sample_rate * p.ck);
        let co_r = 1.0 / (2.0 * sample_rate * p.co);

        // Grid branch: source + Ci in series, parallel Ri, series Rg
        let wsi_kl = ci_r / (ci_r + SOURCE_RESISTANCE);
        let wsi_r = ci_r + SOURCE_RESISTANCE;
        let wpg_kt = wsi_r / (wsi_r + p.ri);
        let wpg_r = wsi_r * p.ri / (wsi_r + p.ri);
        let wsg_kl = p.rg / (p.rg + wpg_r);

        // Cathode branch: Rk parallel Ck
        let wpk_kt = ck_r / (p.rk + ck_r);
        let wpk_r = p.rk * ck_r / (p.rk + ck_r);

        // Plate branch: Co + Ro in series, parallel Rp to the supply
        let wsp_kl = co_r / (co_r + p.ro);
        let wsp_r = co_r + p.ro;
        let wpp_kt = wsp_r / (wsp_r + p.rp);
        let wpp_r = wsp_r * p.rp / (wsp_r + p.rp);

        let bk_bp = wpk_r / wpp_r;
        let k_eta = 1.0 / (bk_bp * (0.5 * p.kpg + p.kp2) + p.kp2);

        Self {
            kp: p.kp,
            kp2: p.kp2,
            kpg: p.kpg,

            wpk_kt,
            wsp_kl,

            k_t_x_ci: 1.0 - wpg_kt,
            k_t_ck: 1.0 - wpk_kt,
            k_t_co: 1.0 - wpp_kt,
            k_t0: wpp_kt * e,

            k_y_t: 0.5 * (1.0 - wsp_kl),
            k_y_co: -0.5 * (1.0 - wsp_kl) * (1.0 + wpp_kt),
            k_y0: 0.5 * (1.0 - wsp_kl) * wpp_kt * e,

            k_ci_t: wsi_kl * (1.0 - wsg_kl),
            k_ci_x_ci: wsi_kl * ((1.0 - wpg_kt) * (wsg_kl + 1.0) - 2.0),
            k_co_co: 1.0 - wsp_kl * (1.0 + wpp_kt),
            k_co0: wsp_kl * wpp_kt * e,

            bk_bp,
            k_eta,
            k_delta: p.kp2 * k_eta * k_eta / (2.0 * wpp_r),
            k_bp_s: k_eta * (2.0 * p.kp2 / wpp_r).sqrt(),
            bp_ap_0: (wpk_r - wpp_r) / (wpp_r + wpk_r),
            bp_ak_0: 2.0 * wpp_r / (wpp_r + wpk_r),
        }
    }

    /// Reflected cathode and plate waves for incident waves `ag, ak, ap`,
    /// and the branch of the tube law that produced them.
    /// The grid draws no current, so its wave is reflected unchanged.
    #[inline]
    fn scatter(&self, ag: f64, ak: f64, ap: f64) -> (f64, f64, Conduction) {
        let v1 = 0.5 * ap;
        let v2 = ak + v1 * self.bk_bp;
        let alpha = self.kpg * (ag - v2) + self.kp;
        let beta = self.kp2 * (v1 - v2);
        let eta = self.k_eta * (2.0 * beta + alpha);
        let v3 = eta + self.k_delta;
        let delta = ap + v3;

        let (bk, bp, vpk, conduction) = if delta >= 0.0 {
            let bp = self.k_bp_s * delta.sqrt() - v3 - self.k_delta;
            let d = self.bk_bp * (ap - bp);
            let bk = ak + d;
            let vpk2 = ap + bp - ak - bk;
            if self.kpg * (ag - ak - 0.5 * d) + self.kp2 * vpk2 + self.kp < 0.0 {
                // Root is on the wrong side of cutoff
                (ak, ap, ap - ak, Conduction::DriveCutoff)
            } else {
                (bk, bp, 0.5 * vpk2, Conduction::Conducting)
            }
        } else {
            (ak, ap, ap - ak, Conduction::Cutoff)
        };

        if vpk < 0.0 {
            (
                bk,
                self.bp_ap_0 * ap + self.bp_ak_0 * ak,
                Conduction::PlateReversed,
            )
        } else {
            (bk, bp, conduction)
        }
    }
}

/// Branch taken by the tube scattering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conduction {
    /// Root of the quadratic tube law
    Conducting,
    /// The quadratic has no real root
    Cutoff,
    /// A root exists but its drive term is negative
    DriveCutoff,
    /// Plate below cathode; the tube port reflects linearly
    PlateReversed,
}

/// Capacitor wave states.
#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    ci: f64,
    ck: f64,
    co: f64,
}

fn step(k: &Coefficients, s: State, vin: f64) -> (f64, State) {
    let x_ci = vin + s.ci;
    let ag = k.k_t_x_ci * x_ci;
    let ak = k.k_t_ck * s.ck;
    let ap = k.k_t_co * s.co + k.k_t0;

    let (bk, bp, _) = k.scatter(ag, ak, ap);
    let bg = ag;

    let vout = k.k_y_t * bp + k.k_y_co * s.co + k.k_y0;
    let next = State {
        ci: k.k_ci_t * bg + k.k_ci_x_ci * x_ci + s.ci,
        ck: bk - k.wpk_kt * s.ck,
        co: k.wsp_kl * bp + k.k_co_co * s.co + k.k_co0,
    };
    (vout, next)
}

/// Wave-digital triode stage.
#[derive(Debug, Clone)]
pub struct TriodeWaveStage {
    sample_rate: f64,
    params: TriodeParams,
    coeffs: Coefficients,
    initial: State,
    state: State,
}

impl TriodeWaveStage {
    /// Build the stage and bias it at its DC operating point.
    ///
    /// Fails if the sample rate or a parameter is not finite and positive.
    /// Validated parameters always have a real operating point.
    pub fn new(sample_rate: f64, params: TriodeParams) -> Result<Self> {
        let sample_rate = require_sample_rate(sample_rate)?;
        params.validate()?;

        let (vk0, vp0) = operating_point(&params)?;
        let coeffs = Coefficients::derive(sample_rate, &params);
        log::debug!(
            "{STAGE}: fs={sample_rate} Vk0={vk0:.4} Vp0={vp0:.3} k_eta={:.6e} k_bp_s={:.6e}",
            coeffs.k_eta,
            coeffs.k_bp_s
        );

        let initial = State {
            ci: 0.0,
            ck: vk0,
            co: vp0,
        };
        Ok(Self {
            sample_rate,
            params,
            coeffs,
            initial,
            state: initial,
        })
    }

    /// Parameters the stage was built from.
    pub fn params(&self) -> &TriodeParams {
        &self.params
    }

    /// Quiescent `(cathode, plate)` voltages the stage starts from.
    pub fn operating_point(&self) -> (f64, f64) {
        (self.initial.ck, self.initial.co)
    }
}

impl Stage for TriodeWaveStage {
    #[inline]
    fn process_sample(&mut self, vin: f64) -> f64 {
        let (vout, next) = step(&self.coeffs, self.state, vin);
        self.state = next;
        vout
    }

    fn reset(&mut self) {
        self.state = self.initial;
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
