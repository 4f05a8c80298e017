//! SGP4 near-Earth analytical propagation.
//!
//! Implements the simplified general perturbations model for objects with
//! periods under 225 minutes: recovery of the original mean motion, secular
//! J2/J4 drift of node and perigee, atmospheric drag through the B* term
//! (C1..C5, D2..D4), long-period J3 terms, the equinoctial Kepler solve and
//! the short-period J2 corrections. Output is TEME, km and km/s.
//!
//! All coefficients are computed once in [`Sgp4::new`]; [`Sgp4::propagate_minutes`]
//! only reads them, so one instance can be queried from many threads.
//!
//! Reference: Hoots & Roehrich, Spacetrack Report #3 (1980), and Vallado et al.,
//! "Revisiting Spacetrack Report #3" (AIAA 2006-6753).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{wgs72, TAU};
use crate::elements::ElementSet;
use crate::kepler::KeplerSolver;
use crate::propagator::{PropagationFault, Propagator, StateVector};

/// Numerical settings for SGP4 evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sgp4Settings {
    /// Newton solve of the equinoctial Kepler equation.
    pub kepler: KeplerSolver,
    /// Samples whose radius falls below this value are reported as decayed (km).
    pub decay_radius_km: f64,
}

impl Default for Sgp4Settings {
    fn default() -> Self {
        Sgp4Settings {
            kepler: KeplerSolver::default(),
            decay_radius_km: wgs72::RADIUS,
        }
    }
}

/// An SGP4 propagator initialized from one element set.
#[derive(Debug, Clone)]
pub struct Sgp4 {
    elements: ElementSet,
    settings: Sgp4Settings,

    // Epoch elements (rad, rad/min)
    ecco: f64,
    inclo: f64,
    nodeo: f64,
    argpo: f64,
    mo: f64,
    bstar: f64,
    no_unkozai: f64,

    // Perigee below 220 km drops the higher-order drag terms
    simplified_drag: bool,

    con41: f64,
    x1mth2: f64,
    x7thm1: f64,
    eta: f64,
    cc1: f64,
    cc4: f64,
    cc5: f64,
    d2: f64,
    d3: f64,
    d4: f64,
    delmo: f64,
    sinmao: f64,
    mdot: f64,
    argpdot: f64,
    nodedot: f64,
    nodecf: f64,
    omgcof: f64,
    xmcof: f64,
    xlcof: f64,
    aycof: f64,
    t2cof: f64,
    t3cof: f64,
    t4cof: f64,
    t5cof: f64,
}

impl Sgp4 {
    /// Initialize with default settings.
    pub fn new(elements: &ElementSet) -> Self {
        Self::with_settings(elements, Sgp4Settings::default())
    }

    /// Initialize, deriving every secular and drag coefficient once.
    pub fn with_settings(elements: &ElementSet, settings: Sgp4Settings) -> Self {
        use wgs72::{J2, J3OJ2, J4, RADIUS, XKE};

        let x2o3 = 2.0 / 3.0;
        let ecco = elements.eccentricity();
        let inclo = elements.inclination();
        let argpo = elements.arg_perigee();
        let mo = elements.mean_anomaly();
        let bstar = elements.bstar();
        let no_kozai = elements.mean_motion();

        // ── Recover original mean motion and semi-major axis ──
        let eccsq = ecco * ecco;
        let omeosq = 1.0 - eccsq;
        let rteosq = omeosq.sqrt();
        let (sinio, cosio) = inclo.sin_cos();
        let cosio2 = cosio * cosio;

        let ak = (XKE / no_kozai).powf(x2o3);
        let d1 = 0.75 * J2 * (3.0 * cosio2 - 1.0) / (rteosq * omeosq);
        let del = d1 / (ak * ak);
        let adel = ak * (1.0 - del * del - del * (1.0 / 3.0 + 134.0 * del * del / 81.0));
        let del = d1 / (adel * adel);
        let no_unkozai = no_kozai / (1.0 + del);

        let ao = (XKE / no_unkozai).powf(x2o3);
        let po = ao * omeosq;
        let con42 = 1.0 - 5.0 * cosio2;
        let con41 = -con42 - cosio2 - cosio2;
        let posq = po * po;
        let rp = ao * (1.0 - ecco);

        if TAU / no_unkozai >= 225.0 {
            log::warn!(
                "NORAD {}: period {:.1} min is in the deep-space regime; \
                 lunisolar and resonance terms are not modeled",
                elements.catalog_number(),
                TAU / no_unkozai
            );
        }

        // ── Atmospheric density parameters ──
        let simplified_drag = rp < 220.0 / RADIUS + 1.0;
        let mut sfour = 78.0 / RADIUS + 1.0;
        let mut qzms24 = ((120.0 - 78.0) / RADIUS).powi(4);
        let perigee_km = (rp - 1.0) * RADIUS;
        if perigee_km < 156.0 {
            let s = if perigee_km < 98.0 { 20.0 } else { perigee_km - 78.0 };
            qzms24 = ((120.0 - s) / RADIUS).powi(4);
            sfour = s / RADIUS + 1.0;
        }

        let pinvsq = 1.0 / posq;
        let tsi = 1.0 / (ao - sfour);
        let eta = ao * ecco * tsi;
        let etasq = eta * eta;
        let eeta = ecco * eta;
        let psisq = (1.0 - etasq).abs();
        let coef = qzms24 * tsi.powi(4);
        let coef1 = coef / psisq.powf(3.5);

        // ── Drag coefficients ──
        let cc2 = coef1
            * no_unkozai
            * (ao * (1.0 + 1.5 * etasq + eeta * (4.0 + etasq))
                + 0.375 * J2 * tsi / psisq * con41 * (8.0 + 3.0 * etasq * (8.0 + etasq)));
        let cc1 = bstar * cc2;
        let cc3 = if ecco > 1.0e-4 {
            -2.0 * coef * tsi * J3OJ2 * no_unkozai * sinio / ecco
        } else {
            0.0
        };
        let x1mth2 = 1.0 - cosio2;
        let cc4 = 2.0
            * no_unkozai
            * coef1
            * ao
            * omeosq
            * (eta * (2.0 + 0.5 * etasq) + ecco * (0.5 + 2.0 * etasq)
                - J2 * tsi / (ao * psisq)
                    * (-3.0 * con41 * (1.0 - 2.0 * eeta + etasq * (1.5 - 0.5 * eeta))
                        + 0.75 * x1mth2 * (2.0 * etasq - eeta * (1.0 + etasq)) * (2.0 * argpo).cos()));
        let cc5 = 2.0 * coef1 * ao * omeosq * (1.0 + 2.75 * (etasq + eeta) + eeta * etasq);

        // ── Secular rates from J2 and J4 ──
        let cosio4 = cosio2 * cosio2;
        let temp1 = 1.5 * J2 * pinvsq * no_unkozai;
        let temp2 = 0.5 * temp1 * J2 * pinvsq;
        let temp3 = -0.46875 * J4 * pinvsq * pinvsq * no_unkozai;
        let mdot = no_unkozai
            + 0.5 * temp1 * rteosq * con41
            + 0.0625 * temp2 * rteosq * (13.0 - 78.0 * cosio2 + 137.0 * cosio4);
        let argpdot = -0.5 * temp1 * con42
            + 0.0625 * temp2 * (7.0 - 114.0 * cosio2 + 395.0 * cosio4)
            + temp3 * (3.0 - 36.0 * cosio2 + 49.0 * cosio4);
        let xhdot1 = -temp1 * cosio;
        let nodedot =
            xhdot1 + (0.5 * temp2 * (4.0 - 19.0 * cosio2) + 2.0 * temp3 * (3.0 - 7.0 * cosio2)) * cosio;

        let omgcof = bstar * cc3 * argpo.cos();
        let xmcof = if ecco > 1.0e-4 { -x2o3 * coef * bstar / eeta } else { 0.0 };
        let nodecf = 3.5 * omeosq * xhdot1 * cc1;
        let t2cof = 1.5 * cc1;

        // Avoid the division by zero at i = 180°
        let one_plus_cosio = if (cosio + 1.0).abs() > 1.5e-12 { 1.0 + cosio } else { 1.5e-12 };
        let xlcof = -0.25 * J3OJ2 * sinio * (3.0 + 5.0 * cosio) / one_plus_cosio;
        let aycof = -0.5 * J3OJ2 * sinio;
        let delmo = (1.0 + eta * mo.cos()).powi(3);
        let sinmao = mo.sin();
        let x7thm1 = 7.0 * cosio2 - 1.0;

        let (mut d2, mut d3, mut d4) = (0.0, 0.0, 0.0);
        let (mut t3cof, mut t4cof, mut t5cof) = (0.0, 0.0, 0.0);
        if !simplified_drag {
            let cc1sq = cc1 * cc1;
            d2 = 4.0 * ao * tsi * cc1sq;
            let temp = d2 * tsi * cc1 / 3.0;
            d3 = (17.0 * ao + sfour) * temp;
            d4 = 0.5 * temp * ao * tsi * (221.0 * ao + 31.0 * sfour) * cc1;
            t3cof = d2 + 2.0 * cc1sq;
            t4cof = 0.25 * (3.0 * d3 + cc1 * (12.0 * d2 + 10.0 * cc1sq));
            t5cof = 0.2 * (3.0 * d4 + 12.0 * cc1 * d3 + 6.0 * d2 * d2 + 15.0 * cc1sq * (2.0 * d2 + cc1sq));
        }

        Sgp4 {
            elements: elements.clone(),
            settings,
            ecco,
            inclo,
            nodeo: elements.raan(),
            argpo,
            mo,
            bstar,
            no_unkozai,
            simplified_drag,
            con41,
            x1mth2,
            x7thm1,
            eta,
            cc1,
            cc4,
            cc5,
            d2,
            d3,
            d4,
            delmo,
            sinmao,
            mdot,
            argpdot,
            nodedot,
            nodecf,
            omgcof,
            xmcof,
            xlcof,
            aycof,
            t2cof,
            t3cof,
            t4cof,
            t5cof,
        }
    }

    pub fn settings(&self) -> &Sgp4Settings {
        &self.settings
    }

    /// Whether the perigee is low enough to use the truncated drag model.
    pub fn uses_simplified_drag(&self) -> bool {
        self.simplified_drag
    }

    /// Position (km) and velocity (km/s) `tsince` minutes after epoch, TEME frame.
    pub fn propagate_minutes(&self, tsince: f64) -> Result<([f64; 3], [f64; 3]), PropagationFault> {
        use wgs72::{J2, RADIUS, XKE};

        let x2o3 = 2.0 / 3.0;
        let t = tsince;

        // ── Secular gravity and drag ──
        let xmdf = self.mo + self.mdot * t;
        let argpdf = self.argpo + self.argpdot * t;
        let nodedf = self.nodeo + self.nodedot * t;
        let mut argpm = argpdf;
        let mut mm = xmdf;
        let t2 = t * t;
        let mut nodem = nodedf + self.nodecf * t2;
        let mut tempa = 1.0 - self.cc1 * t;
        let mut tempe = self.bstar * self.cc4 * t;
        let mut templ = self.t2cof * t2;

        if !self.simplified_drag {
            let delomg = self.omgcof * t;
            let delm = self.xmcof * ((1.0 + self.eta * xmdf.cos()).powi(3) - self.delmo);
            let temp = delomg + delm;
            mm = xmdf + temp;
            argpm = argpdf - temp;
            let t3 = t2 * t;
            let t4 = t3 * t;
            tempa -= self.d2 * t2 + self.d3 * t3 + self.d4 * t4;
            tempe += self.bstar * self.cc5 * (mm.sin() - self.sinmao);
            templ += self.t3cof * t3 + t4 * (self.t4cof + t * self.t5cof);
        }

        let nm = self.no_unkozai;
        if nm <= 0.0 {
            return Err(PropagationFault::MeanMotionNonPositive(nm));
        }

        let am = (XKE / nm).powf(x2o3) * tempa * tempa;
        let nm = XKE / am.powf(1.5);
        let mut em = self.ecco - tempe;

        if !(-0.001..1.0).contains(&em) {
            return Err(PropagationFault::EccentricityOutOfRange(em));
        }
        if em < 1.0e-6 {
            em = 1.0e-6;
        }

        mm += self.no_unkozai * templ;
        let xlm = (mm + argpm + nodem) % TAU;
        nodem %= TAU;
        argpm %= TAU;
        mm = (xlm - argpm - nodem) % TAU;

        let (sinip, cosip) = self.inclo.sin_cos();

        // ── Long-period periodics ──
        let axnl = em * argpm.cos();
        let temp = 1.0 / (am * (1.0 - em * em));
        let aynl = em * argpm.sin() + temp * self.aycof;
        let xl = mm + argpm + nodem + temp * self.xlcof * axnl;

        // ── Kepler's equation ──
        let u = (xl - nodem) % TAU;
        let eo1 = self.settings.kepler.solve_equinoctial(u, axnl, aynl)?;

        // ── Short-period preliminary quantities ──
        let (sineo1, coseo1) = eo1.sin_cos();
        let ecose = axnl * coseo1 + aynl * sineo1;
        let esine = axnl * sineo1 - aynl * coseo1;
        let el2 = axnl * axnl + aynl * aynl;
        let pl = am * (1.0 - el2);
        if pl < 0.0 {
            return Err(PropagationFault::SemiLatusRectumNegative(pl));
        }

        let rl = am * (1.0 - ecose);
        let rdotl = am.sqrt() * esine / rl;
        let rvdotl = pl.sqrt() / rl;
        let betal = (1.0 - el2).sqrt();
        let temp = esine / (1.0 + betal);
        let sinu = am / rl * (sineo1 - aynl - axnl * temp);
        let cosu = am / rl * (coseo1 - axnl + aynl * temp);
        let mut su = sinu.atan2(cosu);
        let sin2u = (cosu + cosu) * sinu;
        let cos2u = 1.0 - 2.0 * sinu * sinu;
        let temp = 1.0 / pl;
        let temp1 = 0.5 * J2 * temp;
        let temp2 = temp1 * temp;

        // ── Short-period periodics ──
        let mrt = rl * (1.0 - 1.5 * temp2 * betal * self.con41) + 0.5 * temp1 * self.x1mth2 * cos2u;
        su -= 0.25 * temp2 * self.x7thm1 * sin2u;
        let xnode = nodem + 1.5 * temp2 * cosip * sin2u;
        let xinc = self.inclo + 1.5 * temp2 * cosip * sinip * cos2u;
        let mvt = rdotl - nm * temp1 * self.x1mth2 * sin2u / XKE;
        let rvdot = rvdotl + nm * temp1 * (self.x1mth2 * cos2u + 1.5 * self.con41) / XKE;

        // ── Orientation vectors ──
        let (sinsu, cossu) = su.sin_cos();
        let (snod, cnod) = xnode.sin_cos();
        let (sini, cosi) = xinc.sin_cos();
        let xmx = -snod * cosi;
        let xmy = cnod * cosi;
        let ux = xmx * sinsu + cnod * cossu;
        let uy = xmy * sinsu + snod * cossu;
        let uz = sini * sinsu;
        let vx = xmx * cossu - cnod * sinsu;
        let vy = xmy * cossu - snod * sinsu;
        let vz = sini * cossu;

        let radius_km = mrt * RADIUS;
        let vkmpersec = RADIUS * XKE / 60.0;
        let r = [radius_km * ux, radius_km * uy, radius_km * uz];
        let v = [
            (mvt * ux + rvdot * vx) * vkmpersec,
            (mvt * uy + rvdot * vy) * vkmpersec,
            (mvt * uz + rvdot * vz) * vkmpersec,
        ];

        if r.iter().chain(v.iter()).any(|c| !c.is_finite()) {
            return Err(PropagationFault::NonFinite);
        }
        if radius_km < self.settings.decay_radius_km {
            return Err(PropagationFault::Decayed { radius_km });
        }

        Ok((r, v))
    }
}

impl Propagator for Sgp4 {
    fn elements(&self) -> &ElementSet {
        &self.elements
    }

    fn state_at(&self, at: DateTime<Utc>) -> Result<StateVector, PropagationFault> {
        let tsince = (at - self.elements.epoch())
            .num_microseconds()
            .ok_or(PropagationFault::TimeOutOfRange)? as f64
            / 60.0e6;
        let (r, v) = self.propagate_minutes(tsince)?;
        Ok(StateVector { r, v, epoch: at })
    }
}
