//! Differentiable special functions built from elementary tensor ops,
//! so gradients can flow through concentration parameters.
//!
//! The Bessel evaluations follow the Abramowitz & Stegun polynomial
//! approximations (9.8.1-9.8.4), blended at `x = 3.75`. Inputs to each
//! branch are clamped into the branch's domain; `where_cond` keeps the
//! selected branch and the clamp zeroes stray gradients from the other.

use candle_core::{Result, Tensor};

const BESSEL_KNOT: f64 = 3.75;

const I0_SMALL: [f64; 7] = [
    0.0045813, 0.0360768, 0.2659732, 1.2067492, 3.0899424, 3.5156229, 1.0,
];

const I0_LARGE: [f64; 9] = [
    0.00392377,
    -0.01647633,
    0.02635537,
    -0.02057706,
    0.00916281,
    -0.00157565,
    0.00225319,
    0.01328592,
    0.39894228,
];

const I1_SMALL: [f64; 7] = [
    0.00032411, 0.00301532, 0.02658733, 0.15084934, 0.51498869, 0.87890594, 0.5,
];

const I1_LARGE: [f64; 9] = [
    -0.00420059,
    0.01787654,
    -0.02895312,
    0.02282967,
    -0.01031555,
    0.00163801,
    -0.00362018,
    -0.03988024,
    0.39894228,
];

/// Horner evaluation; `coeffs` from highest degree to the constant
fn polyval(x: &Tensor, coeffs: &[f64]) -> Result<Tensor> {
    let mut acc = ((x * 0.0)? + coeffs[0])?;
    for &c in &coeffs[1..] {
        acc = (acc.mul(x)? + c)?;
    }
    Ok(acc)
}

/// `softplus(x; beta) = log(1 + exp(beta * x)) / beta`, numerically
/// stable for large `|beta * x|`
pub fn softplus_beta(x: &Tensor, beta: f64) -> Result<Tensor> {
    let bx = (x * beta)?;
    let stable = (bx.relu()? + ((bx.abs()?.neg()?).exp()? + 1.0)?.log()?)?;
    stable * (1.0 / beta)
}

/// Modified Bessel function `I0(x)` for `x in [0, 80]`
pub fn bessel_i0(x: &Tensor) -> Result<Tensor> {
    let xs = x.clamp(0.0, BESSEL_KNOT)?;
    let t2 = (xs / BESSEL_KNOT)?.sqr()?;
    let small = polyval(&t2, &I0_SMALL)?;

    let xl = x.clamp(BESSEL_KNOT, 80.0)?;
    let u = (xl.recip()? * BESSEL_KNOT)?;
    let large = polyval(&u, &I0_LARGE)?
        .mul(&xl.exp()?)?
        .div(&xl.sqrt()?)?;

    x.le(BESSEL_KNOT)?.where_cond(&small, &large)
}

/// Modified Bessel function `I1(x)` for `x in [0, 80]`
pub fn bessel_i1(x: &Tensor) -> Result<Tensor> {
    let xs = x.clamp(0.0, BESSEL_KNOT)?;
    let t2 = (xs.clone() / BESSEL_KNOT)?.sqr()?;
    let small = polyval(&t2, &I1_SMALL)?.mul(&xs)?;

    let xl = x.clamp(BESSEL_KNOT, 80.0)?;
    let u = (xl.recip()? * BESSEL_KNOT)?;
    let large = polyval(&u, &I1_LARGE)?
        .mul(&xl.exp()?)?
        .div(&xl.sqrt()?)?;

    x.le(BESSEL_KNOT)?.where_cond(&small, &large)
}

/// `log I0(x)`, stable for large arguments
pub fn log_bessel_i0(x: &Tensor) -> Result<Tensor> {
    let xs = x.clamp(0.0, BESSEL_KNOT)?;
    let t2 = (xs / BESSEL_KNOT)?.sqr()?;
    let small = polyval(&t2, &I0_SMALL)?.log()?;

    let xl = x.clamp(BESSEL_KNOT, f64::INFINITY)?;
    let u = (xl.recip()? * BESSEL_KNOT)?;
    let large = (polyval(&u, &I0_LARGE)?.log()? + (xl.log()? * (-0.5))?)?.add(&xl)?;

    x.le(BESSEL_KNOT)?.where_cond(&small, &large)
}

/// The mean-resultant ratio `I1(x) / I0(x)`; the exponential factors of
/// the large-argument expansions cancel, so this stays finite for any
/// concentration
pub fn bessel_i1_i0_ratio(x: &Tensor) -> Result<Tensor> {
    let xs = x.clamp(0.0, BESSEL_KNOT)?;
    let t2 = (xs.clone() / BESSEL_KNOT)?.sqr()?;
    let small = polyval(&t2, &I1_SMALL)?
        .mul(&xs)?
        .div(&polyval(&t2, &I0_SMALL)?)?;

    let xl = x.clamp(BESSEL_KNOT, f64::INFINITY)?;
    let u = (xl.recip()? * BESSEL_KNOT)?;
    let large = polyval(&u, &I1_LARGE)?.div(&polyval(&u, &I0_LARGE)?)?;

    x.le(BESSEL_KNOT)?.where_cond(&small, &large)
}

/// `log sinh(x) = x + log(1 - exp(-2x)) - log 2` for `x > 0`
pub fn log_sinh(x: &Tensor) -> Result<Tensor> {
    let decay = ((x * (-2.0))?.exp()?.neg()? + 1.0)?.clamp(1e-12, 1.0)?;
    ((x + decay.log()?)? - std::f64::consts::LN_2)
}

/// `coth(x) = 1 / tanh(x)` for `x > 0`
pub fn coth(x: &Tensor) -> Result<Tensor> {
    x.tanh()?.clamp(1e-8, 1.0)?.recip()
}

/// Surface area of the unit sphere `S^{m-1}` in log space:
/// `log 2 + (m/2) log pi - log Gamma(m/2)`
pub fn log_sphere_surface(ambient_dim: usize) -> f64 {
    use special::Gamma;

    let half_m = ambient_dim as f64 / 2.0;
    let (ln_gamma, _sign) = half_m.ln_gamma();
    std::f64::consts::LN_2 + half_m * std::f64::consts::PI.ln() - ln_gamma
}
