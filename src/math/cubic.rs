//! Cubic polynomials in one variable.

/// A cubic function.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CubicFn {
    coeffs: [f64; 4],
    offset: f64,
}

impl CubicFn {
    /// Fits the cubic Hermite polynomial passing through `(x1, y1)` and `(x2, y2)`
    /// with the given derivatives at each end.
    pub fn fit(x1: f64, y1: f64, dydx1: f64, x2: f64, y2: f64, dydx2: f64) -> Self {
        let w = x2 - x1;
        let a = 2. * y1 - 2. * y2 + w * dydx1 + w * dydx2;
        let b = -3. * y1 + 3. * y2 - 2. * w * dydx1 - w * dydx2;
        let c = w * dydx1;
        let d = y1;
        Self {
            coeffs: [a * w.powi(-3), b * w.powi(-2), c * w.powi(-1), d],
            offset: -x1,
        }
    }

    pub fn y(&self, x: f64) -> f64 {
        self.eval(x).0
    }

    pub fn dy(&self, x: f64) -> f64 {
        self.eval(x).1
    }

    pub fn ddy(&self, x: f64) -> f64 {
        self.eval(x).2
    }

    /// Evaluates the function and its first and second derivatives.
    pub fn eval(&self, x: f64) -> (f64, f64, f64) {
        let c = &self.coeffs;
        let x = x + self.offset;

        let y = c[0] * x * x * x + c[1] * x * x + c[2] * x + c[3];
        let dy = c[0] * 3. * x * x + c[1] * 2. * x + c[2];
        let ddy = c[0] * 6. * x + c[1] * 2.;

        (y, dy, ddy)
    }
}
