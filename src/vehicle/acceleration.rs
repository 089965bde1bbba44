/// The anticipation time used while the vehicle is decelerating, in s.
const DECELERATING_ANTICIPATION: f64 = 0.4; // s

/// The anticipation time used otherwise, in s.
const ANTICIPATION: f64 = 1.0; // s

/// Added to the curvature before computing the cornering speed, in 1/m.
const CURVATURE_EPSILON: f64 = 1e-6;

/// The car following model of a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct AccelerationModel {
    headway: f64,
    max_acc: f64,
    max_dec: f64,
}

/// The parameters of the acceleration model.
pub struct ModelParams {
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The vehicle's maximum deceleration, a positive number in m/s<sup>2</sup>.
    pub max_deceleration: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &ModelParams) -> Self {
        AccelerationModel {
            headway: params.time_headway,
            max_acc: params.max_acceleration,
            max_dec: params.max_deceleration,
        }
    }

    /// Calculates the acceleration needed to follow the object ahead,
    /// clamped to the vehicle's limits.
    ///
    /// # Arguments
    /// * `net_dist` - The bumper-to-bumper gap to the object ahead (m).
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The velocity of the object ahead (m/s).
    /// * `decelerating` - Whether the vehicle is currently slowing down.
    pub fn follow(&self, net_dist: f64, my_vel: f64, their_vel: f64, decelerating: bool) -> f64 {
        let b = self.max_dec;
        let t = self.headway;
        let tau = if decelerating {
            DECELERATING_ANTICIPATION
        } else {
            ANTICIPATION
        };

        let denom = tau * (2. * b * t + b * tau + 2. * my_vel);
        let acc = if denom <= 0.0 {
            // Only reachable with no braking capability while stationary
            if net_dist > 0.0 {
                self.max_acc
            } else {
                -self.max_dec
            }
        } else {
            let num = their_vel.powi(2) - my_vel.powi(2)
                + 2. * b * (tau * (their_vel - my_vel) + net_dist - my_vel * t);
            num / denom
        };

        acc.clamp(-self.max_dec, self.max_acc)
    }
}

/// The highest speed at which a vehicle can take a bend of the given curvature
/// without exceeding `max_lateral_acc`.
pub fn cornering_speed(max_lateral_acc: f64, curvature: f64) -> f64 {
    (max_lateral_acc / (curvature.abs() + CURVATURE_EPSILON)).sqrt()
}
