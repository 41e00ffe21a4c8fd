use super::FaultPolicy;
use crate::error;
use crate::prog::Error;

type Result<T> = std::result::Result<T, Error>;

pub type Vec3 = [f32; 3];
/// Scalar first: `[s, x, y, z]`.
pub type Quat = [f32; 4];

/// ## Arithmetic behind the opcodes
///
/// Integer ops wrap. The ones that can divide by zero consult the
/// fault policy; float ops never fail.

pub struct Operation {}

impl Operation {
    fn zero_divisor(policy: FaultPolicy, fixup: i32) -> Result<i32> {
        match policy {
            FaultPolicy::Fatal => Err(error!(DivisionByZero)),
            FaultPolicy::IeeeFixup => Ok(fixup),
        }
    }

    pub fn div_i(a: i32, b: i32, policy: FaultPolicy) -> Result<i32> {
        if b == 0 {
            Operation::zero_divisor(policy, if a < 0 { i32::MIN } else { i32::MAX })
        } else {
            Ok(a.wrapping_div(b))
        }
    }

    /// Truncated remainder, sign of the dividend.
    pub fn rem_i(a: i32, b: i32, policy: FaultPolicy) -> Result<i32> {
        if b == 0 {
            Operation::zero_divisor(policy, 0)
        } else {
            Ok(a.wrapping_rem(b))
        }
    }

    /// Floored modulo, sign of the divisor.
    pub fn mod_i(a: i32, b: i32, policy: FaultPolicy) -> Result<i32> {
        if b == 0 {
            return Operation::zero_divisor(policy, 0);
        }
        let r = a.wrapping_rem(b);
        if r != 0 && (r < 0) != (b < 0) {
            Ok(r + b)
        } else {
            Ok(r)
        }
    }

    pub fn mod_f(a: f32, b: f32) -> f32 {
        a - b * (a / b).floor()
    }

    pub fn mod_d(a: f64, b: f64) -> f64 {
        a - b * (a / b).floor()
    }

    pub fn shl_i(a: i32, b: i32) -> i32 {
        a.wrapping_shl(b as u32)
    }

    pub fn shr_i(a: i32, b: i32) -> i32 {
        a.wrapping_shr(b as u32)
    }

    pub fn shr_u(a: u32, b: i32) -> u32 {
        a.wrapping_shr(b as u32)
    }

    /// Float bit ops work on the truncated integer values.
    pub fn bits_f(a: f32, b: f32, op: fn(i32, i32) -> i32) -> f32 {
        op(a as i32, b as i32) as f32
    }

    pub fn add_v(a: Vec3, b: Vec3) -> Vec3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    pub fn sub_v(a: Vec3, b: Vec3) -> Vec3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    pub fn dot_v(a: Vec3, b: Vec3) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    pub fn cross_v(a: Vec3, b: Vec3) -> Vec3 {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    pub fn scale_v(a: Vec3, s: f32) -> Vec3 {
        [a[0] * s, a[1] * s, a[2] * s]
    }

    pub fn is_zero_v(a: Vec3) -> bool {
        a[0] == 0.0 && a[1] == 0.0 && a[2] == 0.0
    }

    pub fn length_v(a: Vec3) -> f32 {
        Operation::dot_v(a, a).sqrt()
    }

    pub fn add_q(a: Quat, b: Quat) -> Quat {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
    }

    pub fn sub_q(a: Quat, b: Quat) -> Quat {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]]
    }

    pub fn scale_q(a: Quat, s: f32) -> Quat {
        [a[0] * s, a[1] * s, a[2] * s, a[3] * s]
    }

    pub fn conj_q(a: Quat) -> Quat {
        [a[0], -a[1], -a[2], -a[3]]
    }

    pub fn is_zero_q(a: Quat) -> bool {
        a.iter().all(|&v| v == 0.0)
    }

    pub fn mul_q(a: Quat, b: Quat) -> Quat {
        let av = [a[1], a[2], a[3]];
        let bv = [b[1], b[2], b[3]];
        let c = Operation::cross_v(av, bv);
        let v = Operation::add_v(
            Operation::add_v(Operation::scale_v(bv, a[0]), Operation::scale_v(av, b[0])),
            c,
        );
        [a[0] * b[0] - Operation::dot_v(av, bv), v[0], v[1], v[2]]
    }

    /// Rotates `v` by `q`: `q v q*`.
    pub fn mul_qv(q: Quat, v: Vec3) -> Vec3 {
        let p = [0.0, v[0], v[1], v[2]];
        let r = Operation::mul_q(Operation::mul_q(q, p), Operation::conj_q(q));
        [r[1], r[2], r[3]]
    }
}
