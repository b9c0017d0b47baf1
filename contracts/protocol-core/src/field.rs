//! BN254 field constants and modular arithmetic on 32-byte big-endian limbs.
//!
//! Addition and subtraction run as fixed byte ladders (no data-dependent
//! branches on limb values beyond the final conditional reduction).
//! Multiplication needs a 512-bit intermediate and goes through `num-bigint`.

use alloc::vec::Vec as AllocVec;

use num_bigint::BigUint;
use soroban_sdk::{panic_with_error, Bytes, Env, U256};

use crate::errors::ProtocolError;

/// BN254 scalar field modulus (Fr) in big-endian bytes.
/// r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
///
/// All public signals (root, nullifier, commitment, ids, choice) must be < r;
/// without the check an attacker could replay `nullifier + r`, which stores as
/// a different key but verifies identically after modular reduction.
pub const FR_MODULUS_BE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// BN254 base field modulus (Fq) in big-endian bytes.
/// q = 21888242871839275222246405745257275088696311157297823662689037894645226208583
pub const FQ_MODULUS_BE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d, 0x3c, 0x20, 0x8c, 0x16, 0xd8, 0x7c, 0xfd, 0x47,
];

/// Read a `U256` out as a fixed big-endian array.
pub fn u256_to_be(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_be_bytes().copy_into_slice(&mut out);
    out
}

/// Build a `U256` from a fixed big-endian array.
pub fn u256_from_be(env: &Env, bytes: &[u8; 32]) -> U256 {
    U256::from_be_bytes(env, &Bytes::from_array(env, bytes))
}

/// Check that a value is a canonical Fr element (< r).
pub fn is_in_fr(env: &Env, value: &U256) -> bool {
    let modulus = u256_from_be(env, &FR_MODULUS_BE);
    value < &modulus
}

/// Result-flavored range check, `FieldOverflow` on failure.
pub fn assert_in_fr(env: &Env, value: &U256) -> Result<(), ProtocolError> {
    if is_in_fr(env, value) {
        Ok(())
    } else {
        Err(ProtocolError::FieldOverflow)
    }
}

/// Panicking range check for contract entry points.
pub fn require_in_fr(env: &Env, value: &U256) {
    if !is_in_fr(env, value) {
        panic_with_error!(env, ProtocolError::FieldOverflow);
    }
}

// a + b with carry out, big-endian.
fn be_add(a: &[u8; 32], b: &[u8; 32]) -> (u8, [u8; 32]) {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in (0..32).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry;
        out[i] = (sum & 0xff) as u8;
        carry = sum >> 8;
    }
    (carry as u8, out)
}

// a - b with borrow out, big-endian.
fn be_sub(a: &[u8; 32], b: &[u8; 32]) -> (u8, [u8; 32]) {
    let mut out = [0u8; 32];
    let mut borrow: i32 = 0;
    for i in (0..32).rev() {
        let diff = a[i] as i32 - b[i] as i32 - borrow;
        if diff < 0 {
            out[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            out[i] = diff as u8;
            borrow = 0;
        }
    }
    (borrow as u8, out)
}

fn be_geq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    for i in 0..32 {
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

/// (a + b) mod m. Inputs must already be < m.
pub fn be_add_mod(a: &[u8; 32], b: &[u8; 32], m: &[u8; 32]) -> [u8; 32] {
    let (carry, sum) = be_add(a, b);
    if carry == 1 || be_geq(&sum, m) {
        // Wrapping subtraction folds the carry back in.
        be_sub(&sum, m).1
    } else {
        sum
    }
}

/// (a - b) mod m. Inputs must already be < m.
pub fn be_sub_mod(a: &[u8; 32], b: &[u8; 32], m: &[u8; 32]) -> [u8; 32] {
    let (borrow, diff) = be_sub(a, b);
    if borrow == 1 {
        be_add(&diff, m).1
    } else {
        diff
    }
}

/// (a * b) mod m through a 512-bit intermediate.
pub fn be_mul_mod(a: &[u8; 32], b: &[u8; 32], m: &[u8; 32]) -> [u8; 32] {
    let product = BigUint::from_bytes_be(a) * BigUint::from_bytes_be(b);
    let reduced = product % BigUint::from_bytes_be(m);
    let digits: AllocVec<u8> = reduced.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - digits.len()..].copy_from_slice(&digits);
    out
}

/// (a + b) mod r on canonical scalar elements.
pub fn fr_add(env: &Env, a: &U256, b: &U256) -> U256 {
    u256_from_be(env, &be_add_mod(&u256_to_be(a), &u256_to_be(b), &FR_MODULUS_BE))
}

/// (a - b) mod r on canonical scalar elements.
pub fn fr_sub(env: &Env, a: &U256, b: &U256) -> U256 {
    u256_from_be(env, &be_sub_mod(&u256_to_be(a), &u256_to_be(b), &FR_MODULUS_BE))
}

/// (a * b) mod r on canonical scalar elements.
pub fn fr_mul(env: &Env, a: &U256, b: &U256) -> U256 {
    u256_from_be(env, &be_mul_mod(&u256_to_be(a), &u256_to_be(b), &FR_MODULUS_BE))
}
