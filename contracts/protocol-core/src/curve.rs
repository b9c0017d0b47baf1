//! G1/G2 encoding validation and G1 negation.
//!
//! G1 points are `X||Y` (64 bytes, big-endian), G2 points are
//! `X.c1||X.c0||Y.c1||Y.c0` (128 bytes, imaginary component first, matching
//! the EVM precompile layout). `(0, 0)` encodes the point at infinity.
//!
//! G1 has cofactor 1, so the affine equation check `y² = x³ + 3` is a
//! complete membership test. For G2 only coordinate ranges are validated
//! here; curve and subgroup membership are enforced by the host pairing.

use soroban_sdk::{BytesN, Env};

use crate::errors::ProtocolError;
use crate::field::{be_add_mod, be_mul_mod, be_sub_mod, FQ_MODULUS_BE};

fn be_is_zero(bytes: &[u8; 32]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

fn fq_in_range(coord: &[u8; 32]) -> bool {
    for i in 0..32 {
        if coord[i] != FQ_MODULUS_BE[i] {
            return coord[i] < FQ_MODULUS_BE[i];
        }
    }
    false
}

fn split_g1(point: &BytesN<64>) -> ([u8; 32], [u8; 32]) {
    let bytes = point.to_array();
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&bytes[0..32]);
    y.copy_from_slice(&bytes[32..64]);
    (x, y)
}

/// True when the encoding is the all-zero point at infinity.
pub fn g1_is_identity(point: &BytesN<64>) -> bool {
    let (x, y) = split_g1(point);
    be_is_zero(&x) && be_is_zero(&y)
}

/// Validate a G1 encoding: coordinates < q and on the curve y² = x³ + 3.
pub fn validate_g1(point: &BytesN<64>) -> Result<(), ProtocolError> {
    let (x, y) = split_g1(point);

    if be_is_zero(&x) && be_is_zero(&y) {
        return Ok(());
    }
    if !fq_in_range(&x) || !fq_in_range(&y) {
        return Err(ProtocolError::MalformedProof);
    }

    let y_squared = be_mul_mod(&y, &y, &FQ_MODULUS_BE);
    let x_squared = be_mul_mod(&x, &x, &FQ_MODULUS_BE);
    let x_cubed = be_mul_mod(&x_squared, &x, &FQ_MODULUS_BE);
    let mut three = [0u8; 32];
    three[31] = 3;
    let rhs = be_add_mod(&x_cubed, &three, &FQ_MODULUS_BE);

    if y_squared == rhs {
        Ok(())
    } else {
        Err(ProtocolError::MalformedProof)
    }
}

/// Validate a G2 encoding: all four coordinates < q.
pub fn validate_g2(point: &BytesN<128>) -> Result<(), ProtocolError> {
    let bytes = point.to_array();
    let mut coord = [0u8; 32];
    for chunk in 0..4 {
        coord.copy_from_slice(&bytes[chunk * 32..(chunk + 1) * 32]);
        if !be_is_zero(&coord) && !fq_in_range(&coord) {
            return Err(ProtocolError::MalformedProof);
        }
    }
    Ok(())
}

/// Negate a G1 point: (x, q - y). The identity maps to itself.
pub fn g1_negate(env: &Env, point: &BytesN<64>) -> BytesN<64> {
    let (x, y) = split_g1(point);

    if be_is_zero(&y) {
        return point.clone();
    }

    let zero = [0u8; 32];
    let neg_y = be_sub_mod(&zero, &y, &FQ_MODULUS_BE);

    let mut out = [0u8; 64];
    out[0..32].copy_from_slice(&x);
    out[32..64].copy_from_slice(&neg_y);
    BytesN::from_array(env, &out)
}
