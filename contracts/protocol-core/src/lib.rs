//! # Protocol Core
//!
//! Shared primitives for the anonymous org-voting contracts:
//!
//! - the stable error taxonomy every contract surfaces unchanged,
//! - BN254 field constants, range checks and modular arithmetic,
//! - G1/G2 encoding validation (big-endian, EVM precompile layout),
//! - Groth16 proof verification over the Soroban BN254 host functions.
//!
//! ## Curve parameters
//!
//! BN254 (alt_bn128): y² = x³ + 3 over 𝔽_q with
//! q = 21888242871839275222246405745257275088696311157297823662689037894645226208583,
//! scalar field order
//! r = 21888242871839275222246405745257275088548364400416034343698204186575808495617.
//!
//! All field elements cross contract boundaries as 32-byte big-endian values
//! (`U256`), G1 points as `X||Y` (64 bytes), G2 points as
//! `X.c1||X.c0||Y.c1||Y.c0` (128 bytes, imaginary-before-real).

#![no_std]

extern crate alloc;

mod curve;
mod errors;
mod field;
mod groth16;

pub use curve::{g1_is_identity, g1_negate, validate_g1, validate_g2};
pub use errors::ProtocolError;
pub use field::{
    assert_in_fr, be_add_mod, be_sub_mod, be_mul_mod, fr_add, fr_mul, fr_sub, is_in_fr,
    require_in_fr, u256_from_be, u256_to_be, FQ_MODULUS_BE, FR_MODULUS_BE,
};
pub use groth16::{
    validate_proof, validate_vk, verify_groth16, Proof, VerificationKey, VoteMode, IC_POINTS,
    PUBLIC_INPUTS,
};
