//! Groth16 verification over the Soroban BN254 host functions.
//!
//! The verification equation is
//!
//! ```text
//! e(A, B) = e(alpha, beta) * e(vk_x, gamma) * e(C, delta)
//! where vk_x = IC[0] + sum(pub_signals[i] * IC[i + 1])
//! ```
//!
//! evaluated as the single multi-pairing check
//! `e(-A, B) * e(alpha, beta) * e(vk_x, gamma) * e(C, delta) == 1`.
//!
//! The canonical public-signal order is
//! `[root, nullifier, orgId, proposalId, voteChoice, commitment]`.
//! Reordering it is a breaking change.

use soroban_sdk::{contracttype, BytesN, Env, Vec, U256};

use crate::curve::{validate_g1, validate_g2};
use crate::errors::ProtocolError;

/// Number of public signals the circuits expose.
pub const PUBLIC_INPUTS: u32 = 6;

/// IC points in a verification key: one per signal plus the constant term.
pub const IC_POINTS: u32 = PUBLIC_INPUTS + 1;

/// Groth16 verification key for BN254.
#[contracttype]
#[derive(Clone)]
pub struct VerificationKey {
    pub alpha: BytesN<64>,   // G1 point
    pub beta: BytesN<128>,   // G2 point
    pub gamma: BytesN<128>,  // G2 point
    pub delta: BytesN<128>,  // G2 point
    pub ic: Vec<BytesN<64>>, // IC points (G1)
}

/// Groth16 proof.
#[contracttype]
#[derive(Clone)]
pub struct Proof {
    pub a: BytesN<64>,  // G1 point
    pub b: BytesN<128>, // G2 point
    pub c: BytesN<64>,  // G1 point
}

/// Root-eligibility policy captured at proposal creation.
#[contracttype]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VoteMode {
    /// Only proofs bound to the root snapshotted at creation are eligible.
    Fixed,
    /// Proofs bound to any root in the recent-roots ring are eligible.
    Trailing,
}

/// Structural validation of a verification key.
///
/// Enforces the fixed IC arity and point encodings. Runs at `set_vk` time so
/// a malformed key can never be registered.
pub fn validate_vk(vk: &VerificationKey) -> Result<(), ProtocolError> {
    if vk.ic.len() != IC_POINTS {
        return Err(ProtocolError::MalformedProof);
    }
    validate_g1(&vk.alpha)?;
    validate_g2(&vk.beta)?;
    validate_g2(&vk.gamma)?;
    validate_g2(&vk.delta)?;
    for point in vk.ic.iter() {
        validate_g1(&point)?;
    }
    Ok(())
}

/// Structural validation of a proof: encodings, coordinate ranges, and the
/// G1 curve equation for A and C. Runs before any pairing work.
pub fn validate_proof(proof: &Proof) -> Result<(), ProtocolError> {
    validate_g1(&proof.a)?;
    validate_g2(&proof.b)?;
    validate_g1(&proof.c)
}

/// Verify a Groth16 proof. Returns `false` when the pairing product is not
/// the identity or the IC arity disagrees with the signal count.
///
/// Under `testutils` the pairing itself is compiled out and any structurally
/// valid proof is accepted; real proofs require a circom prover, which the
/// test host does not have. Structural checks stay active in every build.
#[allow(unused_variables)]
pub fn verify_groth16(
    env: &Env,
    vk: &VerificationKey,
    proof: &Proof,
    pub_signals: &Vec<U256>,
) -> bool {
    if pub_signals.len() + 1 != vk.ic.len() {
        return false;
    }

    #[cfg(any(test, feature = "testutils"))]
    {
        return true;
    }

    #[cfg(not(any(test, feature = "testutils")))]
    {
        use soroban_sdk::crypto::bn254::{Fr, G1Affine, G2Affine};

        // vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
        let ic0 = vk.ic.get(0).unwrap_or_else(|| panic!("IC[0] missing"));
        let mut vk_x = G1Affine::from_bytes(ic0);
        for i in 0..pub_signals.len() {
            let signal = pub_signals.get(i).unwrap_or_else(|| panic!("signal missing"));
            let ic_point = G1Affine::from_bytes(
                vk.ic.get(i + 1).unwrap_or_else(|| panic!("IC point missing")),
            );
            let scaled = ic_point * Fr::from(signal);
            vk_x = vk_x + scaled;
        }

        let neg_a = crate::curve::g1_negate(env, &proof.a);

        let mut g1_vec = Vec::new(env);
        g1_vec.push_back(G1Affine::from_bytes(neg_a));
        g1_vec.push_back(G1Affine::from_bytes(vk.alpha.clone()));
        g1_vec.push_back(vk_x);
        g1_vec.push_back(G1Affine::from_bytes(proof.c.clone()));

        let mut g2_vec = Vec::new(env);
        g2_vec.push_back(G2Affine::from_bytes(proof.b.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.beta.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.gamma.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.delta.clone()));

        env.crypto().bn254().pairing_check(g1_vec, g2_vec)
    }
}
