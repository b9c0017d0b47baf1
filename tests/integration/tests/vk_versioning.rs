// Verification-key versioning
//
// Keys are write-once per (org, version); set_vk appends and bumps the
// version. A proposal pins the version current at its creation and verifies
// against that key for its whole life, so key rotation never strands an open
// proposal. Vote and comment keys are independent slots.

use soroban_sdk::{testutils::Address as _, Address, BytesN, Env, String, Vec, U256};

use ballot::BallotClient;
use identity_forest::IdentityForestClient;
use membership_badge::MembershipBadgeClient;
use org_registry::OrgRegistryClient;
use protocol_core::{Proof, VerificationKey, VoteMode};

fn g1_with_y(env: &Env, x: u8, y: u8) -> BytesN<64> {
    let mut bytes = [0u8; 64];
    bytes[31] = x;
    bytes[63] = y;
    BytesN::from_array(env, &bytes)
}

fn g1(env: &Env) -> BytesN<64> {
    g1_with_y(env, 1, 2)
}

fn g2(env: &Env) -> BytesN<128> {
    let bytes: [u8; 128] = [
        0x18, 0x00, 0x50, 0x6a, 0x06, 0x12, 0x86, 0xeb, 0x6a, 0x84, 0xa5, 0x73, 0x0b, 0x8f, 0x10,
        0x29, 0x3e, 0x29, 0x81, 0x6c, 0xd1, 0x91, 0x3d, 0x53, 0x38, 0xf7, 0x15, 0xde, 0x3e, 0x98,
        0xf9, 0xad, 0x19, 0x83, 0x90, 0x42, 0x11, 0xa5, 0x3f, 0x6e, 0x0b, 0x08, 0x53, 0xa9, 0x0a,
        0x00, 0xef, 0xbf, 0xf1, 0x70, 0x0c, 0x7b, 0x1d, 0xc0, 0x06, 0x32, 0x4d, 0x85, 0x9d, 0x75,
        0xe3, 0xca, 0xa5, 0xa2, 0x12, 0xc8, 0x5e, 0xa5, 0xdb, 0x8c, 0x6d, 0xeb, 0x4a, 0xab, 0x71,
        0x8e, 0x80, 0x6a, 0x51, 0xa5, 0x66, 0x08, 0x21, 0x4c, 0x3f, 0x62, 0x8b, 0x96, 0x2c, 0xf1,
        0x91, 0xea, 0xcd, 0xc8, 0x0e, 0x7a, 0x09, 0x0d, 0x97, 0xc0, 0x9c, 0xe1, 0x48, 0x60, 0x63,
        0xb3, 0x59, 0xf3, 0xdd, 0x89, 0xb7, 0xc4, 0x3c, 0x5f, 0x18, 0x95, 0x8f, 0xb3, 0xe6, 0xb9,
        0x6d, 0xb5, 0x5e, 0x19, 0xa3, 0xb7, 0xc0, 0xfb,
    ];
    BytesN::from_array(env, &bytes)
}

// The identity point in the IC tail makes versions distinguishable while
// staying structurally valid.
fn vk_variant(env: &Env, tag: bool) -> VerificationKey {
    let mut ic = Vec::new(env);
    for i in 0..7 {
        if tag && i == 6 {
            ic.push_back(BytesN::from_array(env, &[0u8; 64]));
        } else {
            ic.push_back(g1(env));
        }
    }
    VerificationKey {
        alpha: g1(env),
        beta: g2(env),
        gamma: g2(env),
        delta: g2(env),
        ic,
    }
}

struct System {
    env: Env,
    registry: Address,
    badge: Address,
    forest: Address,
    ballot: Address,
}

impl System {
    fn new() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        env.cost_estimate().budget().reset_unlimited();

        let registry = env.register(org_registry::OrgRegistry, ());
        let badge = env.register(membership_badge::MembershipBadge, (registry.clone(),));
        let forest = env.register(identity_forest::IdentityForest, (badge.clone(),));
        let ballot = env.register(ballot::Ballot, (forest.clone(),));

        Self {
            env,
            registry,
            badge,
            forest,
            ballot,
        }
    }

    fn ballot(&self) -> BallotClient {
        BallotClient::new(&self.env, &self.ballot)
    }

    fn ready(&self) -> (u64, Address, U256, U256) {
        let admin = Address::generate(&self.env);
        let org_id = OrgRegistryClient::new(&self.env, &self.registry).create_org(
            &String::from_str(&self.env, "VK Org"),
            &admin,
            &false,
            &true,
        );
        let forest = IdentityForestClient::new(&self.env, &self.forest);
        forest.init(&org_id, &18, &admin);
        self.ballot().set_vk(&org_id, &vk_variant(&self.env, false), &admin);

        let member = Address::generate(&self.env);
        MembershipBadgeClient::new(&self.env, &self.badge).mint(&org_id, &member, &admin);
        let commitment = U256::from_u32(&self.env, 12345);
        forest.register(&org_id, &commitment, &member);
        let root = forest.current_root(&org_id);

        (org_id, admin, root, commitment)
    }
}

#[test]
fn versions_are_write_once_appends() {
    let system = System::new();
    let (org_id, admin, _root, _commitment) = system.ready();

    assert_eq!(system.ballot().current_vk_version(&org_id), 1);

    system
        .ballot()
        .set_vk(&org_id, &vk_variant(&system.env, true), &admin);
    assert_eq!(system.ballot().current_vk_version(&org_id), 2);

    // Both versions stay readable and distinct.
    let v1 = system.ballot().get_vk(&org_id, &1);
    let v2 = system.ballot().get_vk(&org_id, &2);
    assert_eq!(v1.ic.get(6), Some(g1(&system.env)));
    assert_eq!(v2.ic.get(6), Some(BytesN::from_array(&system.env, &[0u8; 64])));
}

#[test]
fn proposal_survives_key_rotation() {
    let system = System::new();
    let (org_id, admin, root, commitment) = system.ready();

    let proposal_id = system.ballot().create_proposal(
        &org_id,
        &String::from_str(&system.env, "Pinned"),
        &String::from_str(&system.env, "cid"),
        &(system.env.ledger().timestamp() + 86400),
        &admin,
        &VoteMode::Fixed,
    );
    assert_eq!(
        system.ballot().get_proposal(&org_id, &proposal_id).vk_version,
        1
    );

    // Rotate twice; the open proposal still verifies against version 1.
    system
        .ballot()
        .set_vk(&org_id, &vk_variant(&system.env, true), &admin);
    system
        .ballot()
        .set_vk(&org_id, &vk_variant(&system.env, false), &admin);
    assert_eq!(system.ballot().current_vk_version(&org_id), 3);

    let proof = Proof {
        a: g1(&system.env),
        b: g2(&system.env),
        c: g1(&system.env),
    };
    system.ballot().vote(
        &org_id,
        &proposal_id,
        &true,
        &U256::from_u32(&system.env, 999),
        &root,
        &commitment,
        &proof,
    );
    assert_eq!(system.ballot().get_results(&org_id, &proposal_id), (1, 0));

    // A proposal created after the rotations pins the newest version.
    let later = system.ballot().create_proposal(
        &org_id,
        &String::from_str(&system.env, "Later"),
        &String::from_str(&system.env, "cid"),
        &(system.env.ledger().timestamp() + 86400),
        &admin,
        &VoteMode::Fixed,
    );
    assert_eq!(system.ballot().get_proposal(&org_id, &later).vk_version, 3);
}

#[test]
fn comment_slot_versions_independently() {
    let system = System::new();
    let (org_id, admin, _root, _commitment) = system.ready();

    assert_eq!(system.ballot().current_comment_vk_version(&org_id), 0);

    system
        .ballot()
        .set_comment_vk(&org_id, &vk_variant(&system.env, true), &admin);
    assert_eq!(system.ballot().current_comment_vk_version(&org_id), 1);
    // The vote slot is untouched.
    assert_eq!(system.ballot().current_vk_version(&org_id), 1);
}

#[test]
#[should_panic(expected = "Error(Contract, #10)")]
fn missing_version_read_fails() {
    let system = System::new();
    let (org_id, _admin, _root, _commitment) = system.ready();

    system.ballot().get_vk(&org_id, &2);
}
