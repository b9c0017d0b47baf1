// Comment flows
//
// Anonymous comments reuse the membership-proof machinery with the comment
// VK slot and a nonce-extended nullifier domain, and deliberately skip the
// uniqueness rule: the same member may post repeatedly, each time with a
// different nullifier. The stored nullifier only gates edit and delete.

use soroban_sdk::{testutils::Address as _, Address, BytesN, Env, String, Vec, U256};

use ballot::BallotClient;
use comments::CommentsClient;
use identity_forest::IdentityForestClient;
use membership_badge::MembershipBadgeClient;
use org_registry::OrgRegistryClient;
use protocol_core::{Proof, VerificationKey, VoteMode};

fn g1(env: &Env) -> BytesN<64> {
    let mut bytes = [0u8; 64];
    bytes[31] = 1;
    bytes[63] = 2;
    BytesN::from_array(env, &bytes)
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

fn test_vk(env: &Env) -> VerificationKey {
    let mut ic = Vec::new(env);
    for _ in 0..7 {
        ic.push_back(g1(env));
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
    comments: Address,
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
        let comments = env.register(comments::Comments, (forest.clone(), ballot.clone()));

        Self {
            env,
            registry,
            badge,
            forest,
            ballot,
            comments,
        }
    }

    fn comments(&self) -> CommentsClient {
        CommentsClient::new(&self.env, &self.comments)
    }

    fn proof(&self) -> Proof {
        Proof {
            a: g1(&self.env),
            b: g2(&self.env),
            c: g1(&self.env),
        }
    }

    fn cid(&self, s: &str) -> String {
        String::from_str(&self.env, s)
    }

    /// Org with both VK slots set, one member, one open trailing proposal.
    /// Returns (org, proposal, admin, member, root).
    fn ready(&self) -> (u64, u64, Address, Address, U256) {
        let admin = Address::generate(&self.env);
        let org_id = OrgRegistryClient::new(&self.env, &self.registry).create_org(
            &String::from_str(&self.env, "Comment Org"),
            &admin,
            &false,
            &true,
        );
        let forest = IdentityForestClient::new(&self.env, &self.forest);
        forest.init(&org_id, &18, &admin);

        let ballot_client = BallotClient::new(&self.env, &self.ballot);
        ballot_client.set_vk(&org_id, &test_vk(&self.env), &admin);
        ballot_client.set_comment_vk(&org_id, &test_vk(&self.env), &admin);

        let member = Address::generate(&self.env);
        MembershipBadgeClient::new(&self.env, &self.badge).mint(&org_id, &member, &admin);
        forest.register(&org_id, &U256::from_u32(&self.env, 12345), &member);
        let root = forest.current_root(&org_id);

        let proposal_id = ballot_client.create_proposal(
            &org_id,
            &String::from_str(&self.env, "Discussable"),
            &self.cid("bafyproposal"),
            &(self.env.ledger().timestamp() + 86400),
            &admin,
            &VoteMode::Trailing,
        );

        (org_id, proposal_id, admin, member, root)
    }
}

#[test]
fn public_comment_and_thread() {
    let system = System::new();
    let (org_id, proposal_id, _admin, member, _root) = system.ready();

    let top = system.comments().add_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafytop"),
        &None,
        &member,
    );
    let reply = system.comments().add_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyreply"),
        &Some(top),
        &member,
    );

    assert_eq!(system.comments().comment_count(&org_id, &proposal_id), 2);
    let stored = system.comments().get_comment(&org_id, &proposal_id, &reply);
    assert_eq!(stored.parent_id, Some(top));
    assert_eq!(stored.author, Some(member));
    assert_eq!(stored.nullifier, None);
}

#[test]
#[should_panic(expected = "Error(Contract, #2)")]
fn stranger_cannot_comment_publicly() {
    let system = System::new();
    let (org_id, proposal_id, _admin, _member, _root) = system.ready();

    let stranger = Address::generate(&system.env);
    system.comments().add_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafynope"),
        &None,
        &stranger,
    );
}

#[test]
#[should_panic(expected = "Error(Contract, #29)")]
fn reply_to_missing_parent_fails() {
    let system = System::new();
    let (org_id, proposal_id, _admin, member, _root) = system.ready();

    system.comments().add_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyorphan"),
        &Some(42),
        &member,
    );
}

#[test]
fn anonymous_comments_repeat_with_fresh_nullifiers() {
    let system = System::new();
    let (org_id, proposal_id, _admin, _member, root) = system.ready();

    // Two comments from the same member, nonce-separated nullifiers.
    let first = system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyanon1"),
        &None,
        &U256::from_u32(&system.env, 1001),
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );
    let second = system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyanon2"),
        &None,
        &U256::from_u32(&system.env, 1002),
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );

    assert_eq!((first, second), (1, 2));
    let stored = system.comments().get_comment(&org_id, &proposal_id, &first);
    assert_eq!(stored.author, None);
    assert_eq!(stored.nullifier, Some(U256::from_u32(&system.env, 1001)));
}

#[test]
#[should_panic(expected = "Error(Contract, #10)")]
fn anonymous_comment_without_comment_vk_fails() {
    let system = System::new();

    // Org with only the vote VK set.
    let admin = Address::generate(&system.env);
    let org_id = OrgRegistryClient::new(&system.env, &system.registry).create_org(
        &String::from_str(&system.env, "No Comment VK"),
        &admin,
        &false,
        &true,
    );
    let forest = IdentityForestClient::new(&system.env, &system.forest);
    forest.init(&org_id, &18, &admin);
    let ballot_client = BallotClient::new(&system.env, &system.ballot);
    ballot_client.set_vk(&org_id, &test_vk(&system.env), &admin);

    let member = Address::generate(&system.env);
    MembershipBadgeClient::new(&system.env, &system.badge).mint(&org_id, &member, &admin);
    forest.register(&org_id, &U256::from_u32(&system.env, 777), &member);
    let root = forest.current_root(&org_id);

    let proposal_id = ballot_client.create_proposal(
        &org_id,
        &String::from_str(&system.env, "Proposal"),
        &system.cid("cid"),
        &(system.env.ledger().timestamp() + 86400),
        &admin,
        &VoteMode::Trailing,
    );

    system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyanon"),
        &None,
        &U256::from_u32(&system.env, 1001),
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 777),
        &system.proof(),
    );
}

#[test]
fn anonymous_edit_requires_matching_nullifier() {
    let system = System::new();
    let (org_id, proposal_id, _admin, _member, root) = system.ready();

    let nullifier = U256::from_u32(&system.env, 1001);
    let comment_id = system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyoriginal"),
        &None,
        &nullifier,
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );

    system.comments().edit_anonymous_comment(
        &org_id,
        &proposal_id,
        &comment_id,
        &system.cid("bafyedited"),
        &nullifier,
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );

    let stored = system.comments().get_comment(&org_id, &proposal_id, &comment_id);
    assert_eq!(stored.content_ref, system.cid("bafyedited"));

    // A different nullifier is a different author.
    let result = system.comments().try_edit_anonymous_comment(
        &org_id,
        &proposal_id,
        &comment_id,
        &system.cid("bafyhijack"),
        &U256::from_u32(&system.env, 9999),
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );
    assert!(result.is_err());
}

#[test]
fn anonymous_delete_and_admin_delete() {
    let system = System::new();
    let (org_id, proposal_id, admin, _member, root) = system.ready();

    let nullifier = U256::from_u32(&system.env, 1001);
    let own = system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafymine"),
        &None,
        &nullifier,
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );
    let other = system.comments().add_anonymous_comment(
        &org_id,
        &proposal_id,
        &system.cid("bafyother"),
        &None,
        &U256::from_u32(&system.env, 1002),
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );

    system.comments().delete_anonymous_comment(
        &org_id,
        &proposal_id,
        &own,
        &nullifier,
        &root,
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );
    let deleted = system.comments().get_comment(&org_id, &proposal_id, &own);
    assert!(deleted.deleted);
    assert_eq!(deleted.deleted_by, comments::DELETED_BY_USER);

    system
        .comments()
        .admin_delete_comment(&org_id, &proposal_id, &other, &admin);
    let moderated = system.comments().get_comment(&org_id, &proposal_id, &other);
    assert!(moderated.deleted);
    assert_eq!(moderated.deleted_by, comments::DELETED_BY_ADMIN);
}

#[test]
#[should_panic(expected = "Error(Contract, #13)")]
fn fixed_mode_comment_requires_snapshot_root() {
    let system = System::new();
    let (org_id, _proposal_id, admin, _member, root) = system.ready();

    // A fixed-mode proposal; its snapshot is the current root, so any other
    // root fails.
    let fixed = BallotClient::new(&system.env, &system.ballot).create_proposal(
        &org_id,
        &String::from_str(&system.env, "Fixed"),
        &system.cid("cid"),
        &(system.env.ledger().timestamp() + 86400),
        &admin,
        &VoteMode::Fixed,
    );
    let _ = root;

    system.comments().add_anonymous_comment(
        &org_id,
        &fixed,
        &system.cid("bafywrongroot"),
        &None,
        &U256::from_u32(&system.env, 1001),
        &U256::from_u32(&system.env, 31337),
        &U256::from_u32(&system.env, 0),
        &U256::from_u32(&system.env, 12345),
        &system.proof(),
    );
}

#[test]
fn pagination_walks_comment_ids() {
    let system = System::new();
    let (org_id, proposal_id, _admin, member, _root) = system.ready();

    for i in 0..5u32 {
        let label = match i {
            0 => "bafy0",
            1 => "bafy1",
            2 => "bafy2",
            3 => "bafy3",
            _ => "bafy4",
        };
        system
            .comments()
            .add_comment(&org_id, &proposal_id, &system.cid(label), &None, &member);
    }

    let page = system.comments().get_comments(&org_id, &proposal_id, &1, &2);
    assert_eq!(page.len(), 2);
    assert_eq!(page.get(0).unwrap().id, 2);
    assert_eq!(page.get(1).unwrap().id, 3);

    let tail = system.comments().get_comments(&org_id, &proposal_id, &4, &10);
    assert_eq!(tail.len(), 1);
    assert_eq!(tail.get(0).unwrap().id, 5);
}
