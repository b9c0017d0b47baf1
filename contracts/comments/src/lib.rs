//! # Anonymous Comments
//!
//! Proposal discussion with the same membership proofs as voting, minus the
//! one-action rule. The comment circuit exposes the same six public signals
//! as the vote circuit with the choice slot carrying an opaque `binding`
//! value, and its nullifier domain adds a nonce
//! (`Poseidon₄(secret, orgId, proposalId, nonce)`), so one member can post
//! any number of unlinkable comments. Nullifier uniqueness is deliberately
//! NOT enforced here — it is a voting concern; the stored nullifier only
//! proves ownership when a comment is edited or deleted.
//!
//! Proofs verify against the org's comment-VK slot in the ballot contract,
//! never the vote slot.

#![no_std]
use protocol_core::{require_in_fr, validate_proof, verify_groth16, Proof, ProtocolError, VoteMode};
use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, symbol_short, Address, Env, IntoVal,
    String, Symbol, Vec, U256,
};

const FOREST_CONTRACT: Symbol = symbol_short!("forest");
const BALLOT_CONTRACT: Symbol = symbol_short!("ballot");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

const MAX_CONTENT_REF_LEN: u32 = 64;

/// Who deleted a comment.
pub const DELETED_BY_NONE: u32 = 0;
pub const DELETED_BY_USER: u32 = 1;
pub const DELETED_BY_ADMIN: u32 = 2;

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Comment(u64, u64, u64), // (org_id, proposal_id, comment_id) -> CommentInfo
    CommentCount(u64, u64), // (org_id, proposal_id) -> count
}

#[contracttype]
#[derive(Clone)]
pub struct CommentInfo {
    pub id: u64,
    pub org_id: u64,
    pub proposal_id: u64,
    /// Signing author for public comments; `None` for anonymous ones.
    pub author: Option<Address>,
    /// Opaque content-addressed reference to the comment body.
    pub content_ref: String,
    pub parent_id: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub deleted: bool,
    pub deleted_by: u32,
    /// Ownership tag for anonymous comments; edits and deletes must present
    /// a proof carrying the same nullifier.
    pub nullifier: Option<U256>,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommentPostedEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
    pub comment_id: u64,
    pub anonymous: bool,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommentEditedEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
    pub comment_id: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommentRemovedEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
    pub comment_id: u64,
    pub deleted_by: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Comments;

#[contractimpl]
impl Comments {
    /// Constructor: wire the forest and ballot contract addresses.
    pub fn __constructor(env: Env, forest_contract: Address, ballot_contract: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, ProtocolError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&FOREST_CONTRACT, &forest_contract);
        env.storage().instance().set(&BALLOT_CONTRACT, &ballot_contract);
    }

    /// Post a public comment; the author signs and is visible.
    pub fn add_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        content_ref: String,
        parent_id: Option<u64>,
        author: Address,
    ) -> u64 {
        author.require_auth();

        if content_ref.len() > MAX_CONTENT_REF_LEN {
            panic_with_error!(&env, ProtocolError::ContentRefTooLong);
        }

        Self::assert_membership(&env, org_id, &author);
        Self::assert_proposal_exists(&env, org_id, proposal_id);
        Self::assert_parent_exists(&env, org_id, proposal_id, parent_id);

        let comment_id = Self::next_comment_id(&env, org_id, proposal_id);
        let now = env.ledger().timestamp();

        let comment = CommentInfo {
            id: comment_id,
            org_id,
            proposal_id,
            author: Some(author),
            content_ref,
            parent_id,
            created_at: now,
            updated_at: now,
            deleted: false,
            deleted_by: DELETED_BY_NONE,
            nullifier: None,
        };

        env.storage()
            .persistent()
            .set(&DataKey::Comment(org_id, proposal_id, comment_id), &comment);

        CommentPostedEvent {
            org_id,
            proposal_id,
            comment_id,
            anonymous: false,
        }
        .publish(&env);

        comment_id
    }

    /// Post an anonymous comment backed by a membership proof.
    ///
    /// `binding` rides in the circuit's choice slot and is opaque to the
    /// contract. Repeated comments by the same member carry different
    /// nonce-derived nullifiers and stay unlinkable.
    pub fn add_anonymous_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        content_ref: String,
        parent_id: Option<u64>,
        nullifier: U256,
        root: U256,
        binding: U256,
        commitment: U256,
        proof: Proof,
    ) -> u64 {
        if content_ref.len() > MAX_CONTENT_REF_LEN {
            panic_with_error!(&env, ProtocolError::ContentRefTooLong);
        }

        Self::assert_proposal_exists(&env, org_id, proposal_id);
        Self::assert_parent_exists(&env, org_id, proposal_id, parent_id);
        Self::verify_membership_proof(
            &env,
            org_id,
            proposal_id,
            &nullifier,
            &root,
            &binding,
            &commitment,
            &proof,
        );

        let comment_id = Self::next_comment_id(&env, org_id, proposal_id);
        let now = env.ledger().timestamp();

        let comment = CommentInfo {
            id: comment_id,
            org_id,
            proposal_id,
            author: None,
            content_ref,
            parent_id,
            created_at: now,
            updated_at: now,
            deleted: false,
            deleted_by: DELETED_BY_NONE,
            nullifier: Some(nullifier),
        };

        env.storage()
            .persistent()
            .set(&DataKey::Comment(org_id, proposal_id, comment_id), &comment);

        CommentPostedEvent {
            org_id,
            proposal_id,
            comment_id,
            anonymous: true,
        }
        .publish(&env);

        comment_id
    }

    /// Edit a public comment (author only).
    pub fn edit_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        comment_id: u64,
        new_content_ref: String,
        author: Address,
    ) {
        author.require_auth();

        if new_content_ref.len() > MAX_CONTENT_REF_LEN {
            panic_with_error!(&env, ProtocolError::ContentRefTooLong);
        }

        let key = DataKey::Comment(org_id, proposal_id, comment_id);
        let mut comment = Self::live_comment(&env, &key);

        match &comment.author {
            Some(original) if original == &author => {}
            _ => panic_with_error!(&env, ProtocolError::NotCommentOwner),
        }

        comment.content_ref = new_content_ref;
        comment.updated_at = env.ledger().timestamp();
        env.storage().persistent().set(&key, &comment);

        CommentEditedEvent {
            org_id,
            proposal_id,
            comment_id,
        }
        .publish(&env);
    }

    /// Edit an anonymous comment. Ownership is the stored nullifier: the
    /// caller must present a valid proof carrying the same one.
    pub fn edit_anonymous_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        comment_id: u64,
        new_content_ref: String,
        nullifier: U256,
        root: U256,
        binding: U256,
        commitment: U256,
        proof: Proof,
    ) {
        if new_content_ref.len() > MAX_CONTENT_REF_LEN {
            panic_with_error!(&env, ProtocolError::ContentRefTooLong);
        }

        let key = DataKey::Comment(org_id, proposal_id, comment_id);
        let mut comment = Self::live_comment(&env, &key);

        match &comment.nullifier {
            Some(original) if original == &nullifier => {}
            _ => panic_with_error!(&env, ProtocolError::NotCommentOwner),
        }

        Self::verify_membership_proof(
            &env,
            org_id,
            proposal_id,
            &nullifier,
            &root,
            &binding,
            &commitment,
            &proof,
        );

        comment.content_ref = new_content_ref;
        comment.updated_at = env.ledger().timestamp();
        env.storage().persistent().set(&key, &comment);

        CommentEditedEvent {
            org_id,
            proposal_id,
            comment_id,
        }
        .publish(&env);
    }

    /// Delete a public comment (author only). Idempotent.
    pub fn delete_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        comment_id: u64,
        author: Address,
    ) {
        author.require_auth();

        let key = DataKey::Comment(org_id, proposal_id, comment_id);
        let mut comment: CommentInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::CommentNotFound));

        if comment.deleted {
            return;
        }

        match &comment.author {
            Some(original) if original == &author => {}
            _ => panic_with_error!(&env, ProtocolError::NotCommentOwner),
        }

        comment.deleted = true;
        comment.deleted_by = DELETED_BY_USER;
        comment.updated_at = env.ledger().timestamp();
        env.storage().persistent().set(&key, &comment);

        CommentRemovedEvent {
            org_id,
            proposal_id,
            comment_id,
            deleted_by: DELETED_BY_USER,
        }
        .publish(&env);
    }

    /// Delete an anonymous comment with a proof of ownership. Idempotent.
    pub fn delete_anonymous_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        comment_id: u64,
        nullifier: U256,
        root: U256,
        binding: U256,
        commitment: U256,
        proof: Proof,
    ) {
        let key = DataKey::Comment(org_id, proposal_id, comment_id);
        let mut comment: CommentInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::CommentNotFound));

        if comment.deleted {
            return;
        }

        match &comment.nullifier {
            Some(original) if original == &nullifier => {}
            _ => panic_with_error!(&env, ProtocolError::NotCommentOwner),
        }

        Self::verify_membership_proof(
            &env,
            org_id,
            proposal_id,
            &nullifier,
            &root,
            &binding,
            &commitment,
            &proof,
        );

        comment.deleted = true;
        comment.deleted_by = DELETED_BY_USER;
        comment.updated_at = env.ledger().timestamp();
        env.storage().persistent().set(&key, &comment);

        CommentRemovedEvent {
            org_id,
            proposal_id,
            comment_id,
            deleted_by: DELETED_BY_USER,
        }
        .publish(&env);
    }

    /// Delete any comment (org admin only). Idempotent.
    pub fn admin_delete_comment(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        comment_id: u64,
        admin: Address,
    ) {
        admin.require_auth();
        Self::assert_admin(&env, org_id, &admin);

        let key = DataKey::Comment(org_id, proposal_id, comment_id);
        let mut comment: CommentInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::CommentNotFound));

        if comment.deleted {
            return;
        }

        comment.deleted = true;
        comment.deleted_by = DELETED_BY_ADMIN;
        comment.updated_at = env.ledger().timestamp();
        env.storage().persistent().set(&key, &comment);

        CommentRemovedEvent {
            org_id,
            proposal_id,
            comment_id,
            deleted_by: DELETED_BY_ADMIN,
        }
        .publish(&env);
    }

    /// Get a single comment.
    pub fn get_comment(env: Env, org_id: u64, proposal_id: u64, comment_id: u64) -> CommentInfo {
        env.storage()
            .persistent()
            .get(&DataKey::Comment(org_id, proposal_id, comment_id))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::CommentNotFound))
    }

    /// Comment count for a proposal.
    pub fn comment_count(env: Env, org_id: u64, proposal_id: u64) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::CommentCount(org_id, proposal_id))
            .unwrap_or(0)
    }

    /// Page through a proposal's comments. `start` is a zero-based offset.
    pub fn get_comments(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        start: u64,
        limit: u64,
    ) -> Vec<CommentInfo> {
        let total = Self::comment_count(env.clone(), org_id, proposal_id);
        let mut comments = Vec::new(&env);

        let end = core::cmp::min(start + limit, total);
        for i in start..end {
            let comment_id = i + 1;
            let key = DataKey::Comment(org_id, proposal_id, comment_id);
            if let Some(comment) = env.storage().persistent().get::<DataKey, CommentInfo>(&key) {
                comments.push_back(comment);
            }
        }

        comments
    }

    /// Get the forest contract address.
    pub fn forest_contract(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&FOREST_CONTRACT)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::ContractNotSet))
    }

    /// Get the ballot contract address.
    pub fn ballot_contract(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&BALLOT_CONTRACT)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::ContractNotSet))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn live_comment(env: &Env, key: &DataKey) -> CommentInfo {
        let comment: CommentInfo = env
            .storage()
            .persistent()
            .get(key)
            .unwrap_or_else(|| panic_with_error!(env, ProtocolError::CommentNotFound));
        if comment.deleted {
            panic_with_error!(env, ProtocolError::CommentDeleted);
        }
        comment
    }

    fn next_comment_id(env: &Env, org_id: u64, proposal_id: u64) -> u64 {
        let count_key = DataKey::CommentCount(org_id, proposal_id);
        let count: u64 = env.storage().instance().get(&count_key).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&count_key, &new_id);
        new_id
    }

    fn assert_parent_exists(env: &Env, org_id: u64, proposal_id: u64, parent_id: Option<u64>) {
        if let Some(pid) = parent_id {
            let parent_key = DataKey::Comment(org_id, proposal_id, pid);
            if !env.storage().persistent().has(&parent_key) {
                panic_with_error!(env, ProtocolError::InvalidParentComment);
            }
        }
    }

    fn assert_proposal_exists(env: &Env, org_id: u64, proposal_id: u64) {
        let ballot = Self::ballot_contract(env.clone());
        let count: u64 = env.invoke_contract(
            &ballot,
            &Symbol::new(env, "proposal_count"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if proposal_id == 0 || proposal_id > count {
            panic_with_error!(env, ProtocolError::ProposalNotFound);
        }
    }

    fn assert_membership(env: &Env, org_id: u64, member: &Address) {
        let badge = Self::badge_addr(env);
        let is_member: bool = env.invoke_contract(
            &badge,
            &symbol_short!("has"),
            soroban_sdk::vec![env, org_id.into_val(env), member.clone().into_val(env)],
        );
        if !is_member {
            panic_with_error!(env, ProtocolError::NotMember);
        }
    }

    fn assert_admin(env: &Env, org_id: u64, admin: &Address) {
        let badge = Self::badge_addr(env);
        let registry: Address =
            env.invoke_contract(&badge, &symbol_short!("registry"), soroban_sdk::vec![env]);
        let org_admin: Address = env.invoke_contract(
            &registry,
            &symbol_short!("get_admin"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if &org_admin != admin {
            panic_with_error!(env, ProtocolError::NotAdmin);
        }
    }

    fn badge_addr(env: &Env) -> Address {
        let forest = Self::forest_contract(env.clone());
        env.invoke_contract(
            &forest,
            &Symbol::new(env, "badge_contract"),
            soroban_sdk::vec![env],
        )
    }

    // Root policy mirrors the ballot contract, the VK comes from the
    // comment slot.
    #[allow(clippy::too_many_arguments)]
    fn verify_membership_proof(
        env: &Env,
        org_id: u64,
        proposal_id: u64,
        nullifier: &U256,
        root: &U256,
        binding: &U256,
        commitment: &U256,
        proof: &Proof,
    ) {
        require_in_fr(env, root);
        require_in_fr(env, nullifier);
        require_in_fr(env, binding);
        require_in_fr(env, commitment);

        let ballot = Self::ballot_contract(env.clone());

        let vote_mode: VoteMode = env.invoke_contract(
            &ballot,
            &Symbol::new(env, "get_vote_mode"),
            soroban_sdk::vec![env, org_id.into_val(env), proposal_id.into_val(env)],
        );

        match vote_mode {
            VoteMode::Fixed => {
                let eligible: Option<U256> = env.invoke_contract(
                    &ballot,
                    &Symbol::new(env, "get_eligible_root"),
                    soroban_sdk::vec![env, org_id.into_val(env), proposal_id.into_val(env)],
                );
                if eligible.as_ref() != Some(root) {
                    panic_with_error!(env, ProtocolError::RootMismatch);
                }
            }
            VoteMode::Trailing => {
                let forest = Self::forest_contract(env.clone());
                let known: bool = env.invoke_contract(
                    &forest,
                    &Symbol::new(env, "is_known_root"),
                    soroban_sdk::vec![env, org_id.into_val(env), root.clone().into_val(env)],
                );
                if !known {
                    panic_with_error!(env, ProtocolError::RootUnknown);
                }
            }
        }

        let vk_version: u32 = env.invoke_contract(
            &ballot,
            &Symbol::new(env, "current_comment_vk_version"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if vk_version == 0 {
            panic_with_error!(env, ProtocolError::VkNotSet);
        }
        let vk: protocol_core::VerificationKey = env.invoke_contract(
            &ballot,
            &Symbol::new(env, "get_comment_vk"),
            soroban_sdk::vec![env, org_id.into_val(env), vk_version.into_val(env)],
        );

        if let Err(err) = validate_proof(proof) {
            panic_with_error!(env, err);
        }

        let pub_signals = soroban_sdk::vec![
            env,
            root.clone(),
            nullifier.clone(),
            U256::from_u128(env, org_id as u128),
            U256::from_u128(env, proposal_id as u128),
            binding.clone(),
            commitment.clone()
        ];

        if !verify_groth16(env, &vk, proof, &pub_signals) {
            panic_with_error!(env, ProtocolError::ProofInvalid);
        }
    }
}
