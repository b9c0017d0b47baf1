//! # Ballot
//!
//! Proposals, votes, and the per-org verification-key registry.
//!
//! A vote binds six public signals in this exact order:
//! `[root, nullifier, orgId, proposalId, voteChoice, commitment]`.
//! The root must satisfy the proposal's eligibility policy (`Fixed` snapshot
//! or `Trailing` ring lookup), the nullifier must be fresh for the
//! `(org, proposal)` pair, and the Groth16 proof must verify against the
//! VK version the proposal was created under.
//!
//! Verification keys are write-once per `(org, version)`; `set_vk` only ever
//! appends a new version, so an open proposal can never be stranded by a key
//! rotation. Votes and anonymous comments use independent VK slots.

#![no_std]
use protocol_core::{
    require_in_fr, validate_proof, validate_vk, verify_groth16, Proof, ProtocolError,
    VerificationKey, VoteMode,
};
use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, symbol_short, Address, Env, IntoVal,
    String, Symbol, U256,
};

const FOREST_CONTRACT: Symbol = symbol_short!("forest");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

const MAX_TITLE_LEN: u32 = 64;
const MAX_CONTENT_REF_LEN: u32 = 64;

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Proposal(u64, u64),        // (org_id, proposal_id) -> ProposalInfo
    ProposalCount(u64),        // org_id -> count
    Nullifier(u64, u64, U256), // (org_id, proposal_id, nullifier) -> bool
    VoteVk(u64, u32),          // (org_id, version) -> VerificationKey
    VoteVkVersion(u64),        // org_id -> latest version (0 = none)
    CommentVk(u64, u32),       // (org_id, version) -> VerificationKey
    CommentVkVersion(u64),     // org_id -> latest version (0 = none)
}

#[contracttype]
#[derive(Clone)]
pub struct ProposalInfo {
    pub id: u64,
    pub org_id: u64,
    pub title: String,
    /// Opaque content-addressed reference to the proposal body.
    pub content_ref: String,
    pub end_time: u64,
    pub created_by: Address,
    pub vote_mode: VoteMode,
    /// Root snapshot; present only for `Fixed` proposals.
    pub eligible_root: Option<U256>,
    /// Vote-VK version captured at creation; votes verify against it forever.
    pub vk_version: u32,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub closed: bool,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteVkSetEvent {
    #[topic]
    pub org_id: u64,
    pub version: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CommentVkSetEvent {
    #[topic]
    pub org_id: u64,
    pub version: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalOpenedEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
    pub title: String,
    pub creator: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalClosedEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteCastEvent {
    #[topic]
    pub org_id: u64,
    #[topic]
    pub proposal_id: u64,
    pub choice: bool,
    pub nullifier: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Ballot;

#[contractimpl]
impl Ballot {
    /// Constructor: wire the identity-forest address.
    pub fn __constructor(env: Env, forest_contract: Address) {
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
    }

    /// Register a new vote-VK version (org admin only). Keys are write-once
    /// per version; this always appends.
    pub fn set_vk(env: Env, org_id: u64, vk: VerificationKey, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        let version = Self::store_vote_vk(&env, org_id, vk);
        VoteVkSetEvent { org_id, version }.publish(&env);
    }

    /// Vote-VK registration reached only through the registry's
    /// `create_and_init_org` orchestration.
    pub fn set_vk_from_registry(env: Env, org_id: u64, vk: VerificationKey) {
        Self::registry_addr(&env).require_auth();

        let version = Self::store_vote_vk(&env, org_id, vk);
        VoteVkSetEvent { org_id, version }.publish(&env);
    }

    /// Register a new comment-VK version (org admin only). Anonymous
    /// comments verify against this slot, never the vote slot.
    pub fn set_comment_vk(env: Env, org_id: u64, vk: VerificationKey, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        if let Err(err) = validate_vk(&vk) {
            panic_with_error!(&env, err);
        }

        let version: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::CommentVkVersion(org_id))
            .unwrap_or(0)
            + 1;
        env.storage()
            .persistent()
            .set(&DataKey::CommentVk(org_id, version), &vk);
        env.storage()
            .persistent()
            .set(&DataKey::CommentVkVersion(org_id), &version);

        CommentVkSetEvent { org_id, version }.publish(&env);
    }

    /// Fetch a vote VK by version.
    pub fn get_vk(env: Env, org_id: u64, version: u32) -> VerificationKey {
        env.storage()
            .persistent()
            .get(&DataKey::VoteVk(org_id, version))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::VkNotSet))
    }

    /// Latest vote-VK version for an org (0 when none registered).
    pub fn current_vk_version(env: Env, org_id: u64) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::VoteVkVersion(org_id))
            .unwrap_or(0)
    }

    /// Fetch a comment VK by version.
    pub fn get_comment_vk(env: Env, org_id: u64, version: u32) -> VerificationKey {
        env.storage()
            .persistent()
            .get(&DataKey::CommentVk(org_id, version))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::VkNotSet))
    }

    /// Latest comment-VK version for an org (0 when none registered).
    pub fn current_comment_vk_version(env: Env, org_id: u64) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::CommentVkVersion(org_id))
            .unwrap_or(0)
    }

    /// Open a proposal. Voting starts immediately and ends at `end_time`.
    ///
    /// `Fixed` mode snapshots the current tree root as the eligibility
    /// anchor; `Trailing` mode stores no snapshot and accepts any root from
    /// the recent-roots ring at vote time. Either way the proposal pins the
    /// current vote-VK version.
    pub fn create_proposal(
        env: Env,
        org_id: u64,
        title: String,
        content_ref: String,
        end_time: u64,
        creator: Address,
        vote_mode: VoteMode,
    ) -> u64 {
        creator.require_auth();

        if title.len() > MAX_TITLE_LEN {
            panic_with_error!(&env, ProtocolError::NameTooLong);
        }
        if content_ref.len() > MAX_CONTENT_REF_LEN {
            panic_with_error!(&env, ProtocolError::ContentRefTooLong);
        }

        Self::assert_may_propose(&env, org_id, &creator);

        let now = env.ledger().timestamp();
        if end_time <= now {
            panic_with_error!(&env, ProtocolError::EndTimeInPast);
        }

        let vk_version = Self::current_vk_version(env.clone(), org_id);
        if vk_version == 0 {
            panic_with_error!(&env, ProtocolError::VkNotSet);
        }

        let eligible_root = match vote_mode {
            VoteMode::Fixed => {
                let forest = Self::forest_addr(&env);
                let root: U256 = env.invoke_contract(
                    &forest,
                    &symbol_short!("get_root"),
                    soroban_sdk::vec![&env, org_id.into_val(&env)],
                );
                Some(root)
            }
            VoteMode::Trailing => None,
        };

        let proposal_id = Self::next_proposal_id(&env, org_id);
        let proposal = ProposalInfo {
            id: proposal_id,
            org_id,
            title: title.clone(),
            content_ref,
            end_time,
            created_by: creator.clone(),
            vote_mode,
            eligible_root,
            vk_version,
            yes_votes: 0,
            no_votes: 0,
            closed: false,
        };

        env.storage()
            .persistent()
            .set(&DataKey::Proposal(org_id, proposal_id), &proposal);

        ProposalOpenedEvent {
            org_id,
            proposal_id,
            title,
            creator,
        }
        .publish(&env);

        proposal_id
    }

    /// Submit an anonymous vote.
    pub fn vote(
        env: Env,
        org_id: u64,
        proposal_id: u64,
        choice: bool, // true = yes, false = no
        nullifier: U256,
        root: U256,
        commitment: U256,
        proof: Proof,
    ) {
        let prop_key = DataKey::Proposal(org_id, proposal_id);
        let mut proposal: ProposalInfo = env
            .storage()
            .persistent()
            .get(&prop_key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::ProposalNotFound));

        let now = env.ledger().timestamp();
        if proposal.closed || now >= proposal.end_time {
            panic_with_error!(&env, ProtocolError::ProposalClosed);
        }

        // Field-range checks come before any curve or pairing work.
        require_in_fr(&env, &root);
        require_in_fr(&env, &nullifier);
        require_in_fr(&env, &commitment);

        match proposal.vote_mode {
            VoteMode::Fixed => {
                // Unwrap is safe: Fixed proposals always carry a snapshot.
                let eligible = proposal.eligible_root.clone().unwrap();
                if root != eligible {
                    panic_with_error!(&env, ProtocolError::RootMismatch);
                }
            }
            VoteMode::Trailing => {
                let forest = Self::forest_addr(&env);
                let known: bool = env.invoke_contract(
                    &forest,
                    &Symbol::new(&env, "is_known_root"),
                    soroban_sdk::vec![&env, org_id.into_val(&env), root.clone().into_val(&env)],
                );
                if !known {
                    panic_with_error!(&env, ProtocolError::RootUnknown);
                }
            }
        }

        let null_key = DataKey::Nullifier(org_id, proposal_id, nullifier.clone());
        if env.storage().persistent().has(&null_key) {
            panic_with_error!(&env, ProtocolError::NullifierReused);
        }

        let vk = Self::get_vk(env.clone(), org_id, proposal.vk_version);

        if let Err(err) = validate_proof(&proof) {
            panic_with_error!(&env, err);
        }

        let choice_signal = if choice {
            U256::from_u32(&env, 1)
        } else {
            U256::from_u32(&env, 0)
        };
        let org_signal = U256::from_u128(&env, org_id as u128);
        let proposal_signal = U256::from_u128(&env, proposal_id as u128);

        let pub_signals = soroban_sdk::vec![
            &env,
            root.clone(),
            nullifier.clone(),
            org_signal,
            proposal_signal,
            choice_signal,
            commitment.clone()
        ];

        if !verify_groth16(&env, &vk, &proof, &pub_signals) {
            panic_with_error!(&env, ProtocolError::ProofInvalid);
        }

        // Nullifier insert and tally update land in the same invocation, so
        // they commit (or roll back) together.
        env.storage().persistent().set(&null_key, &true);

        if choice {
            proposal.yes_votes += 1;
        } else {
            proposal.no_votes += 1;
        }
        env.storage().persistent().set(&prop_key, &proposal);

        VoteCastEvent {
            org_id,
            proposal_id,
            choice,
            nullifier,
        }
        .publish(&env);
    }

    /// Close a proposal before its deadline (org admin only).
    pub fn close_proposal(env: Env, org_id: u64, proposal_id: u64, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        let prop_key = DataKey::Proposal(org_id, proposal_id);
        let mut proposal: ProposalInfo = env
            .storage()
            .persistent()
            .get(&prop_key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::ProposalNotFound));

        if proposal.closed {
            panic_with_error!(&env, ProtocolError::ProposalClosed);
        }

        proposal.closed = true;
        env.storage().persistent().set(&prop_key, &proposal);

        ProposalClosedEvent {
            org_id,
            proposal_id,
        }
        .publish(&env);
    }

    /// Get proposal info.
    pub fn get_proposal(env: Env, org_id: u64, proposal_id: u64) -> ProposalInfo {
        env.storage()
            .persistent()
            .get(&DataKey::Proposal(org_id, proposal_id))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::ProposalNotFound))
    }

    /// Proposal count for an org.
    pub fn proposal_count(env: Env, org_id: u64) -> u64 {
        env.storage()
            .instance()
            .get(&DataKey::ProposalCount(org_id))
            .unwrap_or(0)
    }

    /// Eligibility mode of a proposal (consumed by the comments contract).
    pub fn get_vote_mode(env: Env, org_id: u64, proposal_id: u64) -> VoteMode {
        Self::get_proposal(env, org_id, proposal_id).vote_mode
    }

    /// Root snapshot of a proposal; `None` for trailing mode.
    pub fn get_eligible_root(env: Env, org_id: u64, proposal_id: u64) -> Option<U256> {
        Self::get_proposal(env, org_id, proposal_id).eligible_root
    }

    /// (yes_votes, no_votes).
    pub fn get_results(env: Env, org_id: u64, proposal_id: u64) -> (u64, u64) {
        let proposal = Self::get_proposal(env, org_id, proposal_id);
        (proposal.yes_votes, proposal.no_votes)
    }

    /// Whether a nullifier has been spent on a proposal.
    pub fn is_nullifier_spent(env: Env, org_id: u64, proposal_id: u64, nullifier: U256) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Nullifier(org_id, proposal_id, nullifier))
    }

    /// Get the forest contract address.
    pub fn forest_contract(env: Env) -> Address {
        Self::forest_addr(&env)
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn store_vote_vk(env: &Env, org_id: u64, vk: VerificationKey) -> u32 {
        if let Err(err) = validate_vk(&vk) {
            panic_with_error!(env, err);
        }

        let version: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::VoteVkVersion(org_id))
            .unwrap_or(0)
            + 1;
        env.storage()
            .persistent()
            .set(&DataKey::VoteVk(org_id, version), &vk);
        env.storage()
            .persistent()
            .set(&DataKey::VoteVkVersion(org_id), &version);

        version
    }

    // Admin, or badge holder when the org allows member proposals.
    fn assert_may_propose(env: &Env, org_id: u64, creator: &Address) {
        let registry = Self::registry_addr(env);
        let org_admin: Address = env.invoke_contract(
            &registry,
            &symbol_short!("get_admin"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if &org_admin == creator {
            return;
        }

        let members_can: bool = env.invoke_contract(
            &registry,
            &Symbol::new(env, "members_can_propose"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if !members_can {
            panic_with_error!(env, ProtocolError::NotAdmin);
        }

        let badge = Self::badge_addr(env);
        let is_member: bool = env.invoke_contract(
            &badge,
            &symbol_short!("has"),
            soroban_sdk::vec![env, org_id.into_val(env), creator.clone().into_val(env)],
        );
        if !is_member {
            panic_with_error!(env, ProtocolError::NotMember);
        }
    }

    fn next_proposal_id(env: &Env, org_id: u64) -> u64 {
        let count_key = DataKey::ProposalCount(org_id);
        let count: u64 = env.storage().instance().get(&count_key).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&count_key, &new_id);
        new_id
    }

    fn forest_addr(env: &Env) -> Address {
        env.storage()
            .instance()
            .get(&FOREST_CONTRACT)
            .unwrap_or_else(|| panic_with_error!(env, ProtocolError::ContractNotSet))
    }

    fn badge_addr(env: &Env) -> Address {
        let forest = Self::forest_addr(env);
        env.invoke_contract(
            &forest,
            &Symbol::new(env, "badge_contract"),
            soroban_sdk::vec![env],
        )
    }

    fn registry_addr(env: &Env) -> Address {
        let badge = Self::badge_addr(env);
        env.invoke_contract(&badge, &symbol_short!("registry"), soroban_sdk::vec![env])
    }

    fn org_admin(env: &Env, org_id: u64) -> Address {
        let registry = Self::registry_addr(env);
        env.invoke_contract(
            &registry,
            &symbol_short!("get_admin"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        )
    }
}
