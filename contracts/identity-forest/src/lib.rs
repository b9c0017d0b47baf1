//! # Identity Forest
//!
//! One fixed-depth Poseidon Merkle tree per org. Leaves are identity
//! commitments `Poseidon₂(secret, salt)`; empty slots are plain `0` and the
//! internal zero ladder is `z[0] = 0`, `z[i+1] = Poseidon₂(z[i], z[i])`, so
//! roots match the off-chain circom prover bit for bit.
//!
//! Registration always appends at the frontier. Removal zeroes the leaf and
//! recomputes the O(depth) path; the index is never reused — the only way a
//! zeroed slot comes back to life is an admin `reinstate`. Every root
//! revision is pushed into a 32-entry recent-roots ring consumed by
//! trailing-mode eligibility checks.

#![no_std]
use protocol_core::{require_in_fr, ProtocolError};
use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, symbol_short, Address, Env, IntoVal,
    Symbol, Vec, U256,
};

const BADGE_CONTRACT: Symbol = symbol_short!("badge");
const ZEROS_CACHE: Symbol = symbol_short!("zeros");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

/// Recent-roots ring capacity (H). Frozen; trailing-mode proofs bound to a
/// root older than the last H revisions are rejected.
const MAX_ROOTS: u32 = 32;

/// Supports ~262K members (2^18 = 262,144)
const MAX_TREE_DEPTH: u32 = 18;

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    TreeDepth(u64),                // org_id -> depth
    NextLeafIndex(u64),            // org_id -> append frontier
    FilledSubtrees(u64),           // org_id -> Vec<U256>
    RootsRing(u64),                // org_id -> Vec<U256>, newest last
    LeafIndex(u64, U256),          // (org_id, commitment) -> leaf index
    MemberLeafIndex(u64, Address), // (org_id, member) -> leaf index
    LeafValue(u64, u32),           // (org_id, index) -> commitment (0 if removed)
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ForestInitEvent {
    #[topic]
    pub org_id: u64,
    pub depth: u32,
    pub empty_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeafAppendedEvent {
    #[topic]
    pub org_id: u64,
    pub commitment: U256,
    pub index: u32,
    pub new_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeafZeroedEvent {
    #[topic]
    pub org_id: u64,
    pub index: u32,
    pub new_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct LeafRestoredEvent {
    #[topic]
    pub org_id: u64,
    pub index: u32,
    pub new_root: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct IdentityForest;

#[contractimpl]
impl IdentityForest {
    /// Constructor: wire the badge contract and precompute the zero ladder so
    /// the cost is paid at deployment rather than on the first org's init.
    pub fn __constructor(env: Env, badge_contract: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, ProtocolError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&BADGE_CONTRACT, &badge_contract);

        Self::ensure_zeros_cache(&env);
    }

    /// Initialize the tree for an org (org admin only). Depth is frozen at
    /// init; production orgs use the full 18 levels.
    pub fn init(env: Env, org_id: u64, depth: u32, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        Self::init_storage(&env, org_id, depth);
    }

    /// Tree initialization reached only through the registry's
    /// `create_and_init_org` orchestration.
    pub fn init_from_registry(env: Env, org_id: u64, depth: u32) {
        Self::registry_addr(&env).require_auth();
        Self::init_storage(&env, org_id, depth);
    }

    /// Append an identity commitment (badge holders only). Appends at the
    /// frontier, advances the root, and pushes it into the ring.
    pub fn register(env: Env, org_id: u64, commitment: U256, caller: Address) {
        caller.require_auth();

        let badge_contract = Self::badge_addr(&env);
        let is_member: bool = env.invoke_contract(
            &badge_contract,
            &symbol_short!("has"),
            soroban_sdk::vec![&env, org_id.into_val(&env), caller.clone().into_val(&env)],
        );
        if !is_member {
            panic_with_error!(&env, ProtocolError::NotMember);
        }

        let depth = Self::depth_of(&env, org_id);
        require_in_fr(&env, &commitment);
        // Zero is the empty-leaf marker and can never be a commitment.
        if commitment == Self::zero_value(&env) {
            panic_with_error!(&env, ProtocolError::DuplicateCommitment);
        }

        // A commitment may only re-enter if its previous slot was zeroed.
        let leaf_key = DataKey::LeafIndex(org_id, commitment.clone());
        if let Some(existing) = env.storage().persistent().get::<DataKey, u32>(&leaf_key) {
            let live: U256 = env
                .storage()
                .persistent()
                .get(&DataKey::LeafValue(org_id, existing))
                .unwrap_or_else(|| Self::zero_value(&env));
            if live == commitment {
                panic_with_error!(&env, ProtocolError::DuplicateCommitment);
            }
        }

        // One live leaf per member; a member whose leaf was zeroed may come
        // back with fresh credentials.
        let member_key = DataKey::MemberLeafIndex(org_id, caller.clone());
        if let Some(existing) = env.storage().persistent().get::<DataKey, u32>(&member_key) {
            let live: U256 = env
                .storage()
                .persistent()
                .get(&DataKey::LeafValue(org_id, existing))
                .unwrap_or_else(|| Self::zero_value(&env));
            if live != Self::zero_value(&env) {
                panic_with_error!(&env, ProtocolError::AlreadyMember);
            }
        }

        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotInitialized));

        if next_index >= (1u32 << depth) {
            panic_with_error!(&env, ProtocolError::Full);
        }

        let new_root = Self::append_leaf(&env, org_id, commitment.clone(), next_index, depth);

        env.storage()
            .persistent()
            .set(&DataKey::NextLeafIndex(org_id), &(next_index + 1));
        env.storage().persistent().set(&leaf_key, &next_index);
        env.storage().persistent().set(&member_key, &next_index);
        env.storage()
            .persistent()
            .set(&DataKey::LeafValue(org_id, next_index), &commitment);

        LeafAppendedEvent {
            org_id,
            commitment,
            index: next_index,
            new_root,
        }
        .publish(&env);
    }

    /// Zero out a leaf (org admin only). The index stays occupied; the member
    /// can only return through `reinstate` or a fresh registration.
    pub fn remove(env: Env, org_id: u64, leaf_index: u32, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        Self::zero_leaf(&env, org_id, leaf_index);
    }

    /// Zero out a member's leaf by address (org admin only).
    pub fn remove_member(env: Env, org_id: u64, member: Address, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        let leaf_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::MemberLeafIndex(org_id, member))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotMember));

        Self::zero_leaf(&env, org_id, leaf_index);
    }

    /// Zero out the caller's own leaf (self-service exit from the voter set).
    pub fn remove_self(env: Env, org_id: u64, caller: Address) {
        caller.require_auth();

        let leaf_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::MemberLeafIndex(org_id, caller))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotMember));

        Self::zero_leaf(&env, org_id, leaf_index);
    }

    /// Write a commitment back into a zeroed slot (org admin only).
    pub fn reinstate(env: Env, org_id: u64, leaf_index: u32, commitment: U256, admin: Address) {
        admin.require_auth();

        let org_admin = Self::org_admin(&env, org_id);
        if org_admin != admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        let depth = Self::depth_of(&env, org_id);
        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap();
        if leaf_index >= next_index {
            panic_with_error!(&env, ProtocolError::LeafOutOfBounds);
        }

        require_in_fr(&env, &commitment);
        if commitment == Self::zero_value(&env) {
            panic_with_error!(&env, ProtocolError::DuplicateCommitment);
        }

        let current: U256 = env
            .storage()
            .persistent()
            .get(&DataKey::LeafValue(org_id, leaf_index))
            .unwrap_or_else(|| Self::zero_value(&env));
        if current != Self::zero_value(&env) {
            panic_with_error!(&env, ProtocolError::LeafNotEmpty);
        }

        // The commitment must not be live anywhere else in the tree.
        let leaf_key = DataKey::LeafIndex(org_id, commitment.clone());
        if let Some(existing) = env.storage().persistent().get::<DataKey, u32>(&leaf_key) {
            let live: U256 = env
                .storage()
                .persistent()
                .get(&DataKey::LeafValue(org_id, existing))
                .unwrap_or_else(|| Self::zero_value(&env));
            if live == commitment {
                panic_with_error!(&env, ProtocolError::DuplicateCommitment);
            }
        }

        env.storage()
            .persistent()
            .set(&DataKey::LeafValue(org_id, leaf_index), &commitment);
        env.storage().persistent().set(&leaf_key, &leaf_index);

        let new_root = Self::recompute_path(&env, org_id, leaf_index, depth);

        LeafRestoredEvent {
            org_id,
            index: leaf_index,
            new_root,
        }
        .publish(&env);
    }

    /// Current root for an org.
    pub fn current_root(env: Env, org_id: u64) -> U256 {
        let ring: Vec<U256> = env
            .storage()
            .persistent()
            .get(&DataKey::RootsRing(org_id))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotInitialized));
        ring.get(ring.len().saturating_sub(1))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotInitialized))
    }

    /// Current root (short alias for cross-contract calls).
    pub fn get_root(env: Env, org_id: u64) -> U256 {
        Self::current_root(env, org_id)
    }

    /// True iff the root is the current root or one of the last H revisions.
    pub fn is_known_root(env: Env, org_id: u64, root: U256) -> bool {
        let key = DataKey::RootsRing(org_id);
        if !env.storage().persistent().has(&key) {
            return false;
        }
        let ring: Vec<U256> = env.storage().persistent().get(&key).unwrap();
        for i in 0..ring.len() {
            if ring.get(i).unwrap() == root {
                return true;
            }
        }
        false
    }

    /// Leaf index for a commitment. The index survives removal (the slot is
    /// zeroed, never freed).
    pub fn leaf_index_of(env: Env, org_id: u64, commitment: U256) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::LeafIndex(org_id, commitment))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotMember))
    }

    /// Leaf index registered by a member address.
    pub fn member_leaf_index(env: Env, org_id: u64, member: Address) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::MemberLeafIndex(org_id, member))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::NotMember))
    }

    /// Stored leaf value at an index (0 for a removed member).
    pub fn leaf_value(env: Env, org_id: u64, leaf_index: u32) -> U256 {
        env.storage()
            .persistent()
            .get(&DataKey::LeafValue(org_id, leaf_index))
            .unwrap_or_else(|| Self::zero_value(&env))
    }

    /// (depth, next free index, current root).
    pub fn tree_info(env: Env, org_id: u64) -> (u32, u32, U256) {
        let depth = Self::depth_of(&env, org_id);
        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap();
        let root = Self::current_root(env, org_id);
        (depth, next_index, root)
    }

    /// Merkle path for a leaf: (siblings, directions), level 0 first.
    /// Direction 0 means the leaf's node is the left child at that level.
    pub fn merkle_path(env: Env, org_id: u64, leaf_index: u32) -> (Vec<U256>, Vec<u32>) {
        let depth = Self::depth_of(&env, org_id);
        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap();

        if leaf_index >= next_index {
            panic_with_error!(&env, ProtocolError::LeafOutOfBounds);
        }

        let mut siblings = Vec::new(&env);
        let mut directions = Vec::new(&env);
        let mut current_index = leaf_index;

        for level in 0..depth {
            let is_left = current_index % 2 == 0;
            directions.push_back(if is_left { 0 } else { 1 });

            let sibling_index = if is_left {
                current_index + 1
            } else {
                current_index - 1
            };
            siblings.push_back(Self::node_hash(&env, org_id, sibling_index, level, next_index));

            current_index /= 2;
        }

        (siblings, directions)
    }

    /// Get the badge contract address.
    pub fn badge_contract(env: Env) -> Address {
        Self::badge_addr(&env)
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal: shared init body.
    fn init_storage(env: &Env, org_id: u64, depth: u32) {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            panic_with_error!(env, ProtocolError::InvalidDepth);
        }

        let depth_key = DataKey::TreeDepth(org_id);
        if env.storage().persistent().has(&depth_key) {
            panic_with_error!(env, ProtocolError::AlreadyInitialized);
        }

        env.storage().persistent().set(&depth_key, &depth);
        env.storage()
            .persistent()
            .set(&DataKey::NextLeafIndex(org_id), &0u32);

        let mut filled = Vec::new(env);
        for level in 0..depth {
            filled.push_back(Self::zero_at_level_cached(env, level));
        }
        env.storage()
            .persistent()
            .set(&DataKey::FilledSubtrees(org_id), &filled);

        let empty_root = Self::zero_at_level_cached(env, depth);
        let mut ring = Vec::new(env);
        ring.push_back(empty_root.clone());
        env.storage()
            .persistent()
            .set(&DataKey::RootsRing(org_id), &ring);

        ForestInitEvent {
            org_id,
            depth,
            empty_root,
        }
        .publish(env);
    }

    // Internal: append at the frontier using the filled-subtrees cache.
    fn append_leaf(env: &Env, org_id: u64, leaf: U256, index: u32, depth: u32) -> U256 {
        let mut filled: Vec<U256> = env
            .storage()
            .persistent()
            .get(&DataKey::FilledSubtrees(org_id))
            .unwrap();

        let mut current_hash = leaf;
        let mut current_index = index;

        for level in 0..depth {
            if current_index % 2 == 0 {
                // Left child: cache it for the future right sibling, pair
                // with the empty subtree on the right.
                filled.set(level, current_hash.clone());
                let zero = Self::zero_at_level_cached(env, level);
                current_hash = Self::hash_pair(env, &current_hash, &zero);
            } else {
                // Right child: consume the cached left sibling.
                let left = filled.get(level).unwrap();
                current_hash = Self::hash_pair(env, &left, &current_hash);
            }
            current_index /= 2;
        }

        env.storage()
            .persistent()
            .set(&DataKey::FilledSubtrees(org_id), &filled);

        Self::push_root(env, org_id, current_hash.clone());
        current_hash
    }

    // Internal: zero a live leaf and recompute its path.
    fn zero_leaf(env: &Env, org_id: u64, leaf_index: u32) {
        let depth = Self::depth_of(env, org_id);
        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap();
        if leaf_index >= next_index {
            panic_with_error!(env, ProtocolError::LeafOutOfBounds);
        }

        let current: U256 = env
            .storage()
            .persistent()
            .get(&DataKey::LeafValue(org_id, leaf_index))
            .unwrap_or_else(|| Self::zero_value(env));
        if current == Self::zero_value(env) {
            panic_with_error!(env, ProtocolError::LeafAlreadyEmpty);
        }

        env.storage()
            .persistent()
            .set(&DataKey::LeafValue(org_id, leaf_index), &Self::zero_value(env));

        let new_root = Self::recompute_path(env, org_id, leaf_index, depth);

        LeafZeroedEvent {
            org_id,
            index: leaf_index,
            new_root,
        }
        .publish(env);
    }

    // Internal: recompute the path from a rewritten leaf to the root,
    // refreshing the filled-subtrees cache wherever the rewritten node is
    // the left sibling the append frontier will consume next.
    fn recompute_path(env: &Env, org_id: u64, leaf_index: u32, depth: u32) -> U256 {
        let next_index: u32 = env
            .storage()
            .persistent()
            .get(&DataKey::NextLeafIndex(org_id))
            .unwrap();
        let mut filled: Vec<U256> = env
            .storage()
            .persistent()
            .get(&DataKey::FilledSubtrees(org_id))
            .unwrap();

        let mut current_hash: U256 = env
            .storage()
            .persistent()
            .get(&DataKey::LeafValue(org_id, leaf_index))
            .unwrap_or_else(|| Self::zero_value(env));
        let mut current_index = leaf_index;

        for level in 0..depth {
            let frontier_node = next_index >> level;
            if frontier_node % 2 == 1 && current_index == frontier_node - 1 {
                filled.set(level, current_hash.clone());
            }

            let is_left = current_index % 2 == 0;
            let sibling_index = if is_left {
                current_index + 1
            } else {
                current_index - 1
            };
            let sibling = Self::node_hash(env, org_id, sibling_index, level, next_index);

            current_hash = if is_left {
                Self::hash_pair(env, &current_hash, &sibling)
            } else {
                Self::hash_pair(env, &sibling, &current_hash)
            };
            current_index /= 2;
        }

        env.storage()
            .persistent()
            .set(&DataKey::FilledSubtrees(org_id), &filled);

        Self::push_root(env, org_id, current_hash.clone());
        current_hash
    }

    // Internal: hash of the node (level, node_index), reconstructed from the
    // stored leaves with the zero ladder substituted past the frontier.
    fn node_hash(env: &Env, org_id: u64, node_index: u32, level: u32, next_index: u32) -> U256 {
        let start_leaf = node_index << level;
        if start_leaf >= next_index {
            return Self::zero_at_level_cached(env, level);
        }
        if level == 0 {
            return env
                .storage()
                .persistent()
                .get(&DataKey::LeafValue(org_id, node_index))
                .unwrap_or_else(|| Self::zero_value(env));
        }

        let left = Self::node_hash(env, org_id, node_index * 2, level - 1, next_index);
        let right = Self::node_hash(env, org_id, node_index * 2 + 1, level - 1, next_index);
        Self::hash_pair(env, &left, &right)
    }

    // Internal: push a root revision, evicting the oldest past H entries.
    fn push_root(env: &Env, org_id: u64, root: U256) {
        let mut ring: Vec<U256> = env
            .storage()
            .persistent()
            .get(&DataKey::RootsRing(org_id))
            .unwrap();

        ring.push_back(root);
        if ring.len() > MAX_ROOTS {
            let mut trimmed = Vec::new(env);
            for i in 1..ring.len() {
                trimmed.push_back(ring.get(i).unwrap());
            }
            ring = trimmed;
        }

        env.storage()
            .persistent()
            .set(&DataKey::RootsRing(org_id), &ring);
    }

    // Internal: Poseidon hash of two field elements (BN254, circomlib params).
    fn hash_pair(env: &Env, left: &U256, right: &U256) -> U256 {
        let field = Symbol::new(env, "BN254");
        let inputs = soroban_sdk::vec![env, left.clone(), right.clone()];
        env.crypto().poseidon_hash(&inputs, field)
    }

    fn zero_value(_env: &Env) -> U256 {
        U256::from_u32(_env, 0)
    }

    // Internal: zeros[0..=MAX_TREE_DEPTH], shared across all orgs.
    fn ensure_zeros_cache(env: &Env) {
        if env.storage().instance().has(&ZEROS_CACHE) {
            return;
        }

        let mut zeros = Vec::new(env);
        let mut current = Self::zero_value(env);
        zeros.push_back(current.clone());
        for _ in 0..MAX_TREE_DEPTH {
            current = Self::hash_pair(env, &current, &current);
            zeros.push_back(current.clone());
        }

        env.storage().instance().set(&ZEROS_CACHE, &zeros);
    }

    fn zero_at_level_cached(env: &Env, level: u32) -> U256 {
        Self::ensure_zeros_cache(env);
        let zeros: Vec<U256> = env.storage().instance().get(&ZEROS_CACHE).unwrap();
        zeros.get(level).unwrap()
    }

    fn depth_of(env: &Env, org_id: u64) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::TreeDepth(org_id))
            .unwrap_or_else(|| panic_with_error!(env, ProtocolError::NotInitialized))
    }

    fn badge_addr(env: &Env) -> Address {
        env.storage()
            .instance()
            .get(&BADGE_CONTRACT)
            .unwrap_or_else(|| panic_with_error!(env, ProtocolError::ContractNotSet))
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

// Test-only helpers in a separate contractimpl block so production builds
// carry no references to them.
#[cfg(any(test, feature = "testutils"))]
#[contractimpl]
impl IdentityForest {
    /// Test helper: expose the Poseidon pair hash for KAT verification
    /// against the circomlib vectors.
    pub fn test_poseidon_pair(env: Env, a: U256, b: U256) -> U256 {
        Self::hash_pair(&env, &a, &b)
    }

    /// Test helper: zero-ladder value at a level.
    pub fn test_zero_at_level(env: Env, level: u32) -> U256 {
        Self::zero_at_level_cached(&env, level)
    }
}
