#![no_std]
use protocol_core::{ProtocolError, VerificationKey};
use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, symbol_short, Address, Env, IntoVal,
    String, Symbol,
};

const ORG_COUNT: Symbol = symbol_short!("org_cnt");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

/// Org names are bounded.
const MAX_ORG_NAME_LEN: u32 = 24;

#[contracttype]
#[derive(Clone)]
pub struct OrgInfo {
    pub id: u64,
    pub name: String,
    pub admin: Address,
    pub created_at: u64,
    /// If true, anyone can join (mint their own badge).
    pub membership_open: bool,
    /// If true, any member can open proposals. If false, only the admin.
    pub members_can_propose: bool,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct OrgCreatedEvent {
    #[topic]
    pub org_id: u64,
    pub admin: Address,
    pub name: String,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct AdminHandoverEvent {
    #[topic]
    pub org_id: u64,
    pub old_admin: Address,
    pub new_admin: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct OrgRegistry;

#[contractimpl]
impl OrgRegistry {
    /// Create a new org (permissionless). The creator becomes its admin;
    /// creating an org on someone else's behalf is not possible.
    pub fn create_org(
        env: Env,
        name: String,
        creator: Address,
        membership_open: bool,
        members_can_propose: bool,
    ) -> u64 {
        creator.require_auth();

        if name.len() > MAX_ORG_NAME_LEN {
            panic_with_error!(&env, ProtocolError::NameTooLong);
        }

        let org_id = Self::next_org_id(&env);

        let info = OrgInfo {
            id: org_id,
            name: name.clone(),
            admin: creator.clone(),
            created_at: env.ledger().timestamp(),
            membership_open,
            members_can_propose,
        };

        env.storage().persistent().set(&Self::org_key(org_id), &info);

        OrgCreatedEvent {
            org_id,
            admin: creator,
            name,
        }
        .publish(&env);

        org_id
    }

    /// Get org info.
    pub fn get_org(env: Env, org_id: u64) -> OrgInfo {
        env.storage()
            .persistent()
            .get(&Self::org_key(org_id))
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::OrgNotFound))
    }

    /// Check if an org exists.
    pub fn org_exists(env: Env, org_id: u64) -> bool {
        env.storage().persistent().has(&Self::org_key(org_id))
    }

    /// Get the admin of an org.
    pub fn get_admin(env: Env, org_id: u64) -> Address {
        Self::get_org(env, org_id).admin
    }

    /// Hand admin rights to a new address (current admin only).
    pub fn transfer_admin(env: Env, org_id: u64, new_admin: Address) {
        let key = Self::org_key(org_id);
        let mut info: OrgInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::OrgNotFound));

        info.admin.require_auth();

        let old_admin = info.admin.clone();
        info.admin = new_admin.clone();
        env.storage().persistent().set(&key, &info);

        AdminHandoverEvent {
            org_id,
            old_admin,
            new_admin,
        }
        .publish(&env);
    }

    /// Total number of orgs created.
    pub fn org_count(env: Env) -> u64 {
        env.storage().instance().get(&ORG_COUNT).unwrap_or(0)
    }

    /// Whether an org lets members join on their own.
    pub fn is_membership_open(env: Env, org_id: u64) -> bool {
        Self::get_org(env, org_id).membership_open
    }

    /// Whether members (vs. only the admin) can open proposals.
    pub fn members_can_propose(env: Env, org_id: u64) -> bool {
        Self::get_org(env, org_id).members_can_propose
    }

    /// Flip the proposal policy (admin only).
    pub fn set_proposal_policy(env: Env, org_id: u64, members_can_propose: bool, admin: Address) {
        admin.require_auth();

        let key = Self::org_key(org_id);
        let mut info: OrgInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::OrgNotFound));

        if admin != info.admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        info.members_can_propose = members_can_propose;
        env.storage().persistent().set(&key, &info);
    }

    /// Open or close self-service membership (admin only).
    pub fn set_membership_open(env: Env, org_id: u64, membership_open: bool, admin: Address) {
        admin.require_auth();

        let key = Self::org_key(org_id);
        let mut info: OrgInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::OrgNotFound));

        if admin != info.admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        info.membership_open = membership_open;
        env.storage().persistent().set(&key, &info);
    }

    /// Rename the org (admin only).
    pub fn set_name(env: Env, org_id: u64, name: String, admin: Address) {
        admin.require_auth();

        if name.len() > MAX_ORG_NAME_LEN {
            panic_with_error!(&env, ProtocolError::NameTooLong);
        }

        let key = Self::org_key(org_id);
        let mut info: OrgInfo = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, ProtocolError::OrgNotFound));

        if admin != info.admin {
            panic_with_error!(&env, ProtocolError::NotAdmin);
        }

        info.name = name;
        env.storage().persistent().set(&key, &info);
    }

    /// Create and fully wire an org in one transaction:
    /// 1. registry entry,
    /// 2. creator badge (`membership-badge::mint_from_registry`),
    /// 3. Merkle tree (`identity-forest::init_from_registry`),
    /// 4. vote verification key (`ballot::set_vk_from_registry`).
    ///
    /// The callee endpoints authenticate this contract's address, so they are
    /// only reachable through this orchestration.
    pub fn create_and_init_org(
        env: Env,
        name: String,
        creator: Address,
        membership_open: bool,
        members_can_propose: bool,
        badge_contract: Address,
        forest_contract: Address,
        ballot_contract: Address,
        tree_depth: u32,
        vk: VerificationKey,
    ) -> u64 {
        creator.require_auth();

        if name.len() > MAX_ORG_NAME_LEN {
            panic_with_error!(&env, ProtocolError::NameTooLong);
        }

        let org_id = Self::next_org_id(&env);
        let info = OrgInfo {
            id: org_id,
            name: name.clone(),
            admin: creator.clone(),
            created_at: env.ledger().timestamp(),
            membership_open,
            members_can_propose,
        };
        env.storage().persistent().set(&Self::org_key(org_id), &info);

        OrgCreatedEvent {
            org_id,
            admin: creator.clone(),
            name,
        }
        .publish(&env);

        env.invoke_contract::<()>(
            &badge_contract,
            &Symbol::new(&env, "mint_from_registry"),
            soroban_sdk::vec![&env, org_id.into_val(&env), creator.clone().into_val(&env)],
        );

        env.invoke_contract::<()>(
            &forest_contract,
            &Symbol::new(&env, "init_from_registry"),
            soroban_sdk::vec![&env, org_id.into_val(&env), tree_depth.into_val(&env)],
        );

        env.invoke_contract::<()>(
            &ballot_contract,
            &Symbol::new(&env, "set_vk_from_registry"),
            soroban_sdk::vec![&env, org_id.into_val(&env), vk.into_val(&env)],
        );

        org_id
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn next_org_id(env: &Env) -> u64 {
        // Lazily record contract version on first mutation
        if !env.storage().instance().has(&VERSION_KEY) {
            env.storage().instance().set(&VERSION_KEY, &VERSION);
            ContractUpgraded {
                from: 0,
                to: VERSION,
            }
            .publish(env);
        }

        let count: u64 = env.storage().instance().get(&ORG_COUNT).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&ORG_COUNT, &new_id);
        new_id
    }

    fn org_key(org_id: u64) -> (Symbol, u64) {
        (symbol_short!("org"), org_id)
    }
}
