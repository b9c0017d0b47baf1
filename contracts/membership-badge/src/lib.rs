//! # Membership Badge
//!
//! Per-org soul-bound membership. A badge is a boolean membership record with
//! a revocation flag; it carries no cryptographic material. Badges gate who
//! may register an identity commitment in the Merkle forest and who may open
//! proposals — nothing here can link a badge holder to a vote.

#![no_std]
use protocol_core::ProtocolError;
use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, symbol_short, Address, Env, IntoVal,
    Symbol, Vec,
};

const REGISTRY: Symbol = symbol_short!("registry");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Member(u64, Address),    // (org_id, address) -> bool
    Revoked(u64, Address),   // (org_id, address) -> bool
    MemberCount(u64),        // org_id -> total members ever minted
    MemberAtIndex(u64, u64), // (org_id, index) -> Address
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct BadgeMintEvent {
    #[topic]
    pub org_id: u64,
    pub to: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct BadgeRevokeEvent {
    #[topic]
    pub org_id: u64,
    pub member: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct BadgeLeaveEvent {
    #[topic]
    pub org_id: u64,
    pub member: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct MembershipBadge;

#[contractimpl]
impl MembershipBadge {
    /// Constructor: wire the org registry address.
    pub fn __constructor(env: Env, registry: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, ProtocolError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&REGISTRY, &registry);
    }

    fn registry_addr(env: &Env) -> Address {
        env.storage()
            .instance()
            .get(&REGISTRY)
            .unwrap_or_else(|| panic_with_error!(env, ProtocolError::ContractNotSet))
    }

    fn assert_org_admin(env: &Env, org_id: u64, admin: &Address) {
        let registry = Self::registry_addr(env);
        let org_admin: Address = env.invoke_contract(
            &registry,
            &symbol_short!("get_admin"),
            soroban_sdk::vec![env, org_id.into_val(env)],
        );
        if &org_admin != admin {
            panic_with_error!(env, ProtocolError::NotAdmin);
        }
    }

    // Append to the enumeration list.
    fn record_member(env: &Env, org_id: u64, member: &Address) {
        let count_key = DataKey::MemberCount(org_id);
        let count: u64 = env.storage().persistent().get(&count_key).unwrap_or(0);

        env.storage()
            .persistent()
            .set(&DataKey::MemberAtIndex(org_id, count), member);
        env.storage().persistent().set(&count_key, &(count + 1));
    }

    fn grant(env: &Env, org_id: u64, to: &Address) {
        if Self::has(env.clone(), org_id, to.clone()) {
            panic_with_error!(env, ProtocolError::AlreadyMember);
        }

        let member_key = DataKey::Member(org_id, to.clone());
        let revoked_key = DataKey::Revoked(org_id, to.clone());

        // First grant vs. re-grant after revocation.
        let is_new_member = !env.storage().persistent().has(&member_key);

        env.storage().persistent().set(&member_key, &true);
        if env.storage().persistent().has(&revoked_key) {
            env.storage().persistent().remove(&revoked_key);
        }

        if is_new_member {
            Self::record_member(env, org_id, to);
        }

        BadgeMintEvent {
            org_id,
            to: to.clone(),
        }
        .publish(env);
    }

    /// Mint a badge (org admin only). Re-minting to a previously revoked
    /// member clears the revocation flag.
    pub fn mint(env: Env, org_id: u64, to: Address, admin: Address) {
        admin.require_auth();
        Self::assert_org_admin(&env, org_id, &admin);
        Self::grant(&env, org_id, &to);
    }

    /// Mint during `create_and_init_org`. Authenticated against the registry
    /// contract's own address, so only the registry orchestration reaches it.
    pub fn mint_from_registry(env: Env, org_id: u64, to: Address) {
        Self::registry_addr(&env).require_auth();
        Self::grant(&env, org_id, &to);
    }

    /// Join an org with open membership.
    pub fn self_join(env: Env, org_id: u64, member: Address) {
        member.require_auth();

        let registry = Self::registry_addr(&env);
        let membership_open: bool = env.invoke_contract(
            &registry,
            &Symbol::new(&env, "is_membership_open"),
            soroban_sdk::vec![&env, org_id.into_val(&env)],
        );
        if !membership_open {
            panic_with_error!(&env, ProtocolError::MembershipClosed);
        }

        Self::grant(&env, org_id, &member);
    }

    /// True when the address holds an unrevoked badge for the org.
    pub fn has(env: Env, org_id: u64, of: Address) -> bool {
        let member_key = DataKey::Member(org_id, of.clone());
        let revoked_key = DataKey::Revoked(org_id, of);

        let holds_badge = env.storage().persistent().get(&member_key).unwrap_or(false);
        let is_revoked = env
            .storage()
            .persistent()
            .get(&revoked_key)
            .unwrap_or(false);

        holds_badge && !is_revoked
    }

    /// Revoke a badge (org admin only). The member record and enumeration
    /// entry stay; revocation is a flag. The Merkle forest is untouched —
    /// removing the member's leaf is a separate, explicit forest operation.
    pub fn revoke(env: Env, org_id: u64, member: Address, admin: Address) {
        admin.require_auth();
        Self::assert_org_admin(&env, org_id, &admin);

        let member_key = DataKey::Member(org_id, member.clone());
        if !env.storage().persistent().has(&member_key) {
            panic_with_error!(&env, ProtocolError::NotMember);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Revoked(org_id, member.clone()), &true);

        BadgeRevokeEvent { org_id, member }.publish(&env);
    }

    /// Leave an org voluntarily (self-revocation).
    pub fn leave(env: Env, org_id: u64, member: Address) {
        member.require_auth();

        let member_key = DataKey::Member(org_id, member.clone());
        if !env.storage().persistent().has(&member_key) {
            panic_with_error!(&env, ProtocolError::NotMember);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Revoked(org_id, member.clone()), &true);

        BadgeLeaveEvent { org_id, member }.publish(&env);
    }

    /// Get the registry address.
    pub fn registry(env: Env) -> Address {
        Self::registry_addr(&env)
    }

    /// Total members ever minted for an org (revocations do not decrement).
    pub fn member_count(env: Env, org_id: u64) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::MemberCount(org_id))
            .unwrap_or(0)
    }

    /// Member address at an enumeration index.
    pub fn member_at(env: Env, org_id: u64, index: u64) -> Option<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::MemberAtIndex(org_id, index))
    }

    /// Page through the enumeration list.
    pub fn get_members(env: Env, org_id: u64, offset: u64, limit: u64) -> Vec<Address> {
        let mut members = Vec::new(&env);
        let count = Self::member_count(env.clone(), org_id);

        let end = core::cmp::min(offset + limit, count);
        for i in offset..end {
            if let Some(member) = Self::member_at(env.clone(), org_id, i) {
                members.push_back(member);
            }
        }

        members
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }
}
