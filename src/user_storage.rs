use crate::error::{DashboardError, Result};
use crate::user_models::{Role, User};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Accounts seeded into a fresh credential store.
pub const DEFAULT_ACCOUNTS: [(&str, &str, Role); 3] = [
    ("admin1", "Admin@123", Role::Admin),
    ("lead1", "Lead@123", Role::ProjectLead),
    ("dev1", "Dev@123", Role::Developer),
];

/// Hashes a new password. Callers sharing the store across tasks run this off
/// the async runtime.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    if password.is_empty() {
        return Err(DashboardError::validation("Password cannot be empty"));
    }
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash is treated the same as a wrong password.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

/// Checks the old password against `current_hash` and hashes the new one.
pub fn rehash_password(current_hash: &str, old_password: &str, new_password: &str, cost: u32) -> Result<String> {
    if new_password.is_empty() {
        return Err(DashboardError::validation("New password cannot be empty"));
    }
    if !verify_password(old_password, current_hash) {
        return Err(DashboardError::WrongOldPassword);
    }
    hash_password(new_password, cost)
}

/// In-memory user records keyed by username.
///
/// Passwords are kept only as bcrypt hashes.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    users: Vec<User>,
    hash_cost: u32,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialStore {
    pub fn new(hash_cost: u32) -> Self {
        Self {
            users: Vec::new(),
            hash_cost,
        }
    }

    pub fn from_users(users: Vec<User>, hash_cost: u32) -> Self {
        Self { users, hash_cost }
    }

    pub fn with_default_accounts(hash_cost: u32) -> Result<Self> {
        let mut store = Self::new(hash_cost);
        for (username, password, role) in DEFAULT_ACCOUNTS {
            store.add_user(username, password, role)?;
        }
        Ok(store)
    }

    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let user = self.users.iter().find(|u| u.username == username)?;
        if verify_password(password, &user.password_hash) {
            Some(user.clone())
        } else {
            debug!(username, "authentication failed");
            None
        }
    }

    /// Fails if `username` is blank or already taken.
    pub fn check_available(&self, username: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DashboardError::validation("Username cannot be empty"));
        }
        if self.users.iter().any(|u| u.username == username) {
            return Err(DashboardError::DuplicateUsername(username.to_string()));
        }
        Ok(())
    }

    pub fn add_user(&mut self, username: &str, password: &str, role: Role) -> Result<User> {
        self.check_available(username)?;
        let password_hash = hash_password(password, self.hash_cost)?;
        self.insert_hashed(username, password_hash, role)
    }

    /// Adds an account whose password was hashed with [`hash_password`].
    pub fn insert_hashed(&mut self, username: &str, password_hash: String, role: Role) -> Result<User> {
        self.check_available(username)?;

        let user = User::new(username.trim().to_string(), password_hash, role);
        self.users.push(user.clone());

        info!(username = %user.username, role = %role, "user added");
        Ok(user)
    }

    pub fn delete_user(&mut self, username: &str) -> Result<()> {
        let before = self.users.len();
        self.users.retain(|u| u.username != username);

        if self.users.len() == before {
            return Err(DashboardError::user_not_found(username));
        }

        info!(username, "user deleted");
        Ok(())
    }

    pub fn change_password(&mut self, username: &str, old_password: &str, new_password: &str) -> Result<()> {
        let current_hash = self
            .get(username)
            .map(|u| u.password_hash.clone())
            .ok_or_else(|| DashboardError::user_not_found(username))?;

        let new_hash = rehash_password(&current_hash, old_password, new_password, self.hash_cost)?;
        self.replace_password_hash(username, &current_hash, new_hash)
    }

    /// Swaps in a hash from [`rehash_password`], provided the stored hash is
    /// still the one the old password was checked against.
    ///
    /// Bumps the account's session generation.
    pub fn replace_password_hash(&mut self, username: &str, previous_hash: &str, new_hash: String) -> Result<()> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| DashboardError::user_not_found(username))?;

        if user.password_hash != previous_hash {
            return Err(DashboardError::WrongOldPassword);
        }

        user.password_hash = new_hash;
        user.session_generation = user.session_generation.wrapping_add(1);
        info!(username, "password changed");
        Ok(())
    }

    pub fn set_role(&mut self, username: &str, role: Role) -> Result<User> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| DashboardError::user_not_found(username))?;

        user.role = role;
        info!(username, role = %role, "role changed");
        Ok(user.clone())
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn list(&self) -> &[User] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn count_by_role(&self) -> BTreeMap<Role, usize> {
        let mut counts: BTreeMap<Role, usize> = Role::ALL.iter().map(|r| (*r, 0)).collect();
        for user in &self.users {
            *counts.entry(user.role).or_default() += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TEST_COST: u32 = 4;

    fn seeded() -> CredentialStore {
        CredentialStore::with_default_accounts(TEST_COST).unwrap()
    }

    #[rstest]
    #[case("admin1", "Admin@123", Role::Admin)]
    #[case("lead1", "Lead@123", Role::ProjectLead)]
    #[case("dev1", "Dev@123", Role::Developer)]
    fn authenticates_default_accounts(#[case] username: &str, #[case] password: &str, #[case] role: Role) {
        let store = seeded();
        let user = store.authenticate(username, password).expect("should authenticate");
        assert_eq!(user.role, role);
    }

    #[rstest]
    #[case("admin1", "admin@123")]
    #[case("admin1", "")]
    #[case("dev1", "Admin@123")]
    #[case("nobody", "Dev@123")]
    fn rejects_wrong_pairs(#[case] username: &str, #[case] password: &str) {
        assert!(seeded().authenticate(username, password).is_none());
    }

    #[test]
    fn stores_hashes_not_passwords() {
        let store = seeded();
        let admin = store.get("admin1").unwrap();
        assert_ne!(admin.password_hash, "Admin@123");
        assert!(admin.password_hash.starts_with("$2"));
    }

    #[test]
    fn duplicate_username_leaves_store_unchanged() {
        let mut store = seeded();
        store.add_user("dev2", "X@1", Role::Developer).unwrap();
        let before = store.list().to_vec();

        let err = store.add_user("dev2", "X@1", Role::Developer).unwrap_err();
        assert!(matches!(err, DashboardError::DuplicateUsername(ref name) if name == "dev2"));
        assert_eq!(store.list(), before.as_slice());
    }

    #[test]
    fn empty_username_is_a_validation_failure() {
        let mut store = seeded();
        let err = store.add_user("   ", "pw", Role::Developer).unwrap_err();
        assert!(matches!(err, DashboardError::ValidationFailure(_)));
    }

    #[test]
    fn delete_unknown_user_is_not_found() {
        let mut store = seeded();
        assert!(matches!(
            store.delete_user("ghost"),
            Err(DashboardError::NotFound { kind: "user", .. })
        ));
        assert_eq!(store.len(), 3);

        store.delete_user("dev1").unwrap();
        assert!(store.get("dev1").is_none());
    }

    #[test]
    fn change_password_requires_old_password() {
        let mut store = seeded();

        let err = store.change_password("dev1", "wrong", "New@1").unwrap_err();
        assert!(matches!(err, DashboardError::WrongOldPassword));
        assert!(store.authenticate("dev1", "Dev@123").is_some());

        store.change_password("dev1", "Dev@123", "New@1").unwrap();
        assert!(store.authenticate("dev1", "Dev@123").is_none());
        assert!(store.authenticate("dev1", "New@1").is_some());
    }

    #[test]
    fn password_change_bumps_the_session_generation() {
        let mut store = seeded();
        assert_eq!(store.get("dev1").unwrap().session_generation, 0);

        store.change_password("dev1", "Dev@123", "New@1").unwrap();
        assert_eq!(store.get("dev1").unwrap().session_generation, 1);

        store.change_password("dev1", "wrong", "Other@1").unwrap_err();
        assert_eq!(store.get("dev1").unwrap().session_generation, 1);
    }

    #[test]
    fn insert_hashed_keeps_duplicate_checks() {
        let mut store = seeded();
        let hash = hash_password("Pw@1", TEST_COST).unwrap();

        let err = store.insert_hashed("dev1", hash.clone(), Role::Developer).unwrap_err();
        assert!(matches!(err, DashboardError::DuplicateUsername(_)));

        store.insert_hashed("  dev9 ", hash, Role::Developer).unwrap();
        assert!(store.authenticate("dev9", "Pw@1").is_some());
    }

    #[test]
    fn replacing_a_stale_hash_is_rejected() {
        let mut store = seeded();
        let seen = store.get("dev1").unwrap().password_hash.clone();
        let new_hash = rehash_password(&seen, "Dev@123", "New@1", TEST_COST).unwrap();

        store.change_password("dev1", "Dev@123", "Race@1").unwrap();

        let err = store.replace_password_hash("dev1", &seen, new_hash).unwrap_err();
        assert!(matches!(err, DashboardError::WrongOldPassword));
        assert!(store.authenticate("dev1", "Race@1").is_some());
    }

    #[test]
    fn rehash_checks_old_password_and_new_value() {
        let hash = hash_password("Old@1", TEST_COST).unwrap();
        assert!(matches!(
            rehash_password(&hash, "wrong", "New@1", TEST_COST),
            Err(DashboardError::WrongOldPassword)
        ));
        assert!(matches!(
            rehash_password(&hash, "Old@1", "", TEST_COST),
            Err(DashboardError::ValidationFailure(_))
        ));
        let new_hash = rehash_password(&hash, "Old@1", "New@1", TEST_COST).unwrap();
        assert!(verify_password("New@1", &new_hash));
    }

    #[test]
    fn counts_users_per_role() {
        let mut store = seeded();
        store.add_user("dev2", "pw", Role::Developer).unwrap();
        store.set_role("lead1", Role::Admin).unwrap();

        let counts = store.count_by_role();
        assert_eq!(counts[&Role::Admin], 2);
        assert_eq!(counts[&Role::ProjectLead], 0);
        assert_eq!(counts[&Role::Developer], 2);
    }
}
