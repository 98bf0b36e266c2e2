// OpenZeppelin Access Control Implementation
use stylus_sdk::{
    alloy_primitives::U256,
    prelude::*,
};

sol_storage! {
    #[entrypoint]
    pub struct AccessControl {
        // Role => Account => HasRole
        mapping(bytes32 => mapping(address => bool)) roles;
        
        // Role => AdminRole
        mapping(bytes32 => bytes32) role_admin;
    }
}

#[external]
impl AccessControl {
    // Initialize with default admin role
    pub fn initialize(&mut self) {
        let default_admin_role = [0u8; 32];
        self._setup_role(default_admin_role, msg::sender());
    }

    // Grant role
    pub fn grant_role(&mut self, role: [u8; 32], account: Address) {
        require!(
            self.has_role(self.get_role_admin(role), msg::sender()),
            "AccessControl: sender must be an admin to grant"
        );
        self._grant_role(role, account);
    }

    // Revoke role
    pub fn revoke_role(&mut self, role: [u8; 32], account: Address) {
        require!(
            self.has_role(self.get_role_admin(role), msg::sender()),
            "AccessControl: sender must be an admin to revoke"
        );
        self._revoke_role(role, account);
    }

    // View functions
    pub fn has_role(&self, role: [u8; 32], account: Address) -> bool {
        self.roles.get(role).get(account)
    }

    pub fn get_role_admin(&self, role: [u8; 32]) -> [u8; 32] {
        self.role_admin.get(role)
    }

    // Internal functions
    fn _setup_role(&mut self, role: [u8; 32], account: Address) {
        self._grant_role(role, account);
    }

    fn _grant_role(&mut self, role: [u8; 32], account: Address) {
        if !self.has_role(role, account) {
            self.roles.setter(role).setter(account).set(true);
        }
    }

    fn _revoke_role(&mut self, role: [u8; 32], account: Address) {
        if self.has_role(role, account) {
            self.roles.setter(role).setter(account).set(false);
        }
    }
}
