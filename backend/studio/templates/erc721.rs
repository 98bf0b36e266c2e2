// OpenZeppelin ERC721 Implementation
use stylus_sdk::{
    alloy_primitives::U256,
    prelude::*,
};

sol_storage! {
    #[entrypoint]
    pub struct ERC721 {
        // Token metadata
        string name;
        string symbol;
        
        // Token data
        mapping(uint256 => address) token_owner;
        mapping(address => uint256) balance_of;
        mapping(uint256 => address) token_approvals;
        mapping(address => mapping(address => bool)) operator_approvals;
        
        // Token URI storage
        mapping(uint256 => string) token_uris;
    }
}

#[external]
impl ERC721 {
    // Initialize collection
    pub fn initialize(&mut self, name: String, symbol: String) {
        self.name.set(name);
        self.symbol.set(symbol);
    }

    // Mint new token
    pub fn mint(&mut self, to: Address, token_id: U256) {
        require!(to != Address::ZERO, "ERC721: mint to zero address");
        require!(!self._exists(token_id), "ERC721: token already minted");

        self.balance_of.setter(to).set(self.balance_of.get(to) + U256::from(1));
        self.token_owner.setter(token_id).set(to);
    }

    // Transfer token
    pub fn transfer_from(&mut self, from: Address, to: Address, token_id: U256) {
        require!(self._is_approved_or_owner(msg::sender(), token_id), "ERC721: not authorized");
        self._transfer(from, to, token_id);
    }

    // Set token URI
    pub fn set_token_uri(&mut self, token_id: U256, token_uri: String) {
        require!(self._exists(token_id), "ERC721: URI set for nonexistent token");
        self.token_uris.setter(token_id).set(token_uri);
    }

    // View functions
    pub fn owner_of(&self, token_id: U256) -> Address {
        let owner = self.token_owner.get(token_id);
        require!(owner != Address::ZERO, "ERC721: invalid token ID");
        owner
    }

    pub fn token_uri(&self, token_id: U256) -> String {
        require!(self._exists(token_id), "ERC721: URI query for nonexistent token");
        self.token_uris.get(token_id)
    }

    // Internal functions
    fn _exists(&self, token_id: U256) -> bool {
        self.token_owner.get(token_id) != Address::ZERO
    }

    fn _is_approved_or_owner(&self, spender: Address, token_id: U256) -> bool {
        let owner = self.owner_of(token_id);
        spender == owner || 
        self.token_approvals.get(token_id) == spender ||
        self.operator_approvals.get(owner).get(spender)
    }

    fn _transfer(&mut self, from: Address, to: Address, token_id: U256) {
        require!(self.owner_of(token_id) == from, "ERC721: transfer from incorrect owner");
        require!(to != Address::ZERO, "ERC721: transfer to zero address");

        self.token_approvals.setter(token_id).set(Address::ZERO);
        self.balance_of.setter(from).set(self.balance_of.get(from) - U256::from(1));
        self.balance_of.setter(to).set(self.balance_of.get(to) + U256::from(1));
        self.token_owner.setter(token_id).set(to);
    }
}
