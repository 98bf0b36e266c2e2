// OpenZeppelin ERC20 Implementation
use stylus_sdk::{
    alloy_primitives::U256,
    prelude::*,
};

sol_storage! {
    #[entrypoint]
    pub struct ERC20 {
        // Token metadata
        string name;                   // Token name (e.g., "MyToken")
        string symbol;                 // Token symbol (e.g., "MTK")
        uint8 decimals;               // Token decimals (usually 18)
        uint256 total_supply;         // Total token supply

        // Balances and allowances
        mapping(address => uint256) balances;                    // User balances
        mapping(address => mapping(address => uint256)) allowed; // Spending allowances
    }
}

#[external]
impl ERC20 {
    // Initialize token with name, symbol, and initial supply
    pub fn initialize(&mut self, name: String, symbol: String, initial_supply: U256) {
        require!(self.total_supply.get() == U256::ZERO, "Already initialized");
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(18);
        self._mint(msg::sender(), initial_supply);
    }

    // View functions
    pub fn name(&self) -> String { self.name.get() }
    pub fn symbol(&self) -> String { self.symbol.get() }
    pub fn decimals(&self) -> u8 { self.decimals.get() }
    pub fn total_supply(&self) -> U256 { self.total_supply.get() }
    pub fn balance_of(&self, account: Address) -> U256 { self.balances.get(account) }
    
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowed.get(owner).get(spender)
    }

    // Transfer tokens
    pub fn transfer(&mut self, to: Address, amount: U256) -> bool {
        self._transfer(msg::sender(), to, amount);
        true
    }

    // Approve spender
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        self._approve(msg::sender(), spender, amount);
        true
    }

    // Transfer tokens from one address to another
    pub fn transfer_from(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let allowed = self.allowed.get(from).get(msg::sender());
        require!(allowed >= amount, "ERC20: insufficient allowance");
        
        self._transfer(from, to, amount);
        self._approve(from, msg::sender(), allowed - amount);
        true
    }

    // Internal functions
    fn _transfer(&mut self, from: Address, to: Address, amount: U256) {
        require!(to != Address::ZERO, "ERC20: transfer to zero address");
        
        let from_balance = self.balances.get(from);
        require!(from_balance >= amount, "ERC20: insufficient balance");
        
        self.balances.setter(from).set(from_balance - amount);
        let to_balance = self.balances.get(to);
        self.balances.setter(to).set(to_balance + amount);
    }

    fn _approve(&mut self, owner: Address, spender: Address, amount: U256) {
        require!(owner != Address::ZERO, "ERC20: approve from zero address");
        require!(spender != Address::ZERO, "ERC20: approve to zero address");
        self.allowed.setter(owner).setter(spender).set(amount);
    }

    fn _mint(&mut self, account: Address, amount: U256) {
        require!(account != Address::ZERO, "ERC20: mint to zero address");
        self.total_supply.set(self.total_supply.get() + amount);
        let account_balance = self.balances.get(account);
        self.balances.setter(account).set(account_balance + amount);
    }
}
