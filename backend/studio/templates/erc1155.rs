// OpenZeppelin ERC1155 Implementation
use stylus_sdk::{
    alloy_primitives::U256,
    prelude::*,
};

sol_storage! {
    #[entrypoint]
    pub struct ERC1155 {
        // Token data
        mapping(uint256 => mapping(address => uint256)) balances;
        mapping(address => mapping(address => bool)) operator_approvals;
        
        // Metadata
        string uri;
    }
}

#[external]
impl ERC1155 {
    // Initialize collection
    pub fn initialize(&mut self, uri: String) {
        self.uri.set(uri);
    }

    // Mint tokens
    pub fn mint(&mut self, to: Address, id: U256, amount: U256, data: Vec<u8>) {
        require!(to != Address::ZERO, "ERC1155: mint to zero address");
        
        let operator = msg::sender();
        let ids = vec![id];
        let amounts = vec![amount];
        
        self._before_token_transfer(operator, Address::ZERO, to, &ids, &amounts, &data);
        
        let balance = self.balances.get(id).get(to);
        self.balances.setter(id).setter(to).set(balance + amount);
        
        self._after_token_transfer(operator, Address::ZERO, to, &ids, &amounts, &data);
    }

    // Batch transfer
    pub fn safe_batch_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        ids: Vec<U256>,
        amounts: Vec<U256>,
        data: Vec<u8>
    ) {
        require!(to != Address::ZERO, "ERC1155: transfer to zero address");
        require!(
            from == msg::sender() || self.operator_approvals.get(from).get(msg::sender()),
            "ERC1155: caller is not owner nor approved"
        );
        require!(ids.len() == amounts.len(), "ERC1155: ids and amounts length mismatch");

        self._before_token_transfer(msg::sender(), from, to, &ids, &amounts, &data);

        for i in 0..ids.len() {
            let id = ids[i];
            let amount = amounts[i];
            
            let from_balance = self.balances.get(id).get(from);
            require!(from_balance >= amount, "ERC1155: insufficient balance");
            self.balances.setter(id).setter(from).set(from_balance - amount);
            
            let to_balance = self.balances.get(id).get(to);
            self.balances.setter(id).setter(to).set(to_balance + amount);
        }

        self._after_token_transfer(msg::sender(), from, to, &ids, &amounts, &data);
    }

    // View functions
    pub fn balance_of(&self, account: Address, id: U256) -> U256 {
        require!(account != Address::ZERO, "ERC1155: balance query for zero address");
        self.balances.get(id).get(account)
    }

    pub fn uri(&self) -> String {
        self.uri.get()
    }

    // Internal functions
    fn _before_token_transfer(
        &self,
        _operator: Address,
        _from: Address,
        _to: Address,
        _ids: &[U256],
        _amounts: &[U256],
        _data: &[u8]
    ) {
        // Hook for before token transfer
    }

    fn _after_token_transfer(
        &self,
        _operator: Address,
        _from: Address,
        _to: Address,
        _ids: &[U256],
        _amounts: &[U256],
        _data: &[u8]
    ) {
        // Hook for after token transfer
    }
}
