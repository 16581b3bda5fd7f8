//! Trading contract call encoding

use ethers::abi::{self, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use ethers::utils::id;

/// Solidity signature of the buy entry point
pub const BUY_SIGNATURE: &str = "buyTokenAMAP(address,address,uint256,uint256)";

/// Arguments of `buyTokenAMAP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyCall {
    pub token: Address,
    pub recipient: Address,
    /// Native currency spent, in wei
    pub funds: U256,
    /// Slippage floor in token base units
    pub min_amount: U256,
}

impl BuyCall {
    /// 4-byte selector followed by the ABI-encoded arguments
    pub fn encode(&self) -> Bytes {
        let mut data = id(BUY_SIGNATURE).to_vec();
        data.extend(abi::encode(&[
            Token::Address(self.token),
            Token::Address(self.recipient),
            Token::Uint(self.funds),
            Token::Uint(self.min_amount),
        ]));
        data.into()
    }
}

/// Everything the engine decides per attempt
#[derive(Debug, Clone, Copy)]
pub struct TxParams {
    pub from: Address,
    pub contract: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub chain_id: u64,
}

/// Build the legacy transaction carrying `call`, paying `call.funds` as value
pub fn build_buy_tx(call: &BuyCall, params: &TxParams) -> TypedTransaction {
    TransactionRequest::new()
        .from(params.from)
        .to(params.contract)
        .value(call.funds)
        .data(call.encode())
        .gas(params.gas_limit)
        .gas_price(params.gas_price)
        .nonce(params.nonce)
        .chain_id(params.chain_id)
        .into()
}

/// Upper bound on what one attempt can cost the wallet: value plus all gas
pub fn max_cost(tx: &TypedTransaction) -> U256 {
    let gas = tx.gas().copied().unwrap_or_default();
    let price = tx.gas_price().unwrap_or_default();
    let value = tx.value().copied().unwrap_or_default();
    gas.saturating_mul(price).saturating_add(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_call() -> BuyCall {
        BuyCall {
            token: Address::repeat_byte(0x11),
            recipient: Address::repeat_byte(0x22),
            funds: U256::exp10(15),
            min_amount: U256::from(42u64),
        }
    }

    #[test]
    fn test_encode_layout() {
        let data = sample_call().encode();
        assert_eq!(data.len(), 4 + 4 * 32);
        assert_eq!(&data[..4], &id(BUY_SIGNATURE)[..]);
        // address arguments are left-padded to 32 bytes
        assert_eq!(&data[16..36], Address::repeat_byte(0x11).as_bytes());
        assert_eq!(&data[48..68], Address::repeat_byte(0x22).as_bytes());
        assert_eq!(U256::from_big_endian(&data[100..132]), U256::from(42u64));
    }

    #[test]
    fn test_build_buy_tx() {
        let call = sample_call();
        let params = TxParams {
            from: Address::repeat_byte(0x33),
            contract: Address::repeat_byte(0x44),
            nonce: 9,
            gas_limit: 500_000,
            gas_price: U256::from(3_000_000_000u64),
            chain_id: 56,
        };

        let tx = build_buy_tx(&call, &params);
        assert_eq!(tx.nonce(), Some(&U256::from(9u64)));
        assert_eq!(tx.value(), Some(&call.funds));
        assert_eq!(tx.gas(), Some(&U256::from(500_000u64)));
        assert_eq!(tx.gas_price(), Some(U256::from(3_000_000_000u64)));
        assert_eq!(tx.data(), Some(&call.encode()));
        assert_eq!(tx.chain_id().map(|c| c.as_u64()), Some(56));
        assert_eq!(
            max_cost(&tx),
            U256::from(500_000u64) * U256::from(3_000_000_000u64) + call.funds
        );
    }

    #[test]
    fn test_max_cost_saturates() {
        let tx: TypedTransaction = TransactionRequest::new()
            .gas(U256::MAX)
            .gas_price(U256::MAX)
            .value(1u64)
            .into();
        assert_eq!(max_cost(&tx), U256::MAX);
    }
}
