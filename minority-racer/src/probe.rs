//! Post-hoc outcome checks. A race is only won if the chain says so.

use crate::Result;
use async_trait::async_trait;
use minority_core::abi::{decode_address, decode_uint, encode_call, Token};
use minority_core::{Address, ChainClient, MinorityError, Selector};
use std::sync::Arc;

/// What the probe expects to find after our transaction lands, captured
/// before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub token_id: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Won,
    Lost { holder: Option<Address> },
}

#[async_trait]
pub trait OutcomeProbe: Send + Sync {
    async fn expect(&self) -> Result<Expectation>;

    async fn verify(&self, expectation: &Expectation, own: &Address) -> Result<Verdict>;
}

/// For sequential-id mints: the prize is token `totalSupply() + 1`, and we won
/// if `ownerOf` of that id is us.
pub struct NextTokenOwnerProbe {
    client: Arc<dyn ChainClient>,
    contract: Address,
}

impl NextTokenOwnerProbe {
    pub fn new(client: Arc<dyn ChainClient>, contract: Address) -> Self {
        Self { client, contract }
    }

    pub async fn total_supply(&self) -> Result<u128> {
        let data = encode_call(Selector::from_signature("totalSupply()"), &[]);
        let out = self.client.call(self.contract, &data).await?;
        Ok(decode_uint(&out)?)
    }

    pub async fn owner_of(&self, token_id: u128) -> Result<Address> {
        let data = encode_call(
            Selector::from_signature("ownerOf(uint256)"),
            &[Token::Uint(token_id)],
        );
        let out = self.client.call(self.contract, &data).await?;
        Ok(decode_address(&out)?)
    }
}

#[async_trait]
impl OutcomeProbe for NextTokenOwnerProbe {
    async fn expect(&self) -> Result<Expectation> {
        let token_id = self
            .total_supply()
            .await?
            .checked_add(1)
            .ok_or_else(|| MinorityError::decode("totalSupply is at u128::MAX"))?;
        tracing::debug!("Racing for token id {}", token_id);
        Ok(Expectation { token_id })
    }

    async fn verify(&self, expectation: &Expectation, own: &Address) -> Result<Verdict> {
        let holder = self.owner_of(expectation.token_id).await?;
        if holder == *own {
            Ok(Verdict::Won)
        } else {
            Ok(Verdict::Lost {
                holder: Some(holder),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;

    #[tokio::test]
    async fn test_reads_supply_and_owner() {
        let chain = Arc::new(MockChain::default());
        let me = Address([0xb0; 20]);
        let rival = Address([0xaa; 20]);
        {
            let mut state = chain.state.lock();
            state.total_supply = 4;
            state.owners.insert(5, rival);
        }

        let probe = NextTokenOwnerProbe::new(chain.clone(), MockChain::contract());
        let expectation = probe.expect().await.unwrap();
        assert_eq!(expectation.token_id, 5);
        assert_eq!(
            probe.verify(&expectation, &me).await.unwrap(),
            Verdict::Lost {
                holder: Some(rival)
            }
        );
        assert_eq!(probe.verify(&expectation, &rival).await.unwrap(), Verdict::Won);

        // unminted id reverts
        assert!(probe.verify(&Expectation { token_id: 9 }, &me).await.is_err());
    }
}
