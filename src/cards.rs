use crate::bank::Bank;
use crate::domain::{AccountId, Card, CardId, CardType, Error, LedgerStore};

impl<S: LedgerStore> Bank<S> {
    /// Issues an ACTIVE card on an existing account, valid for four years.
    pub fn issue_card(&self, account_id: AccountId, card_type: CardType) -> Result<Card, Error> {
        let now = self.store.now();
        let card = self
            .store
            .create_card(account_id, |id| Card::issue(id, account_id, card_type, now))?;

        tracing::info!(
            card_id = %card.card_id,
            account_id = %account_id,
            card_type = %card_type,
            expiry = %card.expiry_date,
            "Card issued"
        );
        Ok(card)
    }

    /// Blocks a card for good. Blocking a blocked card is a no-op.
    pub fn block_card(&self, id: CardId) -> Result<Card, Error> {
        let card = self.store.with_exclusive_card(id, |card| {
            card.block();
            Ok(card.clone())
        })?;

        tracing::info!(card_id = %id, account_id = %card.account_id, "Card blocked");
        Ok(card)
    }

    /// Cards of one account, newest first.
    pub fn cards(&self, account_id: AccountId) -> Result<Vec<Card>, Error> {
        self.store.cards_by_account(account_id)
    }

    pub fn card_by_number(&self, number: &str) -> Result<Card, Error> {
        self.store.get_card_by_number(number)
    }
}
