use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl core::fmt::Display for CardId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Card network. Decides the leading digit of the card number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    #[default]
    Visa,
    Mastercard,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "VISA",
            CardType::Mastercard => "MASTERCARD",
        }
    }

    fn prefix(&self) -> char {
        match self {
            CardType::Visa => '4',
            CardType::Mastercard => '5',
        }
    }
}

impl core::fmt::Display for CardType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VISA" => Ok(CardType::Visa),
            "MASTERCARD" => Ok(CardType::Mastercard),
            other => Err(Error::Ingestion(format!("Invalid card type: {}", other))),
        }
    }
}

/// BLOCKED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Active,
    Blocked,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
        }
    }
}

impl core::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub card_id: CardId,
    pub account_id: AccountId,
    pub card_number: String, // 16 digits, unique
    pub card_type: CardType,
    pub issued_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: CardStatus,
}

impl Card {
    pub const VALIDITY_MONTHS: u32 = 48;

    /// An ACTIVE card valid for four years from `now`.
    pub fn issue(card_id: CardId, account_id: AccountId, card_type: CardType, now: DateTime<Utc>) -> Result<Self, Error> {
        let expiry_date = now
            .checked_add_months(Months::new(Self::VALIDITY_MONTHS))
            .ok_or_else(|| Error::InvariantViolation(format!("card expiry after {} overflows the calendar", now)))?;
        Ok(Self {
            card_id,
            account_id,
            card_number: Self::number_for(card_type, card_id),
            card_type,
            issued_at: now,
            expiry_date,
            status: CardStatus::Active,
        })
    }

    /// Network digit followed by the zero-padded card id.
    pub fn number_for(card_type: CardType, card_id: CardId) -> String {
        format!("{}{:015}", card_type.prefix(), card_id.0)
    }

    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    /// Blocking an already blocked card changes nothing.
    pub fn block(&mut self) {
        self.status = CardStatus::Blocked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn issued_cards_are_active_for_four_years() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap();
        let card = Card::issue(CardId(12), AccountId(3), CardType::Mastercard, now).unwrap();
        assert_eq!(card.card_number, "5000000000000012");
        assert_eq!(card.card_number.len(), 16);
        assert_eq!(card.expiry_date, Utc.with_ymd_and_hms(2028, 2, 29, 8, 0, 0).unwrap());
        assert!(card.is_active());
    }

    #[test]
    fn blocking_is_terminal() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut card = Card::issue(CardId(1), AccountId(1), CardType::Visa, now).unwrap();
        assert!(card.card_number.starts_with('4'));
        card.block();
        card.block();
        assert_eq!(card.status, CardStatus::Blocked);
        assert!(!card.is_active());
    }

    #[test]
    fn card_types_parse_case_insensitively() {
        assert_eq!(" visa ".parse::<CardType>().unwrap(), CardType::Visa);
        assert_eq!("MasterCard".parse::<CardType>().unwrap(), CardType::Mastercard);
        assert!(matches!("amex".parse::<CardType>(), Err(Error::Ingestion(_))));
    }
}
