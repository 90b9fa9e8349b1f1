//! Account numbers, card numbers and authorization codes.
//!
//! Account numbers are IBANs: any country is accepted when validating, and
//! new ones are generated in the Turkish layout (`TR`, two check digits, a
//! five digit bank code, a reserve digit and a sixteen digit account number).
//! Card numbers are sixteen digit Luhn-valid PANs. The full PAN only exists in
//! memory at issuance; the store keeps the last four digits and a digest.

use payloads::CardBrand;
use rand::Rng;
use sha2::{Digest, Sha256};

const IBAN_COUNTRY: &str = "TR";
/// Bank code used for generated account numbers.
const IBAN_BANK_CODE: &str = "00061";
const IBAN_MIN_LEN: usize = 15;
const IBAN_MAX_LEN: usize = 34;

const PAN_LEN: usize = 16;
const AUTH_CODE_LEN: usize = 8;
const AUTH_CODE_ALPHABET: &[u8] = b"0123456789ABCDEF";

/// Remainder of the IBAN's numeric expansion modulo 97, computed digit by
/// digit so arbitrarily long inputs never overflow.
fn iban_mod97(rearranged: &str) -> Option<u32> {
    let mut remainder = 0u32;
    for c in rearranged.chars() {
        let value = c.to_digit(36)?;
        // letters expand to two digits (A = 10 .. Z = 35)
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    Some(remainder)
}

/// Normalize (strip spaces, uppercase) and validate an IBAN.
///
/// Returns the normalized form if the structure and mod-97 checksum are
/// correct.
pub fn normalize_iban(input: &str) -> Option<String> {
    let iban: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !iban.is_ascii() || !(IBAN_MIN_LEN..=IBAN_MAX_LEN).contains(&iban.len())
    {
        return None;
    }
    let (head, bban) = iban.split_at(4);
    let mut head_chars = head.chars();
    let country_ok =
        head_chars.by_ref().take(2).all(|c| c.is_ascii_uppercase());
    let check_ok = head_chars.all(|c| c.is_ascii_digit());
    if !country_ok
        || !check_ok
        || !bban.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }

    let rearranged = format!("{bban}{head}");
    (iban_mod97(&rearranged)? == 1).then_some(iban)
}

/// Generate a random Turkish IBAN with valid check digits.
pub fn generate_iban(rng: &mut impl Rng) -> String {
    let account: String = (0..16)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect();
    let bban = format!("{IBAN_BANK_CODE}0{account}");
    let remainder =
        iban_mod97(&format!("{bban}{IBAN_COUNTRY}00")).unwrap_or_default();
    let check = 98 - remainder;
    format!("{IBAN_COUNTRY}{check:02}{bban}")
}

/// Luhn check digit for a digit string that does not yet carry one.
fn luhn_check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            let d = u32::from(*d);
            // every second digit from the right, starting with the rightmost
            // payload digit, is doubled
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

pub fn luhn_valid(number: &str) -> bool {
    let Some(digits) = number
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
    else {
        return false;
    };
    match digits.split_last() {
        Some((check, payload)) if !payload.is_empty() => {
            luhn_check_digit(payload) == *check
        }
        _ => false,
    }
}

pub fn brand_for_pan(pan: &str) -> Option<CardBrand> {
    match pan.as_bytes().first()? {
        b'4' => Some(CardBrand::Visa),
        b'5' => Some(CardBrand::Mastercard),
        _ => None,
    }
}

/// A freshly generated card number. Only `last_four` and `digest` are ever
/// persisted.
pub struct GeneratedPan {
    pub brand: CardBrand,
    pub last_four: String,
    pub digest: String,
}

/// Generate a card number for a new card.
pub fn generate_pan(rng: &mut impl Rng) -> GeneratedPan {
    let pan = random_pan(rng);
    GeneratedPan {
        brand: brand_for_pan(&pan).unwrap_or(CardBrand::Visa),
        last_four: pan[PAN_LEN - 4..].to_string(),
        digest: pan_digest(&pan),
    }
}

/// Luhn-valid PAN: Visa numbers start with 4, Mastercard with 51-55.
fn random_pan(rng: &mut impl Rng) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(PAN_LEN);
    if rng.gen_bool(0.5) {
        digits.push(4);
    } else {
        digits.push(5);
        digits.push(rng.gen_range(1..=5));
    }
    while digits.len() < PAN_LEN - 1 {
        digits.push(rng.gen_range(0..10));
    }
    digits.push(luhn_check_digit(&digits));
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

pub fn pan_digest(pan: &str) -> String {
    hex::encode(Sha256::digest(pan.as_bytes()))
}

/// Eight character authorization code for card transactions.
pub fn generate_auth_code(rng: &mut impl Rng) -> String {
    (0..AUTH_CODE_LEN)
        .map(|_| {
            let i = rng.gen_range(0..AUTH_CODE_ALPHABET.len());
            char::from(AUTH_CODE_ALPHABET[i])
        })
        .collect()
}
