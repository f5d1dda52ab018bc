/// SS58 address codec
///
/// Layout: `prefix (1 or 2 bytes) ‖ account id (32 bytes) ‖ checksum (2 bytes)`,
/// base58 encoded. The checksum is the first two bytes of
/// `blake2b-512("SS58PRE" ‖ prefix ‖ account id)`.
use super::{AccountId, H160};
use crate::errors::ChainError;
use blake2::{Blake2b512, Digest};

const CHECKSUM_PREIMAGE: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

/// Largest prefix expressible in the two-byte form
pub const MAX_PREFIX: u16 = 0x3FFF;

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(CHECKSUM_PREIMAGE);
    hasher.update(payload);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn encode_prefix(prefix: u16) -> Vec<u8> {
    if prefix < 64 {
        vec![prefix as u8]
    } else {
        let first = (((prefix & 0b0000_0000_1111_1100) >> 2) as u8) | 0b0100_0000;
        let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
        vec![first, second]
    }
}

/// Encode an account id with a network prefix
pub fn encode(account: &AccountId, prefix: u16) -> Result<String, ChainError> {
    if prefix > MAX_PREFIX {
        return Err(ChainError::InvalidAddress(format!("SS58 prefix {} out of range", prefix)));
    }

    let mut payload = encode_prefix(prefix);
    payload.extend_from_slice(account);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    Ok(bs58::encode(payload).into_string())
}

/// Decode an address into its network prefix and account id
pub fn decode(address: &str) -> Result<(u16, AccountId), ChainError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(format!("{}: {}", address, e)))?;

    let (prefix, prefix_len) = match data.first() {
        Some(&b) if b < 64 => (b as u16, 1),
        Some(&b) if b < 128 => {
            let second = *data
                .get(1)
                .ok_or_else(|| ChainError::InvalidAddress(address.to_string()))?;
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            ((lower as u16) | ((upper as u16) << 8), 2)
        }
        _ => return Err(ChainError::InvalidAddress(address.to_string())),
    };

    if data.len() != prefix_len + 32 + CHECKSUM_LEN {
        return Err(ChainError::InvalidAddress(format!("{}: unexpected length {}", address, data.len())));
    }

    let body_len = prefix_len + 32;
    if checksum(&data[..body_len]) != data[body_len..] {
        return Err(ChainError::InvalidAddress(format!("{}: bad checksum", address)));
    }

    let mut account = [0u8; 32];
    account.copy_from_slice(&data[prefix_len..body_len]);
    Ok((prefix, account))
}

pub fn is_ss58(address: &str) -> bool {
    decode(address).is_ok()
}

/// `0x` followed by 40 hex digits
pub fn is_evm_address(address: &str) -> bool {
    parse_evm_address(address).is_ok()
}

pub fn parse_evm_address(address: &str) -> Result<H160, ChainError> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| ChainError::InvalidAddress(address.to_string()))?;

    let mut h160 = [0u8; 20];
    hex::decode_to_slice(digits, &mut h160).map_err(|e| ChainError::InvalidAddress(format!("{}: {}", address, e)))?;
    Ok(h160)
}

/// Account id derived from an EVM address that has no explicit mapping
pub fn fallback_account(h160: &H160) -> AccountId {
    let mut account = [0xEEu8; 32];
    account[..20].copy_from_slice(h160);
    account
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    fn alice() -> AccountId {
        let mut account = [0u8; 32];
        hex::decode_to_slice(ALICE, &mut account).unwrap();
        account
    }

    #[test]
    fn test_known_addresses() {
        assert_eq!(
            encode(&alice(), 42).unwrap(),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
        assert_eq!(
            encode(&alice(), 0).unwrap(),
            "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5"
        );
    }

    #[test]
    fn test_decode_recovers_prefix_and_account() {
        for prefix in [0u16, 2, 42, 63, 64, 1284, MAX_PREFIX] {
            let address = encode(&alice(), prefix).unwrap();
            assert_eq!(decode(&address).unwrap(), (prefix, alice()), "prefix {}", prefix);
        }
    }

    #[test]
    fn test_rejects_corrupted_addresses() {
        let mut address = encode(&alice(), 0).unwrap();
        address.pop();
        address.push('1');
        assert!(!is_ss58(&address));
        assert!(!is_ss58("0x1234"));
        assert!(!is_ss58(""));
        assert!(encode(&alice(), MAX_PREFIX + 1).is_err());
    }

    #[test]
    fn test_evm_addresses() {
        assert!(is_evm_address("0x00000000000000000000000000000000000000aB"));
        assert!(!is_evm_address("0x00"));
        assert!(!is_evm_address("00000000000000000000000000000000000000ab"));
        assert!(!is_evm_address("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"));
    }

    #[test]
    fn test_fallback_account_pads_with_ee() {
        let h160 = [0x11u8; 20];
        let account = fallback_account(&h160);
        assert_eq!(&account[..20], &h160);
        assert!(account[20..].iter().all(|b| *b == 0xEE));
    }
}
