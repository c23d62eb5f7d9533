//! Builds input buffers in the layout the host serializes, for tests and
//! off-chain harnesses.

use {
    crate::{BPF_ALIGN_OF_U128, MAX_PERMITTED_DATA_INCREASE, NON_DUP_MARKER},
    core::mem::size_of,
    quartz_address::Address,
    std::{vec, vec::Vec},
};

/// An account serialized in full.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializedAccount {
    pub address: Address,
    pub owner: Address,
    pub lamports: u64,
    pub data: Vec<u8>,
    pub is_signer: bool,
    pub is_writable: bool,
    pub executable: bool,
    pub rent_epoch: u64,
}

/// One entry of the account list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputAccount {
    Account(SerializedAccount),
    /// Refers to the account at the given earlier position.
    Duplicate(u8),
}

/// A serialized input buffer, aligned to 8 bytes.
#[derive(Clone, Debug)]
pub struct AlignedInput {
    words: Vec<u64>,
    len: usize,
}

impl AlignedInput {
    /// Pointer to hand to the entrypoint.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `len` never exceeds the byte length of `words`.
        unsafe { core::slice::from_raw_parts(self.words.as_ptr() as *const u8, self.len) }
    }
}

/// Serialize `accounts`, `instruction_data` and `program_id` the way the
/// host does before calling the entrypoint.
pub fn serialize_input(
    accounts: &[InputAccount],
    instruction_data: &[u8],
    program_id: &Address,
) -> AlignedInput {
    let mut bytes = Vec::new();

    bytes.extend_from_slice(&(accounts.len() as u64).to_le_bytes());

    for account in accounts {
        match account {
            InputAccount::Duplicate(index) => {
                bytes.push(*index);
                bytes.extend_from_slice(&[0u8; 7]);
            }
            InputAccount::Account(account) => {
                bytes.push(NON_DUP_MARKER);
                bytes.push(account.is_signer as u8);
                bytes.push(account.is_writable as u8);
                bytes.push(account.executable as u8);
                // Resize delta.
                bytes.extend_from_slice(&[0u8; 4]);
                bytes.extend_from_slice(account.address.as_ref());
                bytes.extend_from_slice(account.owner.as_ref());
                bytes.extend_from_slice(&account.lamports.to_le_bytes());
                bytes.extend_from_slice(&(account.data.len() as u64).to_le_bytes());
                bytes.extend_from_slice(&account.data);
                bytes.resize(bytes.len() + MAX_PERMITTED_DATA_INCREASE, 0);
                bytes.resize(bytes.len().next_multiple_of(BPF_ALIGN_OF_U128), 0);
                bytes.extend_from_slice(&account.rent_epoch.to_le_bytes());
            }
        }
    }

    bytes.extend_from_slice(&(instruction_data.len() as u64).to_le_bytes());
    bytes.extend_from_slice(instruction_data);
    bytes.extend_from_slice(program_id.as_ref());

    let len = bytes.len();
    let mut words = vec![0u64; len.div_ceil(size_of::<u64>())];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(size_of::<u64>())) {
        let mut buffer = [0u8; 8];
        buffer[..chunk.len()].copy_from_slice(chunk);
        *word = u64::from_ne_bytes(buffer);
    }

    AlignedInput { words, len }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let input = serialize_input(
            &[
                InputAccount::Account(SerializedAccount {
                    is_signer: true,
                    lamports: 5,
                    data: vec![1, 2, 3],
                    rent_epoch: 9,
                    ..SerializedAccount::default()
                }),
                InputAccount::Duplicate(0),
            ],
            &[7],
            &Address::new_from_array([3; 32]),
        );
        let bytes = input.as_bytes();

        // count + header + data + reserve + padding + rent epoch + duplicate
        // + data length + data + program id
        let account_end = 8 + 88 + 3 + MAX_PERMITTED_DATA_INCREASE + 5 + 8;
        assert_eq!(bytes.len(), account_end + 8 + 8 + 1 + 32);

        assert_eq!(&bytes[..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &[NON_DUP_MARKER, 1, 0, 0]);
        assert_eq!(&bytes[80..88], &5u64.to_le_bytes());
        assert_eq!(&bytes[88..96], &3u64.to_le_bytes());
        assert_eq!(&bytes[96..99], &[1, 2, 3]);
        assert_eq!(&bytes[account_end - 8..account_end], &9u64.to_le_bytes());
        assert_eq!(&bytes[account_end..account_end + 8], &[0; 8]);
        assert_eq!(bytes[account_end + 16], 7);
        assert_eq!(&bytes[account_end + 17..], &[3; 32]);
    }
}
