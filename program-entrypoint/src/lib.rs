//! The program entrypoint: decodes the input buffer the host serializes for
//! every instruction.
//!
//! The buffer is laid out as follows, with every account record aligned to
//! 8 bytes:
//!
//! ```text
//! u64                      number of accounts
//! per account, either
//!   RuntimeAccount          88-byte header, borrow state byte = 0xFF
//!   [u8; data_len]          account data
//!   [u8; 10 KiB]            reserve for data growth
//!   padding                 up to the next 8-byte boundary
//!   u64                     rent epoch
//! or
//!   u8                      index of an earlier account
//!   [u8; 7]                 padding
//! u64                      instruction data length
//! [u8; len]                instruction data
//! [u8; 32]                 program id
//! ```

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(any(test, feature = "dev-context-only-utils"))]
extern crate std;

#[cfg(any(test, feature = "dev-context-only-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "dev-context-only-utils")))]
pub mod dev_utils;

use core::{
    mem::{size_of, MaybeUninit},
    slice::from_raw_parts,
};
pub use {
    quartz_account_view::{
        AccountView, RuntimeAccount, BPF_ALIGN_OF_U128, MAX_PERMITTED_DATA_INCREASE,
    },
    quartz_address::Address,
    quartz_program_error::{ProgramError, ProgramResult},
};

/// Return value for a successful program execution.
pub const SUCCESS: u64 = 0;

/// Value of the first byte of every account that is serialized in full.
///
/// Any other value is the index of the earlier account this one duplicates.
pub const NON_DUP_MARKER: u8 = u8::MAX;

/// Maximum number of accounts a transaction may lock, and therefore the
/// maximum number of accounts the host serializes.
pub const MAX_TX_ACCOUNTS: usize = (u8::MAX - 1) as usize;

/// Number of account views [`program_entrypoint!`] reserves when no capacity
/// is given.
///
/// Views are 16 bytes each, so this keeps the array inside a single 4 KiB
/// stack frame on-chain.
pub const DEFAULT_MAX_ACCOUNTS: usize = 128;

/// Bytes of a non-duplicated account that do not depend on its data length:
/// the header and the growth reserve.
pub const STATIC_ACCOUNT_DATA: usize = size_of::<RuntimeAccount>() + MAX_PERMITTED_DATA_INCREASE;

/// Size of a duplicated account entry.
const DUPLICATE_ACCOUNT_SIZE: usize = size_of::<u64>();

/// Declare the program entrypoint.
///
/// The first argument is the name of a function with this type signature:
///
/// ```ignore
/// fn process_instruction(
///     program_id: &Address,      // Address of the account the program was loaded into
///     accounts: &[AccountView],  // All accounts required to process the instruction
///     instruction_data: &[u8],   // Serialized instruction-specific data
/// ) -> ProgramResult;
/// ```
///
/// The optional second argument is the number of account views to reserve,
/// [`DEFAULT_MAX_ACCOUNTS`] by default. Accounts past that number are skipped.
///
/// # Example
///
/// ```ignore
/// use quartz_program_entrypoint::{
///     program_entrypoint, AccountView, Address, ProgramResult,
/// };
///
/// program_entrypoint!(process_instruction);
///
/// pub fn process_instruction(
///     program_id: &Address,
///     accounts: &[AccountView],
///     instruction_data: &[u8],
/// ) -> ProgramResult {
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! program_entrypoint {
    ($process_instruction:expr) => {
        $crate::program_entrypoint!($process_instruction, { $crate::DEFAULT_MAX_ACCOUNTS });
    };
    ($process_instruction:expr, $maximum:expr) => {
        /// Program entrypoint.
        #[no_mangle]
        pub unsafe extern "C" fn entrypoint(input: *mut u8) -> u64 {
            $crate::process_input::<{ $maximum }>(input, $process_instruction)
        }
    };
}

/// Decode the input buffer and run `process_instruction` over it.
///
/// Returns [`SUCCESS`] or the status code of the error, after logging the
/// error's name.
///
/// # Safety
///
/// `input` must point to a buffer laid out as described in the
/// [crate documentation](crate), aligned to 8 bytes, that stays valid for
/// the duration of the call.
#[inline(always)]
pub unsafe fn process_input<const MAX_ACCOUNTS: usize>(
    input: *mut u8,
    process_instruction: impl FnOnce(&Address, &[AccountView], &[u8]) -> ProgramResult,
) -> u64 {
    const UNINIT: MaybeUninit<AccountView> = MaybeUninit::<AccountView>::uninit();
    // Create an array of uninitialized account views.
    let mut accounts = [UNINIT; MAX_ACCOUNTS];

    let result = match deserialize::<MAX_ACCOUNTS>(input, &mut accounts) {
        Ok((program_id, count, instruction_data)) => process_instruction(
            program_id,
            from_raw_parts(accounts.as_ptr() as *const AccountView, count),
            instruction_data,
        ),
        Err(error) => Err(error),
    };

    match result {
        Ok(()) => SUCCESS,
        Err(error) => {
            quartz_msg::sol_log(error.name());
            error.into()
        }
    }
}

/// Parse the arguments from the input buffer.
///
/// Fills the front of `accounts` with one view per serialized account and
/// returns the program id, the number of views written and the instruction
/// data. Duplicated accounts get a clone of the view they refer to, so both
/// share the same record and borrow state. Accounts past `MAX_ACCOUNTS` are
/// walked over but never read.
///
/// Fails with [`ProgramError::MaxAccountsExceeded`] when the buffer declares
/// more than [`MAX_TX_ACCOUNTS`] accounts and with
/// [`ProgramError::InvalidDuplicateAccount`] when a duplicate refers to
/// itself or a later account.
///
/// # Safety
///
/// `input` must point to a buffer laid out as described in the
/// [crate documentation](crate), aligned to 8 bytes. The returned references
/// and the views are valid for as long as that buffer is.
#[inline(always)]
pub unsafe fn deserialize<'a, const MAX_ACCOUNTS: usize>(
    mut input: *mut u8,
    accounts: &mut [MaybeUninit<AccountView>; MAX_ACCOUNTS],
) -> Result<(&'a Address, usize, &'a [u8]), ProgramError> {
    const {
        assert!(
            MAX_ACCOUNTS <= MAX_TX_ACCOUNTS,
            "MAX_ACCOUNTS exceeds the number of accounts a transaction can lock"
        )
    };

    let total = *(input as *const u64) as usize;
    input = input.add(size_of::<u64>());

    if total > MAX_TX_ACCOUNTS {
        return Err(ProgramError::MaxAccountsExceeded);
    }

    for position in 0..total {
        let marker = *input;

        if marker == NON_DUP_MARKER {
            let raw = input as *mut RuntimeAccount;

            if position < MAX_ACCOUNTS {
                accounts
                    .get_unchecked_mut(position)
                    .write(AccountView::new_unchecked(raw));
            }

            input = input.add(STATIC_ACCOUNT_DATA + (*raw).data_len as usize);
            input = align_pointer(input);
            // Rent epoch.
            input = input.add(size_of::<u64>());
        } else {
            let index = marker as usize;

            if index >= position {
                return Err(ProgramError::InvalidDuplicateAccount);
            }

            if position < MAX_ACCOUNTS {
                // SAFETY: `index < position`, so the view was written above.
                let original = accounts.get_unchecked(index).assume_init_ref().clone();
                accounts.get_unchecked_mut(position).write(original);
            }

            input = input.add(DUPLICATE_ACCOUNT_SIZE);
        }
    }

    let instruction_data_len = *(input as *const u64) as usize;
    input = input.add(size_of::<u64>());

    let instruction_data = from_raw_parts(input as *const u8, instruction_data_len);
    input = input.add(instruction_data_len);

    let program_id = &*(input as *const Address);

    Ok((program_id, total.min(MAX_ACCOUNTS), instruction_data))
}

#[inline(always)]
fn align_pointer(ptr: *mut u8) -> *mut u8 {
    ((ptr as usize + (BPF_ALIGN_OF_U128 - 1)) & !(BPF_ALIGN_OF_U128 - 1)) as *mut u8
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::dev_utils::{serialize_input, InputAccount, SerializedAccount},
        assert_matches::assert_matches,
        quartz_account_view::{Origin, NOT_BORROWED},
        std::{vec, vec::Vec},
        test_case::test_case,
    };

    const UNINIT: MaybeUninit<AccountView> = MaybeUninit::<AccountView>::uninit();

    fn numbered(n: u8) -> Address {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Address::new_from_array(bytes)
    }

    fn account(n: u8, data: Vec<u8>) -> SerializedAccount {
        SerializedAccount {
            address: numbered(n),
            lamports: 1_000 * (n as u64 + 1),
            data,
            ..SerializedAccount::default()
        }
    }

    /// Run the parser over `accounts` and hand the results to `check`.
    fn with_parsed<const N: usize>(
        accounts: &[InputAccount],
        instruction_data: &[u8],
        program_id: &Address,
        check: impl FnOnce(&Address, &[AccountView], &[u8]),
    ) {
        let mut input = serialize_input(accounts, instruction_data, program_id);
        let mut views = [UNINIT; N];

        let (parsed_id, count, data) =
            unsafe { deserialize::<N>(input.as_mut_ptr(), &mut views) }.unwrap();
        let views = unsafe { from_raw_parts(views.as_ptr() as *const AccountView, count) };

        check(parsed_id, views, data);
    }

    #[test]
    fn test_transfer_instruction() {
        let amount = 4_200_000_000u64;
        let mut payload = vec![1u8];
        payload.extend_from_slice(&amount.to_le_bytes());
        let program_id = Address::new_from_array([7; 32]);

        let accounts = [
            InputAccount::Account(SerializedAccount {
                is_signer: true,
                is_writable: true,
                ..account(1, vec![0xAA; 10])
            }),
            InputAccount::Account(account(2, vec![0xBB; 5])),
        ];

        with_parsed::<4>(&accounts, &payload, &program_id, |id, views, data| {
            assert_eq!(id, &program_id);
            assert_eq!(views.len(), 2);

            assert_eq!(views[0].address(), &numbered(1));
            assert!(views[0].is_signer());
            assert!(views[0].is_writable());
            assert!(!views[0].executable());
            assert_eq!(views[0].lamports(), 2_000);
            assert_eq!(&*views[0].try_borrow_data().unwrap(), &[0xAA; 10]);
            assert_eq!(views[0].origin(), Origin::Runtime);

            assert_eq!(views[1].address(), &numbered(2));
            assert!(!views[1].is_signer());
            assert!(!views[1].is_writable());
            assert_eq!(views[1].data_len(), 5);

            assert_eq!(data.len(), 9);
            let (tag, rest) = data.split_first().unwrap();
            assert_eq!(*tag, 1);
            assert_eq!(u64::from_le_bytes(rest.try_into().unwrap()), amount);
        });
    }

    #[test]
    fn test_duplicates_alias_the_original() {
        let accounts = [
            InputAccount::Account(SerializedAccount {
                is_signer: true,
                is_writable: true,
                ..account(0, vec![0xAA; 8])
            }),
            InputAccount::Account(SerializedAccount {
                is_writable: true,
                executable: true,
                ..account(1, vec![0xBB; 12])
            }),
            InputAccount::Duplicate(0),
            InputAccount::Account(SerializedAccount {
                is_signer: true,
                ..account(3, vec![0xCC; 6])
            }),
            InputAccount::Duplicate(1),
        ];

        with_parsed::<8>(&accounts, &[], &Address::default(), |_, views, data| {
            assert_eq!(views.len(), 5);
            assert!(data.is_empty());

            assert_eq!(views[2], views[0]);
            assert_eq!(views[2].account_ptr(), views[0].account_ptr());
            assert_eq!(views[4].account_ptr(), views[1].account_ptr());
            assert_eq!(views[3].address(), &numbered(3));

            // Borrows through one alias are visible through the other.
            let mut data = views[2].try_borrow_mut_data().unwrap();
            data[0] = 0x55;
            assert_eq!(
                views[0].try_borrow_data().unwrap_err(),
                ProgramError::AlreadyMutablyBorrowed
            );
            drop(data);
            assert_eq!(views[0].try_borrow_data().unwrap()[0], 0x55);

            let lamports = views[1].try_borrow_lamports().unwrap();
            assert_eq!(
                views[4].try_borrow_mut_lamports().unwrap_err(),
                ProgramError::AlreadyBorrowed
            );
            drop(lamports);

            assert!(views.iter().all(|view| view.borrow_state() == NOT_BORROWED));
        });
    }

    #[test]
    fn test_complex_iteration() {
        let accounts = (0..10u8)
            .map(|i| match i {
                4 => InputAccount::Duplicate(1),
                7 => InputAccount::Duplicate(2),
                _ => InputAccount::Account(SerializedAccount {
                    address: numbered(i),
                    is_signer: i % 2 == 0,
                    is_writable: i % 3 != 0,
                    executable: i % 5 == 0,
                    lamports: (i as u64 + 1) * 500,
                    data: vec![0xA0 + i; ((i % 4) as usize + 1) * 3],
                    ..SerializedAccount::default()
                }),
            })
            .collect::<Vec<_>>();

        with_parsed::<16>(&accounts, &[9, 9], &numbered(42), |id, views, data| {
            assert_eq!(id, &numbered(42));
            assert_eq!(data, &[9, 9]);
            assert_eq!(views.len(), 10);

            for (position, view) in views.iter().enumerate() {
                let i = match position {
                    4 => 1,
                    7 => 2,
                    other => other as u8,
                };
                assert_eq!(view.address(), &numbered(i));
                assert_eq!(view.is_signer(), i % 2 == 0);
                assert_eq!(view.is_writable(), i % 3 != 0);
                assert_eq!(view.executable(), i % 5 == 0);
                assert_eq!(view.lamports(), (i as u64 + 1) * 500);
                assert_eq!(view.data_len(), ((i % 4) as usize + 1) * 3);
                assert!(view.try_borrow_data().unwrap().iter().all(|b| *b == 0xA0 + i));
            }
        });
    }

    #[test]
    fn test_empty_data_accounts() {
        let accounts = [
            InputAccount::Account(account(0, Vec::new())),
            InputAccount::Account(account(1, vec![0xFF; 4])),
        ];

        with_parsed::<2>(&accounts, &[3], &numbered(5), |id, views, data| {
            assert_eq!(id, &numbered(5));
            assert!(views[0].is_data_empty());
            assert_eq!(views[0].rent_epoch(), Some(0));
            assert_eq!(views[1].address(), &numbered(1));
            assert_eq!(&*views[1].try_borrow_data().unwrap(), &[0xFF; 4]);
            assert_eq!(data, &[3]);
        });
    }

    #[test]
    fn test_accounts_past_capacity_are_skipped() {
        let accounts = (0..5u8)
            .map(|i| InputAccount::Account(account(i, vec![i; i as usize])))
            .collect::<Vec<_>>();

        with_parsed::<3>(&accounts, &[1, 2, 3], &numbered(9), |id, views, data| {
            assert_eq!(views.len(), 3);
            assert_eq!(views[2].address(), &numbered(2));
            // The rest of the buffer is still located correctly.
            assert_eq!(data, &[1, 2, 3]);
            assert_eq!(id, &numbered(9));
        });
    }

    #[test_case(vec![InputAccount::Duplicate(0)] ; "self reference")]
    #[test_case(
        vec![
            InputAccount::Account(account(0, vec![1])),
            InputAccount::Duplicate(2),
            InputAccount::Account(account(2, vec![2])),
        ] ;
        "forward reference"
    )]
    fn test_duplicate_desync(accounts: Vec<InputAccount>) {
        let mut input = serialize_input(&accounts, &[], &Address::default());
        let mut views = [UNINIT; 4];

        assert_matches!(
            unsafe { deserialize::<4>(input.as_mut_ptr(), &mut views) },
            Err(ProgramError::InvalidDuplicateAccount)
        );
    }

    #[test]
    fn test_too_many_accounts() {
        let mut input = [(MAX_TX_ACCOUNTS + 1) as u64, 0, 0, 0];
        let mut views = [UNINIT; 1];

        assert_matches!(
            unsafe { deserialize::<1>(input.as_mut_ptr() as *mut u8, &mut views) },
            Err(ProgramError::MaxAccountsExceeded)
        );
    }

    #[test]
    fn test_process_input_status() {
        let accounts = [InputAccount::Account(SerializedAccount {
            is_writable: true,
            ..account(0, vec![0; 4])
        })];
        let mut input = serialize_input(&accounts, &[2], &numbered(1));

        let status = unsafe {
            process_input::<4>(input.as_mut_ptr(), |program_id, accounts, data| {
                assert_eq!(program_id, &numbered(1));
                *accounts[0].try_borrow_mut_lamports()? += 1;
                match data {
                    [2] => Ok(()),
                    _ => Err(ProgramError::InvalidInstructionData),
                }
            })
        };
        assert_eq!(status, SUCCESS);

        let status = unsafe {
            process_input::<4>(input.as_mut_ptr(), |_, accounts, _| {
                // The first run left its write behind and released its borrow.
                assert_eq!(accounts[0].lamports(), 1_001);
                assert_eq!(accounts[0].borrow_state(), NOT_BORROWED);
                Err(ProgramError::InvalidInstructionData)
            })
        };
        assert_eq!(status, u64::from(ProgramError::InvalidInstructionData));

        let status =
            unsafe { process_input::<4>(input.as_mut_ptr(), |_, _, _| Err(ProgramError::Custom(7))) };
        assert_eq!(status, 7);
    }

    #[test]
    fn test_resize_within_reserve() {
        let accounts = [
            InputAccount::Account(SerializedAccount {
                is_writable: true,
                rent_epoch: 42,
                ..account(0, vec![0xEE; 10])
            }),
            InputAccount::Account(SerializedAccount {
                rent_epoch: 43,
                ..account(1, vec![0xDD; 3])
            }),
        ];

        with_parsed::<2>(&accounts, &[], &Address::default(), |_, views, _| {
            assert_eq!(views[0].rent_epoch(), Some(42));

            views[0].resize(10 + MAX_PERMITTED_DATA_INCREASE).unwrap();
            assert_eq!(
                views[0].resize(11 + MAX_PERMITTED_DATA_INCREASE),
                Err(ProgramError::InvalidRealloc)
            );

            {
                let data = views[0].try_borrow_mut_data().unwrap();
                assert_eq!(&data[..10], &[0xEE; 10]);
                assert!(data[10..].iter().all(|b| *b == 0));
            }

            // Growing into the reserve leaves the rent epoch and the next
            // account intact.
            assert_eq!(views[0].rent_epoch(), Some(42));
            assert_eq!(views[1].address(), &numbered(1));
            assert_eq!(views[1].rent_epoch(), Some(43));
            assert_eq!(&*views[1].try_borrow_data().unwrap(), &[0xDD; 3]);

            views[0].resize(0).unwrap();
            assert_eq!(views[0].original_data_len(), 10);
        });
    }
}
