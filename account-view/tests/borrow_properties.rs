use {
    proptest::prelude::*,
    quartz_account_view::{AccountView, RuntimeAccount, MAX_IMMUTABLE_BORROWS, NOT_BORROWED},
    quartz_program_error::ProgramError,
    std::mem::size_of,
};

#[derive(Clone, Copy, Debug)]
enum Op {
    Lamports,
    LamportsMut,
    Data,
    DataMut,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Lamports),
        Just(Op::LamportsMut),
        Just(Op::Data),
        Just(Op::DataMut),
    ]
}

/// A record with 8 bytes of data and no trailing runtime layout; the
/// borrow tracker never looks past the data.
fn record() -> Vec<u64> {
    let mut buffer = vec![0u64; size_of::<RuntimeAccount>() / size_of::<u64>() + 1];
    let raw = buffer.as_mut_ptr() as *mut RuntimeAccount;
    unsafe {
        (*raw).borrow_state = NOT_BORROWED;
        (*raw).is_writable = 1;
        (*raw).data_len = 8;
    }
    buffer
}

enum Guard<'a> {
    Lamports(quartz_account_view::Ref<'a, u64>),
    LamportsMut(quartz_account_view::RefMut<'a, u64>),
    Data(quartz_account_view::Ref<'a, [u8]>),
    DataMut(quartz_account_view::RefMut<'a, [u8]>),
}

proptest! {
    #[test]
    fn borrows_are_exclusive_and_always_released(ops in prop::collection::vec(op(), 0..40)) {
        let mut buffer = record();
        let account = unsafe {
            AccountView::new_detached(buffer.as_mut_ptr() as *mut RuntimeAccount)
        };

        let mut guards = Vec::new();
        // Readers and writers currently held, per field: (lamports, data).
        let mut readers = (0u8, 0u8);
        let mut writers = (false, false);

        for op in ops {
            match op {
                Op::Lamports => match account.try_borrow_lamports() {
                    Ok(guard) => {
                        prop_assert!(!writers.0 && readers.0 < MAX_IMMUTABLE_BORROWS);
                        readers.0 += 1;
                        guards.push(Guard::Lamports(guard));
                    }
                    Err(ProgramError::AlreadyMutablyBorrowed) => prop_assert!(writers.0),
                    Err(ProgramError::BorrowLimitExceeded) => {
                        prop_assert_eq!(readers.0, MAX_IMMUTABLE_BORROWS)
                    }
                    Err(error) => prop_assert!(false, "unexpected {error:?}"),
                },
                Op::LamportsMut => match account.try_borrow_mut_lamports() {
                    Ok(guard) => {
                        prop_assert!(!writers.0 && readers.0 == 0);
                        writers.0 = true;
                        guards.push(Guard::LamportsMut(guard));
                    }
                    Err(ProgramError::AlreadyMutablyBorrowed) => prop_assert!(writers.0),
                    Err(ProgramError::AlreadyBorrowed) => prop_assert!(readers.0 > 0),
                    Err(error) => prop_assert!(false, "unexpected {error:?}"),
                },
                Op::Data => match account.try_borrow_data() {
                    Ok(guard) => {
                        prop_assert!(!writers.1 && readers.1 < MAX_IMMUTABLE_BORROWS);
                        readers.1 += 1;
                        guards.push(Guard::Data(guard));
                    }
                    Err(ProgramError::AlreadyMutablyBorrowed) => prop_assert!(writers.1),
                    Err(ProgramError::BorrowLimitExceeded) => {
                        prop_assert_eq!(readers.1, MAX_IMMUTABLE_BORROWS)
                    }
                    Err(error) => prop_assert!(false, "unexpected {error:?}"),
                },
                Op::DataMut => match account.try_borrow_mut_data() {
                    Ok(guard) => {
                        prop_assert!(!writers.1 && readers.1 == 0);
                        writers.1 = true;
                        guards.push(Guard::DataMut(guard));
                    }
                    Err(ProgramError::AlreadyMutablyBorrowed) => prop_assert!(writers.1),
                    Err(ProgramError::AlreadyBorrowed) => prop_assert!(readers.1 > 0),
                    Err(error) => prop_assert!(false, "unexpected {error:?}"),
                },
            }
        }

        // Release in an arbitrary order: from the front.
        while !guards.is_empty() {
            match guards.remove(0) {
                Guard::Lamports(_) => readers.0 -= 1,
                Guard::LamportsMut(_) => writers.0 = false,
                Guard::Data(_) => readers.1 -= 1,
                Guard::DataMut(_) => writers.1 = false,
            }
        }

        prop_assert_eq!(readers, (0, 0));
        prop_assert_eq!(writers, (false, false));
        prop_assert_eq!(account.borrow_state(), NOT_BORROWED);
    }
}
