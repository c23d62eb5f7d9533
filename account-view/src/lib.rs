//! Zero-copy access to the account records the host serializes into a
//! program's input.
//!
//! An [`AccountView`] is a pointer to a [`RuntimeAccount`] header followed by
//! the account data. Lamports and data are handed out through [`Ref`] and
//! [`RefMut`] guards backed by the tracker in the header's first byte, so
//! duplicated accounts cannot be aliased mutably even though they share a
//! single record.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::arithmetic_side_effects)]

#[cfg(test)]
extern crate std;

mod borrow;

pub use crate::borrow::{BorrowState, Ref, RefMut, MAX_IMMUTABLE_BORROWS, NOT_BORROWED};
use {
    crate::borrow::{
        acquire_exclusive, acquire_shared, exclusive_conflict, shared_conflict,
        DATA_BORROW_SHIFT, LAMPORTS_BORROW_SHIFT,
    },
    core::{
        mem::{align_of, offset_of, size_of},
        ptr::{addr_of_mut, write, write_bytes, NonNull},
        slice::{from_raw_parts, from_raw_parts_mut},
        sync::atomic::{AtomicU8, Ordering},
    },
    quartz_address::Address,
    quartz_program_error::{ProgramError, ProgramResult},
};

/// Maximum number of bytes a program may add to an account during a
/// single top-level instruction.
pub const MAX_PERMITTED_DATA_INCREASE: usize = 1_024 * 10;

/// Alignment the host pads every serialized account to.
pub const BPF_ALIGN_OF_U128: usize = 8;

/// Rent epoch reported for accounts that are exempt from rent collection.
pub const RENT_EXEMPT_RENT_EPOCH: u64 = u64::MAX;

/// Account header as serialized by the host.
///
/// At runtime the account data follows this struct directly, with its size
/// given by [`RuntimeAccount::data_len`]. The data is followed by
/// [`MAX_PERMITTED_DATA_INCREASE`] bytes reserved for growth, padding up to
/// [`BPF_ALIGN_OF_U128`] and the `u64` rent epoch.
#[repr(C)]
#[cfg_attr(feature = "copy", derive(Copy))]
#[derive(Clone, Default)]
pub struct RuntimeAccount {
    /// Borrow state of the lamports and the data.
    ///
    /// The host writes the non-duplicate marker (`0xFF`) here, which is
    /// also the encoding of "nothing borrowed". See [`BorrowState`] for the
    /// bit layout.
    pub borrow_state: u8,

    /// Indicates whether the transaction was signed by this account.
    pub is_signer: u8,

    /// Indicates whether the account is writable.
    pub is_writable: u8,

    /// Indicates whether this account represents a program.
    pub executable: u8,

    /// Difference between the current data length and the length the host
    /// serialized.
    ///
    /// The host guarantees that this value is zero at the start of the
    /// instruction.
    pub resize_delta: i32,

    /// Address of the account.
    pub address: Address,

    /// Program that owns this account. Modifiable by programs.
    pub owner: Address,

    /// The lamports in the account. Modifiable by programs.
    pub lamports: u64,

    /// Length of the data. Modifiable by programs.
    pub data_len: u64,
}

const _: () = assert!(size_of::<RuntimeAccount>() == 88);
const _: () = assert!(align_of::<RuntimeAccount>() == 8);
const _: () = assert!(offset_of!(RuntimeAccount, resize_delta) == 4);
const _: () = assert!(offset_of!(RuntimeAccount, address) == 8);
const _: () = assert!(offset_of!(RuntimeAccount, owner) == 40);
const _: () = assert!(offset_of!(RuntimeAccount, lamports) == 72);
const _: () = assert!(offset_of!(RuntimeAccount, data_len) == 80);

/// Where the record behind an [`AccountView`] lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// The record sits in the input buffer the host serialized. The host
    /// knows its address, so cross-program invocations can pass the record
    /// fields by pointer and observe the callee's writes in place.
    Runtime,

    /// The record was assembled by the program or a test harness. Only the
    /// header and data are present: there is no growth reserve and no rent
    /// epoch, and cross-program invocations have to copy it.
    Detached,
}

/// Handle to an account record.
///
/// Views are cheap to clone and several may point at the same record, which
/// is how the parser resolves duplicated accounts. All of them share the
/// record's borrow state.
///
/// # Invariants
///
/// - The `raw` pointer must be valid and point to memory containing a
///   `RuntimeAccount` struct, immediately followed by the account's data.
/// - For [`Origin::Runtime`] views the data is followed by the layout the
///   host serializes: the growth reserve, alignment padding and the rent
///   epoch.
#[repr(C)]
#[cfg_attr(feature = "copy", derive(Copy))]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccountView {
    /// Raw (pointer to) account data.
    ///
    /// Note that this pointer can be shared across multiple `AccountView`.
    raw: *mut RuntimeAccount,

    origin: Origin,
}

impl AccountView {
    /// Creates a view over a record serialized by the host.
    ///
    /// # Safety
    ///
    /// `raw` must point into the program input, at a record followed by its
    /// data, the growth reserve and the rent epoch. The memory must outlive
    /// every use of the view.
    #[inline(always)]
    pub unsafe fn new_unchecked(raw: *mut RuntimeAccount) -> Self {
        Self {
            raw,
            origin: Origin::Runtime,
        }
    }

    /// Creates a view over a record the program assembled itself.
    ///
    /// Detached views cannot be resized, report no rent epoch and are copied
    /// when passed to a cross-program invocation.
    ///
    /// # Safety
    ///
    /// `raw` must point at a record immediately followed by `data_len`
    /// bytes of data, and the memory must outlive every use of the view.
    #[inline(always)]
    pub unsafe fn new_detached(raw: *mut RuntimeAccount) -> Self {
        Self {
            raw,
            origin: Origin::Detached,
        }
    }

    /// Where the underlying record lives.
    #[inline(always)]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Address of the account.
    #[inline(always)]
    pub fn address(&self) -> &Address {
        // SAFETY: The `raw` pointer is guaranteed to be valid.
        unsafe { &(*self.raw).address }
    }

    /// Return a reference to the address of the program that owns this account.
    ///
    /// For ownership checks, use the safe `owned_by` method instead.
    ///
    /// # Safety
    ///
    /// The owner field can be modified by `assign` and `close` through any
    /// view of the account. It is undefined behavior to use this reference
    /// after the account has been modified.
    #[inline(always)]
    pub unsafe fn owner(&self) -> &Address {
        unsafe { &(*self.raw).owner }
    }

    /// Checks if the account is owned by the given program.
    #[inline(always)]
    pub fn owned_by(&self, program: &Address) -> bool {
        // SAFETY: The reference does not outlive this call.
        quartz_address::address_eq(unsafe { self.owner() }, program)
    }

    /// Indicate whether the transaction was signed by this account.
    #[inline(always)]
    pub fn is_signer(&self) -> bool {
        unsafe { (*self.raw).is_signer != 0 }
    }

    /// Indicate whether the account is writable.
    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        unsafe { (*self.raw).is_writable != 0 }
    }

    /// Indicate whether this account represents an executable program.
    ///
    /// Program accounts are always read-only.
    #[inline(always)]
    pub fn executable(&self) -> bool {
        unsafe { (*self.raw).executable != 0 }
    }

    /// Return the size of the data in the account.
    #[inline(always)]
    pub fn data_len(&self) -> usize {
        unsafe { (*self.raw).data_len as usize }
    }

    /// Indicates whether the account data is empty.
    #[inline(always)]
    pub fn is_data_empty(&self) -> bool {
        self.data_len() == 0
    }

    /// Return the delta between the current data length and the length the
    /// host serialized.
    ///
    /// This value is different than zero only if the account has been
    /// resized during the current instruction.
    #[inline(always)]
    pub fn resize_delta(&self) -> i32 {
        unsafe { (*self.raw).resize_delta }
    }

    /// Data length at the start of the instruction.
    #[inline(always)]
    pub fn original_data_len(&self) -> usize {
        (self.data_len() as i64 - self.resize_delta() as i64) as usize
    }

    /// Return the lamports in the account.
    ///
    /// Use [`try_borrow_mut_lamports`](Self::try_borrow_mut_lamports) to
    /// change them.
    #[inline(always)]
    pub fn lamports(&self) -> u64 {
        unsafe { (*self.raw).lamports }
    }

    /// Rent epoch the host serialized after the account data.
    ///
    /// Returns `None` for [`Origin::Detached`] views, which carry no rent
    /// epoch.
    #[inline]
    pub fn rent_epoch(&self) -> Option<u64> {
        match self.origin {
            Origin::Runtime => {
                // The host places the rent epoch after the *original* data,
                // so resizing during the instruction does not move it.
                let offset = MAX_PERMITTED_DATA_INCREASE
                    + align_up(self.original_data_len(), BPF_ALIGN_OF_U128);
                // SAFETY: Runtime records are followed by the full layout.
                Some(unsafe { (self.data_ptr().add(offset) as *const u64).read_unaligned() })
            }
            Origin::Detached => None,
        }
    }

    /// Changes the owner of the account.
    ///
    /// Fails with [`ProgramError::AccountNotWritable`] if the account is
    /// read-only.
    #[allow(clippy::clone_on_copy)]
    #[inline(always)]
    pub fn assign(&self, new_owner: &Address) -> ProgramResult {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        // SAFETY: The `raw` pointer is guaranteed to be valid; references
        // handed out by `owner` are covered by its safety contract.
        unsafe { write(addr_of_mut!((*self.raw).owner), new_owner.clone()) };
        Ok(())
    }

    /// Snapshot of the raw borrow state byte.
    #[inline(always)]
    pub fn borrow_state(&self) -> u8 {
        self.state().load(Ordering::Relaxed)
    }

    /// Return `true` if any of the borrows in `state` is outstanding.
    ///
    /// ```ignore
    /// if account.is_borrowed(BorrowState::MutablyBorrowed) {
    ///     // lamports or data are mutably borrowed
    /// }
    /// ```
    #[inline(always)]
    pub fn is_borrowed(&self, state: BorrowState) -> bool {
        let mask = state as u8;
        // Any flag or slot bit of the mask that is cleared means a borrow.
        self.borrow_state() & mask != mask
    }

    /// Check that an immutable borrow of the lamports would succeed.
    #[inline(always)]
    pub fn can_borrow_lamports(&self) -> Result<(), ProgramError> {
        shared_conflict(self.borrow_state(), LAMPORTS_BORROW_SHIFT).map_or(Ok(()), Err)
    }

    /// Check that a mutable borrow of the lamports would succeed.
    #[inline(always)]
    pub fn can_borrow_mut_lamports(&self) -> Result<(), ProgramError> {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        exclusive_conflict(self.borrow_state(), LAMPORTS_BORROW_SHIFT).map_or(Ok(()), Err)
    }

    /// Check that an immutable borrow of the data would succeed.
    #[inline(always)]
    pub fn can_borrow_data(&self) -> Result<(), ProgramError> {
        shared_conflict(self.borrow_state(), DATA_BORROW_SHIFT).map_or(Ok(()), Err)
    }

    /// Check that a mutable borrow of the data would succeed.
    #[inline(always)]
    pub fn can_borrow_mut_data(&self) -> Result<(), ProgramError> {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        exclusive_conflict(self.borrow_state(), DATA_BORROW_SHIFT).map_or(Ok(()), Err)
    }

    /// Borrow the lamports immutably.
    ///
    /// Fails with [`ProgramError::AlreadyMutablyBorrowed`] while a mutable
    /// borrow of the lamports exists and with
    /// [`ProgramError::BorrowLimitExceeded`] when [`MAX_IMMUTABLE_BORROWS`]
    /// are already held. The slot is held until the [`Ref`] is dropped.
    pub fn try_borrow_lamports(&self) -> Result<Ref<'_, u64>, ProgramError> {
        let state = self.state();
        acquire_shared(state, LAMPORTS_BORROW_SHIFT)?;

        // SAFETY: A lamports slot is held by the returned guard.
        unsafe {
            Ok(Ref::new(
                NonNull::new_unchecked(addr_of_mut!((*self.raw).lamports)),
                state,
                LAMPORTS_BORROW_SHIFT,
            ))
        }
    }

    /// Borrow the lamports mutably.
    ///
    /// Fails with [`ProgramError::AccountNotWritable`] for read-only
    /// accounts, [`ProgramError::AlreadyMutablyBorrowed`] while another
    /// mutable borrow exists and [`ProgramError::AlreadyBorrowed`] while any
    /// immutable borrow of the lamports exists.
    pub fn try_borrow_mut_lamports(&self) -> Result<RefMut<'_, u64>, ProgramError> {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        let state = self.state();
        acquire_exclusive(state, LAMPORTS_BORROW_SHIFT)?;

        // SAFETY: The lamports flag is held by the returned guard.
        unsafe {
            Ok(RefMut::new(
                NonNull::new_unchecked(addr_of_mut!((*self.raw).lamports)),
                state,
                LAMPORTS_BORROW_SHIFT,
            ))
        }
    }

    /// Borrow the data immutably.
    ///
    /// Same failure modes as [`try_borrow_lamports`](Self::try_borrow_lamports),
    /// tracked independently of the lamports.
    pub fn try_borrow_data(&self) -> Result<Ref<'_, [u8]>, ProgramError> {
        let state = self.state();
        acquire_shared(state, DATA_BORROW_SHIFT)?;

        // SAFETY: A data slot is held by the returned guard.
        unsafe {
            Ok(Ref::new(
                NonNull::from(from_raw_parts(self.data_ptr(), self.data_len())),
                state,
                DATA_BORROW_SHIFT,
            ))
        }
    }

    /// Borrow the data mutably.
    ///
    /// Same failure modes as
    /// [`try_borrow_mut_lamports`](Self::try_borrow_mut_lamports), tracked
    /// independently of the lamports.
    pub fn try_borrow_mut_data(&self) -> Result<RefMut<'_, [u8]>, ProgramError> {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        let state = self.state();
        acquire_exclusive(state, DATA_BORROW_SHIFT)?;

        // SAFETY: The data flag is held by the returned guard.
        unsafe {
            Ok(RefMut::new(
                NonNull::from(from_raw_parts_mut(self.data_ptr(), self.data_len())),
                state,
                DATA_BORROW_SHIFT,
            ))
        }
    }

    /// Returns a read-only reference to the data in the account.
    ///
    /// # Safety
    ///
    /// This method is unsafe because it does not return a `Ref`, thus leaving the borrow
    /// state untouched. Useful when an instruction has verified non-duplicate accounts.
    #[inline(always)]
    pub unsafe fn borrow_data_unchecked(&self) -> &[u8] {
        from_raw_parts(self.data_ptr(), self.data_len())
    }

    /// Returns a mutable reference to the data in the account.
    ///
    /// # Safety
    ///
    /// This method is unsafe because it does not return a `RefMut`, thus leaving the
    /// borrow state untouched. Useful when an instruction has verified non-duplicate
    /// accounts.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub unsafe fn borrow_data_unchecked_mut(&self) -> &mut [u8] {
        from_raw_parts_mut(self.data_ptr(), self.data_len())
    }

    /// Resize (either truncating or zero extending) the account's data.
    ///
    /// The data can grow by at most [`MAX_PERMITTED_DATA_INCREASE`] bytes over
    /// its original length within an instruction.
    ///
    /// Fails with [`ProgramError::AccountNotWritable`] for read-only
    /// accounts, with a borrow error while the data is borrowed and with
    /// [`ProgramError::InvalidRealloc`] for [`Origin::Detached`] views or when
    /// the growth limit is exceeded.
    #[inline]
    pub fn resize(&self, new_len: usize) -> ProgramResult {
        if self.origin == Origin::Detached {
            return Err(ProgramError::InvalidRealloc);
        }
        self.can_borrow_mut_data()?;

        // SAFETY: The data is not borrowed and the record has a growth
        // reserve.
        unsafe { self.resize_unchecked(new_len) }
    }

    /// Resize (either truncating or zero extending) the account's data.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that there are no active borrows to the
    /// account data and that the view is [`Origin::Runtime`].
    #[inline(always)]
    pub unsafe fn resize_unchecked(&self, new_len: usize) -> ProgramResult {
        // Account length is always `< i32::MAX`...
        let current_len = self.data_len() as i32;
        // ...so the new length must fit in an `i32`.
        let new_len = i32::try_from(new_len).map_err(|_| ProgramError::InvalidRealloc)?;

        if new_len == current_len {
            return Ok(());
        }

        let difference = new_len - current_len;
        let accumulated_resize_delta = self.resize_delta() + difference;

        // Growing past the reserve would overwrite the rent epoch.
        if accumulated_resize_delta > MAX_PERMITTED_DATA_INCREASE as i32 {
            return Err(ProgramError::InvalidRealloc);
        }

        unsafe {
            (*self.raw).data_len = new_len as u64;
            (*self.raw).resize_delta = accumulated_resize_delta;
        }

        if difference > 0 {
            unsafe {
                write_bytes(
                    self.data_ptr().add(current_len as usize),
                    0,
                    difference as usize,
                );
            }
        }

        Ok(())
    }

    /// Zero out the account's data length, lamports and owner fields,
    /// effectively closing the account.
    ///
    /// The data bytes themselves are left for the host to clear, and the
    /// lamports must be moved out beforehand to keep the instruction
    /// balanced.
    ///
    /// Fails with [`ProgramError::AccountNotWritable`] for read-only accounts
    /// and [`ProgramError::AccountBorrowFailed`] while anything is borrowed.
    #[inline]
    pub fn close(&self) -> ProgramResult {
        if !self.is_writable() {
            return Err(ProgramError::AccountNotWritable);
        }
        if self.is_borrowed(BorrowState::Borrowed) {
            return Err(ProgramError::AccountBorrowFailed);
        }

        // SAFETY: There are no active borrows on the account data or lamports.
        unsafe {
            // Keep the original length recoverable after the data length is
            // zeroed (account length is always `< i32::MAX`).
            (*self.raw).resize_delta = self.resize_delta() - self.data_len() as i32;

            self.close_unchecked();
        }

        Ok(())
    }

    /// Zero out the account's data length, lamports and owner fields.
    ///
    /// Unlike [`close`](Self::close) this leaves the resize delta untouched,
    /// so a later [`resize`](Self::resize) may compute a wrong original
    /// length.
    ///
    /// # Safety
    ///
    /// The account must not be borrowed in any form.
    #[inline(always)]
    pub unsafe fn close_unchecked(&self) {
        // The 48 bytes before the account data are the owner, the lamports
        // and the data length.
        write_bytes(self.data_ptr().sub(48), 0, 48);
    }

    /// Returns the raw pointer to the `RuntimeAccount` struct.
    pub const fn account_ptr(&self) -> *const RuntimeAccount {
        self.raw
    }

    /// Returns the memory address of the account data.
    ///
    /// # Important
    ///
    /// Obtaining the raw pointer itself is safe, but de-referencing it requires
    /// the caller to uphold Rust's aliasing rules. It is undefined behavior to
    /// de-reference the pointer or write through it while any guard returned
    /// by the borrow methods is alive.
    #[inline(always)]
    pub fn data_ptr(&self) -> *mut u8 {
        // SAFETY: The `raw` pointer is guaranteed to be valid.
        unsafe { (self.raw as *mut u8).add(size_of::<RuntimeAccount>()) }
    }

    #[inline(always)]
    fn state(&self) -> &AtomicU8 {
        // SAFETY: `borrow_state` is the first byte of the record and lives as
        // long as the view; `AtomicU8` has the same layout as `u8`.
        unsafe { AtomicU8::from_ptr(self.raw as *mut u8) }
    }
}

#[inline(always)]
const fn align_up(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}
