//! Runtime borrow tracking.
//!
//! The first byte of every account record is repurposed as a lock word once
//! the input has been parsed:
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +-+-----+-+-----+
//! |L| l l |D| d d |
//! +-+-----+-+-----+
//! ```
//!
//! `L`/`D` are set while no mutable borrow of the lamports/data is
//! outstanding, `lll`/`ddd` count the immutable borrows still available
//! (7 when none are taken). The parser hands the byte over as
//! [`NOT_BORROWED`] since a non-duplicate record starts with `0xFF`.
//!
//! Duplicated accounts share the record, so every view of the same account
//! updates the same byte. Transitions are compare-and-swap loops on an
//! [`AtomicU8`] and every successful acquisition is paired with a [`Ref`] or
//! [`RefMut`] guard that restores exactly the bits it took when dropped.

use {
    core::{
        marker::PhantomData,
        mem::ManuallyDrop,
        ops::{Deref, DerefMut},
        ptr::NonNull,
        sync::atomic::{AtomicU8, Ordering},
    },
    quartz_program_error::ProgramError,
};

/// State byte of an account with no outstanding borrows.
///
/// This value is the same as `quartz_program_entrypoint::NON_DUP_MARKER`.
pub const NOT_BORROWED: u8 = u8::MAX;

/// Number of immutable borrows a single field supports at the same time.
pub const MAX_IMMUTABLE_BORROWS: u8 = 7;

/// Position of the lamports nibble in the state byte.
pub(crate) const LAMPORTS_BORROW_SHIFT: u8 = 4;

/// Position of the data nibble in the state byte.
pub(crate) const DATA_BORROW_SHIFT: u8 = 0;

const MUTABLE_BORROW_FLAG: u8 = 0b_1000;

const IMMUTABLE_BORROW_MASK: u8 = 0b_0111;

/// Masks for [`AccountView::is_borrowed`](crate::AccountView::is_borrowed).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorrowState {
    /// Any borrow of the lamports or the data.
    Borrowed = 0b_1111_1111,

    /// A mutable borrow of the lamports or the data.
    MutablyBorrowed = 0b_1000_1000,
}

/// Error a shared borrow of the field at `shift` would fail with, if any.
#[inline(always)]
pub(crate) const fn shared_conflict(state: u8, shift: u8) -> Option<ProgramError> {
    if state & (MUTABLE_BORROW_FLAG << shift) == 0 {
        Some(ProgramError::AlreadyMutablyBorrowed)
    } else if state & (IMMUTABLE_BORROW_MASK << shift) == 0 {
        Some(ProgramError::BorrowLimitExceeded)
    } else {
        None
    }
}

/// Error an exclusive borrow of the field at `shift` would fail with, if any.
#[inline(always)]
pub(crate) const fn exclusive_conflict(state: u8, shift: u8) -> Option<ProgramError> {
    if state & (MUTABLE_BORROW_FLAG << shift) == 0 {
        Some(ProgramError::AlreadyMutablyBorrowed)
    } else if state & (IMMUTABLE_BORROW_MASK << shift) != IMMUTABLE_BORROW_MASK << shift {
        Some(ProgramError::AlreadyBorrowed)
    } else {
        None
    }
}

/// Take one immutable slot of the field at `shift`.
#[inline]
pub(crate) fn acquire_shared(state: &AtomicU8, shift: u8) -> Result<(), ProgramError> {
    let mut current = state.load(Ordering::Relaxed);
    loop {
        if let Some(error) = shared_conflict(current, shift) {
            return Err(error);
        }
        // At least one slot is available, so the counter does not underflow
        // into the neighbouring flag.
        match state.compare_exchange_weak(
            current,
            current - (1 << shift),
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Ok(()),
            Err(actual) => current = actual,
        }
    }
}

/// Clear the mutable flag of the field at `shift`.
#[inline]
pub(crate) fn acquire_exclusive(state: &AtomicU8, shift: u8) -> Result<(), ProgramError> {
    let mut current = state.load(Ordering::Relaxed);
    loop {
        if let Some(error) = exclusive_conflict(current, shift) {
            return Err(error);
        }
        match state.compare_exchange_weak(
            current,
            current & !(MUTABLE_BORROW_FLAG << shift),
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Ok(()),
            Err(actual) => current = actual,
        }
    }
}

/// Reference to account data or lamports with checked borrow rules.
#[derive(Debug)]
pub struct Ref<'a, T: ?Sized> {
    value: NonNull<T>,
    state: &'a AtomicU8,
    /// Nibble of `state` holding the slot this guard took.
    borrow_shift: u8,
    /// The `value` raw pointer is only valid while the `&'a T` lives so we claim
    /// to hold a reference to it.
    marker: PhantomData<&'a T>,
}

impl<'a, T: ?Sized> Ref<'a, T> {
    /// Wrap `value` in a guard that gives back one immutable slot on drop.
    ///
    /// # Safety
    ///
    /// The caller must have taken the slot with [`acquire_shared`] and
    /// `value` must stay valid for `'a`.
    #[inline(always)]
    pub(crate) unsafe fn new(value: NonNull<T>, state: &'a AtomicU8, borrow_shift: u8) -> Self {
        Self {
            value,
            state,
            borrow_shift,
            marker: PhantomData,
        }
    }

    /// Maps a reference to a new type.
    #[inline]
    pub fn map<U: ?Sized, F>(orig: Ref<'a, T>, f: F) -> Ref<'a, U>
    where
        F: FnOnce(&T) -> &U,
    {
        // The new guard inherits the slot.
        let orig = ManuallyDrop::new(orig);
        Ref {
            value: NonNull::from(f(&*orig)),
            state: orig.state,
            borrow_shift: orig.borrow_shift,
            marker: PhantomData,
        }
    }

    /// Tries to makes a new `Ref` for a component of the borrowed data.
    /// On failure, the original guard is returned alongside with the error
    /// returned by the closure.
    #[inline]
    pub fn try_map<U: ?Sized, E>(
        orig: Ref<'a, T>,
        f: impl FnOnce(&T) -> Result<&U, E>,
    ) -> Result<Ref<'a, U>, (Self, E)> {
        let orig = ManuallyDrop::new(orig);
        match f(&*orig) {
            Ok(value) => Ok(Ref {
                value: NonNull::from(value),
                state: orig.state,
                borrow_shift: orig.borrow_shift,
                marker: PhantomData,
            }),
            Err(e) => Err((ManuallyDrop::into_inner(orig), e)),
        }
    }

    /// Filters and maps a reference to a new type.
    #[inline]
    pub fn filter_map<U: ?Sized, F>(orig: Ref<'a, T>, f: F) -> Result<Ref<'a, U>, Self>
    where
        F: FnOnce(&T) -> Option<&U>,
    {
        let orig = ManuallyDrop::new(orig);
        match f(&*orig) {
            Some(value) => Ok(Ref {
                value: NonNull::from(value),
                state: orig.state,
                borrow_shift: orig.borrow_shift,
                marker: PhantomData,
            }),
            None => Err(ManuallyDrop::into_inner(orig)),
        }
    }
}

impl<T: ?Sized> Deref for Ref<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { self.value.as_ref() }
    }
}

impl<T: ?Sized> Drop for Ref<'_, T> {
    fn drop(&mut self) {
        // Give the immutable slot back.
        self.state
            .fetch_add(1 << self.borrow_shift, Ordering::Release);
    }
}

/// Mutable reference to account data or lamports with checked borrow rules.
#[derive(Debug)]
pub struct RefMut<'a, T: ?Sized> {
    value: NonNull<T>,
    state: &'a AtomicU8,
    /// Nibble of `state` holding the flag this guard cleared.
    borrow_shift: u8,
    /// The `value` raw pointer is only valid while the `&'a T` lives so we claim
    /// to hold a reference to it.
    marker: PhantomData<&'a mut T>,
}

impl<'a, T: ?Sized> RefMut<'a, T> {
    /// Wrap `value` in a guard that sets the mutable flag back on drop.
    ///
    /// # Safety
    ///
    /// The caller must have cleared the flag with [`acquire_exclusive`] and
    /// `value` must stay valid for `'a`.
    #[inline(always)]
    pub(crate) unsafe fn new(value: NonNull<T>, state: &'a AtomicU8, borrow_shift: u8) -> Self {
        Self {
            value,
            state,
            borrow_shift,
            marker: PhantomData,
        }
    }

    /// Maps a mutable reference to a new type.
    #[inline]
    pub fn map<U: ?Sized, F>(orig: RefMut<'a, T>, f: F) -> RefMut<'a, U>
    where
        F: FnOnce(&mut T) -> &mut U,
    {
        let mut orig = ManuallyDrop::new(orig);
        RefMut {
            value: NonNull::from(f(&mut *orig)),
            state: orig.state,
            borrow_shift: orig.borrow_shift,
            marker: PhantomData,
        }
    }

    /// Tries to makes a new `RefMut` for a component of the borrowed data.
    /// On failure, the original guard is returned alongside with the error
    /// returned by the closure.
    #[inline]
    pub fn try_map<U: ?Sized, E>(
        orig: RefMut<'a, T>,
        f: impl FnOnce(&mut T) -> Result<&mut U, E>,
    ) -> Result<RefMut<'a, U>, (Self, E)> {
        let mut orig = ManuallyDrop::new(orig);
        match f(&mut *orig) {
            Ok(value) => Ok(RefMut {
                value: NonNull::from(value),
                state: orig.state,
                borrow_shift: orig.borrow_shift,
                marker: PhantomData,
            }),
            Err(e) => Err((ManuallyDrop::into_inner(orig), e)),
        }
    }

    /// Filters and maps a mutable reference to a new type.
    #[inline]
    pub fn filter_map<U: ?Sized, F>(orig: RefMut<'a, T>, f: F) -> Result<RefMut<'a, U>, Self>
    where
        F: FnOnce(&mut T) -> Option<&mut U>,
    {
        let mut orig = ManuallyDrop::new(orig);
        match f(&mut *orig) {
            Some(value) => Ok(RefMut {
                value: NonNull::from(value),
                state: orig.state,
                borrow_shift: orig.borrow_shift,
                marker: PhantomData,
            }),
            None => Err(ManuallyDrop::into_inner(orig)),
        }
    }
}

impl<T: ?Sized> Deref for RefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { self.value.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for RefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut <Self as core::ops::Deref>::Target {
        unsafe { self.value.as_mut() }
    }
}

impl<T: ?Sized> Drop for RefMut<'_, T> {
    fn drop(&mut self) {
        // Set the mutable flag back.
        self.state
            .fetch_or(MUTABLE_BORROW_FLAG << self.borrow_shift, Ordering::Release);
    }
}
