//! Instruction descriptors for cross-program invocation.
//!
//! With the `cpi` feature, the [`cpi`] module hands them to the host.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(test)]
extern crate std;

#[cfg(feature = "cpi")]
#[cfg_attr(docsrs, doc(cfg(feature = "cpi")))]
pub mod cpi;

use {
    core::{marker::PhantomData, ops::Deref, slice::from_raw_parts},
    quartz_account_view::AccountView,
    quartz_address::Address,
};

/// Information about a cross-program invocation instruction.
#[derive(Debug, Clone)]
pub struct InstructionView<'a, 'b, 'c, 'd>
where
    'a: 'b,
{
    /// Address of the program to invoke.
    pub program_id: &'c Address,

    /// Data expected by the program instruction.
    pub data: &'d [u8],

    /// Metadata describing accounts that should be passed to the program.
    pub accounts: &'b [InstructionAccount<'a>],
}

/// Describes a single account read or written by a program during
/// instruction execution.
///
/// Laid out as the host's C account metadata record.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionAccount<'a> {
    /// Address of the account.
    pub address: &'a Address,

    /// Indicates whether the account is writable.
    pub is_writable: bool,

    /// Indicates whether the account signs the instruction.
    pub is_signer: bool,
}

impl<'a> InstructionAccount<'a> {
    #[inline(always)]
    pub const fn new(address: &'a Address, is_writable: bool, is_signer: bool) -> Self {
        Self {
            address,
            is_writable,
            is_signer,
        }
    }

    #[inline(always)]
    pub const fn readonly(address: &'a Address) -> Self {
        Self::new(address, false, false)
    }

    #[inline(always)]
    pub const fn writable(address: &'a Address) -> Self {
        Self::new(address, true, false)
    }

    #[inline(always)]
    pub const fn readonly_signer(address: &'a Address) -> Self {
        Self::new(address, false, true)
    }

    #[inline(always)]
    pub const fn writable_signer(address: &'a Address) -> Self {
        Self::new(address, true, true)
    }
}

impl<'a> From<&'a AccountView> for InstructionAccount<'a> {
    /// Mirror the flags the account was passed in with.
    fn from(account: &'a AccountView) -> Self {
        InstructionAccount::new(account.address(), account.is_writable(), account.is_signer())
    }
}

/// A single seed of a signer, laid out as the host expects it.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Seed<'a> {
    /// Seed bytes.
    seed: *const u8,

    /// Length of the seed bytes.
    len: u64,

    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> From<&'a [u8]> for Seed<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self {
            seed: value.as_ptr(),
            len: value.len() as u64,
            _bytes: PhantomData,
        }
    }
}

impl<'a, const SIZE: usize> From<&'a [u8; SIZE]> for Seed<'a> {
    fn from(value: &'a [u8; SIZE]) -> Self {
        Self {
            seed: value.as_ptr(),
            len: value.len() as u64,
            _bytes: PhantomData,
        }
    }
}

impl Deref for Seed<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: Built from a slice that lives for `'a`.
        unsafe { from_raw_parts(self.seed, self.len as usize) }
    }
}

/// The seeds a program presents to sign for one program derived address.
///
/// The host re-derives the address from these seeds and the calling program's
/// id, and treats the matching account as a signer of the invoked
/// instruction.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Signer<'a, 'b> {
    /// Signer seeds.
    seeds: *const Seed<'a>,

    /// Number of seeds.
    len: u64,

    _seeds: PhantomData<&'b [Seed<'a>]>,
}

impl<'a, 'b> Signer<'a, 'b> {
    /// The seeds of this signer, bump included.
    pub fn seeds(&self) -> &'b [Seed<'a>] {
        // SAFETY: Built from a slice that lives for `'b`.
        unsafe { from_raw_parts(self.seeds, self.len as usize) }
    }
}

impl<'a, 'b> From<&'b [Seed<'a>]> for Signer<'a, 'b> {
    fn from(value: &'b [Seed<'a>]) -> Self {
        Self {
            seeds: value.as_ptr(),
            len: value.len() as u64,
            _seeds: PhantomData,
        }
    }
}

impl<'a, 'b, const SIZE: usize> From<&'b [Seed<'a>; SIZE]> for Signer<'a, 'b> {
    fn from(value: &'b [Seed<'a>; SIZE]) -> Self {
        Self {
            seeds: value.as_ptr(),
            len: value.len() as u64,
            _seeds: PhantomData,
        }
    }
}

/// Convenience macro for constructing a `[Seed; N]` array from a list of
/// seeds.
///
/// # Example
///
/// ```ignore
/// let bump = [254];
/// let seeds = seeds!(b"vault", owner.as_ref(), &bump);
/// let signer = Signer::from(&seeds);
/// ```
#[macro_export]
macro_rules! seeds {
    ( $($seed:expr),* $(,)? ) => {
        [$(
            $crate::Seed::from($seed),
        )*]
    };
}

#[cfg(test)]
mod tests {
    use {super::*, std::vec::Vec};

    #[test]
    fn test_account_constructors() {
        let address = Address::new_from_array([1; 32]);

        let flags = |account: InstructionAccount| (account.is_writable, account.is_signer);
        assert_eq!(flags(InstructionAccount::readonly(&address)), (false, false));
        assert_eq!(flags(InstructionAccount::writable(&address)), (true, false));
        assert_eq!(flags(InstructionAccount::readonly_signer(&address)), (false, true));
        assert_eq!(flags(InstructionAccount::writable_signer(&address)), (true, true));
    }

    #[test]
    fn test_seeds_macro() {
        let owner = Address::new_from_array([4; 32]);
        let bump = [253];
        let seeds = seeds!(b"vault", owner.as_ref(), &bump);
        let signer = Signer::from(&seeds);

        let collected = signer
            .seeds()
            .iter()
            .map(|seed| &seed[..])
            .collect::<Vec<_>>();
        assert_eq!(collected, [&b"vault"[..], &[4; 32][..], &[253][..]]);
    }
}
