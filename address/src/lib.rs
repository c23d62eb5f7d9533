//! Address representation for Quartz programs.
//!
//! An address is a sequence of 32 bytes, often shown as a base58 encoded string
//! (e.g. 14grJpemFaf88c8tiVb77W7TYg2W3ir6pfkKz3YjhhZ5). Addresses of
//! [program derived accounts][derive] are guaranteed to be off the ed25519
//! curve, so no private key exists for them.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(clippy::arithmetic_side_effects)]

pub mod derive;
pub mod error;

#[cfg(any(target_os = "solana", feature = "curve25519"))]
pub use crate::derive::DefaultDeriver;
pub use crate::derive::AddressDeriver;
#[cfg(any(target_os = "solana", feature = "sha2"))]
use crate::error::AddressError;
#[cfg(feature = "decode")]
use crate::error::ParseAddressError;

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;
#[cfg(feature = "decode")]
use core::str::FromStr;
use core::{
    array,
    convert::TryFrom,
    hash::{Hash, Hasher},
    ptr::read_unaligned,
};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

/// Number of bytes in an address.
pub const ADDRESS_BYTES: usize = 32;
/// Maximum length of a single derivation seed.
pub const MAX_SEED_LEN: usize = 32;
/// Maximum number of seeds, bump seed included.
pub const MAX_SEEDS: usize = 16;
#[cfg(feature = "decode")]
/// Maximum string length of a base58 encoded address.
const MAX_BASE58_LEN: usize = 44;

/// Suffix hashed after the seeds and the program id when deriving a program address.
pub const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

/// The address of an account.
///
/// Some addresses are ed25519 public keys whose secret keys are managed
/// off-chain. Program derived addresses have no secret key at all: the
/// owning program "signs" for them by presenting the seeds they were derived
/// from when it invokes another program.
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(not(feature = "decode"), derive(Debug))]
#[cfg_attr(feature = "copy", derive(Copy))]
#[derive(Clone, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Address(pub(crate) [u8; 32]);

#[cfg(feature = "decode")]
impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use five8::DecodeError;
        if s.len() > MAX_BASE58_LEN {
            return Err(ParseAddressError::WrongSize);
        }
        let mut bytes = [0; ADDRESS_BYTES];
        five8::decode_32(s, &mut bytes).map_err(|e| match e {
            DecodeError::InvalidChar(_) => ParseAddressError::Invalid,
            DecodeError::TooLong
            | DecodeError::TooShort
            | DecodeError::LargestTermTooHigh
            | DecodeError::OutputTooLong => ParseAddressError::WrongSize,
        })?;
        Ok(Address(bytes))
    }
}

/// Hashes the raw bytes only; the length is always the same.
impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.as_array());
    }
}

impl From<&Address> for Address {
    #[inline]
    fn from(value: &Address) -> Self {
        Self(value.0)
    }
}

impl From<[u8; 32]> for Address {
    #[inline]
    fn from(from: [u8; 32]) -> Self {
        Self(from)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = array::TryFromSliceError;

    #[inline]
    fn try_from(address: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 32]>::try_from(address).map(Self::from)
    }
}

#[cfg(feature = "alloc")]
impl TryFrom<Vec<u8>> for Address {
    type Error = Vec<u8>;

    #[inline]
    fn try_from(address: Vec<u8>) -> Result<Self, Self::Error> {
        <[u8; 32]>::try_from(address).map(Self::from)
    }
}

#[cfg(feature = "decode")]
impl TryFrom<&str> for Address {
    type Error = ParseAddressError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Address::from_str(s)
    }
}

/// Whether `bytes` decompress to a point on the ed25519 curve.
#[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
pub fn bytes_are_curve_point<T: AsRef<[u8]>>(bytes: T) -> bool {
    let Ok(compressed_edwards_y) =
        curve25519_dalek::edwards::CompressedEdwardsY::from_slice(bytes.as_ref())
    else {
        return false;
    };
    compressed_edwards_y.decompress().is_some()
}

impl Address {
    pub const fn new_from_array(address_array: [u8; 32]) -> Self {
        Self(address_array)
    }

    #[cfg(feature = "decode")]
    /// Decode a string into an `Address`, usable in a const context
    pub const fn from_str_const(s: &str) -> Self {
        let id_array = five8_const::decode_32_const(s);
        Address::new_from_array(id_array)
    }

    /// Derive an address from a base address, a string seed and an owner.
    ///
    /// The result is the SHA-256 digest of `base`, `seed` and `owner`.
    /// Owners whose last bytes spell [`PDA_MARKER`] are rejected, since the
    /// digest could then collide with a program derived address.
    #[cfg(any(target_os = "solana", feature = "sha2"))]
    pub fn create_with_seed(
        base: &Address,
        seed: &str,
        owner: &Address,
    ) -> Result<Address, AddressError> {
        if seed.len() > MAX_SEED_LEN {
            return Err(AddressError::MaxSeedLengthExceeded);
        }

        let owner = owner.as_ref();
        if owner.ends_with(PDA_MARKER) {
            return Err(AddressError::IllegalOwner);
        }
        Ok(Address::from(sha256(&[base.as_ref(), seed.as_ref(), owner])))
    }

    /// Create a program derived address from a complete seed list, bump included.
    ///
    /// Fails with [`AddressError::InvalidSeeds`] when the digest lands on the
    /// curve and with [`AddressError::MaxSeedLengthExceeded`] when the seeds
    /// break the [`MAX_SEEDS`] or [`MAX_SEED_LEN`] limits.
    ///
    /// Use [`find_program_address`](Self::find_program_address) to search for
    /// a bump seed, and this function to cheaply verify a known one.
    ///
    /// ```
    /// # use quartz_address::Address;
    /// let program_id = Address::new_from_array([7; 32]);
    /// let (expected, bump) = Address::find_program_address(&[b"vault"], &program_id)?;
    /// let actual = Address::create_program_address(&[b"vault", &[bump]], &program_id)?;
    /// assert_eq!(expected, actual);
    /// # Ok::<(), quartz_address::error::AddressError>(())
    /// ```
    #[cfg(any(target_os = "solana", feature = "curve25519"))]
    #[inline(always)]
    pub fn create_program_address(
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<Address, AddressError> {
        DefaultDeriver::default().create_program_address(seeds, program_id)
    }

    /// Find a program derived address and the highest bump seed that yields it.
    ///
    /// Bump seeds are tried from 255 down to 0. The search is deterministic
    /// but its cost varies with the inputs, so programs usually receive the
    /// bump from the client and verify it with
    /// [`create_program_address`](Self::create_program_address).
    ///
    /// Seeds are hashed back to back: `["abc", "def"]` and `["abcdef"]`
    /// derive the same address for the same program. Programs that mix
    /// variable length seeds should add separators.
    ///
    /// Fails with [`AddressError::NoViableBumpSeed`] in the improbable case
    /// that every bump seed lands on the curve.
    #[cfg(any(target_os = "solana", feature = "curve25519"))]
    #[inline(always)]
    pub fn find_program_address(
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<(Address, u8), AddressError> {
        DefaultDeriver::default().find_program_address(seeds, program_id)
    }

    pub const fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Return a reference to the `Address`'s byte array.
    #[inline(always)]
    pub const fn as_array(&self) -> &[u8; 32] {
        &self.0
    }

    #[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
    pub fn is_on_curve(&self) -> bool {
        bytes_are_curve_point(self)
    }

    /// Log an `Address` from a program.
    #[cfg(target_os = "solana")]
    pub fn log(&self) {
        unsafe { quartz_define_syscall::definitions::sol_log_pubkey(self.0.as_ptr()) };
    }

    /// Log an `Address` value.
    #[cfg(all(not(target_os = "solana"), feature = "std"))]
    pub fn log(&self) {
        std::println!("{}", std::string::ToString::to_string(&self));
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl AsMut<[u8]> for Address {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

#[cfg(target_os = "solana")]
fn sha256(vals: &[&[u8]]) -> [u8; 32] {
    let mut hash = [0u8; 32];
    unsafe {
        quartz_define_syscall::definitions::sol_sha256(
            vals as *const _ as *const u8,
            vals.len() as u64,
            hash.as_mut_ptr(),
        );
    }
    hash
}

#[cfg(all(not(target_os = "solana"), feature = "sha2"))]
fn sha256(vals: &[&[u8]]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    for val in vals {
        hasher.update(val);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

#[cfg(feature = "decode")]
fn write_as_base58(f: &mut core::fmt::Formatter, p: &Address) -> core::fmt::Result {
    let mut out = [0u8; MAX_BASE58_LEN];
    let len = five8::encode_32(&p.0, &mut out) as usize;
    // any sequence of base58 chars is valid utf8
    let as_str = unsafe { core::str::from_utf8_unchecked(&out[..len]) };
    f.write_str(as_str)
}

#[cfg(feature = "decode")]
impl core::fmt::Debug for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write_as_base58(f, self)
    }
}

#[cfg(feature = "decode")]
impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write_as_base58(f, self)
    }
}

/// Compare two addresses as four `u64` words.
///
/// Cheaper in compute units than the derived `PartialEq`, which compares
/// byte by byte on the on-chain target.
#[inline(always)]
pub fn address_eq(a1: &Address, a2: &Address) -> bool {
    let p1_ptr = a1.0.as_ptr().cast::<u64>();
    let p2_ptr = a2.0.as_ptr().cast::<u64>();

    unsafe {
        read_unaligned(p1_ptr) == read_unaligned(p2_ptr)
            && read_unaligned(p1_ptr.add(1)) == read_unaligned(p2_ptr.add(1))
            && read_unaligned(p1_ptr.add(2)) == read_unaligned(p2_ptr.add(2))
            && read_unaligned(p1_ptr.add(3)) == read_unaligned(p2_ptr.add(3))
    }
}

#[cfg(feature = "decode")]
/// Define a constant `Address` from a base58 literal.
///
/// # Example
///
/// ```
/// use std::str::FromStr;
/// use quartz_address::{address, Address};
///
/// static VAULT_PROGRAM: Address = address!("Vau1t11111111111111111111111111111111111111");
///
/// let parsed = Address::from_str("Vau1t11111111111111111111111111111111111111").unwrap();
/// assert_eq!(VAULT_PROGRAM, parsed);
/// ```
#[macro_export]
macro_rules! address {
    ($input:literal) => {
        $crate::Address::from_str_const($input)
    };
}

/// Declare the program's own address as `ID`, with `id()` and `check_id()` helpers.
///
/// # Example
///
/// ```
/// # mod item_wrapper {
/// #   use quartz_address::declare_id;
/// declare_id!("Vau1t11111111111111111111111111111111111111");
/// # }
/// # use item_wrapper::{check_id, id};
/// assert!(check_id(&id()));
/// ```
#[cfg(feature = "decode")]
#[macro_export]
macro_rules! declare_id {
    ($address:expr) => {
        /// The const program ID.
        pub const ID: $crate::Address = $crate::Address::from_str_const($address);

        /// Returns `true` if given address is the ID.
        pub fn check_id(id: &$crate::Address) -> bool {
            $crate::address_eq(id, &ID)
        }

        /// Returns the ID.
        pub const fn id() -> $crate::Address {
            ID
        }
    };
}
