//! Program derived addresses.
//!
//! A program derived address is the SHA-256 digest of the seeds, the program
//! id and [`PDA_MARKER`](crate::PDA_MARKER), accepted only when the digest is *not* a valid
//! ed25519 point. The host recomputes the same digest when a program signs
//! for the address during a cross-program invocation, so the scheme must
//! match it byte for byte.
//!
//! The single-digest primitive is abstracted behind [`AddressDeriver`]: the
//! on-chain implementation delegates to the host, the off-chain one computes
//! the digest and the curve check locally, and tests can substitute their own.

#[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
use crate::PDA_MARKER;
use crate::{error::AddressError, Address, MAX_SEEDS, MAX_SEED_LEN};

/// Derivation primitive used to create and search for program addresses.
pub trait AddressDeriver {
    /// Derive the address for a complete seed list, bump seed included.
    ///
    /// Implementations return [`AddressError::InvalidSeeds`] when the digest
    /// lands on the curve and [`AddressError::MaxSeedLengthExceeded`] when the
    /// seeds break the limits checked by [`check_seeds`].
    fn create_program_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<Address, AddressError>;

    /// Search for the highest bump seed, from 255 down to 0, that yields an
    /// off-curve address for `seeds`.
    ///
    /// `seeds` must leave room for the bump seed, so at most
    /// `MAX_SEEDS - 1` seeds are accepted. Errors other than
    /// [`AddressError::InvalidSeeds`] stop the search immediately.
    fn find_program_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<(Address, u8), AddressError> {
        if seeds.len() >= MAX_SEEDS {
            return Err(AddressError::MaxSeedLengthExceeded);
        }

        const EMPTY: &[u8] = &[];
        for bump in (0..=u8::MAX).rev() {
            let bump_seed = [bump];
            let mut seeds_with_bump = [EMPTY; MAX_SEEDS];
            seeds_with_bump[..seeds.len()].copy_from_slice(seeds);
            seeds_with_bump[seeds.len()] = &bump_seed;

            match self.create_program_address(&seeds_with_bump[..=seeds.len()], program_id) {
                Ok(address) => return Ok((address, bump)),
                Err(AddressError::InvalidSeeds) => continue,
                Err(error) => return Err(error),
            }
        }
        Err(AddressError::NoViableBumpSeed)
    }
}

/// Check `seeds` against [`MAX_SEEDS`] and [`MAX_SEED_LEN`].
#[inline(always)]
pub fn check_seeds(seeds: &[&[u8]]) -> Result<(), AddressError> {
    if seeds.len() > MAX_SEEDS || seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(AddressError::MaxSeedLengthExceeded);
    }
    Ok(())
}

/// Deriver used by [`Address::create_program_address`] and
/// [`Address::find_program_address`] on the current target.
#[cfg(target_os = "solana")]
pub type DefaultDeriver = SyscallDeriver;
/// Deriver used by [`Address::create_program_address`] and
/// [`Address::find_program_address`] on the current target.
#[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
pub type DefaultDeriver = Curve25519Deriver;

/// Delegates each derivation to the `sol_create_program_address` syscall.
#[cfg(target_os = "solana")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SyscallDeriver;

#[cfg(target_os = "solana")]
impl AddressDeriver for SyscallDeriver {
    #[inline(always)]
    fn create_program_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<Address, AddressError> {
        use num_traits::FromPrimitive;

        check_seeds(seeds)?;

        let mut bytes = core::mem::MaybeUninit::<Address>::uninit();
        let result = unsafe {
            quartz_define_syscall::definitions::sol_create_program_address(
                seeds as *const _ as *const u8,
                seeds.len() as u64,
                program_id as *const _ as *const u8,
                bytes.as_mut_ptr() as *mut u8,
            )
        };
        match result {
            // SAFETY: The syscall has initialized the bytes.
            0 => Ok(unsafe { bytes.assume_init() }),
            _ => Err(AddressError::from_u64(result).unwrap_or(AddressError::InvalidSeeds)),
        }
    }
}

/// Computes the digest with `sha2` and rejects on-curve results with
/// `curve25519-dalek`, mirroring what the host does.
#[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct Curve25519Deriver;

#[cfg(all(not(target_os = "solana"), feature = "curve25519"))]
impl AddressDeriver for Curve25519Deriver {
    fn create_program_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Address,
    ) -> Result<Address, AddressError> {
        use sha2::{Digest, Sha256};

        check_seeds(seeds)?;

        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(program_id.as_ref());
        hasher.update(PDA_MARKER);

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());

        if crate::bytes_are_curve_point(hash) {
            return Err(AddressError::InvalidSeeds);
        }
        Ok(Address::from(hash))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, core::cell::Cell};

    const SEED: &[u8] = b"s";

    /// Accepts only the bump seeds `accept` returns true for and records
    /// every bump it was asked about.
    struct ScriptedDeriver<F: Fn(u8) -> bool> {
        accept: F,
        calls: Cell<usize>,
        first_bump: Cell<Option<u8>>,
        last_bump: Cell<Option<u8>>,
    }

    impl<F: Fn(u8) -> bool> ScriptedDeriver<F> {
        fn new(accept: F) -> Self {
            Self {
                accept,
                calls: Cell::new(0),
                first_bump: Cell::new(None),
                last_bump: Cell::new(None),
            }
        }
    }

    impl<F: Fn(u8) -> bool> AddressDeriver for ScriptedDeriver<F> {
        fn create_program_address(
            &self,
            seeds: &[&[u8]],
            _program_id: &Address,
        ) -> Result<Address, AddressError> {
            check_seeds(seeds)?;
            let bump = seeds.last().unwrap()[0];
            self.calls.set(self.calls.get() + 1);
            if self.first_bump.get().is_none() {
                self.first_bump.set(Some(bump));
            }
            self.last_bump.set(Some(bump));

            if (self.accept)(bump) {
                Ok(Address::from([bump; 32]))
            } else {
                Err(AddressError::InvalidSeeds)
            }
        }
    }

    #[test]
    fn test_find_exhausts_every_bump() {
        let deriver = ScriptedDeriver::new(|_| false);
        assert_eq!(
            deriver.find_program_address(&[b"vault"], &Address::default()),
            Err(AddressError::NoViableBumpSeed)
        );
        assert_eq!(deriver.calls.get(), 256);
        assert_eq!(deriver.first_bump.get(), Some(u8::MAX));
        assert_eq!(deriver.last_bump.get(), Some(0));
    }

    #[test]
    fn test_find_returns_highest_viable_bump() {
        let deriver = ScriptedDeriver::new(|bump| bump <= 200);
        assert_eq!(
            deriver.find_program_address(&[b"vault"], &Address::default()),
            Ok((Address::from([200; 32]), 200))
        );
        assert_eq!(deriver.calls.get(), 56);
    }

    #[test]
    fn test_find_reaches_bump_zero() {
        let deriver = ScriptedDeriver::new(|bump| bump == 0);
        assert_eq!(
            deriver.find_program_address(&[], &Address::default()),
            Ok((Address::from([0; 32]), 0))
        );
    }

    #[test]
    fn test_find_leaves_room_for_bump() {
        let deriver = ScriptedDeriver::new(|_| true);
        let seeds = [SEED; MAX_SEEDS];
        assert_eq!(
            deriver.find_program_address(&seeds, &Address::default()),
            Err(AddressError::MaxSeedLengthExceeded)
        );
        assert_eq!(deriver.calls.get(), 0);

        assert!(deriver
            .find_program_address(&seeds[..MAX_SEEDS - 1], &Address::default())
            .is_ok());
    }

    #[test]
    fn test_find_stops_on_other_errors() {
        let deriver = ScriptedDeriver::new(|_| true);
        let long_seed = [1u8; MAX_SEED_LEN + 1];
        assert_eq!(
            deriver.find_program_address(&[&long_seed], &Address::default()),
            Err(AddressError::MaxSeedLengthExceeded)
        );
    }

    #[test]
    fn test_check_seeds() {
        assert_eq!(check_seeds(&[]), Ok(()));
        assert_eq!(check_seeds(&[&[0; MAX_SEED_LEN]]), Ok(()));
        assert_eq!(
            check_seeds(&[&[0; MAX_SEED_LEN + 1]]),
            Err(AddressError::MaxSeedLengthExceeded)
        );
        let too_many = [SEED; MAX_SEEDS + 1];
        assert_eq!(
            check_seeds(&too_many),
            Err(AddressError::MaxSeedLengthExceeded)
        );
    }

    #[test]
    fn test_curve25519_deriver_matches_address_helpers() {
        let program_id = Address::from([42; 32]);
        let deriver = Curve25519Deriver;
        let (address, bump) = deriver
            .find_program_address(&[b"escrow", b"alice"], &program_id)
            .unwrap();
        assert_eq!(
            Address::find_program_address(&[b"escrow", b"alice"], &program_id),
            Ok((address.clone(), bump))
        );
        assert_eq!(
            deriver.create_program_address(&[b"escrow", b"alice", &[bump]], &program_id),
            Ok(address)
        );
    }
}
