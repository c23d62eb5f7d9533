//! Cross-program invocation.
//!
//! The host reads the callee's accounts through [`CpiAccount`] records that
//! point *into* the caller's account memory, so whatever the callee writes
//! lands in place and is visible through the caller's views once the call
//! returns. That only works for views over the input buffer
//! ([`Origin::Runtime`]). Detached views are mirrored into scratch memory
//! instead; see [`CpiPath`].

use {
    crate::{InstructionAccount, InstructionView, Signer},
    core::{
        marker::PhantomData,
        mem::MaybeUninit,
        ptr::addr_of,
        slice::from_raw_parts,
    },
    quartz_account_view::{AccountView, BorrowState, Origin, RENT_EXEMPT_RENT_EPOCH},
    quartz_address::{address_eq, Address},
    quartz_program_error::{ProgramError, ProgramResult},
};

/// Maximum number of accounts that can be passed to a single invocation.
pub const MAX_CPI_ACCOUNTS: usize = 32;

/// Status the host returns for a successful invocation.
pub const SUCCESS: u64 = 0;

/// An account record in the layout the host's C invocation interface
/// expects.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct CpiAccount<'a> {
    // Address of the account.
    address: *const Address,

    // Number of lamports owned by this account.
    lamports: *const u64,

    // Length of data in bytes.
    data_len: u64,

    // On-chain data within this account.
    data: *const u8,

    // Program that owns this account.
    owner: *const Address,

    // The epoch at which this account will next owe rent.
    rent_epoch: u64,

    // Transaction was signed by this account's key?
    is_signer: bool,

    // Is the account writable?
    is_writable: bool,

    // This account's data contains a loaded program (and is now read-only).
    executable: bool,

    _account_view: PhantomData<&'a AccountView>,
}

impl<'a> CpiAccount<'a> {
    /// Point straight into the record behind `account`.
    #[inline(always)]
    fn direct(account: &'a AccountView) -> Self {
        let raw = account.account_ptr();
        // SAFETY: The view guarantees `raw` points to a valid record.
        unsafe {
            Self {
                address: addr_of!((*raw).address),
                lamports: addr_of!((*raw).lamports),
                data_len: account.data_len() as u64,
                data: account.data_ptr(),
                owner: addr_of!((*raw).owner),
                rent_epoch: account.rent_epoch().unwrap_or(RENT_EXEMPT_RENT_EPOCH),
                is_signer: account.is_signer(),
                is_writable: account.is_writable(),
                executable: account.executable(),
                _account_view: PhantomData,
            }
        }
    }

    /// Point at copies of the mutable header fields held in `mirror`.
    #[inline(always)]
    fn mirrored(account: &'a AccountView, mirror: &'a Mirror) -> Self {
        Self {
            lamports: addr_of!(mirror.lamports),
            owner: addr_of!(mirror.owner),
            rent_epoch: RENT_EXEMPT_RENT_EPOCH,
            ..Self::direct(account)
        }
    }

    pub fn address(&self) -> &'a Address {
        unsafe { &*self.address }
    }

    /// Pointer the callee reads and writes the lamports through.
    pub fn lamports_ptr(&self) -> *mut u64 {
        self.lamports as *mut u64
    }

    /// Pointer the callee reads and writes the data through.
    pub fn data_ptr(&self) -> *mut u8 {
        self.data as *mut u8
    }

    pub fn data_len(&self) -> usize {
        self.data_len as usize
    }

    /// Pointer the callee reads and writes the owner through.
    pub fn owner_ptr(&self) -> *mut Address {
        self.owner as *mut Address
    }

    pub fn rent_epoch(&self) -> u64 {
        self.rent_epoch
    }

    pub fn is_signer(&self) -> bool {
        self.is_signer
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn executable(&self) -> bool {
        self.executable
    }
}

/// Scratch copy of the header fields a callee may write.
struct Mirror {
    lamports: u64,
    owner: Address,
}

/// An instruction in the layout the host's C invocation interface expects.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct CInstruction<'a> {
    /// Public key of the program.
    program_id: *const Address,

    /// Accounts expected by the program instruction.
    accounts: *const InstructionAccount<'a>,

    /// Number of accounts expected by the program instruction.
    accounts_len: u64,

    /// Data expected by the program instruction.
    data: *const u8,

    /// Length of the data expected by the program instruction.
    data_len: u64,

    _instruction: PhantomData<&'a ()>,
}

impl<'a> CInstruction<'a> {
    fn new(instruction: &'a InstructionView<'a, 'a, 'a, 'a>) -> Self {
        Self {
            program_id: instruction.program_id,
            accounts: instruction.accounts.as_ptr(),
            accounts_len: instruction.accounts.len() as u64,
            data: instruction.data.as_ptr(),
            data_len: instruction.data.len() as u64,
            _instruction: PhantomData,
        }
    }

    pub fn program_id(&self) -> &'a Address {
        unsafe { &*self.program_id }
    }

    pub fn accounts(&self) -> &'a [InstructionAccount<'a>] {
        unsafe { from_raw_parts(self.accounts, self.accounts_len as usize) }
    }

    pub fn data(&self) -> &'a [u8] {
        unsafe { from_raw_parts(self.data, self.data_len as usize) }
    }
}

/// The host side of a cross-program invocation.
///
/// [`SyscallHost`] is the runtime; tests substitute a fake that records what
/// it receives and mutates the accounts the way a callee would.
pub trait CpiHost {
    /// Run `instruction` with `accounts`, signing for the program derived
    /// addresses `signers` derive from. Returns the host status, `0` on
    /// success.
    fn invoke_signed_c(
        &self,
        instruction: &CInstruction,
        accounts: &[CpiAccount],
        signers: &[Signer],
    ) -> u64;
}

/// Invokes through the `sol_invoke_signed_c` syscall.
///
/// Off-chain there is no host to call and every invocation succeeds without
/// side effects. Signer seeds are not checked there either, so an invalid
/// signer is only rejected on chain. The account checks made before the
/// host is reached apply everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyscallHost;

impl CpiHost for SyscallHost {
    #[inline(always)]
    fn invoke_signed_c(
        &self,
        instruction: &CInstruction,
        accounts: &[CpiAccount],
        signers: &[Signer],
    ) -> u64 {
        #[cfg(target_os = "solana")]
        unsafe {
            quartz_define_syscall::definitions::sol_invoke_signed_c(
                instruction as *const CInstruction as *const u8,
                accounts.as_ptr() as *const u8,
                accounts.len() as u64,
                signers.as_ptr() as *const u8,
                signers.len() as u64,
            )
        }

        #[cfg(not(target_os = "solana"))]
        {
            core::hint::black_box((instruction, accounts, signers));
            SUCCESS
        }
    }
}

/// How the account records reach the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpiPath {
    /// Every view is over the input buffer and its record is passed by
    /// pointer. Writes made by the callee are visible after the call.
    Direct,

    /// At least one view is detached. The lamports and owner of the detached
    /// views are copied into scratch memory first, so the callee's writes to
    /// them are discarded. Data is still passed by pointer.
    Mirrored,
}

/// The path an invocation with `account_views` takes.
pub fn cpi_path(account_views: &[&AccountView]) -> CpiPath {
    if account_views
        .iter()
        .all(|account| account.origin() == Origin::Runtime)
    {
        CpiPath::Direct
    } else {
        CpiPath::Mirrored
    }
}

/// Invoke a cross-program instruction.
///
/// Equivalent to [`invoke_signed`] with no signers.
#[inline(always)]
pub fn invoke<const ACCOUNTS: usize>(
    instruction: &InstructionView,
    account_views: &[&AccountView; ACCOUNTS],
) -> ProgramResult {
    invoke_signed::<ACCOUNTS>(instruction, account_views, &[])
}

/// Invoke a cross-program instruction from a slice of accounts.
///
/// `MAX_ACCOUNTS` is the number of records reserved on the stack; passing
/// more views than that fails with
/// [`ProgramError::MaxCpiAccountsExceeded`].
#[inline(always)]
pub fn invoke_with_bounds<const MAX_ACCOUNTS: usize>(
    instruction: &InstructionView,
    account_views: &[&AccountView],
) -> ProgramResult {
    invoke_signed_with_bounds::<MAX_ACCOUNTS>(instruction, account_views, &[])
}

/// Invoke a cross-program instruction, signing for program derived
/// addresses with `signers_seeds`.
///
/// `account_views` must start with the accounts of `instruction`, in the
/// same order. Fails with:
///
/// - [`ProgramError::NotEnoughAccountKeys`] if fewer views than instruction
///   accounts are given;
/// - [`ProgramError::InvalidArgument`] if a view's address does not match
///   the instruction account at the same position;
/// - a borrow error if a writable account is borrowed in any way, or a
///   read-only account is mutably borrowed;
/// - [`ProgramError::CrossProgramInvocationFailed`] if the host reports a
///   non-zero status.
#[inline(always)]
pub fn invoke_signed<const ACCOUNTS: usize>(
    instruction: &InstructionView,
    account_views: &[&AccountView; ACCOUNTS],
    signers_seeds: &[Signer],
) -> ProgramResult {
    invoke_signed_with_host::<ACCOUNTS, _>(&SyscallHost, instruction, account_views, signers_seeds)
}

/// [`invoke_signed`] from a slice of accounts, see [`invoke_with_bounds`].
#[inline(always)]
pub fn invoke_signed_with_bounds<const MAX_ACCOUNTS: usize>(
    instruction: &InstructionView,
    account_views: &[&AccountView],
    signers_seeds: &[Signer],
) -> ProgramResult {
    invoke_signed_with_host::<MAX_ACCOUNTS, _>(
        &SyscallHost,
        instruction,
        account_views,
        signers_seeds,
    )
}

/// [`invoke_signed_with_bounds`] against an arbitrary [`CpiHost`].
pub fn invoke_signed_with_host<const MAX_ACCOUNTS: usize, H: CpiHost>(
    host: &H,
    instruction: &InstructionView,
    account_views: &[&AccountView],
    signers_seeds: &[Signer],
) -> ProgramResult {
    const {
        assert!(
            MAX_ACCOUNTS <= MAX_CPI_ACCOUNTS,
            "MAX_ACCOUNTS exceeds the accounts a single invocation can take"
        )
    };

    if account_views.len() > MAX_ACCOUNTS {
        return Err(ProgramError::MaxCpiAccountsExceeded);
    }

    check_accounts(instruction.accounts, account_views)?;

    let status = match cpi_path(account_views) {
        CpiPath::Direct => invoke_direct::<MAX_ACCOUNTS, H>(
            host,
            instruction,
            account_views,
            signers_seeds,
        ),
        CpiPath::Mirrored => invoke_mirrored::<MAX_ACCOUNTS, H>(
            host,
            instruction,
            account_views,
            signers_seeds,
        ),
    };

    if status == SUCCESS {
        Ok(())
    } else {
        quartz_msg::sol_log("Cross-program invocation failed");
        Err(ProgramError::CrossProgramInvocationFailed)
    }
}

fn check_accounts(
    instruction_accounts: &[InstructionAccount],
    account_views: &[&AccountView],
) -> ProgramResult {
    if instruction_accounts.len() > account_views.len() {
        return Err(ProgramError::NotEnoughAccountKeys);
    }

    for (instruction_account, account) in instruction_accounts.iter().zip(account_views) {
        if !address_eq(instruction_account.address, account.address()) {
            return Err(ProgramError::InvalidArgument);
        }

        if instruction_account.is_writable {
            // The callee may write either field.
            account.can_borrow_mut_lamports()?;
            account.can_borrow_mut_data()?;
        } else if account.is_borrowed(BorrowState::MutablyBorrowed) {
            return Err(ProgramError::AlreadyMutablyBorrowed);
        }
    }

    Ok(())
}

#[inline(always)]
fn invoke_direct<const MAX_ACCOUNTS: usize, H: CpiHost>(
    host: &H,
    instruction: &InstructionView,
    account_views: &[&AccountView],
    signers_seeds: &[Signer],
) -> u64 {
    // SAFETY: An array of `MaybeUninit` needs no initialization.
    let mut accounts: [MaybeUninit<CpiAccount>; MAX_ACCOUNTS] =
        unsafe { MaybeUninit::uninit().assume_init() };

    for (slot, account) in accounts.iter_mut().zip(account_views) {
        slot.write(CpiAccount::direct(account));
    }

    // SAFETY: The first `account_views.len()` records were written above.
    let accounts =
        unsafe { from_raw_parts(accounts.as_ptr() as *const CpiAccount, account_views.len()) };

    host.invoke_signed_c(&CInstruction::new(instruction), accounts, signers_seeds)
}

#[cold]
#[inline(never)]
fn invoke_mirrored<const MAX_ACCOUNTS: usize, H: CpiHost>(
    host: &H,
    instruction: &InstructionView,
    account_views: &[&AccountView],
    signers_seeds: &[Signer],
) -> u64 {
    // SAFETY: Arrays of `MaybeUninit` need no initialization.
    let mut mirrors: [MaybeUninit<Mirror>; MAX_ACCOUNTS] =
        unsafe { MaybeUninit::uninit().assume_init() };
    let mut accounts: [MaybeUninit<CpiAccount>; MAX_ACCOUNTS] =
        unsafe { MaybeUninit::uninit().assume_init() };

    for (mirror, account) in mirrors.iter_mut().zip(account_views) {
        mirror.write(Mirror {
            lamports: account.lamports(),
            // SAFETY: Copied out before anything can write the owner.
            owner: unsafe { account.owner() }.clone(),
        });
    }

    for ((slot, mirror), account) in accounts.iter_mut().zip(&mirrors).zip(account_views) {
        let record = match account.origin() {
            Origin::Runtime => CpiAccount::direct(account),
            // SAFETY: Every mirror for `account_views` was written above.
            Origin::Detached => CpiAccount::mirrored(account, unsafe { mirror.assume_init_ref() }),
        };
        slot.write(record);
    }

    // SAFETY: The first `account_views.len()` records were written above.
    let accounts =
        unsafe { from_raw_parts(accounts.as_ptr() as *const CpiAccount, account_views.len()) };

    host.invoke_signed_c(&CInstruction::new(instruction), accounts, signers_seeds)
}
