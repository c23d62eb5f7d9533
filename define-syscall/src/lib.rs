//! Declarations of the functions the execution host exposes to programs.
//!
//! Syscalls are plain `extern "C"` symbols resolved by the loader when the
//! program is deployed. They only exist on the on-chain target, so the
//! [`definitions`] module is compiled for `target_os = "solana"` only and
//! every caller is expected to provide an off-chain fallback.

#![no_std]

#[cfg(any(target_os = "solana", target_arch = "bpf"))]
pub mod definitions;

/// Declare a host syscall.
///
/// ```ignore
/// define_syscall!(fn sol_log_(message: *const u8, len: u64));
/// define_syscall!(fn sol_sha256(vals: *const u8, val_len: u64, hash_result: *mut u8) -> u64);
/// ```
#[macro_export]
macro_rules! define_syscall {
    (fn $name:ident($($arg:ident: $typ:ty),*) -> $ret:ty) => {
        extern "C" {
            pub fn $name($($arg: $typ),*) -> $ret;
        }
    };
    (fn $name:ident($($arg:ident: $typ:ty),*)) => {
        $crate::define_syscall!(fn $name($($arg: $typ),*) -> ());
    };
}
