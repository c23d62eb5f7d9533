#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]
#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[cfg(target_os = "solana")]
use quartz_define_syscall::definitions::sol_log_;

/// Re-exported for the `msg!` macro.
#[cfg(feature = "alloc")]
#[doc(hidden)]
pub use alloc::format;

/// Print a message to the program log.
///
/// A single expression is handed to [`sol_log`] as is and must be a `&str`.
/// Anything else goes through [`format!`] first, which needs the `alloc`
/// feature and costs noticeably more compute on-chain.
///
/// [`format!`]: https://doc.rust-lang.org/alloc/fmt/fn.format.html
///
/// # Examples
///
/// ```
/// use quartz_msg::msg;
///
/// msg!("closing vault");
///
/// let remaining = 42u64;
/// msg!("vault closed with {} lamports", remaining);
/// ```
#[cfg(feature = "alloc")]
#[macro_export]
macro_rules! msg {
    ($msg:expr) => {
        $crate::sol_log($msg)
    };
    ($($arg:tt)*) => ($crate::sol_log(&$crate::format!($($arg)*)));
}

/// Print a string to the log.
#[inline]
pub fn sol_log(message: &str) {
    #[cfg(target_os = "solana")]
    unsafe {
        sol_log_(message.as_ptr(), message.len() as u64);
    }

    #[cfg(all(not(target_os = "solana"), feature = "std"))]
    std::println!("{message}");

    #[cfg(all(not(target_os = "solana"), not(feature = "std")))]
    core::hint::black_box(message);
}
