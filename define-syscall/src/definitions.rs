use crate::define_syscall;

// logging
define_syscall!(fn sol_log_(message: *const u8, len: u64));
define_syscall!(fn sol_log_pubkey(pubkey_addr: *const u8));

// hashing
define_syscall!(fn sol_sha256(vals: *const u8, val_len: u64, hash_result: *mut u8) -> u64);

// program derived addresses
define_syscall!(fn sol_create_program_address(seeds_addr: *const u8, seeds_len: u64, program_id_addr: *const u8, address_bytes_addr: *mut u8) -> u64);

// cross-program invocation
define_syscall!(fn sol_invoke_signed_c(instruction_addr: *const u8, account_infos_addr: *const u8, account_infos_len: u64, signers_seeds_addr: *const u8, signers_seeds_len: u64) -> u64);
