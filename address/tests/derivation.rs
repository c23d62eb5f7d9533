use {
    proptest::prelude::*,
    quartz_address::{error::AddressError, Address, MAX_SEEDS, MAX_SEED_LEN},
};

fn seeds_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(any::<u8>(), 0..=MAX_SEED_LEN),
        0..MAX_SEEDS,
    )
}

proptest! {
    #[test]
    fn found_addresses_are_off_curve_and_reproducible(
        program_id in any::<[u8; 32]>().prop_map(Address::from),
        seeds in seeds_strategy(),
    ) {
        let seeds: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();

        let (address, bump) = Address::find_program_address(&seeds, &program_id).unwrap();
        prop_assert!(!address.is_on_curve());

        let mut with_bump = seeds.clone();
        let bump_seed = [bump];
        with_bump.push(&bump_seed);
        prop_assert_eq!(
            Address::create_program_address(&with_bump, &program_id),
            Ok(address.clone())
        );
        prop_assert_eq!(
            Address::find_program_address(&seeds, &program_id),
            Ok((address, bump))
        );
    }

    #[test]
    fn created_addresses_never_land_on_curve(
        program_id in any::<[u8; 32]>().prop_map(Address::from),
        seed in prop::collection::vec(any::<u8>(), 0..=MAX_SEED_LEN),
    ) {
        match Address::create_program_address(&[&seed], &program_id) {
            Ok(address) => prop_assert!(!address.is_on_curve()),
            Err(error) => prop_assert_eq!(error, AddressError::InvalidSeeds),
        }
    }
}

#[test]
fn seeds_are_hashed_back_to_back() {
    let program_id = Address::from([3; 32]);
    assert_eq!(
        Address::create_program_address(&[b"abc", b"def", &[1]], &program_id),
        Address::create_program_address(&[b"abcdef", &[1]], &program_id),
    );
}
