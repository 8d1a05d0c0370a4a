use crate::IdentityProfile;

use proptest::prelude::*;

// =========================================================================
// Property-Based Tests - Fingerprint
// =========================================================================

proptest! {
    #[test]
    fn given_same_content_when_fingerprinted_then_equal(
        id in "[a-z0-9]{1,20}",
        name in proptest::option::of("[A-Za-z ]{1,30}"),
        points in any::<i64>(),
    ) {
        let build = || {
            let mut builder = IdentityProfile::builder(id.clone()).custom("points", points);
            if let Some(name) = &name {
                builder = builder.name(name.clone());
            }
            builder.build()
        };

        prop_assert_eq!(build().fingerprint(), build().fingerprint());
    }

    #[test]
    fn given_different_names_when_fingerprinted_then_differ(
        a in "[A-Za-z]{1,20}",
        b in "[A-Za-z]{1,20}",
    ) {
        prop_assume!(a != b);
        let first = IdentityProfile::builder("u1").name(a).build();
        let second = IdentityProfile::builder("u1").name(b).build();

        prop_assert_ne!(first.fingerprint(), second.fingerprint());
    }
}

// =========================================================================
// Unit Tests - Fingerprint
// =========================================================================

#[test]
fn given_shifted_field_boundaries_when_fingerprinted_then_differ() {
    let first = IdentityProfile::builder("ab").name("c").build();
    let second = IdentityProfile::builder("a").name("bc").build();

    assert_ne!(first.fingerprint(), second.fingerprint());
}

#[test]
fn given_missing_vs_empty_name_when_fingerprinted_then_differ() {
    let without = IdentityProfile::builder("u1").build();
    let empty = IdentityProfile::builder("u1").name("").build();

    assert_ne!(without.fingerprint(), empty.fingerprint());
}

#[test]
fn given_int_vs_string_custom_value_when_fingerprinted_then_differ() {
    let int = IdentityProfile::builder("u1").custom("n", 1_i64).build();
    let string = IdentityProfile::builder("u1").custom("n", "1").build();

    assert_ne!(int.fingerprint(), string.fingerprint());
}

#[test]
fn given_fingerprint_when_formatted_then_is_sha256_hex() {
    let fingerprint = IdentityProfile::builder("u1").build().fingerprint();

    assert_eq!(fingerprint.as_str().len(), 64);
    assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}
