//! Property tests for the operator input rules and mount ordering.

use proptest::prelude::*;

use arch_provision::{
    layout::MountPlan,
    validate::{self, RESERVED_USERNAMES},
};

// =============================================================================
// Hostname
// =============================================================================

proptest! {
    /// Whatever is accepted is made of well-formed labels.
    #[test]
    fn accepted_hostnames_have_valid_labels(h in "[A-Za-z0-9.-]{1,80}") {
        if validate::hostname(&h).is_ok() {
            prop_assert!(h.len() <= 253);
            for label in h.split('.') {
                prop_assert!((1..=63).contains(&label.len()));
                prop_assert!(!label.starts_with('-') && !label.ends_with('-'));
                prop_assert!(label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            }
        }
    }

    /// Dot-joined alphanumeric labels are always accepted.
    #[test]
    fn generated_hostnames_are_accepted(labels in prop::collection::vec("[a-z0-9]{1,20}", 1..5)) {
        let h = labels.join(".");
        prop_assert!(validate::hostname(&h).is_ok());
    }

    /// Any character outside the allowed set is rejected.
    #[test]
    fn foreign_characters_are_rejected(prefix in "[a-z]{1,10}", bad in "[_ /@!]") {
        let h = format!("{}{}", prefix, bad);
        prop_assert!(validate::hostname(&h).is_err());
    }
}

#[test]
fn hostname_examples() {
    assert!(validate::hostname("valid-host.example").is_ok());
    assert!(validate::hostname("-bad.com").is_err());
    assert!(validate::hostname("a..b").is_err());
    assert!(validate::hostname(&"a".repeat(254)).is_err());
}

// =============================================================================
// Username
// =============================================================================

proptest! {
    #[test]
    fn accepted_usernames_follow_every_rule(u in "[a-z0-9_A-Z-]{0,40}") {
        if validate::username(&u).is_ok() {
            prop_assert!((1..=32).contains(&u.len()));
            prop_assert!(u.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
            let first = u.chars().next().unwrap();
            prop_assert!(first.is_ascii_lowercase() || first == '_');
            prop_assert!(!u.ends_with('-') && !u.ends_with('_'));
            prop_assert!(!RESERVED_USERNAMES.contains(&u.as_str()));
        }
    }

    #[test]
    fn plain_lowercase_names_are_accepted(u in "[a-z][a-z0-9]{0,20}[a-z]") {
        prop_assume!(!RESERVED_USERNAMES.contains(&u.as_str()));
        prop_assert!(validate::username(&u).is_ok());
    }

    #[test]
    fn root_password_length_bounds(p in ".{0,140}") {
        let n = p.chars().count();
        prop_assert_eq!(validate::root_password(&p).is_ok(), (8..=128).contains(&n));
    }
}

#[test]
fn username_examples() {
    assert!(validate::username("root").is_err());
    assert!(validate::username("dev_user1").is_ok());
    assert!(validate::username("1alice").is_err());
    assert!(validate::username("alice-").is_err());
}

// =============================================================================
// Mount ordering
// =============================================================================

proptest! {
    /// No mount point is mounted before a mount point it lives under.
    #[test]
    fn parents_mount_first(depths in prop::collection::vec(1usize..5, 1..6)) {
        use std::fs;

        use arch_provision::layout::{DiskMappingBuilder, Role};

        let dir = tempfile::tempdir().unwrap();
        let dev = |name: String| -> String {
            let p = dir.path().join(name);
            fs::write(&p, "").unwrap();
            p.to_str().unwrap().to_string()
        };

        let mut builder = DiskMappingBuilder::default();
        builder.assign(Role::Root, &dev("root".into())).unwrap();
        builder.assign(Role::Esp, &dev("esp".into())).unwrap();

        // Nested chains like /srv/d1/d2/d3, listed deepest first.
        let mut seen = Vec::new();
        for depth in depths.iter().rev() {
            let path = format!("/srv{}", (1..=*depth).map(|d| format!("/d{}", d)).collect::<String>());
            if !seen.contains(&path) {
                builder.add_custom(&dev(format!("custom{}", seen.len())), &path).unwrap();
                seen.push(path);
            }
        }

        let mapping = builder.build().unwrap();
        let plan = MountPlan::new(&mapping, std::path::Path::new("/target"));
        let targets: Vec<_> = plan.entries().iter().map(|e| e.target.clone()).collect();
        for (i, first) in targets.iter().enumerate() {
            for then in &targets[i + 1..] {
                prop_assert!(!first.starts_with(then));
            }
        }
    }
}
