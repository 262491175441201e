/// PROPERTY-BASED TESTS: Resource identifiers
///
/// Key invariants:
/// 1. A built identifier survives formatting and re-parsing unchanged
/// 2. Identifiers differing in any component are different
/// 3. Host spellings resolving to the same address name the same resource

use std::collections::HashSet;

use proptest::prelude::*;
use jsdt_shared::{ObjectType, ResourceUrl};

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_-]{0,15}"
}

fn port_strategy() -> impl Strategy<Value = u16> {
    1u16..=u16::MAX
}

proptest! {
    #[test]
    fn prop_reparsed_url_is_equal(name in name_strategy(), port in port_strategy()) {
        let url = ResourceUrl::session("127.0.0.1", port, "socket", &name);
        prop_assert!(url.is_valid());
        let reparsed = ResourceUrl::parse(&url.to_string());
        prop_assert_eq!(&reparsed, &url);
        prop_assert_eq!(reparsed.object_name(), name.as_str());
        prop_assert_eq!(reparsed.port(), port);
        prop_assert_eq!(reparsed.object_type(), ObjectType::Session);
    }

    #[test]
    fn prop_components_distinguish_urls(
        first in name_strategy(),
        second in name_strategy(),
        port in port_strategy(),
    ) {
        prop_assume!(first != second);
        let a = ResourceUrl::session("127.0.0.1", port, "socket", &first);
        let b = ResourceUrl::session("127.0.0.1", port, "socket", &second);
        prop_assert_ne!(&a, &b);

        let client = ResourceUrl::client("127.0.0.1", port, "socket", &first);
        prop_assert_ne!(&a, &client);

        let other_type = ResourceUrl::session("127.0.0.1", port, "http", &first);
        prop_assert_ne!(&a, &other_type);
    }

    #[test]
    fn prop_equal_urls_hash_alike(name in name_strategy(), port in port_strategy()) {
        let by_address = ResourceUrl::session("127.0.0.1", port, "socket", &name);
        let by_name = ResourceUrl::session("localhost", port, "socket", &name);
        prop_assert_eq!(&by_address, &by_name);

        let set: HashSet<ResourceUrl> = [by_address, by_name].into_iter().collect();
        prop_assert_eq!(set.len(), 1);
    }

    #[test]
    fn prop_garbage_never_validates(text in "[^:/]{0,24}") {
        let url = ResourceUrl::parse(&text);
        prop_assert!(!url.is_valid());
        prop_assert!(url.validated().is_err());
    }
}
