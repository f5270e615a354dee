use kubeboot_pki::signer::{dedup_hostnames, subject_alt_names};
use proptest::prelude::*;
use rcgen::SanType;
use std::collections::HashSet;

fn hostname() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,3}(\\.[a-z]{1,3}){0,2}",
        (0u8..4, 0u8..4).prop_map(|(a, b)| format!("10.0.{}.{}", a, b)),
    ]
}

proptest! {
    #[test]
    fn dedup_is_unique_and_keeps_first_occurrence(hosts in prop::collection::vec(hostname(), 0..24)) {
        let deduped = dedup_hostnames(&hosts);

        let unique: HashSet<_> = deduped.iter().collect();
        prop_assert_eq!(unique.len(), deduped.len());

        let all: HashSet<_> = hosts.iter().collect();
        prop_assert_eq!(unique, all);

        let positions: Vec<usize> = deduped
            .iter()
            .map(|h| hosts.iter().position(|x| x == h).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ip_literals_and_names_are_split(hosts in prop::collection::vec(hostname(), 0..24)) {
        let deduped = dedup_hostnames(&hosts);
        let sans = subject_alt_names(&deduped).unwrap();

        prop_assert_eq!(sans.len(), deduped.len());
        for (host, san) in deduped.iter().zip(&sans) {
            match san {
                SanType::IpAddress(ip) => prop_assert_eq!(&ip.to_string(), host),
                SanType::DnsName(dns) => prop_assert_eq!(dns.as_str(), host.as_str()),
                _ => prop_assert!(false, "unexpected SAN for {}", host),
            }
        }
    }
}
