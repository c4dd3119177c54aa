//! Diagnostic grouping of allowlisted hosts by /24 subnet.
//!
//! Reporting only — nothing here affects enforcement. Grouping is restricted
//! to IPv4 literals: DNS names and IPv6 literals are skipped with a debug
//! log rather than being forced into a /24 bucket they do not belong to.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::allowlist::Allowlist;

/// Group IPv4 literals by their /24 prefix.
///
/// The key is the prefix rendered as `"a.b.c.0/24"`; members keep the order
/// they were passed in. Non-IPv4 input is skipped.
pub fn group_by_subnet24<'a, I>(hosts: I) -> HashMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();

    for host in hosts {
        let ip: Ipv4Addr = match host.parse() {
            Ok(ip) => ip,
            Err(_) => {
                debug!(host, "skipping non-IPv4 host in subnet report");
                continue;
            }
        };
        let o = ip.octets();
        let prefix = format!("{}.{}.{}.0/24", o[0], o[1], o[2]);
        groups.entry(prefix).or_default().push(host.to_string());
    }

    groups
}

/// Sort subnet prefixes ascending by the numeric value of their base address.
///
/// Prefixes that do not parse compare as equal, so invalid input degrades to
/// a no-op instead of an error.
pub fn sort_subnets(subnets: &mut [String]) {
    subnets.sort_by(|a, b| match (base_address(a), base_address(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => std::cmp::Ordering::Equal,
    });
}

fn base_address(subnet: &str) -> Option<[u8; 4]> {
    let (addr, _) = subnet.split_once('/')?;
    addr.parse::<Ipv4Addr>().ok().map(|ip| ip.octets())
}

/// Render the subnet summary for an allowlist.
///
/// One block per subnet in ascending order: the member count and the first
/// member with its representative (first recorded) port, then the remaining
/// members indented. Hostnames are sorted before grouping so the output is
/// deterministic for a given allowlist.
pub fn render_report(list: &Allowlist) -> String {
    let mut hosts: Vec<&str> = list.hosts().collect();
    hosts.sort_unstable();

    let groups = group_by_subnet24(hosts);
    let mut subnets: Vec<String> = groups.keys().cloned().collect();
    sort_subnets(&mut subnets);

    let mut out = String::new();
    for subnet in &subnets {
        let members = &groups[subnet];
        let first = &members[0];
        let port = list.first_port(first).unwrap_or("?");
        if members.len() == 1 {
            out.push_str(&format!("   1: {first}:{port}\n"));
            continue;
        }

        out.push_str(&format!(" {:3}: {first}:{port}\n", members.len()));
        for member in &members[1..] {
            let port = list.first_port(member).unwrap_or("?");
            out.push_str(&format!("      {member}:{port}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_first_three_octets_share_a_group() {
        let groups = group_by_subnet24(["10.0.1.5", "10.0.1.200"]);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups["10.0.1.0/24"],
            vec!["10.0.1.5".to_string(), "10.0.1.200".to_string()]
        );
    }

    #[test]
    fn differing_upper_octets_split_groups() {
        let groups = group_by_subnet24(["10.0.1.5", "10.0.2.5", "11.0.1.5"]);
        assert_eq!(groups.len(), 3);
        assert!(groups.contains_key("10.0.1.0/24"));
        assert!(groups.contains_key("10.0.2.0/24"));
        assert!(groups.contains_key("11.0.1.0/24"));
    }

    #[test]
    fn non_ipv4_hosts_are_skipped() {
        let groups = group_by_subnet24(["node.example.com", "2001:db8::1", "10.0.1.5"]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["10.0.1.0/24"], vec!["10.0.1.5".to_string()]);
    }

    #[test]
    fn subnets_sort_by_numeric_base_address() {
        let mut subnets = vec![
            "10.0.2.0/24".to_string(),
            "10.0.1.0/24".to_string(),
            "1.2.3.0/24".to_string(),
        ];
        sort_subnets(&mut subnets);
        assert_eq!(
            subnets,
            vec![
                "1.2.3.0/24".to_string(),
                "10.0.1.0/24".to_string(),
                "10.0.2.0/24".to_string(),
            ]
        );
    }

    #[test]
    fn invalid_subnets_do_not_panic_the_sort() {
        let mut subnets = vec!["not-a-subnet".to_string(), "10.0.1.0/24".to_string()];
        sort_subnets(&mut subnets);
        assert_eq!(subnets.len(), 2);
    }

    #[test]
    fn report_is_deterministic_and_counts_members() {
        let mut list = Allowlist::with_defaults();
        list.insert("10.0.1.5", "9999");
        list.insert("10.0.1.6", "9999");
        list.insert("192.0.2.9", "443");

        let report = render_report(&list);
        assert_eq!(report, render_report(&list));
        assert!(report.contains("   2: 10.0.1.5:9999\n"));
        assert!(report.contains("      10.0.1.6:9999\n"));
        assert!(report.contains("   1: 192.0.2.9:443\n"));
        // Lower subnet comes first.
        assert!(report.find("10.0.1.5").unwrap() < report.find("192.0.2.9").unwrap());
    }
}
