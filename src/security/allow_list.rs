//! Static allow-list of client addresses.
//!
//! Entries are bare IPv4/IPv6 addresses or CIDR prefixes. An entry whose
//! network address is unspecified (`0.0.0.0/0`, `::/0`, or any prefix of
//! them) admits every client.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("invalid allow-list entry {entry:?}: expected an IP address or CIDR prefix")]
    InvalidEntry { entry: String },
}

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    exact: HashSet<IpAddr>,
    networks: Vec<IpNet>,
    allow_any: bool,
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

impl AllowList {
    pub fn new<I, S>(entries: I) -> Result<Self, AllowListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = AllowList::default();

        for entry in entries {
            let entry = entry.as_ref().trim();
            if let Ok(ip) = entry.parse::<IpAddr>() {
                if ip.is_unspecified() {
                    list.allow_any = true;
                } else {
                    list.exact.insert(canonical(ip));
                }
            } else if let Ok(net) = entry.parse::<IpNet>() {
                if net.network().is_unspecified() {
                    list.allow_any = true;
                } else {
                    list.networks.push(net.trunc());
                }
            } else {
                return Err(AllowListError::InvalidEntry {
                    entry: entry.to_string(),
                });
            }
        }

        Ok(list)
    }

    /// Exact match first, then a linear scan of the prefixes.
    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.allow_any {
            return true;
        }
        let ip = canonical(ip);
        self.exact.contains(&ip) || self.networks.iter().any(|net| net.contains(&ip))
    }

    pub fn allows_any(&self) -> bool {
        self.allow_any
    }

    pub fn is_empty(&self) -> bool {
        !self.allow_any && self.exact.is_empty() && self.networks.is_empty()
    }
}
