use std::io::{Error, ErrorKind, Result};
use std::net::Ipv4Addr;

use nix::ifaddrs::getifaddrs;
use nix::net::if_::if_nametoindex;

/// First IPv4 address assigned to the named interface
pub fn get_interface_ip(name: &str) -> Result<Ipv4Addr> {
    if_nametoindex(name).map_err(|_| Error::new(ErrorKind::NotFound, format!("no interface named '{}'", name)))?;

    getifaddrs()?
        .find_map(|ifa| {
            if ifa.interface_name != name {
                return None;
            }
            ifa.address.and_then(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
        })
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("interface '{}' has no IPv4 address", name)))
}
