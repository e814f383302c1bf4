use multiaddr::{Multiaddr, Protocol};

use rst_common::with_errors::thiserror::{self, Error};

#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    #[error("rpc error: invalid addr: {0}")]
    InvalidMultiAddr(String),

    #[error("rpc error: empty addr")]
    EmptyMultiAddr,
}

/// build_endpoint used to parse given [`Multiaddr`] object into the agency base url
///
/// Only three host protocols are accepted:
///
/// - [`Protocol::Ip4`]
/// - [`Protocol::Dns`]
/// - [`Protocol::Dns4`]
///
/// The second component is expected to be the tcp port, anything else falls back to port 80
pub fn build_endpoint(addr: Multiaddr) -> Result<String, EndpointError> {
    if addr.is_empty() {
        return Err(EndpointError::EmptyMultiAddr);
    }

    let components = addr.iter().collect::<Vec<_>>();
    if components.len() < 2 {
        return Err(EndpointError::InvalidMultiAddr(String::from(
            "multiaddr length not valid",
        )));
    }

    let host = match &components[0] {
        Protocol::Ip4(ip) => Ok(format!("http://{}", ip)),
        Protocol::Dns(dns) => Ok(dns.to_string()),
        Protocol::Dns4(dns4) => Ok(dns4.to_string()),
        protocol => Err(EndpointError::InvalidMultiAddr(format!(
            "unknown protocol: {}",
            protocol
        ))),
    }?;

    let port = match components[1] {
        Protocol::Tcp(port) => port,
        _ => 80,
    };

    Ok(format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use multiaddr::multiaddr;

    #[test]
    fn test_multiaddr_invalid() {
        let addr = multiaddr!(Udp(10500u16), QuicV1);
        let parsed = build_endpoint(addr);
        assert!(matches!(parsed, Err(EndpointError::InvalidMultiAddr(_))));
    }

    #[test]
    fn test_multiaddr_too_short() {
        let addr = multiaddr!(Ip4(Ipv4Addr::new(127, 0, 0, 1)));
        let parsed = build_endpoint(addr);
        assert!(matches!(parsed, Err(EndpointError::InvalidMultiAddr(_))));

        let parsed = build_endpoint(Multiaddr::empty());
        assert_eq!(parsed, Err(EndpointError::EmptyMultiAddr))
    }

    #[test]
    fn test_multiaddr_dns() {
        let addr = multiaddr!(Dns("http://agency.local"), Tcp(8080u16));
        let parsed = build_endpoint(addr);
        assert_eq!(parsed, Ok("http://agency.local:8080".to_string()))
    }

    #[test]
    fn test_multiaddr_dns4() {
        let addr = multiaddr!(Dns4("http://agency.local"), Tcp(8080u16));
        let parsed = build_endpoint(addr);
        assert_eq!(parsed, Ok("http://agency.local:8080".to_string()))
    }

    #[test]
    fn test_multiaddr_ip4() {
        let addr = multiaddr!(Ip4(Ipv4Addr::new(127, 0, 0, 1)), Tcp(8080u16));
        let parsed = build_endpoint(addr);
        assert_eq!(parsed, Ok("http://127.0.0.1:8080".to_string()))
    }

    #[test]
    fn test_multiaddr_default_port() {
        let addr = multiaddr!(Ip4(Ipv4Addr::new(10, 0, 0, 2)), Udp(9000u16));
        let parsed = build_endpoint(addr);
        assert_eq!(parsed, Ok("http://10.0.0.2:80".to_string()))
    }
}
