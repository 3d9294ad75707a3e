use std::net::{IpAddr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Reasons a url is refused at feed registration.
#[derive(Debug, Error)]
pub enum FeedUrlError {
    #[error("Invalid URL: {0}")]
    Malformed(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Loopback, private, link-local or unspecified address
    #[error("Internal address not allowed: {0}")]
    InternalHost(String),
}

/// Check a url before it is registered as a feed.
///
/// Only absolute http(s) urls naming a public host are accepted, so the
/// poller never ends up requesting something on the local network. Host
/// names other than `localhost` are not resolved here.
pub fn validate_feed_url(input: &str) -> Result<Url, FeedUrlError> {
    let url = Url::parse(input.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(FeedUrlError::UnsupportedScheme(other.to_string())),
    }

    let internal = match url.host() {
        None => return Err(FeedUrlError::MissingHost),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.');
            name.eq_ignore_ascii_case("localhost") || name.to_ascii_lowercase().ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_internal(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_internal(IpAddr::V6(ip)),
    };

    if internal {
        let host = url.host_str().unwrap_or_default().to_string();
        return Err(FeedUrlError::InternalHost(host));
    }
    Ok(url)
}

fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_internal(IpAddr::V4(v4));
            }
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(&v6) || is_link_local(&v6)
        }
    }
}

// fc00::/7
fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

// fe80::/10
fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_accepted() {
        let url = validate_feed_url("https://blog.boot.dev/index.xml").unwrap();
        assert_eq!(url.host_str(), Some("blog.boot.dev"));
        assert!(validate_feed_url("http://news.example.org").is_ok());
        assert!(validate_feed_url("  https://example.com/feed  ").is_ok());
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(FeedUrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_feed_url("ftp://example.com/feed"),
            Err(FeedUrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(matches!(
            validate_feed_url("not a url"),
            Err(FeedUrlError::Malformed(_))
        ));
        assert!(matches!(
            validate_feed_url("/relative/feed.xml"),
            Err(FeedUrlError::Malformed(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        for input in [
            "http://localhost/feed",
            "http://LOCALHOST./feed",
            "http://app.localhost/feed",
            "http://127.0.0.1/feed",
            "http://[::1]/feed",
            "http://0.0.0.0/feed",
        ] {
            assert!(
                matches!(validate_feed_url(input), Err(FeedUrlError::InternalHost(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_private_ranges_rejected() {
        for input in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://[fd00::1]/feed",
            "http://[fe80::1]/feed",
            "http://[::ffff:10.0.0.1]/feed",
        ] {
            assert!(validate_feed_url(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn test_public_ip_accepted() {
        assert!(validate_feed_url("http://93.184.216.34/feed").is_ok());
        assert!(validate_feed_url("http://[2606:2800:220:1::]/feed").is_ok());
    }
}
