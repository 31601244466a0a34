//! Fetch Demo
//!
//! Builds an HTTPS client from `key=value` trust options and performs one GET.
//!
//! ```text
//! fetch-demo https://localhost:8443/service?id=1 \
//!     server-trusted-cert=/certs/ca.crt \
//!     client-cert=/certs/client.crt client-private-key=/certs/client.pem
//! ```

// Example-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use std::collections::HashMap;
use std::error::Error as StdError;

use trustline::middleware::LogLevel;
use trustline::prelude::*;

/// Split the arguments into the target URL and the trust properties.
fn parse_args(args: impl IntoIterator<Item = String>) -> (Option<String>, HashMap<String, String>) {
    let mut url = None;
    let mut properties = HashMap::new();

    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) if !arg.starts_with("http") => {
                properties.insert(key.trim().to_owned(), value.to_owned());
            }
            _ => url = Some(arg),
        }
    }

    (url, properties)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn StdError>> {
    let (url, properties) = parse_args(std::env::args().skip(1));
    let Some(url) = url else {
        println!("usage: fetch-demo <url> [allow-self-signed=true] [server-trusted-cert=<paths>] [client-cert=<path> client-private-key=<path>]");
        return Ok(());
    };

    let options = ClientOptions::builder().logging(LogLevel::Info).build();
    let client =
        HttpClientFactory::with_options(options).create_client_from_properties(&properties)?;

    if let Some(downgrade) = client.context().security_downgrade() {
        println!(
            "warning: certificate validation disabled, prefer `{}`",
            downgrade.safer_option
        );
    }

    let response = client.get(&url).await?;
    println!("{} {url}", response.status());
    println!("{}", response.text());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_url_and_properties() {
        let args = [
            "https://localhost:8443/service?id=1&uuid=2",
            "allow-self-signed=true",
            "server-trusted-cert=/certs/a.crt,/certs/b.crt",
        ]
        .map(String::from);

        let (url, properties) = parse_args(args);

        assert_eq!(
            url.as_deref(),
            Some("https://localhost:8443/service?id=1&uuid=2")
        );
        assert_eq!(
            properties.get("server-trusted-cert").map(String::as_str),
            Some("/certs/a.crt,/certs/b.crt")
        );
        assert_eq!(properties.len(), 2);
    }
}
