//! Fuzz target for inbound response parsing.
//!
//! The page URL is attacker-controlled: anything can redirect to the dapp
//! with arbitrary query parameters. Parsing must never panic, and whatever
//! parses must survive a render/parse cycle.
//!
//! ```bash
//! cargo +nightly fuzz run inbound_response
//! ```

#![no_main]

use keyway_proto::{InboundResponse, params::canonical_redirect};
use libfuzzer_sys::fuzz_target;
use url::Url;

#[derive(Debug, arbitrary::Arbitrary)]
struct FuzzInput {
    wallet_key: Option<String>,
    nonce: Option<String>,
    data: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(mut url) = Url::parse("https://dapp.example/app?ref=fuzz") else {
        return;
    };
    {
        let mut query = url.query_pairs_mut();
        let fields = [
            ("phantom_encryption_public_key", &input.wallet_key),
            ("nonce", &input.nonce),
            ("data", &input.data),
            ("errorCode", &input.error_code),
            ("errorMessage", &input.error_message),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }

    let handshake = InboundResponse::is_handshake(&url);
    let Ok(response) = InboundResponse::parse(&url) else {
        return;
    };

    if handshake && input.error_code.is_none() {
        assert!(matches!(response, InboundResponse::Approved(_)));
    }

    let rendered = response.to_redirect(&canonical_redirect(&url));
    let reparsed = InboundResponse::parse(&rendered).expect("rendered response must parse");
    assert_eq!(reparsed, response);
});
