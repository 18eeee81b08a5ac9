//! Fuzz target for opening sealed payloads.
//!
//! Ciphertext and nonce come straight from the URL. `decrypt` must reject
//! anything not sealed under the secret without panicking.
//!
//! ```bash
//! cargo +nightly fuzz run sealed_open
//! ```

#![no_main]

use keyway_crypto::{Nonce, SharedSecret, decrypt, encrypt};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, arbitrary::Arbitrary)]
struct FuzzInput {
    secret: [u8; 32],
    nonce: [u8; 24],
    plaintext: Vec<u8>,
    ciphertext: Vec<u8>,
    flip: usize,
}

fuzz_target!(|input: FuzzInput| {
    let secret = SharedSecret::from_bytes(input.secret);
    let nonce = Nonce::from_bytes(input.nonce);

    // Arbitrary bytes almost never authenticate; they must not panic.
    let _ = decrypt(&input.ciphertext, &nonce, &secret);

    let sealed = encrypt(&input.plaintext, &nonce, &secret).expect("encrypt");
    assert_eq!(decrypt(&sealed, &nonce, &secret).expect("open"), input.plaintext);

    let mut tampered = sealed;
    let index = input.flip % tampered.len();
    tampered[index] ^= 0x01;
    assert!(decrypt(&tampered, &nonce, &secret).is_err());
});
