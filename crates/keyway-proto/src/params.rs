//! Query parameter names and redirect canonicalisation.

use url::Url;

/// Wallet's ephemeral encryption key on a handshake response.
pub const WALLET_ENCRYPTION_PUBLIC_KEY: &str = "phantom_encryption_public_key";
/// Nonce used to seal `data` or `payload`.
pub const NONCE: &str = "nonce";
/// Sealed response body.
pub const DATA: &str = "data";
/// Failure code on a rejected request.
pub const ERROR_CODE: &str = "errorCode";
/// Human-readable failure reason on a rejected request.
pub const ERROR_MESSAGE: &str = "errorMessage";

/// Dapp's request key on an outbound request.
pub const DAPP_ENCRYPTION_PUBLIC_KEY: &str = "dapp_encryption_public_key";
/// Originating app URL on a connect request.
pub const APP_URL: &str = "app_url";
/// Where the wallet should send the user back.
pub const REDIRECT_LINK: &str = "redirect_link";
/// Target network on a connect request.
pub const CLUSTER: &str = "cluster";
/// Sealed request body.
pub const PAYLOAD: &str = "payload";

/// Every parameter a wallet may append to the redirect.
pub const RESPONSE_PARAMS: [&str; 5] =
    [WALLET_ENCRYPTION_PUBLIC_KEY, NONCE, DATA, ERROR_CODE, ERROR_MESSAGE];

/// The current URL with every response parameter removed.
///
/// This is both the `app_url` and the `redirect_link` of outbound requests,
/// so a page that has already received a response never sends the wallet a
/// link that would replay it. Unrelated parameters and the fragment survive.
pub fn canonical_redirect(current: &Url) -> Url {
    let kept: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(key, _)| !RESPONSE_PARAMS.iter().any(|param| *param == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = current.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// First value of `name` in the query string.
pub fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}
