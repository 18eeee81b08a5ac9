//! Reference model of the adapter over the deep-link route.
//!
//! The model tracks only what a page and its storage can observe: whether
//! this page instance holds an identity, which session values are stored,
//! and what the current URL carries. Model-based tests drive the model and
//! the real adapter with the same operation sequence and compare results.

use arbitrary::Arbitrary;

/// One step a user, page or wallet app can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Page calls `connect()`
    Connect,
    /// Page calls `sign_message()`
    SignMessage,
    /// Page calls `take_redirect_result()`
    CollectResult,
    /// Page calls `disconnect()`
    Disconnect,
    /// Wallet approves the last unanswered request; the page reloads on the
    /// redirect
    WalletApprove,
    /// Wallet rejects the last unanswered request; the page reloads on the
    /// redirect
    WalletReject,
    /// The user reloads the page without response parameters
    Reload,
}

/// Observable result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Succeeded with nothing further to report
    Ok,
    /// A request was dispatched by navigation
    Dispatched,
    /// A redirect result was collected
    Collected,
    /// The operation failed
    Error(OperationError),
}

/// Error classes the model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// No identity
    NotConnected,
    /// A required session value was not stored
    StorageKeyMissing,
    /// The wallet declined
    Rejected,
    /// Any other failure
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outstanding {
    Connect,
    Sign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Clean,
    Handshake,
    SignResult,
    Rejected,
}

/// Reference model.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    identity: bool,
    session: bool,
    request_keys: bool,
    pending_method: bool,
    outstanding: Option<Outstanding>,
    page: Page,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// Fresh page, empty storage.
    pub fn new() -> Self {
        Self {
            identity: false,
            session: false,
            request_keys: false,
            pending_method: false,
            outstanding: None,
            page: Page::Clean,
        }
    }

    /// Whether this page instance holds an identity.
    pub fn has_identity(&self) -> bool {
        self.identity
    }

    /// Whether a completed handshake is stored.
    pub fn has_session(&self) -> bool {
        self.session
    }

    /// Whether a navigation is waiting for the wallet.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Apply `op` and return the expected result.
    pub fn apply(&mut self, op: Operation) -> OperationResult {
        match op {
            Operation::Connect => self.connect(),
            Operation::SignMessage => self.sign_message(),
            Operation::CollectResult => self.collect(),
            Operation::Disconnect => self.disconnect(),
            Operation::WalletApprove => self.wallet(true),
            Operation::WalletReject => self.wallet(false),
            Operation::Reload => {
                self.reload(Page::Clean);
                OperationResult::Ok
            },
        }
    }

    fn connect(&mut self) -> OperationResult {
        if self.identity && self.session {
            return OperationResult::Ok;
        }

        if self.page == Page::Handshake {
            if !self.request_keys {
                return OperationResult::Error(OperationError::StorageKeyMissing);
            }
            self.identity = true;
            self.session = true;
            return OperationResult::Ok;
        }

        if self.session {
            self.identity = true;
            return OperationResult::Ok;
        }

        if self.page == Page::Rejected {
            return OperationResult::Error(OperationError::Rejected);
        }

        self.request_keys = true;
        self.pending_method = false;
        self.outstanding = Some(Outstanding::Connect);
        OperationResult::Ok
    }

    fn sign_message(&mut self) -> OperationResult {
        if !self.identity {
            return OperationResult::Error(OperationError::NotConnected);
        }
        self.pending_method = true;
        self.outstanding = Some(Outstanding::Sign);
        OperationResult::Dispatched
    }

    fn collect(&mut self) -> OperationResult {
        match self.page {
            Page::Clean | Page::Handshake => OperationResult::Ok,
            Page::Rejected if self.pending_method => {
                self.pending_method = false;
                OperationResult::Error(OperationError::Rejected)
            },
            Page::SignResult if self.pending_method => {
                self.pending_method = false;
                OperationResult::Collected
            },
            Page::Rejected | Page::SignResult => OperationResult::Ok,
        }
    }

    fn disconnect(&mut self) -> OperationResult {
        self.identity = false;
        if self.session {
            self.session = false;
            self.request_keys = false;
            self.pending_method = false;
        }
        OperationResult::Ok
    }

    fn wallet(&mut self, approve: bool) -> OperationResult {
        let Some(outstanding) = self.outstanding.take() else {
            return OperationResult::Ok;
        };
        let page = match (outstanding, approve) {
            (Outstanding::Connect, true) => Page::Handshake,
            (Outstanding::Sign, true) => Page::SignResult,
            (_, false) => Page::Rejected,
        };
        self.reload(page);
        OperationResult::Ok
    }

    fn reload(&mut self, page: Page) {
        self.identity = false;
        self.page = page;
    }
}
