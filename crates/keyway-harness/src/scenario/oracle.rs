//! Reusable oracle functions.
//!
//! Each helper returns an [`OracleFn`]; combine them with [`all_of`].

use std::collections::BTreeSet;

use keyway_core::AdapterEvent;

use crate::scenario::{OracleFn, StepOutcome};

/// Every step succeeded.
pub fn all_steps_succeeded() -> OracleFn {
    Box::new(|world| {
        for (index, outcome) in world.outcomes().iter().enumerate() {
            if let StepOutcome::Failed(err) = outcome {
                return Err(format!("step {index} failed: {err}"));
            }
        }
        Ok(())
    })
}

/// The current page is connected as the scenario's wallet account.
pub fn connected_as_wallet() -> OracleFn {
    Box::new(|world| {
        let expected = world.wallet_account();
        match world.adapter().public_key() {
            Some(key) if key == expected && world.adapter().connected() => Ok(()),
            Some(key) if key == expected => Err("identity set but route is not live".into()),
            Some(key) => Err(format!("connected as {key}, expected {expected}")),
            None => Err("not connected".into()),
        }
    })
}

/// The current page holds no identity.
pub fn disconnected() -> OracleFn {
    Box::new(|world| match world.adapter().public_key() {
        None => Ok(()),
        Some(key) => Err(format!("still connected as {key}")),
    })
}

/// No page published an `Error` event.
pub fn no_error_events() -> OracleFn {
    Box::new(|world| match world.error_events().first() {
        None => Ok(()),
        Some(err) => Err(format!("unexpected error event: {err}")),
    })
}

/// Exactly `expected` `Connect` events were published across all pages.
pub fn connect_events(expected: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world
            .events()
            .iter()
            .filter(|event| matches!(event, AdapterEvent::Connect(_)))
            .count();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected {expected} connect events, saw {actual}"))
        }
    })
}

/// Every sealed request reached the wallet under a distinct nonce.
pub fn unique_request_nonces() -> OracleFn {
    Box::new(|world| {
        let received = world.wallet().received();
        let distinct: BTreeSet<[u8; 24]> = received.iter().map(|request| request.nonce).collect();
        if distinct.len() == received.len() {
            Ok(())
        } else {
            Err(format!("{} requests shared {} nonces", received.len(), distinct.len()))
        }
    })
}

/// All oracles pass; reports the first failure.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
