//! Scenario tests: whole user journeys verified by oracles.

use keyway_core::WalletError;
use keyway_harness::{
    Decision, SimTransaction,
    scenario::{Scenario, Step, StepOutcome, oracle},
};

#[test]
fn deep_link_connect_and_send() {
    let result = Scenario::new("deep link connect and send")
        .connect()
        .send_transaction(SimTransaction::new(b"transfer".to_vec()))
        .sign_message(b"gm".to_vec())
        .oracle(oracle::all_of(vec![
            oracle::all_steps_succeeded(),
            oracle::connected_as_wallet(),
            oracle::no_error_events(),
            oracle::unique_request_nonces(),
            Box::new(|world| match world.outcomes() {
                [
                    StepOutcome::Done,
                    StepOutcome::Signature(_),
                    StepOutcome::MessageSignature(_),
                ] => Ok(()),
                other => Err(format!("unexpected outcomes: {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn extension_connect_and_sign() {
    let result = Scenario::new("extension connect and sign")
        .extension()
        .connect()
        .step(Step::SignTransaction(SimTransaction::new(b"swap".to_vec())))
        .send_transaction(SimTransaction::new(b"transfer".to_vec()))
        .oracle(oracle::all_of(vec![
            oracle::all_steps_succeeded(),
            oracle::connected_as_wallet(),
            oracle::connect_events(1),
            Box::new(|world| {
                let account = world.extension().account_key();
                match world.outcomes() {
                    [_, StepOutcome::Transaction(tx), StepOutcome::Signature(_)]
                        if tx.is_signed_by(&account) =>
                    {
                        Ok(())
                    },
                    other => Err(format!("unexpected outcomes: {other:?}")),
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn session_survives_reload() {
    let result = Scenario::new("session survives reload")
        .connect()
        .step(Step::Reload)
        .connect()
        .sign_message(b"after reload".to_vec())
        .oracle(oracle::all_of(vec![
            oracle::all_steps_succeeded(),
            oracle::connected_as_wallet(),
            // handshake, resume after the reload, resume on the sign redirect
            oracle::connect_events(3),
            Box::new(|world| {
                if world.wallet().issued_tokens() == 1 {
                    Ok(())
                } else {
                    Err("reload must not start a new handshake".into())
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn rejected_connect_leaves_no_identity() {
    let result = Scenario::new("rejected connect")
        .wallet_decides(Decision::user_rejected())
        .connect()
        .oracle(oracle::all_of(vec![
            oracle::disconnected(),
            oracle::connect_events(0),
            Box::new(|world| match world.outcomes() {
                [StepOutcome::Failed(WalletError::Rejected { .. })] => Ok(()),
                other => Err(format!("expected a rejection, got {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn rejected_sign_keeps_the_session() {
    let result = Scenario::new("rejected sign")
        .wallet_decides(Decision::Approve)
        .wallet_decides(Decision::user_rejected())
        .connect()
        .sign_message(b"no thanks".to_vec())
        .sign_message(b"yes please".to_vec())
        .oracle(oracle::all_of(vec![
            oracle::connected_as_wallet(),
            Box::new(|world| match world.outcomes() {
                [
                    StepOutcome::Done,
                    StepOutcome::Failed(WalletError::Rejected { .. }),
                    StepOutcome::MessageSignature(_),
                ] => Ok(()),
                other => Err(format!("unexpected outcomes: {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn disconnect_then_reconnect_starts_a_new_handshake() {
    let result = Scenario::new("disconnect and reconnect")
        .connect()
        .disconnect()
        .step(Step::Reload)
        .connect()
        .oracle(oracle::all_of(vec![
            oracle::all_steps_succeeded(),
            oracle::connected_as_wallet(),
            Box::new(|world| {
                if world.wallet().issued_tokens() == 2 {
                    Ok(())
                } else {
                    Err(format!("expected 2 handshakes, saw {}", world.wallet().issued_tokens()))
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn handshake_page_after_disconnect_cannot_complete_again() {
    let result = Scenario::new("stale handshake page")
        .connect()
        .disconnect()
        .connect()
        .oracle(oracle::all_of(vec![
            oracle::disconnected(),
            Box::new(|world| match world.outcomes() {
                [
                    StepOutcome::Done,
                    StepOutcome::Done,
                    StepOutcome::Failed(WalletError::StorageKeyMissing { .. }),
                ] => Ok(()),
                other => Err(format!("unexpected outcomes: {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn signing_before_connect_fails() {
    let result = Scenario::new("sign before connect")
        .sign_message(b"too early".to_vec())
        .oracle(oracle::all_of(vec![
            oracle::disconnected(),
            Box::new(|world| match world.outcomes() {
                [StepOutcome::Failed(WalletError::NotConnected)] => Ok(()),
                other => Err(format!("unexpected outcomes: {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn oracle_failure_is_reported_with_scenario_name() {
    let result = Scenario::new("failing oracle")
        .oracle(Box::new(|_| Err("always fails".into())))
        .run();

    assert_eq!(result, Err("Scenario 'failing oracle': always fails".to_string()));
}
