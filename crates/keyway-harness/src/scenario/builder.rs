//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern: a scenario cannot run until it has an oracle.

use std::collections::VecDeque;

use keyway_core::{AdapterConfig, Outcome};

use crate::{
    Decision, SimTransaction,
    scenario::{OracleFn, StepOutcome, Transport, World},
};

/// One user-level action.
#[derive(Debug, Clone)]
pub enum Step {
    /// `connect()`; over the deep link the wallet answers and the page
    /// reloads and connects again
    Connect,
    /// `sign_message()`
    SignMessage(Vec<u8>),
    /// `sign_transaction()`
    SignTransaction(SimTransaction),
    /// `sign_all_transactions()`
    SignAllTransactions(Vec<SimTransaction>),
    /// `send_transaction()` with default options
    SendTransaction(SimTransaction),
    /// `disconnect()`
    Disconnect,
    /// Reload the page without response parameters
    Reload,
}

/// Scenario builder.
///
/// Wallet decisions are consumed in order, one per request the wallet app
/// answers; once exhausted the wallet approves.
pub struct Scenario {
    name: String,
    transport: Transport,
    seed: u64,
    config: AdapterConfig,
    decisions: VecDeque<Decision>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new deep-link scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::DeepLink,
            seed: 7,
            config: AdapterConfig::default(),
            decisions: VecDeque::new(),
            steps: Vec::new(),
        }
    }

    /// Connect through the injected extension instead.
    pub fn extension(mut self) -> Self {
        self.transport = Transport::Extension;
        self
    }

    /// Seed for every deterministic actor.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Adapter configuration.
    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// Queue the wallet's answer to the next request it sees.
    pub fn wallet_decides(mut self, decision: Decision) -> Self {
        self.decisions.push_back(decision);
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append [`Step::Connect`].
    pub fn connect(self) -> Self {
        self.step(Step::Connect)
    }

    /// Append [`Step::SignMessage`].
    pub fn sign_message(self, message: impl Into<Vec<u8>>) -> Self {
        self.step(Step::SignMessage(message.into()))
    }

    /// Append [`Step::SendTransaction`].
    pub fn send_transaction(self, transaction: SimTransaction) -> Self {
        self.step(Step::SendTransaction(transaction))
    }

    /// Append [`Step::Disconnect`].
    pub fn disconnect(self) -> Self {
        self.step(Step::Disconnect)
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every step on a current-thread runtime, then run the oracle
    /// against the final world.
    ///
    /// A step that fails is recorded as [`StepOutcome::Failed`] and the run
    /// continues; only harness-level problems (a wallet that cannot parse a
    /// request, a runtime that cannot start) abort the run.
    pub fn run(self) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| format!("Scenario '{}': runtime: {e}", self.scenario.name))?;

        let Self { mut scenario, oracle } = self;
        let name = scenario.name.clone();
        let world = runtime
            .block_on(scenario.execute())
            .map_err(|e| format!("Scenario '{name}': {e}"))?;

        oracle(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

impl Scenario {
    async fn execute(&mut self) -> Result<World, String> {
        let mut world = World::new(self.transport, self.seed, self.config.clone());

        for step in std::mem::take(&mut self.steps) {
            let outcome = self.execute_step(&mut world, step).await?;
            world.record(outcome);
        }
        Ok(world)
    }

    async fn execute_step(&mut self, world: &mut World, step: Step) -> Result<StepOutcome, String> {
        let outcome = match step {
            Step::Connect => {
                let before = world.host().navigations().len();
                if let Err(err) = world.adapter().connect().await {
                    return Ok(StepOutcome::Failed(err));
                }
                if world.host().navigations().len() > before {
                    if let Err(err) = world.answer(&self.next_decision()).await? {
                        return Ok(StepOutcome::Failed(err));
                    }
                }
                StepOutcome::Done
            },
            Step::SignMessage(message) => {
                let result = world.adapter().sign_message(&message).await;
                match result {
                    Ok(Outcome::Complete(signature)) => StepOutcome::MessageSignature(signature),
                    Ok(Outcome::Dispatched(_)) => self.settle(world).await?,
                    Err(err) => StepOutcome::Failed(err),
                }
            },
            Step::SignTransaction(tx) => {
                let result = world.adapter().sign_transaction(tx).await;
                match result {
                    Ok(Outcome::Complete(tx)) => StepOutcome::Transaction(tx),
                    Ok(Outcome::Dispatched(_)) => self.settle(world).await?,
                    Err(err) => StepOutcome::Failed(err),
                }
            },
            Step::SignAllTransactions(txs) => {
                let result = world.adapter().sign_all_transactions(txs).await;
                match result {
                    Ok(Outcome::Complete(txs)) => StepOutcome::Transactions(txs),
                    Ok(Outcome::Dispatched(_)) => self.settle(world).await?,
                    Err(err) => StepOutcome::Failed(err),
                }
            },
            Step::SendTransaction(tx) => {
                let result = world.send(tx).await;
                match result {
                    Ok(Outcome::Complete(signature)) => StepOutcome::Signature(signature),
                    Ok(Outcome::Dispatched(_)) => self.settle(world).await?,
                    Err(err) => StepOutcome::Failed(err),
                }
            },
            Step::Disconnect => {
                world.adapter().disconnect().await;
                StepOutcome::Done
            },
            Step::Reload => {
                world.reload_clean();
                StepOutcome::Done
            },
        };
        Ok(outcome)
    }

    async fn settle(&mut self, world: &mut World) -> Result<StepOutcome, String> {
        let decision = self.next_decision();
        world.complete_dispatch(&decision).await
    }

    fn next_decision(&mut self) -> Decision {
        self.decisions.pop_front().unwrap_or(Decision::Approve)
    }
}
