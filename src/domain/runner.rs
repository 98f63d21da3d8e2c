//! Strategy runner: loads a trader once and isolates every step call.
//!
//! A step moves the runner Ready → Invoking → (Ok | Faulted) → Ready. Errors
//! and panics from the trader become [`StepFault`] records; they are logged
//! and counted, never propagated. Only a failing factory is fatal.

use serde::Serialize;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use super::error::QuotevalError;
use super::portfolio::Ledger;
use super::quote::Timestep;
use super::strategy::{StrategyFactory, Trader};
use super::universe::Universe;

/// Fault records kept verbatim; later faults are only counted.
pub const MAX_RECORDED_FAULTS: usize = 100;

thread_local! {
    static IN_TRADER: Cell<bool> = const { Cell::new(false) };
}

/// True while this thread is inside a factory or trader call. Panic hooks use
/// it to tell strategy panics, which become faults, from engine panics.
pub fn in_trader_call() -> bool {
    IN_TRADER.with(Cell::get)
}

/// Marks the current thread as running strategy code until dropped.
struct TraderCallGuard;

impl TraderCallGuard {
    fn enter() -> Self {
        IN_TRADER.with(|flag| flag.set(true));
        TraderCallGuard
    }
}

impl Drop for TraderCallGuard {
    fn drop(&mut self) {
        IN_TRADER.with(|flag| flag.set(false));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Ready,
    Invoking,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Error,
    Panic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFault {
    pub step: usize,
    pub timestep: Timestep,
    pub kind: FaultKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Ok,
    Faulted(StepFault),
}

pub struct StrategyRunner {
    trader: Box<dyn Trader>,
    state: RunnerState,
    fault_count: usize,
    faults: Vec<StepFault>,
}

impl StrategyRunner {
    /// Build the trader. A factory error or panic is a construction failure.
    pub fn load(factory: &dyn StrategyFactory, universe: &Universe) -> Result<Self, QuotevalError> {
        let built = {
            let _guard = TraderCallGuard::enter();
            panic::catch_unwind(AssertUnwindSafe(|| factory.build(universe)))
        };
        let trader = match built {
            Ok(Ok(trader)) => trader,
            Ok(Err(e)) => {
                return Err(QuotevalError::Construction {
                    reason: format!("{e:#}"),
                });
            }
            Err(payload) => {
                return Err(QuotevalError::Construction {
                    reason: format!("factory panicked: {}", panic_message(payload.as_ref())),
                });
            }
        };
        tracing::debug!(products = universe.count(), "trader built");

        Ok(StrategyRunner {
            trader,
            state: RunnerState::Ready,
            fault_count: 0,
            faults: Vec::new(),
        })
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn fault_count(&self) -> usize {
        self.fault_count
    }

    pub fn faults(&self) -> &[StepFault] {
        &self.faults
    }

    pub fn into_faults(self) -> (usize, Vec<StepFault>) {
        (self.fault_count, self.faults)
    }

    /// Run the trader for one step against the ledger's market.
    pub fn invoke(&mut self, ledger: &mut Ledger<'_, '_>) -> StepOutcome {
        self.state = RunnerState::Invoking;

        let market = ledger.market();
        let trader = &mut self.trader;
        let result = {
            let _guard = TraderCallGuard::enter();
            panic::catch_unwind(AssertUnwindSafe(|| trader.on_quote(market, ledger)))
        };

        let (kind, message) = match result {
            Ok(Ok(())) => {
                self.state = RunnerState::Ready;
                return StepOutcome::Ok;
            }
            Ok(Err(e)) => (FaultKind::Error, format!("{e:#}")),
            Err(payload) => (FaultKind::Panic, panic_message(payload.as_ref())),
        };

        self.state = RunnerState::Faulted;
        let fault = StepFault {
            step: market.step(),
            timestep: market.timestep(),
            kind,
            message,
        };
        tracing::error!(
            step = fault.step,
            timestep = %fault.timestep,
            kind = ?fault.kind,
            "strategy fault: {}",
            fault.message
        );

        self.fault_count += 1;
        if self.faults.len() < MAX_RECORDED_FAULTS {
            self.faults.push(fault.clone());
        }
        self.state = RunnerState::Ready;
        StepOutcome::Faulted(fault)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
