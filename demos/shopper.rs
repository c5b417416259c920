//! Shopper
//!
//! A simulated shopper walking an online store. Each state calls a fake
//! backend supplied as the run environment and waits on its latency;
//! `GetProfile` and `Browse` only wander into browsing when a d20 saving
//! throw succeeds.
//!
//! Run with: cargo run --example shopper
//! Set `RUST_LOG=gambit=debug` to see every roll.

use gambit::builder::{halt, MachineBuilder};
use gambit::core::DifficultyClass;
use gambit::effects::{
    CandidateSet, Difficulty, EventKind, MachineContext, MachineEvent, TransitionError,
    TransitionSpec,
};
use gambit::state_enum;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stillwater::effect::BoxedEffect;
use stillwater::prelude::*;
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Shopper {
        Register,
        GetProfile,
        Browse,
        Shop,
        Logout,
    }
}

/// Stand-in for an HTTP backend.
#[derive(Clone)]
struct Backend {
    latency: Duration,
    requests: Arc<AtomicUsize>,
}

impl Backend {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn call(&self, method: &str, url: &str) -> Result<(), TransitionError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  [backend] #{n} {method} {url}");
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}

fn request_then(
    method: &'static str,
    url: &'static str,
    next: TransitionSpec<Shopper>,
) -> impl Fn(&MachineContext<Shopper>) -> BoxedEffect<TransitionSpec<Shopper>, TransitionError, Backend>
       + Send
       + Sync
       + 'static {
    move |_ctx: &MachineContext<Shopper>| {
        let next = next.clone();
        from_async(move |backend: &Backend| {
            let backend = backend.clone();
            async move {
                backend.call(method, url).await?;
                Ok(next)
            }
        })
        .boxed()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gambit=info")),
        )
        .init();

    println!("=== Shopper ===\n");

    let profile_candidates = CandidateSet::new().with(Shopper::Browse, 4);
    // A second browse in a row is harder to justify.
    let browse_candidates = CandidateSet::new().with(
        Shopper::Browse,
        Difficulty::computed(|ctx: &MachineContext<Shopper>| {
            if ctx.previous_state() == Some(&Shopper::Browse) {
                DifficultyClass::Score(12)
            } else {
                DifficultyClass::Score(6)
            }
        }),
    );

    let machine = MachineBuilder::new()
        .state(
            Shopper::Register,
            request_then("POST", "/register", TransitionSpec::goto(Shopper::GetProfile)),
        )
        .state(
            Shopper::GetProfile,
            request_then(
                "GET",
                "/profile",
                TransitionSpec::weighted(profile_candidates, Shopper::Shop),
            ),
        )
        .state(
            Shopper::Browse,
            request_then(
                "GET",
                "/browse",
                TransitionSpec::weighted(browse_candidates, Shopper::Shop),
            ),
        )
        .state(
            Shopper::Shop,
            request_then("POST", "/basket", TransitionSpec::goto(Shopper::Logout)),
        )
        .handler(Shopper::Logout, halt())
        .initial(Shopper::Register)
        .build();

    let mut machine = match machine {
        Ok(machine) => machine,
        Err(err) => {
            eprintln!("could not build machine: {err}");
            return;
        }
    };

    machine.on(EventKind::Transition, |event| {
        if let MachineEvent::Transition {
            previous_state,
            next_state,
        } = event
        {
            match previous_state {
                Some(previous) => println!("{previous:?} -> {next_state:?}"),
                None => println!("start -> {next_state:?}"),
            }
        }
    });
    machine.on(EventKind::Error, |event| {
        if let MachineEvent::Error {
            error,
            current_state,
        } = event
        {
            println!("An error has occurred in state {current_state:?}");
            println!("{error}");
        }
    });
    machine.on(EventKind::End, |event| {
        if let MachineEvent::End { final_state } = event {
            println!("We stop at {final_state:?}. Bye!");
        }
    });

    let backend = Backend::new(Duration::from_millis(200));
    let summary = machine.start(&backend).await;

    println!(
        "\n{} ticks, {} backend requests, {} browsing detours",
        summary.ticks,
        backend.requests.load(Ordering::SeqCst),
        machine
            .history()
            .get_path()
            .iter()
            .filter(|state| ***state == Shopper::Browse)
            .count(),
    );
}
