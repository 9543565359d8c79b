//! Factorial by a chain of actors.
//!
//! Every actor multiplies the running product by one more factor, spawns a
//! successor and, once the successor says hello, hands the product over and
//! dies. The last actor of the chain reports the result.

use anyhow::{anyhow, bail, Result};
use clap::Args;
use crossbeam_channel::Sender;
use log::{debug, error};
use std::sync::Arc;

use troupe_runtime::{ActorId, ActorSystem, Context, Message, MessageTag, Role, RuntimeConfig};

use super::deliver;

const MSG_HI_BACK: MessageTag = 0x1;
const MSG_COMPUTE: MessageTag = 0x2;

/// Arguments for the factorial command
#[derive(Args)]
pub struct FactorialArgs {
    /// Compute n!
    pub n: u32,
}

type FactorialRole = Role<Partial, FactorialMsg>;
type Outcome = std::result::Result<u128, u32>;

/// Work carried from one actor of the chain to the next
#[derive(Debug, Clone)]
pub struct Partial {
    k: u32,
    product: u128,
    n: u32,
    successor: Arc<FactorialRole>,
}

/// Payloads exchanged by the chain
#[derive(Debug)]
pub enum FactorialMsg {
    /// A freshly spawned successor announcing itself
    HiBack(ActorId),
    /// The product so far
    Compute(Partial),
}

/// Compute `n!` on an actor system built from `config`.
pub fn compute(n: u32, config: RuntimeConfig) -> Result<u128> {
    let (results, outcome) = crossbeam_channel::bounded(1);

    let successor = Arc::new(link_role(results.clone()).on_hello(greet_parent));
    let system = ActorSystem::create(config, Arc::new(link_role(results)))?;

    let first = Partial {
        k: 0,
        product: 1,
        n,
        successor,
    };
    deliver(&system.handle(), system.root(), || {
        Message::user(MSG_COMPUTE, FactorialMsg::Compute(first.clone()))
    })?;
    system.join();

    match outcome.try_recv() {
        Ok(Ok(product)) => Ok(product),
        Ok(Err(k)) => bail!("{}! does not fit in 128 bits (overflow at factor {})", n, k),
        Err(_) => Err(anyhow!("interrupted before {}! was computed", n)),
    }
}

/// Run the factorial command
pub fn execute(args: &FactorialArgs, config: RuntimeConfig) -> Result<()> {
    let product = compute(args.n, config)?;
    println!("{}", product);
    Ok(())
}

/// Callbacks shared by the first actor and its successors
fn link_role(results: Sender<Outcome>) -> FactorialRole {
    FactorialRole::new()
        .on(MSG_HI_BACK, hand_over)
        .on(MSG_COMPUTE, move |ctx, state, _, payload| match payload {
            FactorialMsg::Compute(partial) => step(ctx, state, partial, &results),
            other => error!("Actor {} expected a partial product, got {:?}", ctx.id(), other),
        })
}

/// Deliver from inside a callback; any failure other than a full mailbox
/// stops the chain for good, so the system is interrupted.
fn forward<F>(ctx: &Context<'_, Partial, FactorialMsg>, to: ActorId, make: F)
where
    F: Fn() -> Message<Partial, FactorialMsg>,
{
    if let Err(e) = deliver(ctx.system(), to, make) {
        error!("Actor {} cannot reach actor {}: {}", ctx.id(), to, e);
        ctx.system().interrupt();
    }
}

fn greet_parent(ctx: &Context<'_, Partial, FactorialMsg>, _: &mut Option<Partial>, parent: ActorId) {
    forward(ctx, parent, || {
        Message::user(MSG_HI_BACK, FactorialMsg::HiBack(ctx.id()))
    });
}

/// The successor is alive: pass the product on and leave.
fn hand_over(
    ctx: &Context<'_, Partial, FactorialMsg>,
    state: &mut Option<Partial>,
    _: usize,
    payload: FactorialMsg,
) {
    let child = match payload {
        FactorialMsg::HiBack(child) => child,
        other => {
            error!("Actor {} expected a greeting, got {:?}", ctx.id(), other);
            return;
        }
    };

    match state.take() {
        Some(partial) => forward(ctx, child, || {
            Message::user(MSG_COMPUTE, FactorialMsg::Compute(partial.clone()))
        }),
        None => error!("Actor {} greeted without a product to hand over", ctx.id()),
    }
    let _ = ctx.die();
}

fn step(
    ctx: &Context<'_, Partial, FactorialMsg>,
    state: &mut Option<Partial>,
    mut partial: Partial,
    results: &Sender<Outcome>,
) {
    if partial.k < partial.n {
        partial.k += 1;
        match partial.product.checked_mul(u128::from(partial.k)) {
            Some(product) => partial.product = product,
            None => {
                let _ = results.try_send(Err(partial.k));
                let _ = ctx.die();
                return;
            }
        }
    }

    debug!("Actor {} computed {}! = {}", ctx.id(), partial.k, partial.product);

    if partial.k == partial.n {
        let _ = results.try_send(Ok(partial.product));
        let _ = ctx.die();
        return;
    }

    let successor = Arc::clone(&partial.successor);
    *state = Some(partial);
    forward(ctx, ctx.id(), || Message::Spawn(Arc::clone(&successor)));
}
